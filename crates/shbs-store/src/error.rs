//! I/O failures, shutdown, lock timeout, key collisions, and descriptor
//! verification failures are all surfaced here. Nothing in the store
//! ever panics on a caller-reachable path in non-test code.

/// Errors returned by `Store` operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Underlying read/write/truncate/rename failure.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration read-lock could not be acquired within the
    /// 2s x 10 retry budget.
    #[error("config lock timeout after {0} attempts")]
    LockTimeout(u32),

    /// The on-disk configuration record failed to parse (truncated or
    /// corrupt). `Store::construct` treats this as a one-shot recovery
    /// trigger: it deletes the config and metadata files and starts
    /// fresh rather than propagating this error to the caller. This
    /// variant only reaches a caller if something downstream of that
    /// recovery (e.g. a direct `ConfigRecord::load` call) surfaces it.
    #[error("config file corrupt: {0}")]
    ConfigCorrupt(String),

    /// The caller's `BlockDescriptor::reconstruct` rejected the
    /// decrypted bytes.
    #[error("block descriptor verification failed: {0}")]
    Descriptor(String),
}

/// Result alias used throughout the store.
pub type Result<T> = std::result::Result<T, Error>;
