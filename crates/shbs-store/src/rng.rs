//! Cryptographic random source, supplied by the caller rather than
//! fixed by this crate.
//!
//! Any `rand_core::RngCore` implementation (e.g. `rand::rngs::OsRng` or
//! a `ChaCha20Rng` seeded for deterministic tests) satisfies this
//! automatically via the blanket impl below.

/// Supplies the random bytes the cipher manager needs for per-slot IVs.
pub trait SecureRandom: Send + Sync + 'static {
    /// Fill `buf` with cryptographically random bytes.
    fn fill(&self, buf: &mut [u8]);
}

impl<T: rand_core::RngCore + Send + Sync + 'static> SecureRandom for std::sync::Mutex<T> {
    fn fill(&self, buf: &mut [u8]) {
        self.lock().expect("rng mutex poisoned").fill_bytes(buf);
    }
}
