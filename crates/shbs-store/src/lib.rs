//! A fixed-capacity, index-less, content-addressed block store for a
//! peer-to-peer anonymizing network node.
//!
//! Blocks are addressed by a routing-key digest and stored across a
//! pair of parallel files (`<name>.metadata`, `<name>.hd`) with no
//! on-disk index: candidate slot offsets are recomputed from the key on
//! every lookup ([`layout`]). Slot contents are encrypted per-entry
//! ([`cipher`]), accessed through positional file I/O so concurrent
//! callers never race on a shared cursor ([`io`]), and protected by
//! per-offset locking with ascending-order acquisition to avoid
//! deadlocking against the background maintenance sweep ([`lock`],
//! [`cleaner`]). [`store::Store`] ties these together behind the public
//! `fetch`/`put`/`probably_in_store` API.
//!
//! Network protocol handling, request scheduling, block verification
//! policy, and UI surfaces are out of scope: callers provide a
//! [`descriptor::BlockDescriptor`] and a [`rng::SecureRandom`] source.
//!
//! Slot I/O uses `std::os::unix::fs::FileExt` for positional reads and
//! writes, so this crate only builds on Unix targets.

#![deny(unsafe_code)]

pub mod bloom;
pub mod cipher;
pub mod cleaner;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod io;
pub mod layout;
pub mod lock;
pub mod metadata;
pub mod rng;
pub mod stats;
pub mod store;

pub use descriptor::{Block, BlockDescriptor, Scheduler, ShutdownHook, ThreadScheduler};
pub use error::{Error, Result};
pub use rng::SecureRandom;
pub use store::{PutOutcome, Store};
