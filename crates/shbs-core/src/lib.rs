//! Shared primitives for the salted hash block store.
//!
//! Small, dependency-light types used by both the store engine and its
//! tests: a digest newtype, a wrapping generation counter, and the
//! millisecond timestamp / jittered-duration helpers the cleaner uses to
//! schedule sweeps.

#![deny(unsafe_code)]

pub mod digest;
pub mod generation;
pub mod time;

pub use digest::RoutingKeyDigest;
pub use generation::Generation;
