//! The 32-byte SHA-256 digest of a routing key.

/// `SHA-256(salt || routing_key)`. Stored on disk in place of the plain
/// routing key so that an operator who only knows the salt cannot
/// enumerate stored content by key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoutingKeyDigest(pub [u8; 32]);

impl RoutingKeyDigest {
    /// Wrap raw digest bytes.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// First 8 bytes, interpreted as a big-endian `u64`, used by the
    /// offset-hashing layer as the probe seed.
    pub fn seed(&self) -> u64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.0[..8]);
        u64::from_be_bytes(buf)
    }

    /// Hex-encoded lowercase string, for logging only (never logged at
    /// a level that would reach an untrusted sink — see `cleaner.rs`).
    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Debug for RoutingKeyDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RoutingKeyDigest({}…)", &self.to_hex()[..8])
    }
}

impl AsRef<[u8]> for RoutingKeyDigest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_is_first_eight_bytes_big_endian() {
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&0x0102_0304_0506_0708u64.to_be_bytes());
        let d = RoutingKeyDigest::new(bytes);
        assert_eq!(d.seed(), 0x0102_0304_0506_0708);
    }

    #[test]
    fn debug_does_not_print_full_digest() {
        let d = RoutingKeyDigest::new([0xAB; 32]);
        let s = format!("{d:?}");
        assert!(!s.contains(&hex::encode([0xAB; 32])));
    }
}
