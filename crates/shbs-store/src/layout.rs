//! Offset hashing: maps a digested routing key to up to `P` candidate slot offsets
//! within a given capacity, deterministically and without an on-disk
//! index. Quadratic probing with a prime-ish step avoids clustering;
//! masking to a non-negative `i64`-equivalent range before the modulo
//! preserves uniform reduction.

use shbs_core::RoutingKeyDigest;

/// Number of candidate slots probed per key.
pub const CANDIDATES_PER_KEY: usize = 5;

/// Up to `CANDIDATES_PER_KEY` distinct offsets in `[0, capacity)`.
/// Fewer than `CANDIDATES_PER_KEY` entries are returned only for tiny
/// capacities where `P > capacity`.
pub fn candidate_offsets(digest: &RoutingKeyDigest, capacity: u64) -> Vec<u64> {
    assert!(capacity > 0, "capacity must be nonzero");
    let h = digest.seed();
    let mut offsets: Vec<u64> = Vec::with_capacity(CANDIDATES_PER_KEY);

    for i in 0..CANDIDATES_PER_KEY as u64 {
        // (h + 141*i^2 + 13*i) mod 2^63, then mod capacity.
        let step = (141u64.wrapping_mul(i).wrapping_mul(i)).wrapping_add(13u64.wrapping_mul(i));
        let mut candidate = (h.wrapping_add(step)) & 0x7FFF_FFFF_FFFF_FFFF;
        candidate %= capacity;

        // Uniquify: bump modulo capacity until distinct from all prior
        // candidates, or give up once every slot has been tried (tiny
        // stores where P > capacity).
        let mut attempts: u64 = 0;
        while offsets.contains(&candidate) && attempts < capacity {
            candidate = (candidate + 1) % capacity;
            attempts += 1;
        }
        if offsets.contains(&candidate) {
            // Capacity smaller than P and every slot already claimed;
            // stop early rather than push a duplicate.
            break;
        }
        offsets.push(candidate);
    }
    offsets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest_from_seed(seed: u64) -> RoutingKeyDigest {
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&seed.to_be_bytes());
        RoutingKeyDigest::new(bytes)
    }

    #[test]
    fn offsets_are_within_capacity() {
        let d = digest_from_seed(0xDEAD_BEEF_1234_5678);
        for capacity in [1024u64, 4096, 7, 100_003] {
            for &o in &candidate_offsets(&d, capacity) {
                assert!(o < capacity);
            }
        }
    }

    #[test]
    fn offsets_are_distinct_for_large_capacity() {
        // For C > P, all candidate offsets for a given key are
        // pairwise distinct.
        for seed in 0..200u64 {
            let d = digest_from_seed(seed.wrapping_mul(0x9E37_79B9));
            let offsets = candidate_offsets(&d, 100_000);
            assert_eq!(offsets.len(), CANDIDATES_PER_KEY);
            let mut sorted = offsets.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), offsets.len(), "duplicate offsets for seed {seed}");
        }
    }

    #[test]
    fn deterministic_across_calls() {
        let d = digest_from_seed(42);
        assert_eq!(candidate_offsets(&d, 1024), candidate_offsets(&d, 1024));
    }

    #[test]
    fn tiny_capacity_never_panics_and_stays_distinct() {
        for capacity in 1u64..=5 {
            let d = digest_from_seed(7);
            let offsets = candidate_offsets(&d, capacity);
            assert!(offsets.len() <= capacity as usize);
            let mut sorted = offsets.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), offsets.len());
        }
    }
}
