//! Bloom filter: a file-backed bitmap sized independently of capacity,
//! supporting `add`/`remove`/`test`, and a fork/merge/discard protocol
//! the cleaner uses during resize and bloom-rebuild sweeps so readers
//! never see a half-rebuilt filter.
//!
//! Several index/mask pairs are derived from one digest via double
//! hashing and folded into a flat word array of `AtomicU64`s so
//! concurrent readers and writers never need a lock of their own. This
//! filter additionally supports `remove`, making it a "possibly
//! counting" bloom filter, and persists to disk between runs.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicU64, Ordering};

use shbs_core::RoutingKeyDigest;

/// A bloom filter backed by an in-memory bit array of `AtomicU64`
/// words, loadable from and flushable to a `.bloom` file.
pub struct BloomFilter {
    bits: Vec<AtomicU64>,
    size_bits: u64,
    k: u32,
}

impl BloomFilter {
    /// A fresh, empty filter sized for `size_bits` bits and `k` probes.
    pub fn new(size_bits: u64, k: u32) -> Self {
        let words = (size_bits as usize).div_ceil(64).max(1);
        let mut bits = Vec::with_capacity(words);
        bits.resize_with(words, || AtomicU64::new(0));
        Self { bits, size_bits: size_bits.max(1), k: k.max(1) }
    }

    /// Load a filter from an open `.bloom` file, or create a fresh one
    /// if the file is empty/short.
    pub fn load(file: &mut std::fs::File, size_bits: u64, k: u32) -> io::Result<Self> {
        let mut filter = Self::new(size_bits, k);
        file.seek(SeekFrom::Start(0))?;
        let mut buf = vec![0u8; filter.bits.len() * 8];
        let n = file.read(&mut buf)?;
        for (i, word) in buf[..n].chunks(8).enumerate() {
            if word.len() == 8 {
                let v = u64::from_le_bytes(word.try_into().unwrap());
                filter.bits[i].store(v, Ordering::Relaxed);
            }
        }
        Ok(filter)
    }

    /// Persist the filter to an open `.bloom` file.
    pub fn flush(&self, file: &mut std::fs::File) -> io::Result<()> {
        file.seek(SeekFrom::Start(0))?;
        let mut buf = Vec::with_capacity(self.bits.len() * 8);
        for word in &self.bits {
            buf.extend_from_slice(&word.load(Ordering::Relaxed).to_le_bytes());
        }
        file.write_all(&buf)?;
        file.sync_all()
    }

    fn probe(&self, digest: &RoutingKeyDigest, i: u32) -> (usize, u64) {
        // Double hashing: combine two halves of the digest to derive k
        // independent-enough probe positions from one SHA-256 value.
        let d = digest.0;
        let mut h1 = [0u8; 8];
        h1.copy_from_slice(&d[0..8]);
        let mut h2 = [0u8; 8];
        h2.copy_from_slice(&d[8..16]);
        let h1 = u64::from_be_bytes(h1);
        let h2 = u64::from_be_bytes(h2);
        let combined = h1.wrapping_add((i as u64).wrapping_mul(h2));
        let bit = combined % self.size_bits;
        ((bit / 64) as usize, 1u64 << (bit % 64))
    }

    /// Add a key's digest to the filter.
    pub fn add(&self, digest: &RoutingKeyDigest) {
        for i in 0..self.k {
            let (word, mask) = self.probe(digest, i);
            self.bits[word].fetch_or(mask, Ordering::Relaxed);
        }
    }

    /// Remove a key's digest (best-effort: if another key shares a bit
    /// position, that bit will incorrectly clear, which only costs a
    /// spurious false negative risk -- mitigated by periodic rebuild).
    pub fn remove(&self, digest: &RoutingKeyDigest) {
        for i in 0..self.k {
            let (word, mask) = self.probe(digest, i);
            self.bits[word].fetch_and(!mask, Ordering::Relaxed);
        }
    }

    /// Test whether a key's digest might be present. `false` is a
    /// guarantee of absence; `true` is not a guarantee of presence.
    pub fn test(&self, digest: &RoutingKeyDigest) -> bool {
        for i in 0..self.k {
            let (word, mask) = self.probe(digest, i);
            if self.bits[word].load(Ordering::Relaxed) & mask == 0 {
                return false;
            }
        }
        true
    }

    /// Number of hash functions in use.
    pub fn k(&self) -> u32 {
        self.k
    }

    /// Bitmap size in bits.
    pub fn size_bits(&self) -> u64 {
        self.size_bits
    }

    /// Start a write-only shadow filter for a rebuild/resize sweep.
    /// Reads continue to hit the live filter; only `merge` or
    /// `discard` ends the fork.
    pub fn fork(&self) -> BloomFilter {
        BloomFilter::new(self.size_bits, self.k)
    }

    /// Atomically replace this filter's bits with the fork's, the
    /// final step of a rebuild or resize sweep.
    pub fn merge(&self, fork: &BloomFilter) {
        debug_assert_eq!(self.bits.len(), fork.bits.len());
        for (dst, src) in self.bits.iter().zip(&fork.bits) {
            dst.store(src.load(Ordering::Relaxed), Ordering::Relaxed);
        }
    }
}

impl std::fmt::Debug for BloomFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BloomFilter").field("size_bits", &self.size_bits).field("k", &self.k).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest(seed: u8) -> RoutingKeyDigest {
        RoutingKeyDigest::new([seed; 32])
    }

    #[test]
    fn add_then_test_is_present() {
        let b = BloomFilter::new(4096, 3);
        let d = digest(7);
        assert!(!b.test(&d));
        b.add(&d);
        assert!(b.test(&d));
    }

    #[test]
    fn empty_filter_reports_absent() {
        let b = BloomFilter::new(4096, 3);
        assert!(!b.test(&digest(1)));
    }

    #[test]
    fn fork_is_independent_until_merged() {
        let live = BloomFilter::new(4096, 3);
        let d = digest(9);
        live.add(&d);
        let fork = live.fork();
        assert!(!fork.test(&d), "fork starts empty");
        let d2 = digest(10);
        fork.add(&d2);
        assert!(!live.test(&d2), "live filter unaffected by fork until merge");
        live.merge(&fork);
        assert!(live.test(&d2));
        assert!(!live.test(&d), "merge replaces rather than unions");
    }

    #[test]
    fn flush_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.bloom");
        let filter = BloomFilter::new(4096, 3);
        let d = digest(3);
        filter.add(&d);

        let mut file = std::fs::OpenOptions::new().create(true).read(true).write(true).open(&path).unwrap();
        filter.flush(&mut file).unwrap();

        let mut file2 = std::fs::OpenOptions::new().read(true).write(true).open(&path).unwrap();
        let loaded = BloomFilter::load(&mut file2, 4096, 3).unwrap();
        assert!(loaded.test(&d));
    }
}
