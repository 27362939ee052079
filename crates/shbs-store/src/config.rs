//! Persisted configuration record. Unlike the big-endian metadata
//! file, the config record is little-endian -- that asymmetry is
//! deliberate, not a bug, and is preserved here.
//!
//! Written via an atomic-write idiom: a `.config.tmp` file is written,
//! `fsync`'d, then renamed into place.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use bitflags::bitflags;

use crate::error::{Error, Result};

/// Exact on-disk size of the config record: at least 96 bytes are
/// required; this implementation uses exactly 96.
pub const CONFIG_RECORD_LEN: usize = 96;

bitflags! {
    /// Store-wide flag bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ConfigFlags: u32 {
        /// Set before any write becomes durable; cleared only at
        /// orderly `close()`.
        const DIRTY = 1 << 0;
        /// A bloom-filter rebuild sweep is due.
        const REBUILD_BLOOM = 1 << 1;
    }
}

/// The persisted, process-wide configuration and cumulative counters
/// for one store.
#[derive(Debug, Clone)]
pub struct ConfigRecord {
    /// Salt, optionally master-key-encrypted on disk (see `cipher.rs`).
    pub disk_salt: [u8; 16],
    /// Current slot count.
    pub capacity: u64,
    /// Nonzero while a resize is in progress.
    pub previous_capacity: u64,
    /// Estimated number of distinct keys currently stored.
    pub key_count: u64,
    /// Current epoch tag.
    pub generation: u32,
    /// Dirty / rebuild-bloom bits.
    pub flags: ConfigFlags,
    /// Bloom filter hash-function count.
    pub bloom_k: u32,
    /// Cumulative write count.
    pub writes: u64,
    /// Cumulative hit count.
    pub hits: u64,
    /// Cumulative miss count.
    pub misses: u64,
    /// Cumulative bloom false-positive count.
    pub bloom_false_positives: u64,
}

impl ConfigRecord {
    /// A fresh configuration for a brand-new store.
    pub fn new(disk_salt: [u8; 16], capacity: u64, bloom_k: u32) -> Self {
        Self {
            disk_salt,
            capacity,
            previous_capacity: 0,
            key_count: 0,
            generation: 0,
            flags: ConfigFlags::DIRTY,
            bloom_k,
            writes: 0,
            hits: 0,
            misses: 0,
            bloom_false_positives: 0,
        }
    }

    /// Encode to the exact on-disk byte layout: salt at `0x00`, then
    /// capacity, previousCapacity, key count, generation, flags, bloom
    /// k, two reserved fields, then the four cumulative counters.
    pub fn to_bytes(&self) -> [u8; CONFIG_RECORD_LEN] {
        let mut buf = [0u8; CONFIG_RECORD_LEN];
        buf[0x00..0x10].copy_from_slice(&self.disk_salt);
        buf[0x10..0x18].copy_from_slice(&self.capacity.to_le_bytes());
        buf[0x18..0x20].copy_from_slice(&self.previous_capacity.to_le_bytes());
        buf[0x20..0x28].copy_from_slice(&self.key_count.to_le_bytes());
        buf[0x28..0x2C].copy_from_slice(&self.generation.to_le_bytes());
        buf[0x2C..0x30].copy_from_slice(&self.flags.bits().to_le_bytes());
        buf[0x30..0x34].copy_from_slice(&self.bloom_k.to_le_bytes());
        // 0x34..0x40 reserved, left zeroed.
        buf[0x40..0x48].copy_from_slice(&self.writes.to_le_bytes());
        buf[0x48..0x50].copy_from_slice(&self.hits.to_le_bytes());
        buf[0x50..0x58].copy_from_slice(&self.misses.to_le_bytes());
        buf[0x58..0x60].copy_from_slice(&self.bloom_false_positives.to_le_bytes());
        buf
    }

    /// Decode from on-disk bytes, failing on truncation.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < CONFIG_RECORD_LEN {
            return Err(Error::ConfigCorrupt(format!(
                "record too short: {} < {CONFIG_RECORD_LEN}",
                buf.len()
            )));
        }
        let mut disk_salt = [0u8; 16];
        disk_salt.copy_from_slice(&buf[0x00..0x10]);
        let le8 = |r: std::ops::Range<usize>| u64::from_le_bytes(buf[r].try_into().unwrap());
        let le4 = |r: std::ops::Range<usize>| u32::from_le_bytes(buf[r].try_into().unwrap());

        Ok(Self {
            disk_salt,
            capacity: le8(0x10..0x18),
            previous_capacity: le8(0x18..0x20),
            key_count: le8(0x20..0x28),
            generation: le4(0x28..0x2C),
            flags: ConfigFlags::from_bits_truncate(le4(0x2C..0x30)),
            bloom_k: le4(0x30..0x34),
            writes: le8(0x40..0x48),
            hits: le8(0x48..0x50),
            misses: le8(0x50..0x58),
            bloom_false_positives: le8(0x58..0x60),
        })
    }

    /// Load from `<name>.config`, or `None` if the file does not
    /// exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        match fs::read(path) {
            Ok(bytes) => Self::from_bytes(&bytes).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Persist atomically: write `<name>.config.tmp`, `fsync`, then
    /// rename over `<name>.config`.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("config.tmp");
        {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(&self.to_bytes())?;
            f.sync_all()?;
        }
        fs::rename(&tmp, path)?;
        if let Some(parent) = path.parent() {
            if let Ok(dirf) = fs::File::open(parent) {
                let _ = dirf.sync_all();
            }
        }
        Ok(())
    }
}

/// Read the raw bytes of an existing config file purely for recovery
/// diagnostics (not used on the happy path).
pub fn read_raw(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut f = fs::File::open(path)?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    Ok(buf)
}
