//! Positional reads/writes over the two parallel on-disk files, with
//! preallocation and the `offsetReady` watermark that tracks how much
//! of the files is safe to touch.
//!
//! Positional access goes through `FileExt::{read_exact_at,
//! write_all_at}` so concurrent callers never share (and race on) a
//! file cursor -- many foreground threads and the background cleaner
//! all touch these files at once.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};
use crate::metadata::{Entry, MetadataRecord, METADATA_RECORD_LEN};

/// Header+data records are padded to a multiple of this size for
/// aligned I/O.
pub const HD_ALIGNMENT: usize = 512;

/// Non-cryptographic PRNG stream used to pre-fill the `.hd` file so its
/// disk footprint looks identical before and after writes land.
/// Reseeded every 1 GiB written.
struct FillStream {
    state: u64,
}

impl FillStream {
    fn new(seed: u64) -> Self {
        Self { state: seed ^ 0x2545_F491_4F6C_DD1D }
    }

    fn next_u64(&mut self) -> u64 {
        // xorshift64*
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    fn fill(&mut self, buf: &mut [u8]) {
        for chunk in buf.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }
}

const RESEED_EVERY: u64 = 1 << 30; // 1 GiB

/// Record stride (in bytes) of the header+data file for a given block
/// type's fixed header/data lengths.
pub fn hd_record_len(header_len: usize, data_len: usize) -> usize {
    let raw = header_len + data_len;
    let pad = (HD_ALIGNMENT - (raw % HD_ALIGNMENT)) % HD_ALIGNMENT;
    raw + pad
}

/// Owns the two open files and the preallocation watermark.
pub struct SlotFiles {
    metadata_file: File,
    hd_file: File,
    hd_record_len: usize,
    /// Largest slot index known to be preallocated in both files.
    offset_ready: AtomicU64,
}

impl SlotFiles {
    /// Open (creating if absent) the `.metadata` and `.hd` files
    /// rooted at `base` (e.g. `dir/name`), and preallocate up to
    /// `capacity` slots if `preallocate` is requested.
    pub fn open(
        base: &Path,
        capacity: u64,
        header_len: usize,
        data_len: usize,
        preallocate: bool,
    ) -> Result<Self> {
        let hd_record_len = hd_record_len(header_len, data_len);
        let metadata_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(base.with_extension("metadata"))?;
        let hd_file =
            OpenOptions::new().create(true).read(true).write(true).open(base.with_extension("hd"))?;

        let existing_slots = metadata_file.metadata()?.len() / METADATA_RECORD_LEN as u64;
        let slots = Self {
            metadata_file,
            hd_file,
            hd_record_len,
            offset_ready: AtomicU64::new(existing_slots.min(capacity)),
        };
        if preallocate {
            slots.extend_to(capacity)?;
        }
        Ok(slots)
    }

    /// Largest slot index known preallocated in both files.
    pub fn offset_ready(&self) -> u64 {
        self.offset_ready.load(Ordering::Acquire)
    }

    /// The on-disk stride of one header+data record.
    pub fn hd_record_len(&self) -> usize {
        self.hd_record_len
    }

    /// Grow both files so that `target` slots are preallocated.
    /// Metadata is zero-filled (occupied=0 means free); header+data is
    /// filled with the non-cryptographic PRNG stream, reseeded every
    /// 1 GiB.
    pub fn extend_to(&self, target: u64) -> Result<()> {
        let current = self.offset_ready();
        if target <= current {
            return Ok(());
        }

        self.metadata_file.set_len(target * METADATA_RECORD_LEN as u64)?;
        let zero_chunk = vec![0u8; METADATA_RECORD_LEN * 64];
        let mut slot = current;
        while slot < target {
            let n = ((target - slot) as usize).min(64);
            let off = slot * METADATA_RECORD_LEN as u64;
            self.metadata_file.write_all_at(&zero_chunk[..n * METADATA_RECORD_LEN], off)?;
            slot += n as u64;
        }

        self.hd_file.set_len(target * self.hd_record_len as u64)?;
        let mut rng = FillStream::new(current ^ (target << 1));
        let mut buf = vec![0u8; self.hd_record_len];
        let mut bytes_since_reseed: u64 = 0;
        for slot in current..target {
            rng.fill(&mut buf);
            let off = slot * self.hd_record_len as u64;
            self.hd_file.write_all_at(&buf, off)?;
            bytes_since_reseed += buf.len() as u64;
            if bytes_since_reseed >= RESEED_EVERY {
                rng = FillStream::new(slot ^ 0x1234_5678);
                bytes_since_reseed = 0;
            }
        }

        self.metadata_file.sync_all()?;
        self.hd_file.sync_all()?;
        self.offset_ready.store(target, Ordering::Release);
        Ok(())
    }

    /// Shortcut: read just the flag bits at offset `o`.
    pub fn flags_at(&self, o: u64) -> Result<MetadataRecord> {
        let mut buf = [0u8; METADATA_RECORD_LEN];
        self.metadata_file.read_exact_at(&mut buf, o * METADATA_RECORD_LEN as u64)?;
        Ok(MetadataRecord(buf))
    }

    /// Read the fixed metadata fields and, if `with_data`, the
    /// decrypted-pending header+data bytes for slot `o`. If
    /// `expected_key` is given and the stored digested key does not
    /// match, treat as not-found. EOF past `offset_ready` is expected
    /// during a resize shrink and returns `Ok(None)`; elsewhere it is
    /// logged and also returns `Ok(None)`.
    pub fn read_entry(
        &self,
        o: u64,
        expected_key: Option<&[u8; 32]>,
        with_data: bool,
        resize_in_progress: bool,
    ) -> Result<Option<Entry>> {
        if o >= self.offset_ready() {
            if !resize_in_progress {
                tracing::warn!(offset = o, "read past offsetReady outside resize");
            }
            return Ok(None);
        }

        let rec = self.flags_at(o)?;
        if !rec.is_occupied() {
            return Ok(None);
        }
        if let Some(expected) = expected_key {
            if rec.digested_key() != *expected {
                return Ok(None);
            }
        }

        let mut entry = rec.decode();
        if with_data {
            let mut buf = vec![0u8; self.hd_record_len];
            match self.hd_file.read_exact_at(&mut buf, o * self.hd_record_len as u64) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof && resize_in_progress => {
                    return Ok(None)
                }
                Err(e) => return Err(Error::Io(e)),
            }
            // header_len/data_len are supplied by the caller via split;
            // SlotFiles itself only knows the padded stride, so it
            // hands back the whole padded buffer split at the lengths
            // recorded by the caller through `split_hd`.
            entry.header = buf;
            entry.data = Vec::new();
        }
        Ok(Some(entry))
    }

    /// Split a raw padded header+data buffer (as read by
    /// `read_entry`) into `(header, data)` using the block type's
    /// fixed lengths.
    pub fn split_hd(buf: Vec<u8>, header_len: usize, data_len: usize) -> (Vec<u8>, Vec<u8>) {
        let mut buf = buf;
        let data = buf.split_off(header_len);
        buf.truncate(header_len);
        (buf, data[..data_len].to_vec())
    }

    /// Write an already-encrypted entry's metadata and header+data
    /// records at offset `o`.
    pub fn write_entry(&self, entry: &Entry, o: u64) -> Result<()> {
        let rec = MetadataRecord::encode(entry);
        self.metadata_file.write_all_at(&rec.0, o * METADATA_RECORD_LEN as u64)?;

        let mut buf = vec![0u8; self.hd_record_len];
        let total = entry.header.len() + entry.data.len();
        buf[..entry.header.len()].copy_from_slice(&entry.header);
        buf[entry.header.len()..total].copy_from_slice(&entry.data);
        self.hd_file.write_all_at(&buf, o * self.hd_record_len as u64)?;
        Ok(())
    }

    /// Clear slot `o` to the canonical free representation (zeroed
    /// metadata record).
    pub fn free_slot(&self, o: u64) -> Result<()> {
        let rec = MetadataRecord::zeroed();
        self.metadata_file.write_all_at(&rec.0, o * METADATA_RECORD_LEN as u64)?;
        Ok(())
    }

    /// Read a batch of `count` raw metadata records starting at `start`
    /// as one buffer (used by the cleaner's batch processor).
    pub fn read_metadata_batch(&self, start: u64, count: u64) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; (count as usize) * METADATA_RECORD_LEN];
        self.metadata_file.read_exact_at(&mut buf, start * METADATA_RECORD_LEN as u64)?;
        Ok(buf)
    }

    /// Write a batch of raw metadata records back starting at `start`.
    pub fn write_metadata_batch(&self, start: u64, buf: &[u8]) -> Result<()> {
        self.metadata_file.write_all_at(buf, start * METADATA_RECORD_LEN as u64)?;
        Ok(())
    }

    /// Force both files to stable storage (used at `close()`).
    pub fn sync_all(&self) -> Result<()> {
        self.metadata_file.sync_all()?;
        self.hd_file.sync_all()?;
        Ok(())
    }

    /// Current length of the metadata file, in slots.
    pub fn metadata_len_slots(&self) -> Result<u64> {
        Ok(self.metadata_file.metadata()?.len() / METADATA_RECORD_LEN as u64)
    }

    /// Current length of the header+data file, in bytes.
    pub fn hd_len_bytes(&self) -> Result<u64> {
        Ok(self.hd_file.metadata()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::EntryFlags;

    #[test]
    fn preallocation_zero_fills_metadata_and_randomizes_hd() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("store");
        let files = SlotFiles::open(&base, 16, 8, 8, true).unwrap();
        assert_eq!(files.offset_ready(), 16);

        let meta = std::fs::read(base.with_extension("metadata")).unwrap();
        assert!(meta.iter().all(|&b| b == 0));

        let hd = std::fs::read(base.with_extension("hd")).unwrap();
        assert!(hd.iter().any(|&b| b != 0), "hd file should be PRNG-filled, not zero");
    }

    #[test]
    fn write_then_read_entry_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("store");
        let files = SlotFiles::open(&base, 16, 4, 4, true).unwrap();

        let mut entry = Entry::free();
        entry.digested_routing_key = [9u8; 32];
        entry.flags = EntryFlags::OCCUPIED;
        entry.header = vec![1, 2, 3, 4];
        entry.data = vec![5, 6, 7, 8];
        files.write_entry(&entry, 3).unwrap();

        let got = files.read_entry(3, Some(&[9u8; 32]), true, false).unwrap().unwrap();
        let (header, data) = SlotFiles::split_hd(got.header, 4, 4);
        assert_eq!(header, vec![1, 2, 3, 4]);
        assert_eq!(data, vec![5, 6, 7, 8]);
    }

    #[test]
    fn free_slot_reads_as_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("store");
        let files = SlotFiles::open(&base, 8, 4, 4, true).unwrap();
        assert!(files.read_entry(2, None, false, false).unwrap().is_none());
    }

    #[test]
    fn mismatched_expected_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("store");
        let files = SlotFiles::open(&base, 8, 4, 4, true).unwrap();
        let mut entry = Entry::free();
        entry.digested_routing_key = [1u8; 32];
        entry.flags = EntryFlags::OCCUPIED;
        entry.header = vec![0; 4];
        entry.data = vec![0; 4];
        files.write_entry(&entry, 0).unwrap();

        assert!(files.read_entry(0, Some(&[2u8; 32]), false, false).unwrap().is_none());
    }

    #[test]
    fn read_past_offset_ready_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("store");
        let files = SlotFiles::open(&base, 8, 4, 4, false).unwrap();
        assert_eq!(files.offset_ready(), 0);
        assert!(files.read_entry(5, None, false, true).unwrap().is_none());
    }

    #[test]
    fn hd_record_len_pads_to_512() {
        assert_eq!(hd_record_len(10, 10), 512);
        assert_eq!(hd_record_len(256, 256), 512);
        assert_eq!(hd_record_len(300, 300), 1024);
    }
}
