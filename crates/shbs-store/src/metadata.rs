//! The in-memory `Entry` and its 128-byte on-disk `MetadataRecord`.
//! Metadata fields are big-endian ("network order"), the opposite
//! endianness from the little-endian configuration record in
//! `config.rs` -- that asymmetry is deliberate, not accidental.

use bitflags::bitflags;

/// Exact on-disk size of one metadata record.
pub const METADATA_RECORD_LEN: usize = 128;

bitflags! {
    /// Per-slot flag bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EntryFlags: u64 {
        /// Slot holds a live entry. All other bytes are meaningless
        /// when this bit is clear.
        const OCCUPIED = 1 << 0;
        /// `plain_routing_key` is present at offset 0x40.
        const PLAIN_KEY_PRESENT = 1 << 1;
        /// Entry was written as a genuinely new block (vs. a relayed
        /// one), used to decide whether to upgrade the bit on a
        /// duplicate `put`.
        const NEW_BLOCK = 1 << 2;
        /// Entry arrived via overflow from a primary store, marking it
        /// ineligible to overflow again (cycle prevention).
        const WRONG_STORE = 1 << 3;
    }
}

/// An occupied-or-free slot's full in-memory representation: the fixed
/// metadata fields plus the (decrypted, once read) header+data bytes.
#[derive(Debug, Clone)]
pub struct Entry {
    /// `SHA-256(salt || routing_key)`.
    pub digested_routing_key: [u8; 32],
    /// Per-slot IV used to encrypt `header`/`data`.
    pub data_encrypt_iv: [u8; 16],
    /// Occupied / plain-key / new-block / wrong-store bits.
    pub flags: EntryFlags,
    /// Capacity at the time this entry was written. Used by the
    /// resize cleaner to tell "already in the right bucket" from
    /// "needs relocating".
    pub store_size: u64,
    /// Generation this entry was last touched at.
    pub generation: u32,
    /// Present only when `PLAIN_KEY_PRESENT` is set.
    pub plain_routing_key: Option<[u8; 32]>,
    /// Fixed-length header bytes (plaintext once decrypted).
    pub header: Vec<u8>,
    /// Fixed-length data bytes (plaintext once decrypted).
    pub data: Vec<u8>,
    /// Whether `header`/`data` are currently ciphertext in place.
    pub encrypted: bool,
}

impl Entry {
    /// A cleared, free-slot entry: the canonical free representation
    /// is the all-zero record.
    pub fn free() -> Self {
        Self {
            digested_routing_key: [0; 32],
            data_encrypt_iv: [0; 16],
            flags: EntryFlags::empty(),
            store_size: 0,
            generation: 0,
            plain_routing_key: None,
            header: Vec::new(),
            data: Vec::new(),
            encrypted: false,
        }
    }

    /// Whether the slot is occupied; any other field is meaningless
    /// when this is false.
    pub fn is_occupied(&self) -> bool {
        self.flags.contains(EntryFlags::OCCUPIED)
    }
}

/// The fixed 128-byte fields of an `Entry`, without header/data (those
/// live in the parallel `.hd` file). Byte layout:
///
/// ```text
/// [0x00] 32 B  digestedRoutingKey
/// [0x20] 16 B  dataEncryptIV
/// [0x30] u64   flags
/// [0x38] u64   storeSize
/// [0x40] 32 B  plainRoutingKey (only if PLAIN_KEY_PRESENT)
/// [0x60] u32   generation
/// [0x64] 28 B  reserved
/// ```
#[derive(Debug, Clone, Copy)]
pub struct MetadataRecord(pub [u8; METADATA_RECORD_LEN]);

impl MetadataRecord {
    /// The canonical free-slot record: all zero bytes.
    pub fn zeroed() -> Self {
        Self([0u8; METADATA_RECORD_LEN])
    }

    /// Encode an `Entry`'s fixed fields into wire form.
    pub fn encode(entry: &Entry) -> Self {
        let mut buf = [0u8; METADATA_RECORD_LEN];
        buf[0x00..0x20].copy_from_slice(&entry.digested_routing_key);
        buf[0x20..0x30].copy_from_slice(&entry.data_encrypt_iv);
        buf[0x30..0x38].copy_from_slice(&entry.flags.bits().to_be_bytes());
        buf[0x38..0x40].copy_from_slice(&entry.store_size.to_be_bytes());
        if let Some(plain) = entry.plain_routing_key {
            buf[0x40..0x60].copy_from_slice(&plain);
        }
        buf[0x60..0x64].copy_from_slice(&entry.generation.to_be_bytes());
        Self(buf)
    }

    /// Decode the fixed fields into a bare `Entry` (header/data left
    /// empty; the caller fills them in from the `.hd` file if needed).
    pub fn decode(&self) -> Entry {
        let buf = &self.0;
        let mut digested_routing_key = [0u8; 32];
        digested_routing_key.copy_from_slice(&buf[0x00..0x20]);
        let mut data_encrypt_iv = [0u8; 16];
        data_encrypt_iv.copy_from_slice(&buf[0x20..0x30]);
        let flags = EntryFlags::from_bits_truncate(u64::from_be_bytes(buf[0x30..0x38].try_into().unwrap()));
        let store_size = u64::from_be_bytes(buf[0x38..0x40].try_into().unwrap());
        let plain_routing_key = if flags.contains(EntryFlags::PLAIN_KEY_PRESENT) {
            let mut k = [0u8; 32];
            k.copy_from_slice(&buf[0x40..0x60]);
            Some(k)
        } else {
            None
        };
        let generation = u32::from_be_bytes(buf[0x60..0x64].try_into().unwrap());

        Entry {
            digested_routing_key,
            data_encrypt_iv,
            flags,
            store_size,
            generation,
            plain_routing_key,
            header: Vec::new(),
            data: Vec::new(),
            encrypted: true,
        }
    }

    /// Shortcut: is the OCCUPIED bit set, without decoding the rest.
    pub fn is_occupied(&self) -> bool {
        let flags = u64::from_be_bytes(self.0[0x30..0x38].try_into().unwrap());
        flags & EntryFlags::OCCUPIED.bits() != 0
    }

    /// Shortcut: the digested routing key, without decoding the rest.
    pub fn digested_key(&self) -> [u8; 32] {
        let mut k = [0u8; 32];
        k.copy_from_slice(&self.0[0x00..0x20]);
        k
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_entry_is_all_zero() {
        let rec = MetadataRecord::encode(&Entry::free());
        assert_eq!(rec.0, [0u8; METADATA_RECORD_LEN]);
        assert!(!rec.is_occupied());
    }

    #[test]
    fn round_trip_preserves_fixed_fields() {
        let mut entry = Entry::free();
        entry.digested_routing_key = [7u8; 32];
        entry.data_encrypt_iv = [9u8; 16];
        entry.flags = EntryFlags::OCCUPIED | EntryFlags::NEW_BLOCK;
        entry.store_size = 4096;
        entry.generation = 3;

        let rec = MetadataRecord::encode(&entry);
        let decoded = rec.decode();
        assert_eq!(decoded.digested_routing_key, entry.digested_routing_key);
        assert_eq!(decoded.data_encrypt_iv, entry.data_encrypt_iv);
        assert_eq!(decoded.flags, entry.flags);
        assert_eq!(decoded.store_size, entry.store_size);
        assert_eq!(decoded.generation, entry.generation);
        assert_eq!(decoded.plain_routing_key, None);
    }

    #[test]
    fn plain_key_round_trips_when_flag_set() {
        let mut entry = Entry::free();
        entry.flags = EntryFlags::OCCUPIED | EntryFlags::PLAIN_KEY_PRESENT;
        entry.plain_routing_key = Some([3u8; 32]);

        let rec = MetadataRecord::encode(&entry);
        let decoded = rec.decode();
        assert_eq!(decoded.plain_routing_key, Some([3u8; 32]));
    }

    #[test]
    fn occupied_shortcut_matches_full_decode() {
        let mut entry = Entry::free();
        entry.flags = EntryFlags::OCCUPIED;
        let rec = MetadataRecord::encode(&entry);
        assert!(rec.is_occupied());
        assert_eq!(rec.digested_key(), entry.digested_routing_key);
    }
}
