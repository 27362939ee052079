//! Per-slot encryption. This store's slot cipher carries no
//! authentication tag of its own -- verification is the caller's
//! block-descriptor's job once bytes are decrypted, and the on-disk
//! record reserves a 16-byte IV rather than a 12-byte AEAD nonce. AES-256
//! in CTR mode fits that shape, keyed from `(salt, routing key or
//! digest)` so that without the routing key, recovering plaintext from
//! ciphertext is infeasible even if the salt leaks.

use aes::cipher::{KeyIvInit, StreamCipher};
use sha2::{Digest as ShaDigest, Sha256};

use crate::metadata::Entry;
use crate::rng::SecureRandom;

type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;

/// Owns the in-memory salt and, when a master key is configured, its
/// AES-256-ECB-wrapped on-disk form.
pub struct CipherManager {
    salt: [u8; 16],
    disk_salt: [u8; 16],
}

impl CipherManager {
    /// Construct with a plaintext-on-disk salt (no master key).
    pub fn new(salt: [u8; 16]) -> Self {
        Self { salt, disk_salt: salt }
    }

    /// Construct with a master key: `disk_salt = AES-256(salt, master_key)`.
    pub fn with_master_key(salt: [u8; 16], master_key: &[u8; 32]) -> Self {
        use aes::cipher::BlockEncrypt;
        let cipher = <aes::Aes256 as aes::cipher::KeyInit>::new(master_key.into());
        let mut block = aes::Block::default();
        block[..16].copy_from_slice(&salt);
        cipher.encrypt_block(&mut block);
        let mut disk_salt = [0u8; 16];
        disk_salt.copy_from_slice(&block);
        Self { salt, disk_salt }
    }

    /// Recover a `CipherManager` from its on-disk salt form.
    pub fn from_disk(disk_salt: [u8; 16], master_key: Option<&[u8; 32]>) -> Self {
        match master_key {
            None => Self { salt: disk_salt, disk_salt },
            Some(key) => {
                use aes::cipher::BlockDecrypt;
                let cipher = <aes::Aes256 as aes::cipher::KeyInit>::new(key.into());
                let mut block = aes::Block::default();
                block[..16].copy_from_slice(&disk_salt);
                cipher.decrypt_block(&mut block);
                let mut salt = [0u8; 16];
                salt.copy_from_slice(&block);
                Self { salt, disk_salt }
            }
        }
    }

    /// The on-disk salt representation, to persist in the config record.
    pub fn disk_salt(&self) -> [u8; 16] {
        self.disk_salt
    }

    /// `SHA-256(salt || plain_key)`.
    pub fn digested_key(&self, plain_key: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.salt);
        hasher.update(plain_key);
        hasher.finalize().into()
    }

    fn derive_cipher_key(&self, key_material: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"shbs-slot-key-v1");
        hasher.update(self.salt);
        hasher.update(key_material);
        hasher.finalize().into()
    }

    /// Encrypt `entry.header || entry.data` in place with a fresh
    /// random IV, unless it is already marked encrypted. `key_material`
    /// is the plain routing key when available, else the digested key.
    pub fn encrypt(&self, entry: &mut Entry, key_material: &[u8], rng: &dyn SecureRandom) {
        if entry.encrypted {
            return;
        }
        let mut iv = [0u8; 16];
        rng.fill(&mut iv);
        let cipher_key = self.derive_cipher_key(key_material);
        let mut cipher = Aes256Ctr::new((&cipher_key).into(), (&iv).into());
        cipher.apply_keystream(&mut entry.header);
        cipher.apply_keystream(&mut entry.data);
        entry.data_encrypt_iv = iv;
        entry.encrypted = true;
    }

    /// Decrypt `entry.header || entry.data` in place using the stored
    /// IV. CTR mode is its own inverse; whether the result is
    /// meaningful is for the caller's block descriptor to decide.
    pub fn decrypt(&self, entry: &mut Entry, key_material: &[u8]) {
        if !entry.encrypted {
            return;
        }
        let cipher_key = self.derive_cipher_key(key_material);
        let mut cipher = Aes256Ctr::new((&cipher_key).into(), (&entry.data_encrypt_iv).into());
        cipher.apply_keystream(&mut entry.header);
        cipher.apply_keystream(&mut entry.data);
        entry.encrypted = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn fixed_rng(byte: u8) -> Mutex<rand_chacha::ChaCha20Rng> {
        use rand::SeedableRng;
        Mutex::new(rand_chacha::ChaCha20Rng::from_seed([byte; 32]))
    }

    #[test]
    fn encrypt_then_decrypt_round_trips() {
        let cm = CipherManager::new([1u8; 16]);
        let rng = fixed_rng(5);
        let mut entry = Entry::free();
        entry.header = vec![1, 2, 3, 4];
        entry.data = vec![5, 6, 7, 8, 9];
        let key = b"routing-key-0".to_vec();

        cm.encrypt(&mut entry, &key, &rng);
        assert!(entry.encrypted);
        let ciphertext = (entry.header.clone(), entry.data.clone());
        assert_ne!(ciphertext.0, vec![1, 2, 3, 4]);

        cm.decrypt(&mut entry, &key);
        assert!(!entry.encrypted);
        assert_eq!(entry.header, vec![1, 2, 3, 4]);
        assert_eq!(entry.data, vec![5, 6, 7, 8, 9]);
    }

    #[test]
    fn wrong_key_material_does_not_reproduce_plaintext() {
        let cm = CipherManager::new([1u8; 16]);
        let rng = fixed_rng(5);
        let mut entry = Entry::free();
        entry.header = vec![42; 16];
        entry.data = vec![7; 32];
        cm.encrypt(&mut entry, b"right-key", &rng);

        let mut wrong = entry.clone();
        cm.decrypt(&mut wrong, b"wrong-key");
        assert_ne!(wrong.header, vec![42; 16]);
    }

    #[test]
    fn master_key_round_trips_disk_salt() {
        let master = [0x42u8; 32];
        let salt = [0x11u8; 16];
        let cm = CipherManager::with_master_key(salt, &master);
        assert_ne!(cm.disk_salt(), salt);
        let recovered = CipherManager::from_disk(cm.disk_salt(), Some(&master));
        assert_eq!(recovered.digested_key(b"x"), cm.digested_key(b"x"));
    }

    #[test]
    fn digested_key_depends_on_salt() {
        let a = CipherManager::new([1u8; 16]);
        let b = CipherManager::new([2u8; 16]);
        assert_ne!(a.digested_key(b"same"), b.digested_key(b"same"));
    }
}
