//! The store engine: the public API that coordinates layout, cipher,
//! slot I/O, and locking, plus the bloom filter, statistics, and
//! secondary-store overflow.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use shbs_core::RoutingKeyDigest;

use crate::bloom::BloomFilter;
use crate::cipher::CipherManager;
use crate::config::{ConfigFlags, ConfigRecord};
use crate::descriptor::{Block, BlockDescriptor, Scheduler, ShutdownHook};
use crate::error::{Error, Result};
use crate::io::SlotFiles;
use crate::layout::{self, CANDIDATES_PER_KEY};
use crate::lock::LockManager;
use crate::metadata::{Entry, EntryFlags};
use crate::rng::SecureRandom;
use crate::stats::Stats;

const CONFIG_LOCK_ATTEMPTS: u32 = 10;
const CONFIG_LOCK_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(2);
const CONFIG_LOCK_POLL_INTERVAL: Duration = Duration::from_millis(5);
const CLEANER_PERIOD: Duration = Duration::from_secs(5 * 60);
const CLEANER_JITTER_FRAC: f64 = 0.1;

/// The result of a successful `put`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// A new slot now holds this block.
    Inserted,
    /// The block was already present; nothing was written.
    AlreadyPresent,
    /// A different block already occupies the only reachable slot and
    /// `overwrite` was false.
    Collision,
    /// Every candidate slot is occupied by higher-priority entries and
    /// this request, itself an overflow write, was declined to protect
    /// the receiving store's own traffic.
    Rejected,
}

/// The salted hash block store. Generic over the block-type descriptor
/// and the random source, both supplied by the caller.
pub struct Store<D: BlockDescriptor, R: SecureRandom> {
    #[allow(dead_code)]
    dir: PathBuf,
    name: String,
    descriptor: D,
    rng: R,
    cipher: CipherManager,
    config: RwLock<ConfigRecord>,
    config_path: PathBuf,
    slot_files: SlotFiles,
    locks: LockManager,
    bloom: RwLock<BloomFilter>,
    bloom_path: PathBuf,
    stats: Stats,
    shutdown: AtomicBool,
    shutdown_hook: Box<dyn ShutdownHook>,
    alt_store: Mutex<Option<Arc<Store<D, R>>>>,
    check_bloom: bool,
    resize_signal: Arc<(Mutex<bool>, std::sync::Condvar)>,
}

impl<D: BlockDescriptor, R: SecureRandom> Store<D, R> {
    /// Open or create a store rooted at `dir/name`. `bloom_k` is the
    /// bloom filter's hash-function
    /// count used only when no config file exists yet.
    #[allow(clippy::too_many_arguments)]
    pub fn construct(
        dir: &Path,
        name: &str,
        descriptor: D,
        rng: R,
        max_keys: u64,
        bloom_size_bits: u64,
        bloom_k: u32,
        shutdown_hook: Box<dyn ShutdownHook>,
        preallocate: bool,
        master_key: Option<[u8; 32]>,
    ) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let base = dir.join(name);
        let config_path = base.with_extension("config");
        let bloom_path = base.with_extension("bloom");

        let loaded = match ConfigRecord::load(&config_path) {
            Ok(cfg) => cfg,
            Err(Error::ConfigCorrupt(reason)) => {
                // Unrecoverable config corruption: delete config and
                // metadata, keep the hd file as-is, and start fresh.
                tracing::warn!(%reason, "config corrupt, recovering as a new store");
                let _ = std::fs::remove_file(&config_path);
                let _ = std::fs::remove_file(base.with_extension("metadata"));
                None
            }
            Err(e) => return Err(e),
        };

        let (config, dirty_on_open) = match loaded {
            Some(cfg) => {
                let dirty = cfg.flags.contains(ConfigFlags::DIRTY);
                (cfg, dirty)
            }
            None => {
                let salt = {
                    let mut s = [0u8; 16];
                    rng.fill(&mut s);
                    s
                };
                let cipher = match master_key {
                    Some(mk) => CipherManager::with_master_key(salt, &mk),
                    None => CipherManager::new(salt),
                };
                let mut cfg = ConfigRecord::new(cipher.disk_salt(), max_keys, bloom_k);
                cfg.flags |= ConfigFlags::DIRTY;
                (cfg, true)
            }
        };

        let cipher = CipherManager::from_disk(config.disk_salt, master_key.as_ref());
        let capacity_for_files = config.capacity.max(config.previous_capacity);
        let slot_files = SlotFiles::open(
            &base,
            capacity_for_files,
            descriptor.header_len(),
            descriptor.data_len(),
            preallocate,
        )?;

        let mut bloom_file = std::fs::OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&bloom_path)?;
        let bloom = if dirty_on_open {
            tracing::info!("dirty bit set on open; scheduling bloom rebuild");
            BloomFilter::new(bloom_size_bits, config.bloom_k)
        } else {
            BloomFilter::load(&mut bloom_file, bloom_size_bits, config.bloom_k)?
        };
        drop(bloom_file);

        let mut config = config;
        if dirty_on_open {
            config.flags |= ConfigFlags::REBUILD_BLOOM;
        }
        config.persist(&config_path)?;

        let stats = Stats::from_persisted(config.hits, config.misses, config.writes, config.bloom_false_positives);
        stats.set_key_count(config.key_count);

        Ok(Self {
            dir: dir.to_path_buf(),
            name: name.to_string(),
            descriptor,
            rng,
            cipher,
            config: RwLock::new(config),
            config_path,
            slot_files,
            locks: LockManager::new(),
            bloom: RwLock::new(bloom),
            bloom_path,
            stats,
            shutdown: AtomicBool::new(false),
            shutdown_hook,
            alt_store: Mutex::new(None),
            check_bloom: true,
            resize_signal: Arc::new((Mutex::new(false), std::sync::Condvar::new())),
        })
    }

    /// Start the background cleaner. Returns
    /// `true` if a resize or bloom rebuild is already pending, meaning
    /// the store has startup work left to do asynchronously.
    pub fn start(self: &Arc<Self>, scheduler: &dyn Scheduler) -> bool {
        let pending = {
            let cfg = self.config.read().expect("config lock poisoned");
            cfg.previous_capacity != 0 || cfg.flags.contains(ConfigFlags::REBUILD_BLOOM)
        };

        let weak = Arc::downgrade(self);
        let resize_signal = self.resize_signal.clone();
        let task: Box<dyn FnMut() + Send> = Box::new(move || {
            let (lock, cv) = &*resize_signal;
            let mut signalled = lock.lock().expect("resize signal poisoned");
            if !*signalled {
                let sleep_for = shbs_core::time::jittered(CLEANER_PERIOD, CLEANER_JITTER_FRAC, shbs_core::time::now_ms());
                let (guard, _timeout) = cv.wait_timeout(signalled, sleep_for).expect("resize signal poisoned");
                signalled = guard;
            }
            *signalled = false;
            drop(signalled);
            if let Some(store) = weak.upgrade() {
                crate::cleaner::run_sweep(&store);
            }
        });
        let weak2 = Arc::downgrade(self);
        let should_stop: Box<dyn Fn() -> bool + Send> = Box::new(move || match weak2.upgrade() {
            Some(s) => s.is_shutdown(),
            None => true,
        });
        let spawn_period = shbs_core::time::jittered(CLEANER_PERIOD, CLEANER_JITTER_FRAC, shbs_core::time::now_ms());
        scheduler.spawn_periodic(spawn_period, task, should_stop);

        pending
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn descriptor(&self) -> &D {
        &self.descriptor
    }

    pub(crate) fn cipher(&self) -> &CipherManager {
        &self.cipher
    }

    pub(crate) fn slot_files(&self) -> &SlotFiles {
        &self.slot_files
    }

    pub(crate) fn locks(&self) -> &LockManager {
        &self.locks
    }

    pub(crate) fn bloom(&self) -> &RwLock<BloomFilter> {
        &self.bloom
    }

    pub(crate) fn bloom_path(&self) -> &Path {
        &self.bloom_path
    }

    pub(crate) fn config_lock(&self) -> &RwLock<ConfigRecord> {
        &self.config
    }

    pub(crate) fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub(crate) fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Wake the cleaner immediately rather than waiting out the rest of
    /// its sleep period.
    pub(crate) fn signal_cleaner(&self) {
        let (lock, cv) = &*self.resize_signal;
        *lock.lock().expect("resize signal poisoned") = true;
        cv.notify_all();
    }

    fn acquire_config_read(&self) -> Result<Option<RwLockReadGuard<'_, ConfigRecord>>> {
        if self.is_shutdown() {
            return Ok(None);
        }
        for attempt in 0..CONFIG_LOCK_ATTEMPTS {
            let deadline = Instant::now() + CONFIG_LOCK_ATTEMPT_TIMEOUT;
            loop {
                if let Ok(guard) = self.config.try_read() {
                    return Ok(Some(guard));
                }
                if self.is_shutdown() {
                    return Ok(None);
                }
                if Instant::now() >= deadline {
                    break;
                }
                std::thread::sleep(CONFIG_LOCK_POLL_INTERVAL);
            }
            tracing::warn!(attempt, store = %self.name, "config read-lock attempt timed out");
        }
        Err(Error::LockTimeout(CONFIG_LOCK_ATTEMPTS))
    }

    fn acquire_config_write(&self) -> Result<Option<RwLockWriteGuard<'_, ConfigRecord>>> {
        if self.is_shutdown() {
            return Ok(None);
        }
        for attempt in 0..CONFIG_LOCK_ATTEMPTS {
            let deadline = Instant::now() + CONFIG_LOCK_ATTEMPT_TIMEOUT;
            loop {
                if let Ok(guard) = self.config.try_write() {
                    return Ok(Some(guard));
                }
                if self.is_shutdown() {
                    return Ok(None);
                }
                if Instant::now() >= deadline {
                    break;
                }
                std::thread::sleep(CONFIG_LOCK_POLL_INTERVAL);
            }
            tracing::warn!(attempt, store = %self.name, "config write-lock attempt timed out");
        }
        Err(Error::LockTimeout(CONFIG_LOCK_ATTEMPTS))
    }

    fn reconstruct(&self, routing_key: &[u8], full_key: &[u8], entry: &Entry) -> Option<D::Block> {
        let (header, data) =
            SlotFiles::split_hd(entry.header.clone(), self.descriptor.header_len(), self.descriptor.data_len());
        match self.descriptor.reconstruct(routing_key, full_key, &header, &data) {
            Ok(block) if block.routing_key() == routing_key => Some(block),
            Ok(_) => None,
            Err(reason) => {
                tracing::debug!(%reason, "block descriptor rejected decrypted bytes");
                None
            }
        }
    }

    /// `fetch(routingKey, fullKey) -> block | none`.
    pub fn fetch(&self, routing_key: &[u8], full_key: &[u8]) -> Result<Option<D::Block>> {
        let Some(cfg) = self.acquire_config_read()? else { return Ok(None) };
        let current_capacity = cfg.capacity;
        let previous_capacity = cfg.previous_capacity;
        // A bloom filter slated for rebuild (e.g. just reset to empty
        // after an unclean shutdown) cannot be trusted to reflect what
        // is actually on disk.
        let bloom_trustworthy = self.check_bloom && !cfg.flags.contains(ConfigFlags::REBUILD_BLOOM);
        drop(cfg);

        let digested = self.cipher.digested_key(routing_key);
        let digest = RoutingKeyDigest::new(digested);

        let current_offsets = layout::candidate_offsets(&digest, current_capacity);
        let previous_offsets = if previous_capacity != 0 {
            layout::candidate_offsets(&digest, previous_capacity)
        } else {
            Vec::new()
        };
        let mut all_offsets = current_offsets.clone();
        all_offsets.extend(previous_offsets.iter().copied());

        let Some(_guards) = self.locks.lock_ascending(&all_offsets) else { return Ok(None) };

        if bloom_trustworthy {
            let trusted = self.bloom.read().expect("bloom lock poisoned").test(&digest);
            if !trusted {
                self.stats.record_miss();
                return Ok(None);
            }
        }

        for &o in current_offsets.iter().chain(previous_offsets.iter()) {
            let resize_in_progress = previous_capacity != 0;
            let Some(mut entry) = self.slot_files.read_entry(o, Some(&digested), true, resize_in_progress)? else {
                continue;
            };
            self.cipher.decrypt(&mut entry, routing_key);
            if let Some(block) = self.reconstruct(routing_key, full_key, &entry) {
                self.stats.record_hit();
                return Ok(Some(block));
            }
        }

        if bloom_trustworthy {
            self.stats.record_bloom_false_positive();
        } else {
            self.stats.record_miss();
        }
        Ok(None)
    }

    /// `probablyInStore(routingKey) -> bool`.
    pub fn probably_in_store(&self, routing_key: &[u8]) -> Result<bool> {
        let Some(_cfg) = self.acquire_config_read()? else { return Ok(false) };
        if !self.check_bloom {
            return Ok(true);
        }
        let digested = self.cipher.digested_key(routing_key);
        Ok(self.bloom.read().expect("bloom lock poisoned").test(&RoutingKeyDigest::new(digested)))
    }

    /// `put(block, overwrite, isNewBlock, wrongStore) -> outcome`.
    pub fn put(
        &self,
        block: &D::Block,
        full_key: &[u8],
        overwrite: bool,
        is_new_block: bool,
        wrong_store: bool,
    ) -> Result<Option<PutOutcome>> {
        let Some(cfg) = self.acquire_config_read()? else { return Ok(None) };
        let current_capacity = cfg.capacity;
        let previous_capacity = cfg.previous_capacity;
        let generation = cfg.generation;
        let rebuild_threshold = 2 * current_capacity.max(1);
        drop(cfg);

        let routing_key = block.routing_key().to_vec();
        let digested = self.cipher.digested_key(&routing_key);
        let digest = RoutingKeyDigest::new(digested);

        let current_offsets = layout::candidate_offsets(&digest, current_capacity);
        let previous_offsets =
            if previous_capacity != 0 { layout::candidate_offsets(&digest, previous_capacity) } else { Vec::new() };
        let mut all_offsets = current_offsets.clone();
        all_offsets.extend(previous_offsets.iter().copied());

        let Some(_guards) = self.locks.lock_ascending(&all_offsets) else { return Ok(None) };

        // Step 2: probe for an existing entry with this digested key.
        for &o in current_offsets.iter().chain(previous_offsets.iter()) {
            let resize_in_progress = previous_capacity != 0;
            let Some(mut existing) = self.slot_files.read_entry(o, Some(&digested), true, resize_in_progress)?
            else {
                continue;
            };

            if !self.descriptor.collision_possible() {
                self.maybe_upgrade_new_block(&mut existing, o, is_new_block, &routing_key)?;
                return Ok(Some(PutOutcome::AlreadyPresent));
            }

            self.cipher.decrypt(&mut existing, &routing_key);
            let stored = self.reconstruct(&routing_key, full_key, &existing);
            match stored {
                Some(stored_block) if &stored_block == block => {
                    self.maybe_upgrade_new_block(&mut existing, o, is_new_block, &routing_key)?;
                    return Ok(Some(PutOutcome::AlreadyPresent));
                }
                Some(_) if !overwrite => return Ok(Some(PutOutcome::Collision)),
                _ => {
                    // `o` may have matched via `previous_offsets` rather than
                    // `current_offsets` while a resize is in progress; tag the
                    // entry with whichever capacity it's actually a candidate
                    // offset for, so the cleaner's relocation sweep (which
                    // skips entries whose `store_size` already equals the new
                    // capacity) doesn't mistake it for already being in place.
                    let o_capacity = if current_offsets.contains(&o) { current_capacity } else { previous_capacity };
                    self.write_block(o, block, full_key, &routing_key, o_capacity, generation, is_new_block, wrong_store)?;
                    self.maybe_flag_bloom_rebuild(rebuild_threshold)?;
                    return Ok(Some(PutOutcome::Inserted));
                }
            }
        }

        // Step 3: walk current-capacity candidates for a free slot.
        for &o in &current_offsets {
            if o >= self.slot_files.offset_ready() {
                continue;
            }
            if !self.slot_files.flags_at(o)?.is_occupied() {
                self.write_block(o, block, full_key, &routing_key, current_capacity, generation, is_new_block, wrong_store)?;
                self.stats.incr_key_count();
                self.maybe_flag_bloom_rebuild(rebuild_threshold)?;
                return Ok(Some(PutOutcome::Inserted));
            }
        }

        // Step 4: overflow to the secondary store, unless this request
        // is itself an overflow write (cycle prevention).
        if !wrong_store {
            let alt = self.alt_store.lock().expect("alt store lock poisoned").clone();
            if let Some(alt) = alt {
                if let Some(outcome) = alt.put(block, full_key, overwrite, is_new_block, true)? {
                    return Ok(Some(outcome));
                }
            }
        }

        // Step 5: must overwrite a victim.
        let victim = if wrong_store {
            let mut wrong_store_candidates = Vec::new();
            for &o in &current_offsets {
                let rec = self.slot_files.flags_at(o)?;
                if rec.is_occupied() {
                    let decoded = rec.decode();
                    if decoded.flags.contains(EntryFlags::WRONG_STORE) {
                        wrong_store_candidates.push(o);
                    }
                }
            }
            let w = wrong_store_candidates.len() as f64;
            let p = CANDIDATES_PER_KEY as f64;
            let roll = {
                let mut byte = [0u8; 1];
                self.rng.fill(&mut byte);
                byte[0] as f64 / 255.0
            };
            if w > 0.0 && roll < w / (p + w) {
                Some(wrong_store_candidates[0])
            } else {
                None
            }
        } else {
            Some(current_offsets[0])
        };

        let Some(victim_offset) = victim else {
            return Ok(Some(PutOutcome::Rejected));
        };

        let victim_rec = self.slot_files.flags_at(victim_offset)?;
        if victim_rec.is_occupied() {
            let victim_entry = victim_rec.decode();
            if victim_entry.generation == generation {
                self.bloom.read().expect("bloom lock poisoned").remove(&RoutingKeyDigest::new(victim_entry.digested_routing_key));
            } else {
                self.stats.incr_key_count();
            }
        } else {
            self.stats.incr_key_count();
        }

        self.write_block(victim_offset, block, full_key, &routing_key, current_capacity, generation, is_new_block, wrong_store)?;
        self.maybe_flag_bloom_rebuild(rebuild_threshold)?;
        Ok(Some(PutOutcome::Inserted))
    }

    fn maybe_upgrade_new_block(&self, existing: &mut Entry, offset: u64, is_new_block: bool, routing_key: &[u8]) -> Result<()> {
        if is_new_block && !existing.flags.contains(EntryFlags::NEW_BLOCK) {
            existing.flags |= EntryFlags::NEW_BLOCK;
            // `existing` may have been decrypted by the caller to compare
            // against the incoming block; re-encrypt (a no-op if it
            // wasn't) so the slot write never lands plaintext on disk.
            self.cipher.encrypt(existing, routing_key, &self.rng);
            self.slot_files.write_entry(existing, offset)?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn write_block(
        &self,
        offset: u64,
        block: &D::Block,
        full_key: &[u8],
        routing_key: &[u8],
        capacity: u64,
        generation: u32,
        is_new_block: bool,
        wrong_store: bool,
    ) -> Result<()> {
        let (header, data) =
            self.descriptor.encode(block, full_key).map_err(Error::Descriptor)?;
        let digested = self.cipher.digested_key(routing_key);

        let mut flags = EntryFlags::OCCUPIED;
        if is_new_block {
            flags |= EntryFlags::NEW_BLOCK;
        }
        if wrong_store {
            flags |= EntryFlags::WRONG_STORE;
        }

        let mut entry = Entry {
            digested_routing_key: digested,
            data_encrypt_iv: [0u8; 16],
            flags,
            store_size: capacity,
            generation,
            plain_routing_key: None,
            header,
            data,
            encrypted: false,
        };
        if self.descriptor.collision_possible() && routing_key.len() == 32 {
            let mut k = [0u8; 32];
            k.copy_from_slice(routing_key);
            entry.plain_routing_key = Some(k);
            entry.flags |= EntryFlags::PLAIN_KEY_PRESENT;
        }

        self.cipher.encrypt(&mut entry, routing_key, &self.rng);
        self.slot_files.write_entry(&entry, offset)?;
        self.bloom.read().expect("bloom lock poisoned").add(&RoutingKeyDigest::new(digested));
        self.stats.record_write();
        Ok(())
    }

    fn maybe_flag_bloom_rebuild(&self, threshold: u64) -> Result<()> {
        if threshold == 0 || self.stats.writes() % threshold != 0 {
            return Ok(());
        }
        let Some(mut cfg) = self.acquire_config_write()? else { return Ok(()) };
        cfg.flags |= ConfigFlags::REBUILD_BLOOM;
        Ok(())
    }

    /// `setMaxKeys(newCapacity)`.
    pub fn set_max_keys(&self, new_capacity: u64) -> Result<()> {
        let Some(mut cfg) = self.acquire_config_write()? else { return Ok(()) };
        if cfg.capacity == new_capacity || cfg.previous_capacity != 0 {
            return Ok(());
        }
        cfg.previous_capacity = cfg.capacity;
        cfg.capacity = new_capacity;
        cfg.flags |= ConfigFlags::DIRTY;
        cfg.persist(&self.config_path)?;
        drop(cfg);
        self.signal_cleaner();
        Ok(())
    }

    /// `setAltStore(secondary)`. Fails if `secondary` itself already
    /// has a secondary configured, bounding overflow recursion at
    /// depth 1.
    pub fn set_alt_store(&self, secondary: Option<Arc<Store<D, R>>>) -> Result<()> {
        if let Some(ref s) = secondary {
            if s.alt_store.lock().expect("alt store lock poisoned").is_some() {
                return Err(Error::Descriptor("secondary store already has its own secondary".into()));
            }
        }
        *self.alt_store.lock().expect("alt store lock poisoned") = secondary;
        Ok(())
    }

    /// `close()`: stop accepting operations, wake everything blocked
    /// on the lock manager, force files, clear the dirty bit, persist
    /// config.
    pub fn close(&self) -> Result<()> {
        self.shutdown.store(true, Ordering::Release);
        self.locks.shutdown();
        self.signal_cleaner();

        self.slot_files.sync_all()?;
        {
            let mut bloom_file = std::fs::OpenOptions::new().write(true).open(&self.bloom_path)?;
            self.bloom.read().expect("bloom lock poisoned").flush(&mut bloom_file)?;
        }

        let mut cfg = self.config.write().expect("config lock poisoned");
        cfg.flags.remove(ConfigFlags::DIRTY);
        cfg.writes = self.stats.writes();
        cfg.hits = self.stats.hits();
        cfg.misses = self.stats.misses();
        cfg.bloom_false_positives = self.stats.bloom_false_positives();
        cfg.key_count = self.stats.key_count();
        cfg.persist(&self.config_path)?;
        drop(cfg);

        self.shutdown_hook.on_shutdown();
        Ok(())
    }

    /// `destruct()`: close and remove all on-disk files for this
    /// store. Irreversible.
    pub fn destruct(self) -> Result<()> {
        self.close()?;
        let base = self.dir.join(&self.name);
        for ext in ["config", "metadata", "hd", "bloom"] {
            let _ = std::fs::remove_file(base.with_extension(ext));
        }
        Ok(())
    }

    pub fn hits(&self) -> u64 {
        self.stats.hits()
    }
    pub fn misses(&self) -> u64 {
        self.stats.misses()
    }
    pub fn writes(&self) -> u64 {
        self.stats.writes()
    }
    pub fn key_count(&self) -> u64 {
        self.stats.key_count()
    }
    pub fn bloom_false_positives(&self) -> u64 {
        self.stats.bloom_false_positives()
    }
    pub fn hits_since_start(&self) -> u64 {
        self.stats.hits_since_start()
    }
    pub fn misses_since_start(&self) -> u64 {
        self.stats.misses_since_start()
    }
    pub fn writes_since_start(&self) -> u64 {
        self.stats.writes_since_start()
    }
    pub fn bloom_false_positives_since_start(&self) -> u64 {
        self.stats.bloom_false_positives_since_start()
    }
}
