//! The background cleaner: relocates entries during a resize and
//! rebuilds the bloom filter, coordinated with foreground traffic via
//! the lock manager and across store instances via a process-wide
//! maintenance latch.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use shbs_core::RoutingKeyDigest;

use crate::config::ConfigFlags;
use crate::descriptor::BlockDescriptor;
use crate::layout;
use crate::metadata::{Entry, EntryFlags, MetadataRecord};
use crate::rng::SecureRandom;
use crate::store::Store;

/// Slots processed per batch.
const BATCH_SIZE: u64 = 128;
const INTER_BATCH_SLEEP: Duration = Duration::from_millis(100);

/// A single process-wide latch: at most one store instance runs a
/// resize or bloom-rebuild sweep at a time. `try_lock` only -- never
/// blocking.
fn maintenance_latch() -> &'static Mutex<()> {
    static LATCH: OnceLock<Mutex<()>> = OnceLock::new();
    LATCH.get_or_init(|| Mutex::new(()))
}

/// Queued entry awaiting relocation during a resize. Bounded at
/// `BATCH_SIZE`; the oldest is dropped on overflow.
struct PendingRelocation {
    routing_key: [u8; 32],
    data_encrypt_iv: [u8; 16],
    header: Vec<u8>,
    data: Vec<u8>,
    generation: u32,
}

/// Run one sweep: at most one of resize or bloom-rebuild, whichever is
/// pending, then persist state. Called by the scheduler's periodic
/// task; also callable directly by a caller driving its own tick loop
/// instead of `Store::start`'s built-in scheduler.
pub fn run_sweep<D: BlockDescriptor, R: SecureRandom>(store: &Arc<Store<D, R>>) {
    let (previous_capacity, capacity, rebuild_bloom) = {
        let cfg = store.config_lock().read().expect("config lock poisoned");
        (cfg.previous_capacity, cfg.capacity, cfg.flags.contains(ConfigFlags::REBUILD_BLOOM))
    };

    if store.is_shutdown() {
        return;
    }

    if previous_capacity != 0 {
        if let Ok(_guard) = maintenance_latch().try_lock() {
            if let Err(reason) = resize(store, previous_capacity, capacity) {
                tracing::warn!(%reason, store = store.name(), "resize sweep aborted");
            }
        }
    } else if rebuild_bloom {
        if let Ok(_guard) = maintenance_latch().try_lock() {
            if let Err(reason) = rebuild(store, capacity) {
                tracing::warn!(%reason, store = store.name(), "bloom rebuild sweep aborted");
            }
        }
    }

    persist_periodic(store);
}

fn persist_periodic<D: BlockDescriptor, R: SecureRandom>(store: &Arc<Store<D, R>>) {
    let mut cfg = store.config_lock().write().expect("config lock poisoned");
    cfg.writes = store.stats().writes();
    cfg.hits = store.stats().hits();
    cfg.misses = store.stats().misses();
    cfg.bloom_false_positives = store.stats().bloom_false_positives();
    cfg.key_count = store.stats().key_count();
    if let Err(reason) = cfg.persist(store.config_path()) {
        tracing::warn!(%reason, "failed to persist config during periodic sweep");
        return;
    }
    drop(cfg);

    if let Ok(mut bloom_file) = std::fs::OpenOptions::new().write(true).open(store.bloom_path()) {
        let bloom = store.bloom().read().expect("bloom lock poisoned");
        if let Err(reason) = bloom.flush(&mut bloom_file) {
            tracing::warn!(%reason, "failed to flush bloom filter during periodic sweep");
        }
    }
}

/// Resize: relocate entries that no longer belong in their current
/// bucket, or re-tag entries already in the right place with the new
/// generation.
fn resize<D: BlockDescriptor, R: SecureRandom>(
    store: &Arc<Store<D, R>>,
    previous_capacity: u64,
    new_capacity: u64,
) -> crate::error::Result<()> {
    if new_capacity > previous_capacity {
        store.slot_files().extend_to(new_capacity)?;
    }

    let new_generation = {
        let mut cfg = store.config_lock().write().expect("config lock poisoned");
        cfg.generation = cfg.generation.wrapping_add(1);
        cfg.key_count = 0;
        cfg.generation
    };

    let fork = store.bloom().read().expect("bloom lock poisoned").fork();
    let descending = new_capacity < previous_capacity;
    let high_water = previous_capacity.max(new_capacity);

    let mut pending: VecDeque<PendingRelocation> = VecDeque::new();
    let mut aborted = false;

    for batch_start in batch_starts(high_water, descending) {
        if store.is_shutdown() {
            aborted = true;
            break;
        }
        let batch_len = BATCH_SIZE.min(high_water.saturating_sub(batch_start));
        let offsets: Vec<u64> = (batch_start..batch_start + batch_len).collect();
        let Some(_guards) = store.locks().lock_ascending(&offsets) else {
            aborted = true;
            break;
        };

        let mut batch_io_error = false;
        for &o in &offsets {
            let rec = match store.slot_files().flags_at(o) {
                Ok(r) => r,
                Err(reason) => {
                    tracing::warn!(%reason, offset = o, "resize: I/O error reading slot, aborting batch");
                    batch_io_error = true;
                    break;
                }
            };
            if !rec.is_occupied() {
                continue;
            }
            let mut entry = rec.decode();

            if entry.store_size == new_capacity {
                if entry.generation != new_generation {
                    fork.add(&RoutingKeyDigest::new(entry.digested_routing_key));
                    entry.generation = new_generation;
                    let new_rec = MetadataRecord::encode(&entry);
                    if let Err(reason) = store.slot_files().write_metadata_batch(o, &new_rec.0) {
                        tracing::warn!(%reason, offset = o, "resize: I/O error rewriting generation, aborting batch");
                        batch_io_error = true;
                        break;
                    }
                }
                continue;
            }

            let full = match store.slot_files().read_entry(o, None, true, true) {
                Ok(Some(e)) => e,
                Ok(None) => continue,
                Err(reason) => {
                    tracing::warn!(%reason, offset = o, "resize: I/O error reading entry, aborting batch");
                    batch_io_error = true;
                    break;
                }
            };
            let (header, data) =
                crate::io::SlotFiles::split_hd(full.header, store.descriptor().header_len(), store.descriptor().data_len());

            if pending.len() as u64 >= BATCH_SIZE {
                pending.pop_front();
            }
            pending.push_back(PendingRelocation {
                routing_key: entry.digested_routing_key,
                data_encrypt_iv: entry.data_encrypt_iv,
                header,
                data,
                generation: new_generation,
            });

            if let Err(reason) = store.slot_files().free_slot(o) {
                tracing::warn!(%reason, offset = o, "resize: I/O error freeing relocated slot, aborting batch");
                batch_io_error = true;
                break;
            }
        }
        drop(_guards);

        // Resolve whatever was evacuated from this batch before
        // possibly aborting -- an entry already freed from its old slot
        // must not be left stranded in `pending` when the sweep stops.
        resolve_pending(store, &mut pending, new_capacity, &fork);

        if batch_io_error {
            aborted = true;
            break;
        }

        if batch_start + batch_len < high_water {
            std::thread::sleep(INTER_BATCH_SLEEP);
        }
    }

    if aborted {
        if !pending.is_empty() {
            tracing::info!(store = store.name(), dropped = pending.len(), "resize: entries lost on abort");
        }
        tracing::info!(store = store.name(), "resize sweep aborted, will resume next cycle");
        return Ok(());
    }

    // Anything still queued at the end is lost: the store is
    // content-addressed, so another peer is assumed to hold it.
    if !pending.is_empty() {
        tracing::info!(store = store.name(), dropped = pending.len(), "resize: entries lost on finalization");
    }

    // Relocation, in-place retagging, and loss all happened above without
    // updating the live key count; recount occupied slots at the new
    // capacity so `persist_periodic`'s read of `stats().key_count()`
    // reflects reality rather than the pre-resize value.
    let occupied = count_occupied(store, new_capacity);
    store.stats().set_key_count(occupied);

    store.bloom().read().expect("bloom lock poisoned").merge(&fork);
    let mut cfg = store.config_lock().write().expect("config lock poisoned");
    cfg.previous_capacity = 0;
    cfg.flags.remove(ConfigFlags::REBUILD_BLOOM);
    cfg.persist(store.config_path())?;
    Ok(())
}

/// Count occupied slots across `[0, capacity)`, used to resynchronize
/// the live key count after a resize relocates, retags, and drops
/// entries in ways that are hard to track incrementally batch-to-batch.
fn count_occupied<D: BlockDescriptor, R: SecureRandom>(store: &Arc<Store<D, R>>, capacity: u64) -> u64 {
    let ready = store.slot_files().offset_ready().min(capacity);
    let mut count = 0;
    for o in 0..ready {
        if let Ok(rec) = store.slot_files().flags_at(o) {
            if rec.is_occupied() {
                count += 1;
            }
        }
    }
    count
}

/// Try to place each queued relocation at its new-capacity candidate
/// offsets.
fn resolve_pending<D: BlockDescriptor, R: SecureRandom>(
    store: &Arc<Store<D, R>>,
    pending: &mut VecDeque<PendingRelocation>,
    new_capacity: u64,
    fork: &crate::bloom::BloomFilter,
) {
    let mut remaining = VecDeque::new();
    while let Some(item) = pending.pop_front() {
        let digest = RoutingKeyDigest::new(item.routing_key);
        let offsets = layout::candidate_offsets(&digest, new_capacity);
        let Some(_guards) = store.locks().lock_ascending(&offsets) else {
            remaining.push_back(item);
            continue;
        };

        let mut placed = false;
        let mut already_present = false;
        for &o in &offsets {
            if o >= store.slot_files().offset_ready() {
                continue;
            }
            let rec = match store.slot_files().flags_at(o) {
                Ok(r) => r,
                Err(_) => continue,
            };
            if rec.is_occupied() {
                if rec.digested_key() == item.routing_key {
                    already_present = true;
                    break;
                }
                continue;
            }

            let entry = Entry {
                digested_routing_key: item.routing_key,
                data_encrypt_iv: item.data_encrypt_iv,
                flags: EntryFlags::OCCUPIED,
                store_size: new_capacity,
                generation: item.generation,
                plain_routing_key: None,
                header: item.header.clone(),
                data: item.data.clone(),
                encrypted: true,
            };
            if store.slot_files().write_entry(&entry, o).is_ok() {
                fork.add(&digest);
                placed = true;
                break;
            }
        }

        if !placed && !already_present {
            tracing::debug!("resize: could not relocate entry, lost");
        }
    }
    *pending = remaining;
}

/// Bloom rebuild: no relocation, just re-add every occupied entry's
/// key to a fresh fork.
fn rebuild<D: BlockDescriptor, R: SecureRandom>(store: &Arc<Store<D, R>>, capacity: u64) -> crate::error::Result<()> {
    let new_generation = {
        let mut cfg = store.config_lock().write().expect("config lock poisoned");
        cfg.generation = cfg.generation.wrapping_add(1);
        cfg.generation
    };
    let fork = store.bloom().read().expect("bloom lock poisoned").fork();

    let mut aborted = false;
    for batch_start in batch_starts(capacity, false) {
        if store.is_shutdown() {
            aborted = true;
            break;
        }
        let batch_len = BATCH_SIZE.min(capacity.saturating_sub(batch_start));
        let offsets: Vec<u64> = (batch_start..batch_start + batch_len).collect();
        let Some(_guards) = store.locks().lock_ascending(&offsets) else {
            aborted = true;
            break;
        };

        let mut batch_io_error = false;
        for &o in &offsets {
            let rec = match store.slot_files().flags_at(o) {
                Ok(r) => r,
                Err(reason) => {
                    tracing::warn!(%reason, offset = o, "rebuild: I/O error reading slot, aborting batch");
                    batch_io_error = true;
                    break;
                }
            };
            if !rec.is_occupied() {
                continue;
            }
            let mut entry = rec.decode();
            if entry.generation != new_generation {
                fork.add(&RoutingKeyDigest::new(entry.digested_routing_key));
                entry.generation = new_generation;
                let new_rec = MetadataRecord::encode(&entry);
                if let Err(reason) = store.slot_files().write_metadata_batch(o, &new_rec.0) {
                    tracing::warn!(%reason, offset = o, "rebuild: I/O error rewriting generation, aborting batch");
                    batch_io_error = true;
                    break;
                }
            }
        }

        if batch_io_error {
            aborted = true;
            break;
        }

        if batch_start + batch_len < capacity {
            std::thread::sleep(INTER_BATCH_SLEEP);
        }
    }

    if aborted {
        tracing::info!(store = store.name(), "bloom rebuild aborted, will resume next cycle");
        return Ok(());
    }

    store.bloom().read().expect("bloom lock poisoned").merge(&fork);
    let mut cfg = store.config_lock().write().expect("config lock poisoned");
    cfg.flags.remove(ConfigFlags::REBUILD_BLOOM);
    cfg.persist(store.config_path())?;
    Ok(())
}

fn batch_starts(total: u64, descending: bool) -> Vec<u64> {
    let mut starts: Vec<u64> = (0..total).step_by(BATCH_SIZE as usize).collect();
    if descending {
        starts.reverse();
    }
    starts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_starts_ascending_covers_range() {
        let starts = batch_starts(300, false);
        assert_eq!(starts, vec![0, 128, 256]);
    }

    #[test]
    fn batch_starts_descending_is_reversed() {
        let starts = batch_starts(300, true);
        assert_eq!(starts, vec![256, 128, 0]);
    }
}
