//! The block-type descriptor: a caller-supplied collaborator that
//! tells the store the fixed sizes for a block type and how to turn
//! decrypted bytes back into a verified block. The store never
//! interprets header/data bytes itself — that is this trait's job.

/// A reconstructed, verified block.
pub trait Block: Clone + PartialEq + Send + Sync + 'static {
    /// The block's own routing key, as recovered during
    /// reconstruction. Used by `fetch` to confirm the right block was
    /// found, not merely a slot whose stored digest happens to match.
    fn routing_key(&self) -> &[u8];
}

/// Describes one block type (e.g. a content-hash block vs. a
/// signed/subspace block). Block types with `collision_possible() ==
/// false` use a cryptographically unforgeable routing key, so any slot
/// match is treated as "already stored" without comparing payloads.
pub trait BlockDescriptor: Send + Sync + 'static {
    /// The concrete block type this descriptor reconstructs.
    type Block: Block;

    /// Fixed header length in bytes for this block type.
    fn header_len(&self) -> usize;

    /// Fixed data length in bytes for this block type.
    fn data_len(&self) -> usize;

    /// Fixed length of a block's full key (routing key plus any
    /// decryption/verification material carried alongside it).
    fn full_key_len(&self) -> usize;

    /// Whether two different blocks can share a routing key. CHK-style
    /// (content-hash) blocks are collision-free; SSK-style (subspace)
    /// blocks are not.
    fn collision_possible(&self) -> bool;

    /// Reconstruct and verify a block from its decrypted parts. Must
    /// fail if `header`/`data` do not match `full_key`/`routing_key`
    /// (e.g. a bad decryption key produced garbage).
    fn reconstruct(
        &self,
        routing_key: &[u8],
        full_key: &[u8],
        header: &[u8],
        data: &[u8],
    ) -> Result<Self::Block, String>;

    /// Split a full key into the header+data an encoder would produce,
    /// and return the routing key that should be used to store it. Used
    /// by `put` to obtain bytes to encrypt and write.
    fn encode(&self, block: &Self::Block, full_key: &[u8]) -> Result<(Vec<u8>, Vec<u8>), String>;
}

/// Notified once, at `close()`. A no-op `()` impl is provided for
/// callers with nothing to do on shutdown.
pub trait ShutdownHook: Send + Sync {
    /// Called exactly once, after the store has stopped accepting new
    /// operations but before files are closed.
    fn on_shutdown(&self);
}

impl ShutdownHook for () {
    fn on_shutdown(&self) {}
}

/// Delayed and periodic execution. The cleaner uses this to schedule
/// its own sweep loop rather than reaching for an async runtime -- the
/// store's concurrency model is blocking multithreading throughout.
pub trait Scheduler: Send + Sync {
    /// Run `task` repeatedly until `should_stop` reports `true`. `task`
    /// is responsible for its own pacing (it holds `period` and waits
    /// on its own condvar so an external wake-up signal can cut a wait
    /// short); `spawn_periodic` must not impose an additional fixed
    /// delay of its own between invocations, or a signal that wakes
    /// `task` early still has to wait out that extra delay.
    fn spawn_periodic(&self, period: std::time::Duration, task: Box<dyn FnMut() + Send>, should_stop: Box<dyn Fn() -> bool + Send>);
}

/// A `Scheduler` backed by a single real OS thread: plain preemptive
/// multithreading, no async runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadScheduler;

impl Scheduler for ThreadScheduler {
    fn spawn_periodic(
        &self,
        _period: std::time::Duration,
        mut task: Box<dyn FnMut() + Send>,
        should_stop: Box<dyn Fn() -> bool + Send>,
    ) {
        std::thread::spawn(move || {
            while !should_stop() {
                task();
            }
        });
    }
}
