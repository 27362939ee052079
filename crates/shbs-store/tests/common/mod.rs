//! Minimal `BlockDescriptor`/`Block` pair used by the integration
//! tests: a CHK-style (collision-free) block whose routing key is just
//! its header bytes.

use std::sync::Mutex;

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use shbs_store::{Block, BlockDescriptor};

pub const HEADER_LEN: usize = 32;
pub const DATA_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestBlock {
    pub routing_key: [u8; HEADER_LEN],
    pub payload: [u8; DATA_LEN],
}

impl TestBlock {
    pub fn new(routing_key: [u8; HEADER_LEN], payload: [u8; DATA_LEN]) -> Self {
        Self { routing_key, payload }
    }
}

impl Block for TestBlock {
    fn routing_key(&self) -> &[u8] {
        &self.routing_key
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TestDescriptor;

impl BlockDescriptor for TestDescriptor {
    type Block = TestBlock;

    fn header_len(&self) -> usize {
        HEADER_LEN
    }
    fn data_len(&self) -> usize {
        DATA_LEN
    }
    fn full_key_len(&self) -> usize {
        HEADER_LEN
    }
    fn collision_possible(&self) -> bool {
        false
    }

    fn reconstruct(
        &self,
        routing_key: &[u8],
        _full_key: &[u8],
        header: &[u8],
        data: &[u8],
    ) -> Result<Self::Block, String> {
        if header != routing_key {
            return Err("header does not match routing key".into());
        }
        let mut rk = [0u8; HEADER_LEN];
        rk.copy_from_slice(header);
        let mut payload = [0u8; DATA_LEN];
        payload.copy_from_slice(data);
        Ok(TestBlock { routing_key: rk, payload })
    }

    fn encode(&self, block: &Self::Block, _full_key: &[u8]) -> Result<(Vec<u8>, Vec<u8>), String> {
        Ok((block.routing_key.to_vec(), block.payload.to_vec()))
    }
}

pub fn rng(seed: u8) -> Mutex<ChaCha20Rng> {
    Mutex::new(ChaCha20Rng::from_seed([seed; 32]))
}

pub fn key(seed: u8) -> [u8; HEADER_LEN] {
    [seed; HEADER_LEN]
}

pub fn block(seed: u8) -> TestBlock {
    TestBlock::new(key(seed), [seed.wrapping_add(1); DATA_LEN])
}
