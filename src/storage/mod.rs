// Storage layer for the block chain

mod blockchain_db;

pub use blockchain_db::SledStore;

use crate::core::Hash256;
use crate::error::Result;

/// Writes applied together by [`ChainStore::commit`]
#[derive(Debug, Default)]
pub struct ChainBatch {
    blocks: Vec<(Hash256, Vec<u8>)>,
    tip: Option<Hash256>,
}

impl ChainBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `bytes` under `hash`
    pub fn put(&mut self, hash: Hash256, bytes: Vec<u8>) {
        self.blocks.push((hash, bytes));
    }

    /// Move the tip pointer
    pub fn set_tip(&mut self, hash: Hash256) {
        self.tip = Some(hash);
    }

    pub fn blocks(&self) -> &[(Hash256, Vec<u8>)] {
        &self.blocks
    }

    pub fn tip(&self) -> Option<Hash256> {
        self.tip
    }
}

/// Key-value block store with an atomic commit scope
pub trait ChainStore {
    /// Serialized block stored under `hash`
    fn get(&self, hash: &Hash256) -> Result<Option<Vec<u8>>>;

    /// Hash of the most recently appended block
    fn tip(&self) -> Result<Option<Hash256>>;

    /// Apply every write in `batch`, or none of them
    fn commit(&self, batch: ChainBatch) -> Result<()>;
}

impl<S: ChainStore + ?Sized> ChainStore for &S {
    fn get(&self, hash: &Hash256) -> Result<Option<Vec<u8>>> {
        (**self).get(hash)
    }

    fn tip(&self) -> Result<Option<Hash256>> {
        (**self).tip()
    }

    fn commit(&self, batch: ChainBatch) -> Result<()> {
        (**self).commit(batch)
    }
}
