// Block store using sled

use crate::core::Hash256;
use crate::error::{Error, Result};
use crate::storage::{ChainBatch, ChainStore};
use sled::Db;
use std::path::Path;

/// Reserved key holding the current tip hash
const TIP_KEY: &[u8] = b"lh";

/// Blocks keyed by their own hash, plus the tip pointer
pub struct SledStore {
    db: Db,
}

impl SledStore {
    /// Open (or create) an on-disk store
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Create an in-memory database (for testing)
    pub fn memory() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }
}

impl ChainStore for SledStore {
    fn get(&self, hash: &Hash256) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get(hash.as_bytes())?.map(|data| data.to_vec()))
    }

    fn tip(&self) -> Result<Option<Hash256>> {
        match self.db.get(TIP_KEY)? {
            Some(data) => Hash256::from_slice(&data)
                .map(Some)
                .map_err(Error::CorruptBlock),
            None => Ok(None),
        }
    }

    /// Applying the batch is the commit. The flush that follows only makes it
    /// durable, so its failure is logged rather than reported.
    fn commit(&self, batch: ChainBatch) -> Result<()> {
        let mut writes = sled::Batch::default();
        for (hash, bytes) in batch.blocks() {
            writes.insert(&hash.as_bytes()[..], bytes.as_slice());
        }
        if let Some(tip) = batch.tip() {
            writes.insert(TIP_KEY, &tip.as_bytes()[..]);
        }

        self.db.apply_batch(writes)?;
        flushed(self.db.flush());
        Ok(())
    }
}

/// Whether a post-commit flush reached disk
fn flushed(result: sled::Result<usize>) -> bool {
    match result {
        Ok(_) => true,
        Err(err) => {
            log::warn!("Committed batch not yet durable, flush failed: {}", err);
            false
        }
    }
}
