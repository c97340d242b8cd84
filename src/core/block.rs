// Block data structures

use crate::core::{Hash256, sha256, Transaction, Serializable};
use std::io::{Write, Read, Cursor};
use super::serialize::{write_varint, read_varint, write_var_bytes, read_var_bytes, read_array};

/// Block - a proof-of-work sealed batch of transactions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Unix timestamp (seconds) at assembly time
    pub timestamp: u64,
    /// Hash of the previous block, `None` exactly for genesis
    pub prev_hash: Option<Hash256>,
    /// Transactions in this block
    pub transactions: Vec<Transaction>,
    /// Header hash satisfying the proof-of-work target
    pub hash: Hash256,
    /// Nonce for proof-of-work
    pub nonce: u64,
}

impl Block {
    /// Assemble an unsealed block; `hash` and `nonce` are set by the miner
    pub fn new(prev_hash: Option<Hash256>, transactions: Vec<Transaction>, timestamp: u64) -> Self {
        Self {
            timestamp,
            prev_hash,
            transactions,
            hash: Hash256::zero(),
            nonce: 0,
        }
    }

    /// One SHA256 over the concatenated transaction ids, in block order
    pub fn transactions_digest(&self) -> Hash256 {
        let mut ids = Vec::with_capacity(self.transactions.len() * 32);
        for tx in &self.transactions {
            ids.extend_from_slice(tx.id.as_bytes());
        }
        sha256(&ids)
    }

    /// Header preimage: prev_hash || transactions digest || timestamp || nonce
    pub fn header_preimage(&self, digest: &Hash256, nonce: u64) -> Vec<u8> {
        let mut buf = Vec::with_capacity(32 + 32 + 8 + 8);
        if let Some(prev) = &self.prev_hash {
            buf.extend_from_slice(prev.as_bytes());
        }
        buf.extend_from_slice(digest.as_bytes());
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        buf.extend_from_slice(&nonce.to_be_bytes());
        buf
    }

    /// Header hash for a candidate nonce
    pub fn header_hash(&self, nonce: u64) -> Hash256 {
        sha256(&self.header_preimage(&self.transactions_digest(), nonce))
    }

    pub fn is_genesis(&self) -> bool {
        self.prev_hash.is_none()
    }

    /// Current Unix time in seconds
    pub fn now() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

impl Serializable for Block {
    fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(self.hash.as_bytes());

        let prev: &[u8] = match &self.prev_hash {
            Some(hash) => hash.as_bytes(),
            None => &[],
        };
        // Writes into a Vec cannot fail
        let _ = write_var_bytes(&mut buf, prev);
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&self.nonce.to_le_bytes());

        let _ = write_varint(&mut buf, self.transactions.len() as u64);
        for tx in &self.transactions {
            let _ = buf.write_all(&tx.serialize());
        }

        buf
    }

    fn deserialize(data: &[u8]) -> Result<Self, String> {
        let mut cursor = Cursor::new(data);

        let hash = Hash256::new(read_array(&mut cursor).map_err(|e| e.to_string())?);

        let prev = read_var_bytes(&mut cursor).map_err(|e| e.to_string())?;
        let prev_hash = match prev.len() {
            0 => None,
            _ => Some(Hash256::from_slice(&prev)?),
        };

        let timestamp = u64::from_le_bytes(read_array(&mut cursor).map_err(|e| e.to_string())?);
        let nonce = u64::from_le_bytes(read_array(&mut cursor).map_err(|e| e.to_string())?);

        let tx_count = read_varint(&mut cursor).map_err(|e| e.to_string())? as usize;
        let mut transactions = Vec::with_capacity(tx_count.min(1024));
        for _ in 0..tx_count {
            transactions.push(Transaction::from_reader(&mut cursor)?);
        }

        let mut trailing = Vec::new();
        cursor.read_to_end(&mut trailing).map_err(|e| e.to_string())?;
        if !trailing.is_empty() {
            return Err(format!("{} trailing bytes after block", trailing.len()));
        }

        Ok(Self {
            timestamp,
            prev_hash,
            transactions,
            hash,
            nonce,
        })
    }
}
