// Proof of Work implementation

use crate::config::ChainConfig;
use crate::core::{Block, Hash256, Transaction};
use crate::error::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Difficulty target: a block hash must be strictly below `2^(256 - difficulty)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub difficulty: u32,
    /// Big-endian 256-bit threshold
    threshold: Hash256,
}

impl Target {
    pub fn from_difficulty(difficulty: u32) -> Result<Self> {
        if difficulty == 0 || difficulty > 255 {
            return Err(Error::InvalidDifficulty(difficulty));
        }

        let bit = 256 - difficulty as usize;
        let mut threshold = [0u8; 32];
        threshold[31 - bit / 8] = 1 << (bit % 8);

        Ok(Self {
            difficulty,
            threshold: Hash256::new(threshold),
        })
    }

    /// Target as a big-endian hash-sized integer
    pub fn to_hash256(&self) -> Hash256 {
        self.threshold
    }

    /// Check if a hash meets this target (hash < target)
    pub fn is_valid_hash(&self, hash: &Hash256) -> bool {
        hash < &self.threshold
    }
}

/// Cooperative cancellation for long nonce searches
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that also trips once `timeout` has elapsed
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// How many nonces to try between cancellation checks
const CANCEL_CHECK_INTERVAL: u64 = 4096;

/// Proof of Work miner
#[derive(Debug, Clone)]
pub struct Miner {
    pub target: Target,
    /// Largest nonce tried before giving up
    pub max_nonce: u64,
}

impl Miner {
    pub fn new(difficulty: u32, max_nonce: u64) -> Result<Self> {
        Ok(Self {
            target: Target::from_difficulty(difficulty)?,
            max_nonce,
        })
    }

    pub fn from_config(config: &ChainConfig) -> Result<Self> {
        Self::new(config.difficulty, config.max_nonce)
    }

    /// Find the first nonce from 0 whose header hash is below the target
    pub fn mine(&self, block: &Block, cancel: &CancelToken) -> Result<MiningResult> {
        let start_time = Instant::now();
        let digest = block.transactions_digest();
        let mut attempts = 0u64;

        for nonce in 0..=self.max_nonce {
            if nonce % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                log::warn!("Mining cancelled after {} attempts", attempts);
                return Err(Error::MiningCancelled);
            }

            let hash = crate::core::sha256(&block.header_preimage(&digest, nonce));
            attempts += 1;

            if self.target.is_valid_hash(&hash) {
                return Ok(MiningResult {
                    nonce,
                    hash,
                    attempts,
                    duration: start_time.elapsed(),
                });
            }

            // Progress indicator every 100k attempts
            if attempts % 100_000 == 0 {
                let elapsed = start_time.elapsed();
                log::debug!("Mining attempts: {} ({:.1} KH/s)",
                    attempts,
                    attempts as f64 / elapsed.as_secs_f64() / 1000.0
                );
            }
        }

        Err(Error::NonceSpaceExhausted { max_nonce: self.max_nonce })
    }

    /// Assemble and seal a block on top of `prev_hash`
    pub fn seal(
        &self,
        prev_hash: Option<Hash256>,
        transactions: Vec<Transaction>,
        cancel: &CancelToken,
    ) -> Result<Block> {
        let mut block = Block::new(prev_hash, transactions, Block::now());
        let result = self.mine(&block, cancel)?;

        log::info!(
            "Mined block {} (nonce {}, {} attempts, {:.0} H/s)",
            result.hash, result.nonce, result.attempts, result.hash_rate()
        );

        block.nonce = result.nonce;
        block.hash = result.hash;
        Ok(block)
    }

    /// Sealed genesis block holding only `coinbase`
    pub fn genesis(&self, coinbase: Transaction, cancel: &CancelToken) -> Result<Block> {
        self.seal(None, vec![coinbase], cancel)
    }

    /// Recompute the header hash with the stored nonce and check it against the target
    pub fn validate(&self, block: &Block) -> bool {
        self.target.is_valid_hash(&block.header_hash(block.nonce))
    }
}

/// Mining result
#[derive(Debug)]
pub struct MiningResult {
    pub nonce: u64,
    pub hash: Hash256,
    pub attempts: u64,
    pub duration: Duration,
}

impl MiningResult {
    /// Calculate hash rate (hashes per second)
    pub fn hash_rate(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.attempts as f64 / secs
        } else {
            self.attempts as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coinbase_block() -> Block {
        Block::new(None, vec![Transaction::coinbase([1; 20], b"pow", 100)], 1_700_000_000)
    }

    #[test]
    fn test_target_threshold() {
        let target = Target::from_difficulty(8).unwrap();
        let mut expected = [0u8; 32];
        expected[0] = 0x01;
        assert_eq!(target.to_hash256(), Hash256::new(expected));
        assert_eq!(target.to_hash256().leading_zeros(), 7);

        let top = Target::from_difficulty(1).unwrap();
        assert_eq!(top.to_hash256().as_bytes()[0], 0x80);

        let bottom = Target::from_difficulty(255).unwrap();
        assert_eq!(bottom.to_hash256().as_bytes()[31], 0x02);
    }

    #[test]
    fn test_invalid_difficulty() {
        assert!(matches!(Target::from_difficulty(0), Err(Error::InvalidDifficulty(0))));
        assert!(matches!(Target::from_difficulty(256), Err(Error::InvalidDifficulty(256))));
    }

    #[test]
    fn test_target_is_strict() {
        let target = Target::from_difficulty(8).unwrap();
        assert!(target.is_valid_hash(&Hash256::zero()));
        assert!(!target.is_valid_hash(&target.to_hash256()));

        let mut just_below = [0xffu8; 32];
        just_below[0] = 0x00;
        assert!(target.is_valid_hash(&Hash256::new(just_below)));
        assert!(!target.is_valid_hash(&Hash256::new([0xff; 32])));
    }

    #[test]
    fn test_mine_and_validate() {
        let miner = Miner::new(8, u64::MAX).unwrap();
        let mut block = coinbase_block();

        let result = miner.mine(&block, &CancelToken::new()).unwrap();
        assert!(result.hash.leading_zeros() >= 8);
        assert_eq!(result.attempts, result.nonce + 1);

        // First satisfying nonce is taken
        for nonce in 0..result.nonce {
            assert!(!miner.target.is_valid_hash(&block.header_hash(nonce)));
        }

        block.nonce = result.nonce;
        block.hash = result.hash;
        assert!(miner.validate(&block));
    }

    #[test]
    fn test_validate_rejects_tampering() {
        let miner = Miner::new(16, u64::MAX).unwrap();
        let block = miner.genesis(Transaction::coinbase([1; 20], b"pow", 100), &CancelToken::new()).unwrap();
        assert!(miner.validate(&block));

        let mut tampered = block.clone();
        tampered.transactions[0].outputs[0].value = 1_000;
        tampered.transactions[0].id = tampered.transactions[0].hash();
        assert!(!miner.validate(&tampered));

        let mut renonced = block.clone();
        renonced.nonce += 1;
        assert!(!miner.validate(&renonced));
    }

    #[test]
    fn test_nonce_space_exhausted() {
        let miner = Miner::new(200, 50).unwrap();
        let err = miner.mine(&coinbase_block(), &CancelToken::new()).unwrap_err();
        assert!(matches!(err, Error::NonceSpaceExhausted { max_nonce: 50 }));
    }

    #[test]
    fn test_cancelled_before_start() {
        let miner = Miner::new(200, u64::MAX).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(matches!(miner.mine(&coinbase_block(), &cancel), Err(Error::MiningCancelled)));
    }

    #[test]
    fn test_deadline_cancels_search() {
        let miner = Miner::new(200, u64::MAX).unwrap();
        let cancel = CancelToken::with_timeout(Duration::from_millis(20));
        assert!(matches!(miner.mine(&coinbase_block(), &cancel), Err(Error::MiningCancelled)));
    }

    #[test]
    fn test_cancel_from_another_thread() {
        let miner = Miner::new(200, u64::MAX).unwrap();
        let cancel = CancelToken::new();
        let remote = cancel.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });

        assert!(matches!(miner.mine(&coinbase_block(), &cancel), Err(Error::MiningCancelled)));
        handle.join().unwrap();
    }
}
