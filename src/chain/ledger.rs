// Append-only ledger over a ChainStore

use crate::chain::UtxoResolver;
use crate::config::ChainConfig;
use crate::consensus::{CancelToken, Miner, SpendValidator};
use crate::core::{Block, Hash256, PriorTransactions, PubKeyHash, Serializable, Transaction};
use crate::error::{Error, Result};
use crate::storage::{ChainBatch, ChainStore};
use secp256k1::SecretKey;

/// The chain of proof-of-work sealed blocks held in `S`
pub struct Ledger<S: ChainStore> {
    store: S,
    miner: Miner,
    config: ChainConfig,
}

impl<S: ChainStore> Ledger<S> {
    /// Mine a genesis block paying the block reward to `genesis_owner` and persist it
    pub fn create(
        store: S,
        config: ChainConfig,
        genesis_owner: PubKeyHash,
        cancel: &CancelToken,
    ) -> Result<Self> {
        config.validate()?;
        if store.tip()?.is_some() {
            return Err(Error::ChainAlreadyExists);
        }

        let miner = Miner::from_config(&config)?;
        let coinbase = Transaction::coinbase(
            genesis_owner,
            config.genesis_memo.as_bytes(),
            config.block_reward,
        );
        let genesis = Self::genesis(&miner, coinbase, cancel)?;

        let mut batch = ChainBatch::new();
        batch.put(genesis.hash, genesis.serialize());
        batch.set_tip(genesis.hash);
        store.commit(batch)?;

        log::info!("Created chain with genesis block {}", genesis.hash);
        Ok(Self { store, miner, config })
    }

    /// Open an existing chain
    pub fn open(store: S, config: ChainConfig) -> Result<Self> {
        config.validate()?;
        if store.tip()?.is_none() {
            return Err(Error::ChainNotInitialized);
        }
        let miner = Miner::from_config(&config)?;
        Ok(Self { store, miner, config })
    }

    /// First block: no previous hash, only the coinbase
    pub fn genesis(miner: &Miner, coinbase: Transaction, cancel: &CancelToken) -> Result<Block> {
        miner.genesis(coinbase, cancel)
    }

    /// Mine a block of `transactions` on the current tip and persist it.
    ///
    /// Transactions must already be signature-verified. Spends are checked
    /// against the chain before mining; nothing is written unless mining and
    /// the commit both succeed.
    pub fn append(&self, transactions: Vec<Transaction>, cancel: &CancelToken) -> Result<Block> {
        let tip = self.store.tip()?.ok_or(Error::ChainNotInitialized)?;

        SpendValidator::new(self).check(&transactions)?;

        let block = self.miner.seal(Some(tip), transactions, cancel)?;

        let mut batch = ChainBatch::new();
        batch.put(block.hash, block.serialize());
        batch.set_tip(block.hash);
        self.store.commit(batch)?;

        log::info!("Appended block {} with {} transaction(s)", block.hash, block.transactions.len());
        Ok(block)
    }

    /// Blocks from the tip back to genesis, inclusive
    pub fn iter(&self) -> ChainIter<'_, S> {
        match self.store.tip() {
            Ok(tip) => ChainIter {
                store: &self.store,
                next: tip,
                pending_error: None,
            },
            Err(err) => ChainIter {
                store: &self.store,
                next: None,
                pending_error: Some(err),
            },
        }
    }

    pub fn tip(&self) -> Result<Option<Hash256>> {
        self.store.tip()
    }

    /// Scan the chain for a transaction by id
    pub fn find_transaction(&self, id: &Hash256) -> Result<Option<Transaction>> {
        for block in self.iter() {
            if let Some(tx) = block?.transactions.into_iter().find(|tx| &tx.id == id) {
                return Ok(Some(tx));
            }
        }
        Ok(None)
    }

    /// Resolve every transaction referenced by `tx`'s inputs
    pub fn prior_transactions(&self, tx: &Transaction) -> Result<PriorTransactions> {
        let mut prior = PriorTransactions::new();
        if tx.is_coinbase() {
            return Ok(prior);
        }
        for input in &tx.inputs {
            let id = input.prev_tx_id.ok_or(Error::UnknownPriorTransaction(Hash256::zero()))?;
            if prior.contains_key(&id) {
                continue;
            }
            let prev = self
                .find_transaction(&id)?
                .ok_or(Error::UnknownPriorTransaction(id))?;
            prior.insert(id, prev);
        }
        Ok(prior)
    }

    pub fn sign_transaction(&self, tx: &mut Transaction, secret_key: &SecretKey) -> Result<()> {
        let prior = self.prior_transactions(tx)?;
        tx.sign(secret_key, &prior)
    }

    pub fn verify_transaction(&self, tx: &Transaction) -> Result<bool> {
        let prior = self.prior_transactions(tx)?;
        tx.verify(&prior)
    }

    pub fn utxo(&self) -> UtxoResolver<'_, S> {
        UtxoResolver::new(self)
    }

    pub fn miner(&self) -> &Miner {
        &self.miner
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }
}

/// Lazy walk from a tip to genesis
pub struct ChainIter<'a, S: ChainStore> {
    store: &'a S,
    next: Option<Hash256>,
    pending_error: Option<Error>,
}

impl<S: ChainStore> Iterator for ChainIter<'_, S> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.pending_error.take() {
            return Some(Err(err));
        }

        let hash = self.next.take()?;
        let block = match self.store.get(&hash) {
            Ok(Some(data)) => Block::deserialize(&data).map_err(Error::CorruptBlock),
            Ok(None) => Err(Error::CorruptBlock(format!("missing block {}", hash))),
            Err(err) => Err(err),
        };

        if let Ok(block) = &block {
            self.next = block.prev_hash;
        }
        Some(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{TxInput, TxOutput};
    use crate::storage::SledStore;

    fn config() -> ChainConfig {
        ChainConfig {
            difficulty: 4,
            ..ChainConfig::default()
        }
    }

    fn ledger() -> Ledger<SledStore> {
        Ledger::create(SledStore::memory().unwrap(), config(), [1; 20], &CancelToken::new()).unwrap()
    }

    #[test]
    fn test_create_writes_genesis() {
        let ledger = ledger();
        let blocks: Vec<Block> = ledger.iter().collect::<Result<_>>().unwrap();

        assert_eq!(blocks.len(), 1);
        let genesis = &blocks[0];
        assert!(genesis.is_genesis());
        assert_eq!(genesis.transactions.len(), 1);
        assert!(genesis.transactions[0].is_coinbase());
        assert_eq!(genesis.transactions[0].outputs[0], TxOutput::new(100, [1; 20]));
        assert_eq!(ledger.tip().unwrap(), Some(genesis.hash));
        assert!(ledger.miner().validate(genesis));
    }

    #[test]
    fn test_create_twice_fails() {
        let store = SledStore::memory().unwrap();
        Ledger::create(&store, config(), [1; 20], &CancelToken::new()).unwrap();
        let again = Ledger::create(&store, config(), [1; 20], &CancelToken::new());
        assert!(matches!(again, Err(Error::ChainAlreadyExists)));
    }

    #[test]
    fn test_open_requires_chain() {
        let store = SledStore::memory().unwrap();
        assert!(matches!(Ledger::open(&store, config()), Err(Error::ChainNotInitialized)));

        Ledger::create(&store, config(), [1; 20], &CancelToken::new()).unwrap();
        assert!(Ledger::open(&store, config()).is_ok());
    }

    #[test]
    fn test_append_links_to_tip() {
        let ledger = ledger();
        let genesis_hash = ledger.tip().unwrap().unwrap();

        let block = ledger
            .append(vec![Transaction::coinbase([2; 20], b"reward", 100)], &CancelToken::new())
            .unwrap();

        assert_eq!(block.prev_hash, Some(genesis_hash));
        assert_eq!(ledger.tip().unwrap(), Some(block.hash));
        assert!(ledger.miner().validate(&block));
    }

    #[test]
    fn test_iter_is_restartable() {
        let ledger = ledger();
        for i in 0..3u8 {
            ledger
                .append(vec![Transaction::coinbase([i; 20], &[i], 100)], &CancelToken::new())
                .unwrap();
        }

        let first: Vec<Hash256> = ledger.iter().map(|b| b.unwrap().hash).collect();
        let second: Vec<Hash256> = ledger.iter().map(|b| b.unwrap().hash).collect();
        assert_eq!(first.len(), 4);
        assert_eq!(first, second);
        assert_eq!(first[0], ledger.tip().unwrap().unwrap());
    }

    #[test]
    fn test_iter_reports_missing_block() {
        let store = SledStore::memory().unwrap();
        let mut batch = ChainBatch::new();
        batch.set_tip(Hash256::new([0xab; 32]));
        store.commit(batch).unwrap();

        let ledger = Ledger::open(&store, config()).unwrap();
        let mut iter = ledger.iter();
        assert!(matches!(iter.next(), Some(Err(Error::CorruptBlock(_)))));
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_cancelled_append_leaves_tip() {
        let ledger = ledger();
        let tip = ledger.tip().unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = ledger.append(vec![Transaction::coinbase([2; 20], b"x", 100)], &cancel);
        assert!(matches!(result, Err(Error::MiningCancelled)));
        assert_eq!(ledger.tip().unwrap(), tip);
    }

    #[test]
    fn test_find_and_resolve_prior() {
        let ledger = ledger();
        let genesis_tx = ledger.iter().next().unwrap().unwrap().transactions[0].clone();

        assert_eq!(ledger.find_transaction(&genesis_tx.id).unwrap(), Some(genesis_tx.clone()));
        assert_eq!(ledger.find_transaction(&Hash256::new([3; 32])).unwrap(), None);

        let spend = Transaction::new(
            vec![TxInput::new(genesis_tx.id, 0, vec![])],
            vec![TxOutput::new(100, [2; 20])],
        );
        let prior = ledger.prior_transactions(&spend).unwrap();
        assert_eq!(prior.get(&genesis_tx.id), Some(&genesis_tx));

        let orphan = Transaction::new(
            vec![TxInput::new(Hash256::new([3; 32]), 0, vec![])],
            vec![TxOutput::new(1, [2; 20])],
        );
        assert!(matches!(
            ledger.prior_transactions(&orphan),
            Err(Error::UnknownPriorTransaction(_))
        ));
    }
}
