// Transaction builder

use crate::chain::Ledger;
use crate::core::{PubKeyHash, Transaction, TxInput, TxOutput};
use crate::error::{Error, Result};
use crate::storage::ChainStore;
use crate::wallet::{Address, KeyPair, KeyProvider};

/// Builds payments funded from the sender's unspent outputs
pub struct TransactionBuilder<'a, K: KeyProvider, S: ChainStore> {
    keys: &'a K,
    ledger: &'a Ledger<S>,
}

impl<'a, K: KeyProvider, S: ChainStore> TransactionBuilder<'a, K, S> {
    pub fn new(keys: &'a K, ledger: &'a Ledger<S>) -> Self {
        Self { keys, ledger }
    }

    /// Unsigned payment of `amount` from `from` to `to`.
    ///
    /// Spends the greedy selection of the sender's outputs; anything above
    /// `amount` comes back to the sender as a change output.
    pub fn build(&self, from: &KeyPair, to: &PubKeyHash, amount: u64) -> Result<Transaction> {
        if amount == 0 {
            return Err(Error::InvalidAmount);
        }

        let from_hash = self.keys.public_key_hash(&from.raw_public_key());
        let selection = self
            .ledger
            .utxo()
            .select_spendable_outputs(&from_hash, amount)?;

        if selection.accumulated < amount {
            return Err(Error::InsufficientFunds {
                available: selection.accumulated,
                requested: amount,
            });
        }

        let public_key = from.raw_public_key();
        let inputs = selection
            .outpoints
            .iter()
            .map(|outpoint| TxInput::new(outpoint.txid, outpoint.index, public_key.clone()))
            .collect();

        let mut outputs = vec![TxOutput::new(amount, *to)];
        if selection.accumulated > amount {
            outputs.push(TxOutput::new(selection.accumulated - amount, from_hash));
        }

        Ok(Transaction::new(inputs, outputs))
    }

    /// Build and sign a payment between two addresses
    pub fn send(&self, from: &Address, to: &Address, amount: u64) -> Result<Transaction> {
        let keypair = self.keys.key_pair(from)?;
        let recipient = to.to_pubkey_hash()?;

        let mut tx = self.build(keypair, &recipient, amount)?;
        self.ledger.sign_transaction(&mut tx, &keypair.secret_key)?;

        log::info!("Built transaction {} paying {} to {}", tx.id, amount, to);
        Ok(tx)
    }

    /// Balance for an address
    pub fn get_balance(&self, address: &Address) -> Result<u64> {
        self.ledger.utxo().balance_of(&address.to_pubkey_hash()?)
    }
}
