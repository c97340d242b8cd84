// Unspent output discovery by scanning the chain

use crate::chain::Ledger;
use crate::core::{Hash256, PubKeyHash, TxOutput};
use crate::error::{Error, Result};
use crate::storage::ChainStore;
use std::collections::HashSet;

/// Reference to one output of one transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutPoint {
    pub txid: Hash256,
    pub index: i32,
}

impl OutPoint {
    pub fn new(txid: Hash256, index: i32) -> Self {
        Self { txid, index }
    }
}

/// An unspent output together with where it lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    pub outpoint: OutPoint,
    pub output: TxOutput,
}

/// Coins chosen to fund a spend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub accumulated: u64,
    pub outpoints: Vec<OutPoint>,
}

/// Read-only UTXO queries; every call is a full tip-to-genesis scan
pub struct UtxoResolver<'a, S: ChainStore> {
    ledger: &'a Ledger<S>,
}

impl<'a, S: ChainStore> UtxoResolver<'a, S> {
    pub fn new(ledger: &'a Ledger<S>) -> Self {
        Self { ledger }
    }

    /// Unspent outputs owned by `pubkey_hash`, in chain traversal order
    ///
    /// Blocks are visited newest first, so the input consuming an output is
    /// always recorded before the transaction creating that output is seen.
    /// Outputs of a transaction are checked before its own inputs are
    /// recorded as spent.
    pub fn unspent_outputs_for(&self, pubkey_hash: &PubKeyHash) -> Result<Vec<Utxo>> {
        let mut unspent = Vec::new();
        let mut spent: HashSet<OutPoint> = HashSet::new();
        let mut blocks = 0usize;

        for block in self.ledger.iter() {
            let block = block?;
            blocks += 1;

            for tx in &block.transactions {
                for (index, output) in tx.outputs.iter().enumerate() {
                    let outpoint = OutPoint::new(tx.id, index as i32);
                    if spent.contains(&outpoint) {
                        continue;
                    }
                    if output.is_locked_with(pubkey_hash) {
                        unspent.push(Utxo {
                            outpoint,
                            output: output.clone(),
                        });
                    }
                }

                if !tx.is_coinbase() {
                    for input in &tx.inputs {
                        if let Some(prev) = input.prev_tx_id {
                            spent.insert(OutPoint::new(prev, input.out_index));
                        }
                    }
                }
            }
        }

        log::debug!(
            "Scanned {} block(s): {} unspent output(s) for {}",
            blocks,
            unspent.len(),
            hex::encode(pubkey_hash)
        );
        Ok(unspent)
    }

    pub fn balance_of(&self, pubkey_hash: &PubKeyHash) -> Result<u64> {
        self.unspent_outputs_for(pubkey_hash)?
            .iter()
            .try_fold(0u64, |acc, utxo| acc.checked_add(utxo.output.value))
            .ok_or(Error::ValueOverflow)
    }

    /// Greedily take unspent outputs in traversal order until `amount` is covered.
    ///
    /// Stops as soon as the running total reaches `amount`; if it never does,
    /// every unspent output is returned and `accumulated < amount`.
    pub fn select_spendable_outputs(&self, pubkey_hash: &PubKeyHash, amount: u64) -> Result<Selection> {
        let mut selection = Selection {
            accumulated: 0,
            outpoints: Vec::new(),
        };

        for utxo in self.unspent_outputs_for(pubkey_hash)? {
            if selection.accumulated >= amount {
                break;
            }
            selection.accumulated = selection
                .accumulated
                .checked_add(utxo.output.value)
                .ok_or(Error::ValueOverflow)?;
            selection.outpoints.push(utxo.outpoint);
        }

        Ok(selection)
    }
}
