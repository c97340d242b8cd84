// Spend acceptance checks run before a block is mined

use crate::chain::{Ledger, OutPoint};
use crate::core::{Hash256, Transaction};
use crate::error::{Error, Result};
use crate::storage::ChainStore;
use std::collections::{HashMap, HashSet};

/// Checks a batch of transactions against the current chain.
///
/// Rejects ids already on chain or repeated in the batch, coinbases that do
/// not mint exactly the block reward, references to unknown transactions or
/// outputs, outputs that are already spent on chain or twice within the
/// batch, and transactions whose outputs exceed their inputs. Signatures are
/// not checked.
pub struct SpendValidator<'a, S: ChainStore> {
    ledger: &'a Ledger<S>,
}

impl<'a, S: ChainStore> SpendValidator<'a, S> {
    pub fn new(ledger: &'a Ledger<S>) -> Self {
        Self { ledger }
    }

    pub fn check(&self, transactions: &[Transaction]) -> Result<()> {
        let (known, mut spent) = self.chain_state()?;
        let reward = self.ledger.config().block_reward;
        let mut batch_ids = HashSet::new();

        for tx in transactions {
            if known.contains_key(&tx.id) || !batch_ids.insert(tx.id) {
                log::warn!("Rejecting {}: duplicate transaction id", tx.id);
                return Err(Error::DuplicateTransaction(tx.id));
            }

            if tx.is_coinbase() {
                check_coinbase(tx, reward)?;
                continue;
            }

            let mut input_value = 0u64;

            for input in &tx.inputs {
                let prev_id = input.prev_tx_id.ok_or(Error::UnknownPriorTransaction(Hash256::zero()))?;
                let prev = known.get(&prev_id).ok_or(Error::UnknownPriorTransaction(prev_id))?;
                let output = usize::try_from(input.out_index)
                    .ok()
                    .and_then(|index| prev.outputs.get(index))
                    .ok_or(Error::InvalidOutputReference {
                        tx_id: prev_id,
                        index: input.out_index,
                    })?;

                if !spent.insert(OutPoint::new(prev_id, input.out_index)) {
                    log::warn!("Rejecting {}: output {}:{} already spent", tx.id, prev_id, input.out_index);
                    return Err(Error::DoubleSpend {
                        tx_id: prev_id,
                        index: input.out_index,
                    });
                }
                input_value = input_value.saturating_add(output.value);
            }

            let output_value = tx.total_output_value().ok_or(Error::ValueOverflow)?;
            if output_value > input_value {
                log::warn!("Rejecting {}: creates value", tx.id);
                return Err(Error::ValueCreated {
                    inputs: input_value,
                    outputs: output_value,
                });
            }
        }

        Ok(())
    }

    /// Every transaction on chain by id, and every outpoint already consumed
    fn chain_state(&self) -> Result<(HashMap<Hash256, Transaction>, HashSet<OutPoint>)> {
        let mut known = HashMap::new();
        let mut spent = HashSet::new();

        for block in self.ledger.iter() {
            for tx in block?.transactions {
                if !tx.is_coinbase() {
                    for input in &tx.inputs {
                        if let Some(prev) = input.prev_tx_id {
                            spent.insert(OutPoint::new(prev, input.out_index));
                        }
                    }
                }
                known.insert(tx.id, tx);
            }
        }

        Ok((known, spent))
    }
}

/// A coinbase mints exactly `reward` in a single output
fn check_coinbase(tx: &Transaction, reward: u64) -> Result<()> {
    let reason = match tx.outputs.as_slice() {
        [output] if output.value == reward => return Ok(()),
        [output] => format!("mints {} instead of {}", output.value, reward),
        outputs => format!("has {} outputs", outputs.len()),
    };
    log::warn!("Rejecting coinbase {}: {}", tx.id, reason);
    Err(Error::InvalidCoinbase { tx_id: tx.id, reason })
}
