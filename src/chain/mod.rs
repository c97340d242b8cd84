// Ledger and chain scanning

mod ledger;
mod utxo;

pub use ledger::{ChainIter, Ledger};
pub use utxo::{OutPoint, Selection, Utxo, UtxoResolver};
