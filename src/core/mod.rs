// Core ledger data structures

mod types;
mod transaction;
mod block;
mod serialize;
mod hash;
pub mod signature;

pub use types::*;
pub use transaction::*;
pub use block::*;
pub use serialize::*;
pub use hash::*;
pub use signature::{PriorTransactions, raw_public_key, public_key_from_raw};
