// Wallet and transaction building

mod address;
mod keystore;
mod tx_builder;

pub use address::Address;
pub use keystore::{Keystore, KeyPair, KeyProvider};
pub use tx_builder::TransactionBuilder;
