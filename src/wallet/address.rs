// Base58Check addresses

use crate::core::{double_sha256, PubKeyHash};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

const VERSION: u8 = 0x00;
const CHECKSUM_LEN: usize = 4;

/// Human-readable address: Base58(version || pubkey hash || checksum)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    /// Create address from public key hash
    pub fn from_pubkey_hash(hash: &PubKeyHash) -> Self {
        let mut payload = Vec::with_capacity(1 + hash.len() + CHECKSUM_LEN);
        payload.push(VERSION);
        payload.extend_from_slice(hash);
        let checksum = checksum(&payload);
        payload.extend_from_slice(&checksum);
        Self(bs58::encode(payload).into_string())
    }

    /// Parse and validate an address string
    pub fn parse(address: &str) -> Result<Self> {
        let address = Self(address.to_string());
        address.to_pubkey_hash()?;
        Ok(address)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the public key hash, checking version and checksum
    pub fn to_pubkey_hash(&self) -> Result<PubKeyHash> {
        let bytes = bs58::decode(&self.0)
            .into_vec()
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", self.0, e)))?;

        if bytes.len() != 1 + 20 + CHECKSUM_LEN {
            return Err(Error::InvalidAddress(format!("{}: wrong length {}", self.0, bytes.len())));
        }
        let (payload, actual) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
        if actual != checksum(payload) {
            return Err(Error::InvalidAddress(format!("{}: checksum mismatch", self.0)));
        }
        if payload[0] != VERSION {
            return Err(Error::InvalidAddress(format!("{}: unknown version {}", self.0, payload[0])));
        }

        let mut hash = [0u8; 20];
        hash.copy_from_slice(&payload[1..]);
        Ok(hash)
    }
}

fn checksum(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let digest = double_sha256(payload);
    let mut checksum = [0u8; CHECKSUM_LEN];
    checksum.copy_from_slice(&digest[..CHECKSUM_LEN]);
    checksum
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_conversion() {
        let hash = [0x12; 20];
        let addr = Address::from_pubkey_hash(&hash);

        assert!(addr.as_str().starts_with('1'));
        assert_eq!(addr.to_pubkey_hash().unwrap(), hash);
        assert_eq!(Address::parse(addr.as_str()).unwrap(), addr);
    }

    #[test]
    fn test_corrupted_checksum() {
        let addr = Address::from_pubkey_hash(&[0x34; 20]);
        let mut bytes = bs58::decode(addr.as_str()).into_vec().unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = bs58::encode(bytes).into_string();

        assert!(matches!(Address::parse(&tampered), Err(Error::InvalidAddress(_))));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(Address::parse("not-base58-0OIl").is_err());
        assert!(Address::parse("").is_err());
        assert!(Address::parse("1111").is_err());
    }
}
