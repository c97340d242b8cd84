// Hashing utilities

use sha2::{Sha256, Digest};
use crate::core::{Hash256, PubKeyHash};

/// Single SHA256, used for transaction ids, the transactions digest and block hashes
pub fn sha256(data: &[u8]) -> Hash256 {
    let digest = Sha256::digest(data);
    let mut result = [0u8; 32];
    result.copy_from_slice(&digest);
    Hash256(result)
}

/// SHA256(SHA256(data)) - used for address checksums
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut result = [0u8; 32];
    result.copy_from_slice(&second);
    result
}

/// RIPEMD160(SHA256(data)) - public key hash
pub fn hash160(data: &[u8]) -> PubKeyHash {
    use ripemd::{Ripemd160, Digest as RipemdDigest};
    let sha = Sha256::digest(data);
    let ripemd = Ripemd160::digest(sha);
    let mut result = [0u8; 20];
    result.copy_from_slice(&ripemd);
    result
}
