// Key management

use crate::core::{hash160, raw_public_key, PubKeyHash};
use crate::error::{Error, Result};
use crate::wallet::Address;
use secp256k1::{Secp256k1, SecretKey, PublicKey};
use rand::rngs::OsRng;
use std::collections::HashMap;
use std::path::Path;
use std::fs;
use serde::{Serialize, Deserialize};

/// Resolves addresses to signing keys and raw public keys to ownership hashes
pub trait KeyProvider {
    /// Key pair controlling `address`
    fn key_pair(&self, address: &Address) -> Result<&KeyPair>;

    /// Ownership hash of a raw `X || Y` public key
    fn public_key_hash(&self, raw_public_key: &[u8]) -> PubKeyHash {
        hash160(raw_public_key)
    }
}

/// Serializable key pair (for storage)
#[derive(Serialize, Deserialize)]
struct SerializableKeyPair {
    secret_key_bytes: [u8; 32],
    address: Address,
}

/// Key pair
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
    pub address: Address,
}

impl KeyPair {
    /// Generate a new key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let mut rng = OsRng;

        let secret_key = SecretKey::new(&mut rng);
        Self::from_secret_key(&secp, secret_key)
    }

    /// Create from secret key bytes
    fn from_secret_bytes(bytes: &[u8; 32]) -> Result<Self> {
        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(bytes)
            .map_err(|e| Error::Keystore(format!("Invalid secret key: {}", e)))?;
        Ok(Self::from_secret_key(&secp, secret_key))
    }

    fn from_secret_key<C: secp256k1::Signing>(secp: &Secp256k1<C>, secret_key: SecretKey) -> Self {
        let public_key = secret_key.public_key(secp);
        let address = Address::from_pubkey_hash(&hash160(&raw_public_key(&public_key)));
        Self {
            secret_key,
            public_key,
            address,
        }
    }

    /// Convert to serializable format
    fn to_serializable(&self) -> SerializableKeyPair {
        SerializableKeyPair {
            secret_key_bytes: self.secret_key.secret_bytes(),
            address: self.address.clone(),
        }
    }

    /// Raw `X || Y` public key carried by inputs
    pub fn raw_public_key(&self) -> Vec<u8> {
        raw_public_key(&self.public_key).to_vec()
    }

    pub fn pubkey_hash(&self) -> PubKeyHash {
        hash160(&self.raw_public_key())
    }
}

/// Keystore - manages multiple key pairs
pub struct Keystore {
    keys: HashMap<Address, KeyPair>,
}

#[derive(Serialize, Deserialize)]
struct SerializableKeystore {
    keys: Vec<SerializableKeyPair>,
}

impl Keystore {
    pub fn new() -> Self {
        Self {
            keys: HashMap::new(),
        }
    }

    /// Generate a new address
    pub fn new_address(&mut self) -> Address {
        let keypair = KeyPair::generate();
        let address = keypair.address.clone();
        self.keys.insert(address.clone(), keypair);
        address
    }

    /// Get all addresses, sorted
    pub fn list_addresses(&self) -> Vec<Address> {
        let mut addresses: Vec<Address> = self.keys.keys().cloned().collect();
        addresses.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        addresses
    }

    pub fn count(&self) -> usize {
        self.keys.len()
    }

    /// Save keystore to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let data = SerializableKeystore {
            keys: self.keys.values().map(KeyPair::to_serializable).collect(),
        };

        let json = serde_json::to_string_pretty(&data)
            .map_err(|e| Error::Keystore(format!("Failed to serialize keystore: {}", e)))?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load keystore from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let data: SerializableKeystore = serde_json::from_str(&json)
            .map_err(|e| Error::Keystore(format!("Failed to deserialize keystore: {}", e)))?;

        let mut keys = HashMap::new();
        for stored in data.keys {
            let kp = KeyPair::from_secret_bytes(&stored.secret_key_bytes)?;
            if kp.address != stored.address {
                return Err(Error::Keystore(format!("Key does not match address {}", stored.address)));
            }
            keys.insert(kp.address.clone(), kp);
        }

        Ok(Self { keys })
    }

    /// Load from `path` if it exists, otherwise start empty
    pub fn load_or_new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            log::info!("Loading keystore from {}", path.as_ref().display());
            Self::load(path)
        } else {
            Ok(Self::new())
        }
    }
}

impl KeyProvider for Keystore {
    fn key_pair(&self, address: &Address) -> Result<&KeyPair> {
        self.keys
            .get(address)
            .ok_or_else(|| Error::UnknownAddress(address.to_string()))
    }
}

impl Default for Keystore {
    fn default() -> Self {
        Self::new()
    }
}
