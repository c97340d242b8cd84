// Per-input ECDSA signing and verification
//
// Each input signs the id of a trimmed copy of the transaction in which only
// that input's public key field is populated, holding the public key hash of
// the output it spends. Signatures and public keys use fixed-width 32-byte
// coordinates.

use crate::core::{Hash256, Transaction};
use crate::error::{Error, Result};
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};
use std::collections::HashMap;

/// Prior transactions resolved by id
pub type PriorTransactions = HashMap<Hash256, Transaction>;

/// Width of one curve coordinate in bytes
pub const COORDINATE_LEN: usize = 32;

/// `r || s` and `X || Y` are both two coordinates wide
pub const SIGNATURE_LEN: usize = 2 * COORDINATE_LEN;
pub const RAW_PUBLIC_KEY_LEN: usize = 2 * COORDINATE_LEN;

/// Raw `X || Y` encoding of a public key
pub fn raw_public_key(public_key: &PublicKey) -> [u8; RAW_PUBLIC_KEY_LEN] {
    let uncompressed = public_key.serialize_uncompressed();
    let mut raw = [0u8; RAW_PUBLIC_KEY_LEN];
    raw.copy_from_slice(&uncompressed[1..]);
    raw
}

/// Parse a raw `X || Y` public key
pub fn public_key_from_raw(raw: &[u8]) -> Option<PublicKey> {
    if raw.len() != RAW_PUBLIC_KEY_LEN {
        return None;
    }
    let mut uncompressed = [0u8; RAW_PUBLIC_KEY_LEN + 1];
    uncompressed[0] = 0x04;
    uncompressed[1..].copy_from_slice(raw);
    PublicKey::from_slice(&uncompressed).ok()
}

impl Transaction {
    /// Sign every input with `secret_key`. No-op for coinbase.
    ///
    /// All referenced prior transactions must be present in `prior`, checked
    /// before any input is touched.
    pub fn sign(&mut self, secret_key: &SecretKey, prior: &PriorTransactions) -> Result<()> {
        if self.is_coinbase() {
            return Ok(());
        }
        self.check_prior_known(prior)?;

        let secp = Secp256k1::signing_only();
        let mut working = self.trimmed_copy();
        let mut signatures = Vec::with_capacity(self.inputs.len());

        for index in 0..working.inputs.len() {
            let digest = match signing_digest(&mut working, index, prior) {
                Some(digest) => digest,
                None => {
                    let input = &self.inputs[index];
                    return Err(Error::InvalidOutputReference {
                        tx_id: input.prev_tx_id.unwrap_or_default(),
                        index: input.out_index,
                    });
                }
            };
            let message = Message::from_digest(digest.0);
            let signature = secp.sign_ecdsa(&message, secret_key);
            signatures.push(signature.serialize_compact());
        }

        for (input, signature) in self.inputs.iter_mut().zip(signatures) {
            input.signature = signature.to_vec();
        }
        Ok(())
    }

    /// Verify every input signature. Coinbase always verifies.
    ///
    /// Returns `Ok(false)` on the first failing input.
    pub fn verify(&self, prior: &PriorTransactions) -> Result<bool> {
        if self.is_coinbase() {
            return Ok(true);
        }
        self.check_prior_known(prior)?;

        let secp = Secp256k1::verification_only();
        let mut working = self.trimmed_copy();

        for (index, input) in self.inputs.iter().enumerate() {
            let Some(digest) = signing_digest(&mut working, index, prior) else {
                return Ok(false);
            };
            if input.signature.len() != SIGNATURE_LEN {
                return Ok(false);
            }
            let Ok(signature) = Signature::from_compact(&input.signature) else {
                return Ok(false);
            };
            let Some(public_key) = public_key_from_raw(&input.public_key) else {
                return Ok(false);
            };

            let message = Message::from_digest(digest.0);
            if secp.verify_ecdsa(&message, &signature, &public_key).is_err() {
                log::debug!("Input {} of {} failed verification", index, self.id);
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn check_prior_known(&self, prior: &PriorTransactions) -> Result<()> {
        for input in &self.inputs {
            match &input.prev_tx_id {
                Some(id) if prior.contains_key(id) => {}
                Some(id) => return Err(Error::UnknownPriorTransaction(*id)),
                None => return Err(Error::UnknownPriorTransaction(Hash256::zero())),
            }
        }
        Ok(())
    }
}

/// Id of `working` with only input `index` carrying the spent output's
/// public key hash. Leaves `working` fully blanked again on return.
fn signing_digest(working: &mut Transaction, index: usize, prior: &PriorTransactions) -> Option<Hash256> {
    let input = &working.inputs[index];
    let prev_tx = prior.get(input.prev_tx_id.as_ref()?)?;
    let out_index = usize::try_from(input.out_index).ok()?;
    let spent = prev_tx.outputs.get(out_index)?;

    working.inputs[index].public_key = spent.pubkey_hash.to_vec();
    let digest = working.hash();
    working.inputs[index].public_key.clear();
    Some(digest)
}
