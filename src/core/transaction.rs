// Transaction data structures and canonical encoding

use crate::core::{Hash256, PubKeyHash, sha256, Serializable};
use std::fmt;
use std::io::{Write, Read, Cursor};
use super::serialize::{write_varint, read_varint, write_var_bytes, read_var_bytes, read_array};

/// Output index carried by the coinbase input
pub const COINBASE_OUT_INDEX: i32 = -1;

/// Transaction input - references a previous transaction output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInput {
    /// Id of the transaction holding the spent output, `None` for coinbase
    pub prev_tx_id: Option<Hash256>,
    /// Index of the output in the previous transaction
    pub out_index: i32,
    /// `r || s`, 64 bytes once signed; the memo for a coinbase input
    pub signature: Vec<u8>,
    /// Spender's raw `X || Y` public key
    pub public_key: Vec<u8>,
}

impl TxInput {
    /// Create an unsigned input spending `prev_tx_id:out_index`
    pub fn new(prev_tx_id: Hash256, out_index: i32, public_key: Vec<u8>) -> Self {
        Self {
            prev_tx_id: Some(prev_tx_id),
            out_index,
            signature: Vec::new(),
            public_key,
        }
    }

    /// Create a coinbase input carrying `memo`
    pub fn coinbase(memo: Vec<u8>) -> Self {
        Self {
            prev_tx_id: None,
            out_index: COINBASE_OUT_INDEX,
            signature: memo,
            public_key: Vec::new(),
        }
    }

    pub fn is_coinbase(&self) -> bool {
        self.prev_tx_id.is_none() && self.out_index == COINBASE_OUT_INDEX
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        let prev: &[u8] = match &self.prev_tx_id {
            Some(id) => id.as_bytes(),
            None => &[],
        };
        write_var_bytes(writer, prev)?;
        writer.write_all(&self.out_index.to_le_bytes())?;
        write_var_bytes(writer, &self.signature)?;
        write_var_bytes(writer, &self.public_key)?;
        Ok(())
    }

    fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Self, String> {
        let prev = read_var_bytes(reader).map_err(|e| e.to_string())?;
        let prev_tx_id = match prev.len() {
            0 => None,
            _ => Some(Hash256::from_slice(&prev)?),
        };
        let out_index = i32::from_le_bytes(read_array(reader).map_err(|e| e.to_string())?);
        let signature = read_var_bytes(reader).map_err(|e| e.to_string())?;
        let public_key = read_var_bytes(reader).map_err(|e| e.to_string())?;

        Ok(Self {
            prev_tx_id,
            out_index,
            signature,
            public_key,
        })
    }
}

/// Transaction output - value locked to a public key hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    pub value: u64,
    pub pubkey_hash: PubKeyHash,
}

impl TxOutput {
    pub fn new(value: u64, pubkey_hash: PubKeyHash) -> Self {
        Self { value, pubkey_hash }
    }

    /// Whether this output is owned by `pubkey_hash`
    pub fn is_locked_with(&self, pubkey_hash: &PubKeyHash) -> bool {
        &self.pubkey_hash == pubkey_hash
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&self.value.to_le_bytes())?;
        writer.write_all(&self.pubkey_hash)?;
        Ok(())
    }

    fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Self, String> {
        let value = u64::from_le_bytes(read_array(reader).map_err(|e| e.to_string())?);
        let pubkey_hash = read_array(reader).map_err(|e| e.to_string())?;
        Ok(Self { value, pubkey_hash })
    }
}

/// Transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Hash of the canonical encoding with this field blanked
    pub id: Hash256,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    /// Create a transaction and compute its id
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        let mut tx = Self {
            id: Hash256::zero(),
            inputs,
            outputs,
        };
        tx.id = tx.hash();
        tx
    }

    /// Create a coinbase transaction minting `reward` to `to`
    pub fn coinbase(to: PubKeyHash, memo: &[u8], reward: u64) -> Self {
        let memo = if memo.is_empty() {
            format!("Reward to {}", hex::encode(to)).into_bytes()
        } else {
            memo.to_vec()
        };
        Self::new(vec![TxInput::coinbase(memo)], vec![TxOutput::new(reward, to)])
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].is_coinbase()
    }

    /// Hash of the canonical encoding with `id` blanked
    pub fn hash(&self) -> Hash256 {
        sha256(&self.encode(false))
    }

    /// Canonical encoding; `with_id = false` writes a zero-length id
    pub fn encode(&self, with_id: bool) -> Vec<u8> {
        let mut buf = Vec::new();
        // Writes into a Vec cannot fail
        let _ = self.write_to(&mut buf, with_id);
        buf
    }

    fn write_to<W: Write>(&self, writer: &mut W, with_id: bool) -> std::io::Result<()> {
        let id: &[u8] = if with_id { self.id.as_bytes() } else { &[] };
        write_var_bytes(writer, id)?;

        write_varint(writer, self.inputs.len() as u64)?;
        for input in &self.inputs {
            input.write_to(writer)?;
        }

        write_varint(writer, self.outputs.len() as u64)?;
        for output in &self.outputs {
            output.write_to(writer)?;
        }
        Ok(())
    }

    /// Copy with every input's signature and public key blanked
    pub fn trimmed_copy(&self) -> Self {
        let inputs = self
            .inputs
            .iter()
            .map(|input| TxInput {
                prev_tx_id: input.prev_tx_id,
                out_index: input.out_index,
                signature: Vec::new(),
                public_key: Vec::new(),
            })
            .collect();

        Self {
            id: self.id,
            inputs,
            outputs: self.outputs.clone(),
        }
    }

    /// Sum of output values, `None` on overflow
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.value))
    }

    /// Read one full encoding (with id) from a stream
    pub fn from_reader<R: Read + ?Sized>(reader: &mut R) -> Result<Self, String> {
        let id_bytes = read_var_bytes(reader).map_err(|e| e.to_string())?;
        let id = Hash256::from_slice(&id_bytes)?;

        let input_count = read_varint(reader).map_err(|e| e.to_string())? as usize;
        let mut inputs = Vec::with_capacity(input_count.min(1024));
        for _ in 0..input_count {
            inputs.push(TxInput::read_from(reader)?);
        }

        let output_count = read_varint(reader).map_err(|e| e.to_string())? as usize;
        let mut outputs = Vec::with_capacity(output_count.min(1024));
        for _ in 0..output_count {
            outputs.push(TxOutput::read_from(reader)?);
        }

        Ok(Self { id, inputs, outputs })
    }
}

impl Serializable for Transaction {
    fn serialize(&self) -> Vec<u8> {
        self.encode(true)
    }

    fn deserialize(data: &[u8]) -> Result<Self, String> {
        let mut cursor = Cursor::new(data);
        Self::from_reader(&mut cursor)
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "-- Transaction {}:", self.id)?;
        for (i, input) in self.inputs.iter().enumerate() {
            writeln!(f, "     Input {}:", i)?;
            match &input.prev_tx_id {
                Some(id) => writeln!(f, "       TxID: {}", id)?,
                None => writeln!(f, "       TxID: (coinbase)")?,
            }
            writeln!(f, "       Out: {}", input.out_index)?;
            writeln!(f, "       Sig: {}", hex::encode(&input.signature))?;
            writeln!(f, "       Pub: {}", hex::encode(&input.public_key))?;
        }
        for (i, output) in self.outputs.iter().enumerate() {
            writeln!(f, "     Output {}:", i)?;
            writeln!(f, "       Value: {}", output.value)?;
            writeln!(f, "       PubHash: {}", hex::encode(output.pubkey_hash))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spend() -> Transaction {
        Transaction::new(
            vec![TxInput::new(Hash256::new([7; 32]), 1, vec![9; 64])],
            vec![TxOutput::new(40, [2; 20]), TxOutput::new(60, [1; 20])],
        )
    }

    #[test]
    fn test_coinbase_input() {
        let input = TxInput::coinbase(vec![1, 2, 3]);
        assert!(input.is_coinbase());
        assert_eq!(input.prev_tx_id, None);
        assert_eq!(input.out_index, -1);
        assert_eq!(input.signature, vec![1, 2, 3]);
    }

    #[test]
    fn test_coinbase_transaction() {
        let tx = Transaction::coinbase([1; 20], b"genesis", 100);

        assert!(tx.is_coinbase());
        assert_eq!(tx.outputs, vec![TxOutput::new(100, [1; 20])]);
        assert_eq!(tx.id, tx.hash());
    }

    #[test]
    fn test_coinbase_default_memo_names_recipient() {
        let tx = Transaction::coinbase([0xab; 20], b"", 100);
        let memo = String::from_utf8(tx.inputs[0].signature.clone()).unwrap();
        assert!(memo.contains(&hex::encode([0xab; 20])));
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let a = spend();
        let b = spend();
        assert_eq!(a.encode(true), b.encode(true));
        assert_eq!(a.id, b.id);
        assert_eq!(a.hash(), a.hash());
    }

    #[test]
    fn test_id_preimage_ignores_stored_id() {
        let mut tx = spend();
        let original = tx.hash();
        tx.id = Hash256::new([0xee; 32]);
        assert_eq!(tx.hash(), original);
    }

    #[test]
    fn test_encoding_layout() {
        let tx = Transaction::coinbase([3; 20], b"m", 5);
        let bytes = tx.encode(false);

        let expected: Vec<u8> = [
            vec![0x00],                    // blanked id
            vec![0x01],                    // one input
            vec![0x00],                    // empty prev id
            (-1i32).to_le_bytes().to_vec(),
            vec![0x01, b'm'],              // memo
            vec![0x00],                    // empty public key
            vec![0x01],                    // one output
            5u64.to_le_bytes().to_vec(),
            vec![3; 20],
        ]
        .concat();
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_total_output_value_overflow() {
        let tx = Transaction::new(
            vec![TxInput::coinbase(vec![])],
            vec![TxOutput::new(u64::MAX, [1; 20]), TxOutput::new(1, [2; 20])],
        );
        assert_eq!(tx.total_output_value(), None);
        assert_eq!(Transaction::coinbase([3; 20], b"m", 5).total_output_value(), Some(5));
    }

    #[test]
    fn test_output_order_changes_id() {
        let tx = spend();
        let mut swapped = tx.clone();
        swapped.outputs.reverse();
        assert_ne!(tx.hash(), swapped.hash());
    }

    #[test]
    fn test_transaction_serialization() {
        let tx = spend();
        let decoded = Transaction::deserialize(&tx.serialize()).unwrap();
        assert_eq!(tx, decoded);
    }

    #[test]
    fn test_trimmed_copy_blanks_inputs() {
        let trimmed = spend().trimmed_copy();
        assert!(trimmed.inputs.iter().all(|i| i.signature.is_empty() && i.public_key.is_empty()));
        assert_eq!(trimmed.outputs, spend().outputs);
    }
}
