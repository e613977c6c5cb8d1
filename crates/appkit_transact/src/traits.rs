use crate::constants::Byte32;
use crate::error::AppkitTransactError;
use crate::utils::{hash, sort_msgpack_value};
use crate::Transaction;
use serde::{Deserialize, Serialize};

/// Canonical msgpack encoding: struct fields as maps, keys sorted, empty values omitted by the
/// serde attributes of each model, and an optional domain-separation prefix.
pub trait AlgorandMsgpack: Serialize + for<'de> Deserialize<'de> {
    const PREFIX: &'static [u8] = b"";

    /// Encodes without the prefix.
    fn encode_raw(&self) -> Result<Vec<u8>, AppkitTransactError> {
        let mut named = Vec::new();
        let mut serializer = rmp_serde::Serializer::new(&mut named).with_struct_map();
        self.serialize(&mut serializer)?;

        let value: rmpv::Value = rmp_serde::from_slice(&named)?;
        let mut canonical = Vec::new();
        rmpv::encode::write_value(&mut canonical, &sort_msgpack_value(value))?;
        Ok(canonical)
    }

    /// Encodes with the prefix, which is what gets hashed and signed.
    fn encode(&self) -> Result<Vec<u8>, AppkitTransactError> {
        let raw = self.encode_raw()?;
        let mut bytes = Vec::with_capacity(Self::PREFIX.len() + raw.len());
        bytes.extend_from_slice(Self::PREFIX);
        bytes.extend_from_slice(&raw);
        Ok(bytes)
    }

    /// Decodes bytes produced by [`AlgorandMsgpack::encode`] or [`AlgorandMsgpack::encode_raw`].
    fn decode(bytes: &[u8]) -> Result<Self, AppkitTransactError> {
        if bytes.is_empty() {
            return Err(AppkitTransactError::InputError {
                message: "Attempted to decode 0 bytes".to_string(),
            });
        }

        let body = if !Self::PREFIX.is_empty() && bytes.starts_with(Self::PREFIX) {
            &bytes[Self::PREFIX.len()..]
        } else {
            bytes
        };
        Ok(rmp_serde::from_slice(body)?)
    }
}

pub trait TransactionId: AlgorandMsgpack {
    /// The raw 32 byte id: SHA-512/256 of the prefixed encoding.
    fn id_raw(&self) -> Result<Byte32, AppkitTransactError> {
        Ok(hash(&self.encode()?))
    }

    /// The base32 (no padding) rendering used by nodes and explorers.
    fn id(&self) -> Result<String, AppkitTransactError> {
        Ok(base32::encode(
            base32::Alphabet::Rfc4648 { padding: false },
            &self.id_raw()?,
        ))
    }
}

pub trait EstimateTransactionSize {
    fn estimate_size(&self) -> Result<usize, AppkitTransactError>;
}

pub trait Transactions {
    /// Assigns the shared group id to every transaction in the slice.
    fn assign_group(self) -> Result<Vec<Transaction>, AppkitTransactError>;
}
