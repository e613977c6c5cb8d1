use crate::constants::{
    ALGORAND_CHECKSUM_BYTE_LENGTH, Byte32, HASH_BYTES_LENGTH, MAX_TX_GROUP_SIZE,
    TRANSACTION_GROUP_DOMAIN_SEPARATOR,
};
use crate::{Address, AlgorandMsgpack, AppkitTransactError, StateSchema, Transaction, TransactionId};
use serde::{Deserialize, Serialize};
use serde_with::{Bytes, serde_as};
use sha2::{Digest, Sha512_256};
use std::collections::BTreeMap;

/// SHA-512/256 digest used for ids, checksums and derived addresses.
pub fn hash(bytes: &[u8]) -> Byte32 {
    let mut hasher = Sha512_256::new();
    hasher.update(bytes);

    let mut hash_bytes = [0u8; HASH_BYTES_LENGTH];
    hash_bytes.copy_from_slice(&hasher.finalize()[..HASH_BYTES_LENGTH]);
    hash_bytes
}

pub fn pub_key_to_checksum(pub_key: &Byte32) -> [u8; ALGORAND_CHECKSUM_BYTE_LENGTH] {
    let digest = hash(pub_key);
    let mut checksum = [0u8; ALGORAND_CHECKSUM_BYTE_LENGTH];
    checksum.copy_from_slice(&digest[HASH_BYTES_LENGTH - ALGORAND_CHECKSUM_BYTE_LENGTH..]);
    checksum
}

/// Recursively sorts map keys so the encoding is canonical.
pub fn sort_msgpack_value(value: rmpv::Value) -> rmpv::Value {
    match value {
        rmpv::Value::Map(entries) => {
            let mut sorted: BTreeMap<String, rmpv::Value> = BTreeMap::new();
            for (key, inner) in entries {
                if let rmpv::Value::String(key) = key {
                    sorted.insert(key.into_str().unwrap_or_default(), sort_msgpack_value(inner));
                }
            }
            rmpv::Value::Map(
                sorted
                    .into_iter()
                    .map(|(key, inner)| (rmpv::Value::String(key.into()), inner))
                    .collect(),
            )
        }
        rmpv::Value::Array(items) => {
            rmpv::Value::Array(items.into_iter().map(sort_msgpack_value).collect())
        }
        other => other,
    }
}

pub fn is_zero<T>(n: &T) -> bool
where
    T: PartialEq + From<u8>,
{
    *n == T::from(0u8)
}

pub fn is_zero_opt<T>(n: &Option<T>) -> bool
where
    T: PartialEq + From<u8>,
{
    n.as_ref().is_none_or(is_zero)
}

pub fn is_zero_addr(addr: &Address) -> bool {
    addr.is_zero()
}

pub fn is_zero_addr_opt(addr: &Option<Address>) -> bool {
    addr.as_ref().is_none_or(Address::is_zero)
}

pub fn is_empty_bytes32_opt(bytes: &Option<Byte32>) -> bool {
    bytes.as_ref().is_none_or(|b| b == &[0u8; 32])
}

pub fn is_empty_string_opt(string: &Option<String>) -> bool {
    string.as_ref().is_none_or(String::is_empty)
}

pub fn is_empty_vec_opt<T>(vec: &Option<Vec<T>>) -> bool {
    vec.as_ref().is_none_or(Vec::is_empty)
}

pub fn is_empty_schema_opt(schema: &Option<StateSchema>) -> bool {
    schema.as_ref().is_none_or(StateSchema::is_empty)
}

/// Computes the group id over the ids of the supplied (not yet grouped) transactions.
pub fn compute_group_id(txs: &[Transaction]) -> Result<Byte32, AppkitTransactError> {
    if txs.is_empty() {
        return Err(AppkitTransactError::InputError {
            message: "Transaction group size cannot be 0".to_string(),
        });
    }

    if txs.len() > MAX_TX_GROUP_SIZE {
        return Err(AppkitTransactError::InputError {
            message: format!(
                "Transaction group size exceeds the max limit of {}",
                MAX_TX_GROUP_SIZE
            ),
        });
    }

    let tx_hashes = txs
        .iter()
        .map(|tx| {
            if tx.header().group.is_some() {
                return Err(AppkitTransactError::InputError {
                    message: "Transactions must not already be grouped".to_string(),
                });
            }
            tx.id_raw()
        })
        .collect::<Result<Vec<Byte32>, AppkitTransactError>>()?;

    let encoded = GroupedTransactions { tx_hashes }.encode()?;
    Ok(hash(&encoded))
}

#[serde_as]
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
struct GroupedTransactions {
    #[serde(rename = "txlist")]
    #[serde_as(as = "Vec<Bytes>")]
    tx_hashes: Vec<Byte32>,
}

impl AlgorandMsgpack for GroupedTransactions {
    const PREFIX: &'static [u8] = TRANSACTION_GROUP_DOMAIN_SEPARATOR;
}
