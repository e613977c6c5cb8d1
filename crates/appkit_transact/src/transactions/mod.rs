//! The transaction models the application client needs: application calls and payments, the
//! shared header, signed transactions and group/fee helpers.

mod application_call;
mod common;
mod payment;

use application_call::{application_call_deserializer, application_call_serializer};
pub use application_call::{
    ApplicationCallTransactionBuilder, ApplicationCallTransactionBuilderError,
    ApplicationCallTransactionFields, BoxReference, OnApplicationComplete, StateSchema,
};
pub use common::{TransactionHeader, TransactionHeaderBuilder};
pub use payment::{
    PaymentTransactionBuilder, PaymentTransactionBuilderError, PaymentTransactionFields,
};

use crate::Address;
use crate::LogicSignature;
use crate::MultisigSignature;
use crate::constants::{
    ALGORAND_SIGNATURE_BYTE_LENGTH, ALGORAND_SIGNATURE_ENCODING_INCR, Byte32,
    TRANSACTION_DOMAIN_SEPARATOR,
};
use crate::error::AppkitTransactError;
use crate::traits::{AlgorandMsgpack, EstimateTransactionSize, TransactionId, Transactions};
use crate::utils::{compute_group_id, is_zero_addr_opt};
use serde::{Deserialize, Serialize};
use serde_with::{Bytes, serde_as};

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(tag = "type")]
pub enum Transaction {
    #[serde(rename = "pay")]
    Payment(PaymentTransactionFields),

    #[serde(serialize_with = "application_call_serializer")]
    #[serde(deserialize_with = "application_call_deserializer")]
    #[serde(rename = "appl")]
    ApplicationCall(ApplicationCallTransactionFields),
}

/// Inputs for [`Transaction::assign_fee`].
#[derive(Debug, Clone, Default)]
pub struct FeeParams {
    pub fee_per_byte: u64,
    pub min_fee: u64,
    /// Added on top of the computed fee, e.g. to cover inner transactions.
    pub extra_fee: Option<u64>,
    pub max_fee: Option<u64>,
}

impl Transaction {
    pub fn header(&self) -> &TransactionHeader {
        match self {
            Transaction::Payment(p) => &p.header,
            Transaction::ApplicationCall(a) => &a.header,
        }
    }

    pub fn header_mut(&mut self) -> &mut TransactionHeader {
        match self {
            Transaction::Payment(p) => &mut p.header,
            Transaction::ApplicationCall(a) => &mut a.header,
        }
    }

    pub fn sender(&self) -> &Address {
        &self.header().sender
    }

    pub fn as_application_call(&self) -> Option<&ApplicationCallTransactionFields> {
        match self {
            Transaction::ApplicationCall(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn assign_fee(&self, request: FeeParams) -> Result<Transaction, AppkitTransactError> {
        let mut tx = self.clone();
        let mut calculated_fee: u64 = 0;

        if request.fee_per_byte > 0 {
            let estimated_size = tx.estimate_size()?;
            calculated_fee = request.fee_per_byte * estimated_size as u64;
        }

        if calculated_fee < request.min_fee {
            calculated_fee = request.min_fee;
        }

        if let Some(extra_fee) = request.extra_fee {
            calculated_fee += extra_fee;
        }

        if let Some(max_fee) = request.max_fee {
            if calculated_fee > max_fee {
                return Err(AppkitTransactError::InputError {
                    message: format!(
                        "Transaction fee {} µALGO is greater than max fee {} µALGO",
                        calculated_fee, max_fee
                    ),
                });
            }
        }

        tx.header_mut().fee = Some(calculated_fee);
        Ok(tx)
    }
}

impl AlgorandMsgpack for Transaction {
    const PREFIX: &'static [u8] = TRANSACTION_DOMAIN_SEPARATOR;
}

impl TransactionId for Transaction {}

impl EstimateTransactionSize for Transaction {
    fn estimate_size(&self) -> Result<usize, AppkitTransactError> {
        Ok(self.encode_raw()?.len() + ALGORAND_SIGNATURE_ENCODING_INCR)
    }
}

/// A transaction plus exactly one form of authorization.
#[serde_as]
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct SignedTransaction {
    #[serde(rename = "txn")]
    pub transaction: Transaction,

    /// Ed25519 signature over the prefixed transaction bytes.
    #[serde(rename = "sig")]
    #[serde_as(as = "Option<Bytes>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub signature: Option<[u8; ALGORAND_SIGNATURE_BYTE_LENGTH]>,

    #[serde(rename = "msig")]
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub multisignature: Option<MultisigSignature>,

    #[serde(rename = "lsig")]
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub logic_signature: Option<LogicSignature>,

    /// Set when the authorizing address differs from the sender (rekeyed accounts).
    #[serde(rename = "sgnr")]
    #[serde(skip_serializing_if = "is_zero_addr_opt")]
    #[serde(default)]
    pub auth_address: Option<Address>,
}

/// Everything in a signed transaction except the transaction itself.
#[serde_as]
#[derive(Deserialize)]
struct Authorization {
    #[serde(rename = "sig")]
    #[serde_as(as = "Option<Bytes>")]
    #[serde(default)]
    signature: Option<[u8; ALGORAND_SIGNATURE_BYTE_LENGTH]>,
    #[serde(rename = "msig")]
    #[serde(default)]
    multisignature: Option<MultisigSignature>,
    #[serde(rename = "lsig")]
    #[serde(default)]
    logic_signature: Option<LogicSignature>,
    #[serde(rename = "sgnr")]
    #[serde(default)]
    auth_address: Option<Address>,
}

impl SignedTransaction {
    /// Wraps an unsigned transaction; authorization is attached by a signer.
    pub fn unsigned(transaction: Transaction) -> Self {
        Self {
            transaction,
            signature: None,
            multisignature: None,
            logic_signature: None,
            auth_address: None,
        }
    }

    /// The address whose authority the transaction is submitted under.
    pub fn authorizer(&self) -> &Address {
        self.auth_address
            .as_ref()
            .unwrap_or_else(|| self.transaction.sender())
    }
}

impl AlgorandMsgpack for SignedTransaction {
    // Every transaction field has a default, so the inner transaction is decoded on its own to
    // have its "type" tag checked.
    fn decode(bytes: &[u8]) -> Result<Self, AppkitTransactError> {
        let value: rmpv::Value = rmp_serde::from_slice(bytes)?;

        let rmpv::Value::Map(map) = value else {
            return Err(AppkitTransactError::InputError {
                message: "Expected signed transaction to be a map".to_string(),
            });
        };

        let txn_value = map
            .iter()
            .find(|(k, _)| k.as_str() == Some("txn"))
            .map(|(_, v)| v)
            .ok_or_else(|| AppkitTransactError::InputError {
                message: "Signed transaction is missing the txn field".to_string(),
            })?;

        let mut txn_buf = Vec::new();
        rmpv::encode::write_value(&mut txn_buf, txn_value)?;

        let authorization: Authorization = rmp_serde::from_slice(bytes)?;
        Ok(SignedTransaction {
            transaction: Transaction::decode(&txn_buf)?,
            signature: authorization.signature,
            multisignature: authorization.multisignature,
            logic_signature: authorization.logic_signature,
            auth_address: authorization.auth_address,
        })
    }
}

impl TransactionId for SignedTransaction {
    fn id_raw(&self) -> Result<Byte32, AppkitTransactError> {
        self.transaction.id_raw()
    }
}

impl EstimateTransactionSize for SignedTransaction {
    fn estimate_size(&self) -> Result<usize, AppkitTransactError> {
        Ok(self.encode()?.len())
    }
}

impl Transactions for &[Transaction] {
    fn assign_group(self) -> Result<Vec<Transaction>, AppkitTransactError> {
        let group_id = compute_group_id(self)?;
        Ok(self
            .iter()
            .map(|tx| {
                let mut tx = tx.clone();
                tx.header_mut().group = Some(group_id);
                tx
            })
            .collect())
    }
}
