//! Ledger-level building blocks for the application client: addresses, the application call and
//! payment transaction models, canonical msgpack encoding and transaction/group identifiers.
mod address;
pub mod constants;
mod error;
mod logicsig;
pub mod multisig;
mod traits;
mod transactions;
mod utils;

pub use address::Address;
pub use constants::*;
pub use error::AppkitTransactError;
pub use logicsig::LogicSignature;
pub use multisig::{MultisigSignature, MultisigSubsignature};
pub use traits::{AlgorandMsgpack, EstimateTransactionSize, TransactionId, Transactions};
pub use transactions::{
    ApplicationCallTransactionBuilder, ApplicationCallTransactionBuilderError,
    ApplicationCallTransactionFields, BoxReference, FeeParams, OnApplicationComplete,
    PaymentTransactionBuilder, PaymentTransactionBuilderError, PaymentTransactionFields,
    SignedTransaction, StateSchema, Transaction, TransactionHeader, TransactionHeaderBuilder,
};
pub use utils::hash;


#[cfg(feature = "test_utils")]
pub mod test_utils;
