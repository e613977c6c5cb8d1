//! The node seam: everything the client needs from a ledger node, behind one async trait so the
//! REST transport and the in-memory ledger used by tests are interchangeable.

use appkit_transact::{Address, Byte32, SignedTransaction, StateSchema};
use async_trait::async_trait;
use serde::Serialize;
use snafu::Snafu;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

#[derive(Debug, Snafu)]
pub enum TransportError {
    /// The node does not know the requested object (yet). Retryable while waiting for confirmation.
    #[snafu(display("Not found: {message}"))]
    NotFound { message: String },

    /// The node refused the submission; `message` is the node's reason verbatim.
    #[snafu(display("{message}"))]
    Rejected { message: String },

    #[snafu(display("Request failed: {message}"))]
    Request { message: String },

    #[snafu(display("Failed to decode node response: {message}"))]
    Decode { message: String },
}

/// Network-supplied parameters for building transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestedParams {
    /// Fee per byte in microALGO; 0 under normal network load.
    pub fee: u64,
    pub min_fee: u64,
    pub last_round: u64,
    pub genesis_id: String,
    pub genesis_hash: Byte32,
    pub consensus_version: String,
}

/// What the node reports about a submitted transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PendingTransactionInfo {
    pub confirmed_round: Option<u64>,
    /// Non-empty once the transaction has been evicted from the pool.
    pub pool_error: String,
    /// Id of the application created by this transaction.
    pub application_index: Option<u64>,
    pub logs: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeStatus {
    pub last_round: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TealValue {
    Uint(u64),
    Bytes(Vec<u8>),
}

impl TealValue {
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            TealValue::Uint(value) => Some(*value),
            TealValue::Bytes(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            TealValue::Bytes(value) => Some(value),
            TealValue::Uint(_) => None,
        }
    }
}

impl Display for TealValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TealValue::Uint(value) => write!(f, "{}", value),
            TealValue::Bytes(value) => match std::str::from_utf8(value) {
                Ok(text) => write!(f, "{}", text),
                Err(_) => write!(f, "0x{}", hex::encode(value)),
            },
        }
    }
}

/// Key/value state of an application, either global or one account's local state.
pub type AppState = BTreeMap<Vec<u8>, TealValue>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationInfo {
    pub app_id: u64,
    pub creator: Address,
    pub approval_program: Vec<u8>,
    pub clear_state_program: Vec<u8>,
    pub global_state_schema: StateSchema,
    pub local_state_schema: StateSchema,
    pub extra_program_pages: u64,
    pub global_state: AppState,
}

/// Balance and standing of an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub address: Address,
    /// Balance in microALGO.
    pub amount: u64,
    /// Set when the account has been rekeyed.
    pub auth_address: Option<Address>,
    pub total_apps_opted_in: u64,
    pub total_created_apps: u64,
    /// Round the information was read at.
    pub round: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulateResponse {
    pub last_round: u64,
    /// Set when the group would have been rejected.
    pub failure_message: Option<String>,
    pub txn_results: Vec<PendingTransactionInfo>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn suggested_params(&self) -> Result<SuggestedParams, TransportError>;

    /// Submits a signed group and returns the id of its first transaction.
    async fn submit(&self, signed: &[SignedTransaction]) -> Result<String, TransportError>;

    async fn pending_transaction_info(
        &self,
        tx_id: &str,
    ) -> Result<PendingTransactionInfo, TransportError>;

    async fn status(&self) -> Result<NodeStatus, TransportError>;

    /// Resolves once the node has seen `round`.
    async fn wait_for_block(&self, round: u64) -> Result<NodeStatus, TransportError>;

    fn application_address(&self, app_id: u64) -> Address {
        Address::from_app_id(app_id)
    }

    async fn application_info(&self, app_id: u64) -> Result<ApplicationInfo, TransportError>;

    /// Accounts the node has never seen are reported with a zero balance.
    async fn account_info(&self, address: &Address) -> Result<AccountInfo, TransportError>;

    /// Local state of `address` for `app_id`; `NotFound` when the account has not opted in.
    async fn account_application_info(
        &self,
        address: &Address,
        app_id: u64,
    ) -> Result<AppState, TransportError>;

    /// Evaluates a group against the current ledger without committing it.
    async fn simulate(
        &self,
        signed: &[SignedTransaction],
    ) -> Result<SimulateResponse, TransportError>;
}

pub fn genesis_id_is_localnet(genesis_id: &str) -> bool {
    genesis_id == "devnet-v1" || genesis_id == "sandnet-v1" || genesis_id == "dockernet-v1"
}
