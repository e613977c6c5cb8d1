#![allow(dead_code)]
#![allow(unused_imports)]
pub mod logging;

use appkit_client::testing::{ApplicationClientMother, ApplicationDescriptionMother, MockLedger};
use appkit_abi::ABIValue;
use appkit_client::{ApplicationClient, CallOverrides, MethodArg, SuggestedParams, Transport};
use appkit_transact::{Address, PaymentTransactionFields, Transaction, TransactionHeader};
use rstest::fixture;
use std::sync::Arc;

pub use logging::init_test_logging;

pub type TestResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

pub type DeployedAppResult = Result<DeployedApp, Box<dyn std::error::Error + Send + Sync>>;

pub struct DeployedApp {
    pub ledger: Arc<MockLedger>,
    pub client: ApplicationClient,
}

#[fixture]
pub fn ledger() -> Arc<MockLedger> {
    init_test_logging();
    ApplicationClientMother::counter_ledger()
}

/// A counter application created by the creator account.
#[fixture]
pub async fn deployed_counter(
    ledger: Arc<MockLedger>,
) -> DeployedAppResult {
    let mut client = ApplicationClientMother::counter(&ledger);
    client.create(None, CallOverrides::default()).await?;
    Ok(DeployedApp { ledger, client })
}

/// A payment from `sender` built against the ledger's current parameters.
pub async fn payment(
    ledger: &MockLedger,
    sender: Address,
    receiver: Address,
    amount: u64,
) -> Result<Transaction, Box<dyn std::error::Error + Send + Sync>> {
    let params: SuggestedParams = ledger.suggested_params().await?;
    Ok(Transaction::Payment(PaymentTransactionFields {
        header: TransactionHeader {
            sender,
            fee: Some(params.min_fee),
            first_valid: params.last_round,
            last_valid: params.last_round + 1000,
            genesis_hash: Some(params.genesis_hash),
            genesis_id: Some(params.genesis_id),
            note: None,
            rekey_to: None,
            lease: None,
            group: None,
        },
        receiver,
        amount,
        close_remainder_to: None,
    }))
}

pub fn uint(value: u64) -> MethodArg {
    MethodArg::Value(ABIValue::from(value))
}

pub fn string(value: &str) -> MethodArg {
    MethodArg::Value(ABIValue::from(value))
}
