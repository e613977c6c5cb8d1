//! Payment transactions, used to fund the application account and to attach payments to a group.

use crate::transactions::common::TransactionHeader;
use crate::utils::{is_zero, is_zero_addr, is_zero_addr_opt};
use crate::{Address, Transaction};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, skip_serializing_none};

/// Transfers microALGO between accounts.
#[serde_as]
#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Builder)]
#[builder(
    name = "PaymentTransactionBuilder",
    setter(strip_option),
    build_fn(name = "build_fields")
)]
pub struct PaymentTransactionFields {
    #[serde(flatten)]
    pub header: TransactionHeader,

    #[serde(rename = "rcv")]
    #[serde(skip_serializing_if = "is_zero_addr")]
    #[serde(default)]
    pub receiver: Address,

    /// Amount in microALGO.
    #[serde(rename = "amt")]
    #[serde(skip_serializing_if = "is_zero")]
    #[serde(default)]
    pub amount: u64,

    /// Closes the sender account, sending whatever remains to this address.
    #[serde(rename = "close")]
    #[serde(skip_serializing_if = "is_zero_addr_opt")]
    #[serde(default)]
    #[builder(default)]
    pub close_remainder_to: Option<Address>,
}

impl PaymentTransactionBuilder {
    pub fn build(&self) -> Result<Transaction, PaymentTransactionBuilderError> {
        self.build_fields().map(Transaction::Payment)
    }
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{AccountMother, TransactionMother};
    use crate::{AlgorandMsgpack, Transaction, TransactionId};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_payment_round_trips_through_msgpack() {
        let tx = TransactionMother::simple_payment().build().unwrap();

        let decoded = Transaction::decode(&tx.encode().unwrap()).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(decoded.id().unwrap(), tx.id().unwrap());
    }

    #[test]
    fn test_payment_receiver_survives_encoding() {
        let tx = TransactionMother::simple_payment()
            .receiver(AccountMother::neil().address())
            .amount(5_000_000)
            .build()
            .unwrap();

        let Transaction::Payment(fields) = Transaction::decode(&tx.encode().unwrap()).unwrap()
        else {
            panic!("Expected Payment transaction type");
        };
        assert_eq!(fields.receiver, AccountMother::neil().address());
        assert_eq!(fields.amount, 5_000_000);
        assert_eq!(fields.close_remainder_to, None);
    }
}
