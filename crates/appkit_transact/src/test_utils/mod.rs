//! Object mothers for transactions and accounts, shared with dependent crates through the
//! `test_utils` feature.

mod application_call;

use crate::{
    Address, PaymentTransactionBuilder, SignedTransaction, Transaction, TransactionHeaderBuilder,
};
use base64::{Engine, prelude::BASE64_STANDARD};
use ed25519_dalek::{Signer, SigningKey};

pub use application_call::ApplicationCallTransactionMother;

/// A deterministic ed25519 key pair.
#[derive(Clone)]
pub struct TestKeyPair {
    signing_key: SigningKey,
}

impl TestKeyPair {
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    pub fn address(&self) -> Address {
        Address::from_pubkey(&self.signing_key.verifying_key().to_bytes())
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn sign(&self, transaction: &Transaction) -> SignedTransaction {
        let bytes = crate::AlgorandMsgpack::encode(transaction).unwrap();
        SignedTransaction {
            signature: Some(self.signing_key.sign(&bytes).to_bytes()),
            ..SignedTransaction::unsigned(transaction.clone())
        }
    }
}

pub struct AccountMother {}
impl AccountMother {
    pub fn account() -> TestKeyPair {
        TestKeyPair::from_seed([1u8; 32])
    }

    pub fn neil() -> TestKeyPair {
        TestKeyPair::from_seed([2u8; 32])
    }

    pub fn example() -> TestKeyPair {
        TestKeyPair::from_seed([3u8; 32])
    }
}

pub struct TransactionHeaderMother {}
impl TransactionHeaderMother {
    pub fn testnet() -> TransactionHeaderBuilder {
        TransactionHeaderBuilder::default()
            .genesis_id(String::from("testnet-v1.0"))
            .genesis_hash(
                BASE64_STANDARD
                    .decode("SGO1GKSzyE7IEPItTxCByw9x8FmnrCDexi9/cOUJOiI=")
                    .unwrap()
                    .try_into()
                    .unwrap(),
            )
            .fee(1000)
            .to_owned()
    }

    pub fn simple_testnet() -> TransactionHeaderBuilder {
        Self::testnet()
            .sender(AccountMother::account().address())
            .first_valid(50659540)
            .last_valid(50660540)
            .to_owned()
    }

    pub fn example() -> TransactionHeaderBuilder {
        TransactionHeaderBuilder::default()
            .genesis_id(String::from("example"))
            .genesis_hash(
                BASE64_STANDARD
                    .decode("3r2+nRwL99aTROTiOtPEeUQarv2fATkmNliHqfGxNJA=")
                    .unwrap()
                    .try_into()
                    .unwrap(),
            )
            .first_valid(1)
            .last_valid(999)
            .fee(1000)
            .sender(AccountMother::example().address())
            .to_owned()
    }
}

pub struct TransactionMother {}
impl TransactionMother {
    pub fn simple_payment() -> PaymentTransactionBuilder {
        PaymentTransactionBuilder::default()
            .header(TransactionHeaderMother::simple_testnet().build().unwrap())
            .amount(101000)
            .receiver(AccountMother::neil().address())
            .to_owned()
    }

    pub fn payment_with_note() -> PaymentTransactionBuilder {
        Self::simple_payment()
            .header(
                TransactionHeaderMother::simple_testnet()
                    .note(b"funding".to_vec())
                    .build()
                    .unwrap(),
            )
            .to_owned()
    }
}
