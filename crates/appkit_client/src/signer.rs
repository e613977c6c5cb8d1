//! Signing capabilities.
//!
//! [`Signer`] is the closed set of signer kinds a client can be configured with. Every variant
//! knows its address and can sign any subset of a group through [`TransactionSigner`]. When a
//! transaction's sender differs from the signer's address (a rekeyed account) the signed
//! transaction records the signer's address as the authorizer.

use appkit_transact::{
    Address, AlgorandMsgpack, AppkitTransactError, LogicSignature, MultisigSignature,
    SignedTransaction, Transaction,
};
use async_trait::async_trait;
use derive_more::Debug;
use ed25519_dalek::{Signer as _, SigningKey};
use rand::rngs::OsRng;
use std::sync::Arc;

#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Signs the transactions at `indices`, returning them in the same order.
    async fn sign_transactions(
        &self,
        txns: &[Transaction],
        indices: &[usize],
    ) -> Result<Vec<SignedTransaction>, String>;

    async fn sign_transaction(&self, txn: &Transaction) -> Result<SignedTransaction, String> {
        let mut result = self.sign_transactions(&[txn.clone()], &[0]).await?;
        result
            .pop()
            .ok_or_else(|| "Signer returned no transactions".to_string())
    }
}

fn select<'a>(txns: &'a [Transaction], indices: &[usize]) -> Result<Vec<&'a Transaction>, String> {
    indices
        .iter()
        .map(|&idx| {
            txns.get(idx)
                .ok_or_else(|| format!("Index {} out of bounds for transactions", idx))
        })
        .collect()
}

fn auth_address(txn: &Transaction, signer_address: &Address) -> Option<Address> {
    (txn.sender() != signer_address).then(|| signer_address.clone())
}

/// A single ed25519 key.
#[derive(Debug, Clone)]
pub struct AccountSigner {
    #[debug(skip)]
    signing_key: SigningKey,
    address: Address,
}

impl AccountSigner {
    pub fn from_secret_key(secret_key: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&secret_key);
        let address = Address::from_pubkey(&signing_key.verifying_key().to_bytes());
        Self {
            signing_key,
            address,
        }
    }

    pub fn generate() -> Self {
        Self::from_secret_key(SigningKey::generate(&mut OsRng).to_bytes())
    }

    pub fn address(&self) -> Address {
        self.address.clone()
    }

    fn raw_sign(&self, bytes: &[u8]) -> [u8; 64] {
        self.signing_key.sign(bytes).to_bytes()
    }
}

#[async_trait]
impl TransactionSigner for AccountSigner {
    async fn sign_transactions(
        &self,
        txns: &[Transaction],
        indices: &[usize],
    ) -> Result<Vec<SignedTransaction>, String> {
        select(txns, indices)?
            .into_iter()
            .map(|txn| {
                let bytes = txn.encode().map_err(|e| e.to_string())?;
                Ok(SignedTransaction {
                    signature: Some(self.raw_sign(&bytes)),
                    auth_address: auth_address(txn, &self.address),
                    ..SignedTransaction::unsigned(txn.clone())
                })
            })
            .collect()
    }
}

/// A multisig account plus the participant keys held locally.
#[derive(Debug, Clone)]
pub struct MultisigSigner {
    account: MultisigSignature,
    #[debug(skip)]
    keys: Vec<AccountSigner>,
}

impl MultisigSigner {
    pub fn new(
        version: u8,
        threshold: u8,
        participants: Vec<Address>,
        keys: Vec<AccountSigner>,
    ) -> Result<Self, AppkitTransactError> {
        let account = MultisigSignature::new(version, threshold, participants)?;
        if let Some(stranger) = keys
            .iter()
            .find(|key| !account.participants().contains(&key.address))
        {
            return Err(AppkitTransactError::InputError {
                message: format!("{} is not a participant of the multisig account", stranger.address),
            });
        }
        Ok(Self { account, keys })
    }

    pub fn address(&self) -> Address {
        self.account.address()
    }

    pub fn account(&self) -> &MultisigSignature {
        &self.account
    }

    fn sign_one(&self, txn: &Transaction) -> Result<SignedTransaction, String> {
        let bytes = txn.encode().map_err(|e| e.to_string())?;
        let mut multisignature = self.account.clone();
        for subsig in multisignature.subsignatures.iter_mut() {
            if let Some(key) = self.keys.iter().find(|key| key.address == subsig.address) {
                subsig.signature = Some(key.raw_sign(&bytes));
            }
        }

        if multisignature.signature_count() < self.account.threshold as usize {
            return Err(format!(
                "Multisig {} requires {} signatures but only {} keys are held",
                self.address(),
                self.account.threshold,
                multisignature.signature_count()
            ));
        }

        Ok(SignedTransaction {
            multisignature: Some(multisignature),
            auth_address: auth_address(txn, &self.address()),
            ..SignedTransaction::unsigned(txn.clone())
        })
    }
}

#[async_trait]
impl TransactionSigner for MultisigSigner {
    async fn sign_transactions(
        &self,
        txns: &[Transaction],
        indices: &[usize],
    ) -> Result<Vec<SignedTransaction>, String> {
        select(txns, indices)?
            .into_iter()
            .map(|txn| self.sign_one(txn))
            .collect()
    }
}

/// A compiled program acting as its own account.
#[derive(Debug, Clone)]
pub struct LogicSigSigner {
    logic_signature: LogicSignature,
}

impl LogicSigSigner {
    pub fn new(program: Vec<u8>, args: Option<Vec<Vec<u8>>>) -> Self {
        Self {
            logic_signature: LogicSignature::new(program, args),
        }
    }

    pub fn address(&self) -> Address {
        self.logic_signature.address()
    }

    pub fn program(&self) -> &[u8] {
        &self.logic_signature.logic
    }
}

#[async_trait]
impl TransactionSigner for LogicSigSigner {
    async fn sign_transactions(
        &self,
        txns: &[Transaction],
        indices: &[usize],
    ) -> Result<Vec<SignedTransaction>, String> {
        let address = self.address();
        Ok(select(txns, indices)?
            .into_iter()
            .map(|txn| SignedTransaction {
                logic_signature: Some(self.logic_signature.clone()),
                auth_address: auth_address(txn, &address),
                ..SignedTransaction::unsigned(txn.clone())
            })
            .collect())
    }
}

/// The signer a client is configured with.
///
/// Variants share their inner signer, so clones of a client sign through the same instance and
/// a group built from them is signed with one call per signer.
#[derive(Debug, Clone)]
pub enum Signer {
    Account(Arc<AccountSigner>),
    Multisig(Arc<MultisigSigner>),
    LogicSig(Arc<LogicSigSigner>),
}

impl Signer {
    pub fn address(&self) -> Address {
        match self {
            Signer::Account(signer) => signer.address(),
            Signer::Multisig(signer) => signer.address(),
            Signer::LogicSig(signer) => signer.address(),
        }
    }

    pub fn as_transaction_signer(&self) -> Arc<dyn TransactionSigner> {
        match self {
            Signer::Account(signer) => signer.clone(),
            Signer::Multisig(signer) => signer.clone(),
            Signer::LogicSig(signer) => signer.clone(),
        }
    }
}

impl From<AccountSigner> for Signer {
    fn from(signer: AccountSigner) -> Self {
        Signer::Account(Arc::new(signer))
    }
}

impl From<MultisigSigner> for Signer {
    fn from(signer: MultisigSigner) -> Self {
        Signer::Multisig(Arc::new(signer))
    }
}

impl From<LogicSigSigner> for Signer {
    fn from(signer: LogicSigSigner) -> Self {
        Signer::LogicSig(Arc::new(signer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use appkit_transact::test_utils::TransactionMother;
    use ed25519_dalek::{Signature, Verifier};
    use pretty_assertions::assert_eq;

    fn key(seed: u8) -> AccountSigner {
        AccountSigner::from_secret_key([seed; 32])
    }

    fn payment_from(sender: Address) -> Transaction {
        let mut txn = TransactionMother::simple_payment().build().unwrap();
        txn.header_mut().sender = sender;
        txn
    }

    #[tokio::test]
    async fn test_account_signature_verifies() {
        let signer = key(1);
        let txn = payment_from(signer.address());

        let signed = signer.sign_transaction(&txn).await.unwrap();

        let verifying_key = signer.signing_key.verifying_key();
        let signature = Signature::from_bytes(&signed.signature.unwrap());
        assert!(verifying_key.verify(&txn.encode().unwrap(), &signature).is_ok());
        assert_eq!(signed.auth_address, None);
    }

    #[tokio::test]
    async fn test_rekeyed_sender_records_authorizer() {
        let signer = key(1);
        let txn = payment_from(key(2).address());

        let signed = signer.sign_transaction(&txn).await.unwrap();
        assert_eq!(signed.auth_address, Some(signer.address()));
        assert_eq!(signed.authorizer(), &signer.address());
    }

    #[tokio::test]
    async fn test_out_of_bounds_index_is_an_error() {
        let signer = key(1);
        let txn = payment_from(signer.address());
        let err = signer.sign_transactions(&[txn], &[3]).await.unwrap_err();
        assert_eq!(err, "Index 3 out of bounds for transactions");
    }

    #[test]
    fn test_multisig_address_is_deterministic() {
        let participants = vec![key(1).address(), key(2).address(), key(3).address()];
        let first = MultisigSigner::new(1, 2, participants.clone(), vec![key(1)]).unwrap();
        let second = MultisigSigner::new(1, 2, participants, vec![key(2), key(3)]).unwrap();

        // Held keys do not take part in the address.
        assert_eq!(first.address(), second.address());
    }

    #[test]
    fn test_multisig_rejects_foreign_keys() {
        let participants = vec![key(1).address(), key(2).address()];
        let err = MultisigSigner::new(1, 1, participants, vec![key(9)]).unwrap_err();
        assert!(err.to_string().contains("is not a participant"));
    }

    #[tokio::test]
    async fn test_multisig_signs_with_held_keys() {
        let participants = vec![key(1).address(), key(2).address(), key(3).address()];
        let signer = MultisigSigner::new(1, 2, participants, vec![key(1), key(3)]).unwrap();
        let txn = payment_from(signer.address());

        let signed = signer.sign_transaction(&txn).await.unwrap();
        let msig = signed.multisignature.unwrap();
        assert_eq!(msig.signature_count(), 2);
        assert!(msig.subsignatures[1].signature.is_none());
        assert_eq!(signed.auth_address, None);
    }

    #[tokio::test]
    async fn test_multisig_below_threshold_fails() {
        let participants = vec![key(1).address(), key(2).address()];
        let signer = MultisigSigner::new(1, 2, participants, vec![key(1)]).unwrap();
        let txn = payment_from(signer.address());

        let err = signer.sign_transaction(&txn).await.unwrap_err();
        assert!(err.contains("requires 2 signatures but only 1 keys are held"));
    }

    #[tokio::test]
    async fn test_logic_sig_attaches_program() {
        let program = vec![8, 0x81, 0x01, 0x43];
        let signer = LogicSigSigner::new(program.clone(), None);
        let txn = payment_from(signer.address());

        let signed = signer.sign_transaction(&txn).await.unwrap();
        assert_eq!(signed.logic_signature.unwrap().logic, program);
        assert_eq!(signer.address(), LogicSigSigner::new(program, None).address());
    }

    #[test]
    fn test_signer_address_matches_variant() {
        let account = key(4);
        let signer: Signer = account.clone().into();
        assert_eq!(signer.address(), account.address());

        let lsig = LogicSigSigner::new(vec![8, 0x81, 0x00], None);
        let signer: Signer = lsig.clone().into();
        assert_eq!(signer.address(), lsig.address());
    }

    #[test]
    fn test_cloned_signer_shares_transaction_signer() {
        let signer: Signer = key(5).into();
        let clone = signer.clone();
        assert!(Arc::ptr_eq(
            &signer.as_transaction_signer(),
            &clone.as_transaction_signer()
        ));
    }
}
