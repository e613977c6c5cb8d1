//! Multisignature accounts.
//!
//! A multisig account is described by a version, a threshold and an ordered list of participant
//! addresses. Its [`Address`] is the SHA-512/256 digest of the domain separator, version,
//! threshold and the concatenated participant keys. The digest is one-way, so the participants
//! cannot be recovered from the address; the same description always yields the same address and
//! reordering participants yields a different one.

use crate::address::Address;
use crate::constants::{
    ALGORAND_PUBLIC_KEY_BYTE_LENGTH, ALGORAND_SIGNATURE_BYTE_LENGTH, MULTISIG_DOMAIN_SEPARATOR,
};
use crate::error::AppkitTransactError;
use crate::utils::hash;
use serde::{Deserialize, Serialize};
use serde_with::{Bytes, serde_as};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// The only multisig version the network accepts.
pub const MULTISIG_VERSION: u8 = 1;

/// A multisig account together with whatever sub-signatures have been collected so far.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct MultisigSignature {
    #[serde(rename = "v")]
    pub version: u8,
    /// Minimum number of sub-signatures required.
    #[serde(rename = "thr")]
    pub threshold: u8,
    #[serde(rename = "subsig")]
    pub subsignatures: Vec<MultisigSubsignature>,
}

impl MultisigSignature {
    /// Describes a multisig account with no signatures attached.
    pub fn new(
        version: u8,
        threshold: u8,
        participants: Vec<Address>,
    ) -> Result<Self, AppkitTransactError> {
        if version != MULTISIG_VERSION {
            return Err(AppkitTransactError::InputError {
                message: format!("Unsupported multisig version {}", version),
            });
        }
        if participants.is_empty() {
            return Err(AppkitTransactError::InputError {
                message: "Multisig account requires at least one participant".to_string(),
            });
        }
        if threshold == 0 || threshold as usize > participants.len() {
            return Err(AppkitTransactError::InputError {
                message: format!(
                    "Multisig threshold {} must be between 1 and the participant count {}",
                    threshold,
                    participants.len()
                ),
            });
        }

        Ok(Self {
            version,
            threshold,
            subsignatures: participants
                .into_iter()
                .map(|address| MultisigSubsignature {
                    address,
                    signature: None,
                })
                .collect(),
        })
    }

    pub fn participants(&self) -> Vec<Address> {
        self.subsignatures
            .iter()
            .map(|subsig| subsig.address.clone())
            .collect()
    }

    pub fn address(&self) -> Address {
        let mut buffer = Vec::with_capacity(
            MULTISIG_DOMAIN_SEPARATOR.len()
                + 2
                + self.subsignatures.len() * ALGORAND_PUBLIC_KEY_BYTE_LENGTH,
        );
        buffer.extend_from_slice(MULTISIG_DOMAIN_SEPARATOR);
        buffer.push(self.version);
        buffer.push(self.threshold);
        for subsig in &self.subsignatures {
            buffer.extend_from_slice(subsig.address.as_bytes());
        }
        Address(hash(&buffer))
    }

    /// Number of sub-signatures present.
    pub fn signature_count(&self) -> usize {
        self.subsignatures
            .iter()
            .filter(|subsig| subsig.signature.is_some())
            .count()
    }
}

#[serde_as]
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct MultisigSubsignature {
    #[serde(rename = "pk")]
    pub address: Address,
    #[serde(rename = "s")]
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    #[serde_as(as = "Option<Bytes>")]
    pub signature: Option<[u8; ALGORAND_SIGNATURE_BYTE_LENGTH]>,
}

impl From<&MultisigSignature> for Address {
    fn from(msig: &MultisigSignature) -> Address {
        msig.address()
    }
}

impl Display for MultisigSignature {
    /// Formats the multisig account as its address.
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.address())
    }
}
