//! Ledger addresses: 32 bytes (a public key or a hash digest) rendered as a 58-character base32
//! string that carries a trailing 4-byte checksum.

use crate::constants::{
    ALGORAND_ADDRESS_LENGTH, ALGORAND_CHECKSUM_BYTE_LENGTH, ALGORAND_PUBLIC_KEY_BYTE_LENGTH,
    APP_ID_DOMAIN_SEPARATOR, Byte32,
};
use crate::error::AppkitTransactError;
use crate::utils::{hash, pub_key_to_checksum};
use serde::{Deserialize, Serialize};
use serde_with::{Bytes, serde_as};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

const BASE32_ALPHABET: base32::Alphabet = base32::Alphabet::Rfc4648 { padding: false };

/// The decoded bytes of an address, without the checksum.
///
/// Single-key accounts use the ed25519 public key directly. Application, multisig and
/// logic-sig accounts use a SHA-512/256 digest over a domain-separated preimage, so the
/// same type covers every signer variant.
#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Address(#[serde_as(as = "Bytes")] pub Byte32);

impl Address {
    pub fn from_pubkey(pub_key: &Byte32) -> Self {
        Address(*pub_key)
    }

    pub fn as_bytes(&self) -> &Byte32 {
        &self.0
    }

    /// Derives the escrow address of an application from its id.
    ///
    /// This is a pure function of the id, so it can be computed before the application exists.
    pub fn from_app_id(app_id: u64) -> Self {
        let mut to_hash = APP_ID_DOMAIN_SEPARATOR.to_vec();
        to_hash.extend_from_slice(&app_id.to_be_bytes());
        Address(hash(&to_hash))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ALGORAND_PUBLIC_KEY_BYTE_LENGTH]
    }

    /// Returns the base32 representation including the checksum.
    pub fn as_str(&self) -> String {
        let mut buffer = [0u8; ALGORAND_PUBLIC_KEY_BYTE_LENGTH + ALGORAND_CHECKSUM_BYTE_LENGTH];
        buffer[..ALGORAND_PUBLIC_KEY_BYTE_LENGTH].copy_from_slice(&self.0);
        buffer[ALGORAND_PUBLIC_KEY_BYTE_LENGTH..].copy_from_slice(&self.checksum());
        base32::encode(BASE32_ALPHABET, &buffer)
    }

    pub fn checksum(&self) -> [u8; ALGORAND_CHECKSUM_BYTE_LENGTH] {
        pub_key_to_checksum(&self.0)
    }
}

impl FromStr for Address {
    type Err = AppkitTransactError;

    /// Parses a 58-character base32 address, validating its checksum.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != ALGORAND_ADDRESS_LENGTH {
            return Err(AppkitTransactError::InvalidAddress {
                message: format!(
                    "Address must be exactly {} characters, got {}",
                    ALGORAND_ADDRESS_LENGTH,
                    s.len()
                ),
            });
        }

        let decoded = base32::decode(BASE32_ALPHABET, s).ok_or_else(|| {
            AppkitTransactError::InvalidAddress {
                message: format!("Invalid base32 encoding for address {}", s),
            }
        })?;

        let (key_bytes, checksum) = decoded.split_at(ALGORAND_PUBLIC_KEY_BYTE_LENGTH);
        let pub_key: Byte32 =
            key_bytes
                .try_into()
                .map_err(|_| AppkitTransactError::InvalidAddress {
                    message: "Could not decode address into 32 bytes".to_string(),
                })?;

        if pub_key_to_checksum(&pub_key) != checksum {
            return Err(AppkitTransactError::InvalidAddress {
                message: format!("Checksum is invalid for address {}", s),
            });
        }

        Ok(Address(pub_key))
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}
