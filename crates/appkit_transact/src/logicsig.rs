//! Delegated logic signatures.
//!
//! A logic signature authorizes transactions with a compiled program instead of (or in addition
//! to) a key. Without a delegating signature the program acts as its own account, whose address is
//! the SHA-512/256 digest of `"Program"` followed by the bytecode.

use crate::address::Address;
use crate::constants::{ALGORAND_SIGNATURE_BYTE_LENGTH, LOGIC_SIG_DOMAIN_SEPARATOR};
use crate::multisig::MultisigSignature;
use crate::utils::{hash, is_empty_vec_opt};
use serde::{Deserialize, Serialize};
use serde_with::{Bytes, serde_as, skip_serializing_none};

#[serde_as]
#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct LogicSignature {
    /// Compiled program bytes.
    #[serde(rename = "l")]
    #[serde_as(as = "Bytes")]
    pub logic: Vec<u8>,

    /// Arguments made available to the program.
    #[serde(rename = "arg")]
    #[serde_as(as = "Option<Vec<Bytes>>")]
    #[serde(skip_serializing_if = "is_empty_vec_opt")]
    #[serde(default)]
    pub args: Option<Vec<Vec<u8>>>,

    /// Delegating single-key signature over the program.
    #[serde(rename = "sig")]
    #[serde_as(as = "Option<Bytes>")]
    #[serde(default)]
    pub signature: Option<[u8; ALGORAND_SIGNATURE_BYTE_LENGTH]>,

    /// Delegating multisig signature over the program.
    #[serde(rename = "msig")]
    #[serde(default)]
    pub multisignature: Option<MultisigSignature>,
}

impl LogicSignature {
    pub fn new(logic: Vec<u8>, args: Option<Vec<Vec<u8>>>) -> Self {
        Self {
            logic,
            args,
            signature: None,
            multisignature: None,
        }
    }

    /// Address of the contract account controlled by this program.
    pub fn address(&self) -> Address {
        let mut to_hash = LOGIC_SIG_DOMAIN_SEPARATOR.to_vec();
        to_hash.extend_from_slice(&self.logic);
        Address(hash(&to_hash))
    }

    pub fn is_delegated(&self) -> bool {
        self.signature.is_some() || self.multisignature.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{Engine, prelude::BASE64_STANDARD};

    // version 6; int 1; return
    const ALWAYS_APPROVE: &str = "BoEBQw==";

    #[test]
    fn test_address_is_deterministic() {
        let program = BASE64_STANDARD.decode(ALWAYS_APPROVE).unwrap();
        let first = LogicSignature::new(program.clone(), None);
        let second = LogicSignature::new(program, Some(vec![b"ignored".to_vec()]));

        assert_eq!(first.address(), second.address());
        assert!(!first.is_delegated());
    }

    #[test]
    fn test_address_differs_per_program() {
        let program = BASE64_STANDARD.decode(ALWAYS_APPROVE).unwrap();
        let mut other = program.clone();
        other[0] = 8;

        assert_ne!(
            LogicSignature::new(program, None).address(),
            LogicSignature::new(other, None).address()
        );
    }
}
