//! An in-memory ledger and object mothers for exercising clients without a node.

pub mod fixture;
pub mod ledger;

pub use fixture::{ApplicationClientMother, ApplicationDescriptionMother, SignerMother};
pub use ledger::{
    ApprovalEffects, ApprovalHandler, ApprovalRequest, FIRST_APP_ID, GENESIS_HASH, GENESIS_ID,
    MIN_FEE, MockLedger,
};
