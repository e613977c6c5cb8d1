pub mod algod;

pub use algod::{AlgodConfig, AlgodTransport};
