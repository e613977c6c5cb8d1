//! Error types raised while building, encoding and decoding ledger transactions.

use snafu::Snafu;

/// Errors that can occur while working with addresses, transactions and their encodings.
#[derive(Debug, Snafu)]
pub enum AppkitTransactError {
    #[snafu(display("Error ocurred during encoding: {source}"))]
    EncodingError { source: rmp_serde::encode::Error },

    #[snafu(display("Error ocurred during decoding: {source}"))]
    DecodingError { source: rmp_serde::decode::Error },

    #[snafu(display("Error ocurred during msgpack encoding: {source}"))]
    MsgpackEncodingError { source: rmpv::encode::Error },

    #[snafu(display("{message}"))]
    InputError { message: String },

    #[snafu(display("{message}"))]
    InvalidAddress { message: String },
}

impl From<rmp_serde::encode::Error> for AppkitTransactError {
    fn from(source: rmp_serde::encode::Error) -> Self {
        AppkitTransactError::EncodingError { source }
    }
}

impl From<rmp_serde::decode::Error> for AppkitTransactError {
    fn from(source: rmp_serde::decode::Error) -> Self {
        AppkitTransactError::DecodingError { source }
    }
}

impl From<rmpv::encode::Error> for AppkitTransactError {
    fn from(source: rmpv::encode::Error) -> Self {
        AppkitTransactError::MsgpackEncodingError { source }
    }
}
