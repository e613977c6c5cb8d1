//! Encoding and decoding of ARC-4 ABI types, plus method signatures, selectors and return values.
pub mod abi_type;
pub mod abi_value;
pub mod constants;
pub mod error;
pub mod method;
mod types;
pub mod utils;

pub use abi_type::{ABIType, BitSize};
pub use abi_value::ABIValue;
pub use error::ABIError;
pub use method::{
    ABIMethod, ABIMethodArg, ABIMethodArgType, ABIReferenceType, ABIReturn, ABITransactionType,
    encode_method_args,
};
