use crate::abi_type::{ABIType, parse_tuple_content};
use crate::abi_value::ABIValue;
use crate::constants::{MAX_METHOD_ARG_SLOTS, METHOD_SELECTOR_LENGTH, RETURN_PREFIX};
use crate::error::ABIError;
use sha2::{Digest, Sha512_256};
use std::fmt::Display;
use std::str::FromStr;

const VOID_RETURN_TYPE: &str = "void";

/// A transaction type accepted as a method argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ABITransactionType {
    /// Any transaction type
    Txn,
    Payment,
    KeyRegistration,
    AssetConfig,
    AssetTransfer,
    AssetFreeze,
    ApplicationCall,
}

impl FromStr for ABITransactionType {
    type Err = ABIError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "txn" => Ok(ABITransactionType::Txn),
            "pay" => Ok(ABITransactionType::Payment),
            "keyreg" => Ok(ABITransactionType::KeyRegistration),
            "acfg" => Ok(ABITransactionType::AssetConfig),
            "axfer" => Ok(ABITransactionType::AssetTransfer),
            "afrz" => Ok(ABITransactionType::AssetFreeze),
            "appl" => Ok(ABITransactionType::ApplicationCall),
            _ => Err(ABIError::ValidationError {
                message: format!("Invalid transaction type: {}", s),
            }),
        }
    }
}

impl Display for ABITransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ABITransactionType::Txn => "txn",
            ABITransactionType::Payment => "pay",
            ABITransactionType::KeyRegistration => "keyreg",
            ABITransactionType::AssetConfig => "acfg",
            ABITransactionType::AssetTransfer => "axfer",
            ABITransactionType::AssetFreeze => "afrz",
            ABITransactionType::ApplicationCall => "appl",
        };
        write!(f, "{}", s)
    }
}

/// A foreign resource argument, passed as a uint8 index into one of the reference arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ABIReferenceType {
    Account,
    Application,
    Asset,
}

impl FromStr for ABIReferenceType {
    type Err = ABIError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "account" => Ok(ABIReferenceType::Account),
            "application" => Ok(ABIReferenceType::Application),
            "asset" => Ok(ABIReferenceType::Asset),
            _ => Err(ABIError::ValidationError {
                message: format!("Invalid reference type: {}", s),
            }),
        }
    }
}

impl Display for ABIReferenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ABIReferenceType::Account => "account",
            ABIReferenceType::Application => "application",
            ABIReferenceType::Asset => "asset",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ABIMethodArgType {
    /// Encoded directly into the application args.
    Value(ABIType),
    /// Placed immediately before the application call in the group.
    Transaction(ABITransactionType),
    /// Encoded as an index into a reference array.
    Reference(ABIReferenceType),
}

impl ABIMethodArgType {
    pub fn is_transaction(&self) -> bool {
        matches!(self, ABIMethodArgType::Transaction(_))
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, ABIMethodArgType::Reference(_))
    }

    pub fn is_value_type(&self) -> bool {
        matches!(self, ABIMethodArgType::Value(_))
    }
}

impl Display for ABIMethodArgType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ABIMethodArgType::Value(abi_type) => write!(f, "{}", abi_type),
            ABIMethodArgType::Transaction(tx_type) => write!(f, "{}", tx_type),
            ABIMethodArgType::Reference(ref_type) => write!(f, "{}", ref_type),
        }
    }
}

impl FromStr for ABIMethodArgType {
    type Err = ABIError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(tx_type) = ABITransactionType::from_str(s) {
            return Ok(ABIMethodArgType::Transaction(tx_type));
        }

        if let Ok(ref_type) = ABIReferenceType::from_str(s) {
            return Ok(ABIMethodArgType::Reference(ref_type));
        }

        Ok(ABIMethodArgType::Value(ABIType::from_str(s)?))
    }
}

/// A parsed ARC-4 method.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ABIMethod {
    pub name: String,
    pub args: Vec<ABIMethodArg>,
    /// `None` for `void`.
    pub returns: Option<ABIType>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ABIMethodArg {
    pub arg_type: ABIMethodArgType,
    pub name: Option<String>,
    pub description: Option<String>,
}

impl ABIMethodArg {
    pub fn new(
        arg_type: ABIMethodArgType,
        name: Option<String>,
        description: Option<String>,
    ) -> Self {
        Self {
            arg_type,
            name,
            description,
        }
    }
}

impl ABIMethod {
    pub fn new(
        name: String,
        args: Vec<ABIMethodArg>,
        returns: Option<ABIType>,
        description: Option<String>,
    ) -> Self {
        Self {
            name,
            args,
            returns,
            description,
        }
    }

    pub fn transaction_arg_count(&self) -> usize {
        self.args
            .iter()
            .filter(|arg| arg.arg_type.is_transaction())
            .count()
    }

    pub fn reference_arg_count(&self) -> usize {
        self.args
            .iter()
            .filter(|arg| arg.arg_type.is_reference())
            .count()
    }

    pub fn value_arg_count(&self) -> usize {
        self.args
            .iter()
            .filter(|arg| arg.arg_type.is_value_type())
            .count()
    }

    /// First 4 bytes of the SHA-512/256 digest of the signature.
    pub fn selector(&self) -> Result<Vec<u8>, ABIError> {
        let signature = self.signature()?;
        let hash = Sha512_256::digest(signature.as_bytes());
        Ok(hash[..METHOD_SELECTOR_LENGTH].to_vec())
    }

    /// The canonical `name(arg1,arg2,...)return` form.
    pub fn signature(&self) -> Result<String, ABIError> {
        if self.name.is_empty() {
            return Err(ABIError::ValidationError {
                message: "Method name cannot be empty".to_string(),
            });
        }

        let arg_types: Vec<String> = self.args.iter().map(|arg| arg.arg_type.to_string()).collect();
        let return_type = self
            .returns
            .as_ref()
            .map(|r| r.to_string())
            .unwrap_or_else(|| VOID_RETURN_TYPE.to_string());

        let signature = format!("{}({}){}", self.name, arg_types.join(","), return_type);
        if signature.chars().any(|c| c.is_whitespace()) {
            return Err(ABIError::ValidationError {
                message: "Generated signature contains whitespace".to_string(),
            });
        }

        Ok(signature)
    }

    /// Extracts the return value from the logs of the call that invoked this method.
    ///
    /// The value is carried by the last log entry, after the 4 byte return prefix.
    pub fn parse_return(&self, logs: &[Vec<u8>]) -> Result<ABIReturn, ABIError> {
        let Some(return_type) = &self.returns else {
            return Ok(ABIReturn {
                method: self.clone(),
                raw_return_value: Vec::new(),
                return_value: None,
            });
        };

        let last_log = logs.last().ok_or_else(|| ABIError::DecodingError {
            message: format!("App call transaction did not log a return value for {}", self.name),
        })?;
        let raw_return_value =
            last_log
                .strip_prefix(&RETURN_PREFIX)
                .ok_or_else(|| ABIError::DecodingError {
                    message: format!(
                        "App call transaction did not log a valid return value for {}",
                        self.name
                    ),
                })?;

        Ok(ABIReturn {
            method: self.clone(),
            raw_return_value: raw_return_value.to_vec(),
            return_value: Some(return_type.decode(raw_return_value)?),
        })
    }
}

impl FromStr for ABIMethod {
    type Err = ABIError;

    fn from_str(signature: &str) -> Result<Self, Self::Err> {
        if signature.chars().any(|c| c.is_whitespace()) {
            return Err(ABIError::ValidationError {
                message: "Method signature cannot contain whitespace".to_string(),
            });
        }

        let open_paren_pos = signature.find('(').ok_or_else(|| ABIError::ValidationError {
            message: "Method signature must contain opening parenthesis".to_string(),
        })?;
        if open_paren_pos == 0 {
            return Err(ABIError::ValidationError {
                message: "Method name cannot be empty".to_string(),
            });
        }
        let method_name = signature[..open_paren_pos].to_string();

        let close_paren_pos = find_matching_closing_paren(signature, open_paren_pos)?;
        let args = parse_tuple_content(&signature[open_paren_pos + 1..close_paren_pos])?
            .iter()
            .enumerate()
            .map(|(i, arg_type)| {
                Ok(ABIMethodArg::new(
                    ABIMethodArgType::from_str(arg_type)?,
                    Some(format!("arg{}", i)),
                    None,
                ))
            })
            .collect::<Result<Vec<_>, ABIError>>()?;

        let return_type = &signature[close_paren_pos + 1..];
        let returns = match return_type {
            "" | VOID_RETURN_TYPE => None,
            _ => Some(ABIType::from_str(return_type)?),
        };

        Ok(ABIMethod::new(method_name, args, returns, None))
    }
}

/// The outcome of a method call: the raw bytes after the return prefix and their decoded value.
#[derive(Debug, Clone, PartialEq)]
pub struct ABIReturn {
    pub method: ABIMethod,
    pub raw_return_value: Vec<u8>,
    /// `None` for void methods.
    pub return_value: Option<ABIValue>,
}

/// Encodes method arguments into application args (selector excluded).
///
/// Only 15 slots remain after the selector, so when there are more arguments than that the
/// 15th slot holds every remaining argument encoded as one tuple.
pub fn encode_method_args(
    types: &[ABIType],
    values: &[ABIValue],
) -> Result<Vec<Vec<u8>>, ABIError> {
    if types.len() != values.len() {
        return Err(ABIError::EncodingError {
            message: format!(
                "Expected {} method argument values, got {}",
                types.len(),
                values.len()
            ),
        });
    }

    if types.len() <= MAX_METHOD_ARG_SLOTS {
        return types
            .iter()
            .zip(values)
            .map(|(abi_type, value)| abi_type.encode(value))
            .collect();
    }

    let split = MAX_METHOD_ARG_SLOTS - 1;
    let mut encoded = types[..split]
        .iter()
        .zip(&values[..split])
        .map(|(abi_type, value)| abi_type.encode(value))
        .collect::<Result<Vec<_>, _>>()?;
    let tuple_type = ABIType::Tuple(types[split..].to_vec());
    encoded.push(tuple_type.encode(&ABIValue::Array(values[split..].to_vec()))?);
    Ok(encoded)
}

fn find_matching_closing_paren(s: &str, open_pos: usize) -> Result<usize, ABIError> {
    let mut depth = 0;

    for (i, ch) in s.char_indices().skip_while(|(i, _)| *i < open_pos) {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
    }

    Err(ABIError::ValidationError {
        message: "Mismatched parentheses in method signature".to_string(),
    })
}
