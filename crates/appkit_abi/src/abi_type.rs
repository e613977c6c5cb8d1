use crate::{
    ABIError, ABIValue,
    constants::{ALGORAND_PUBLIC_KEY_BYTE_LENGTH, BITS_PER_BYTE, MAX_BIT_SIZE, STATIC_ARRAY_REGEX},
    types::collections::find_bool_sequence_end,
};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

/// A uint bit size: 8 to 512 and a multiple of 8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitSize(u16);

impl BitSize {
    pub fn new(bits: u16) -> Result<Self, ABIError> {
        if bits < BITS_PER_BYTE as u16 || bits > MAX_BIT_SIZE || bits % BITS_PER_BYTE as u16 != 0 {
            return Err(ABIError::ValidationError {
                message: format!(
                    "Bit size must be between {} and {} and divisible by {}, got {}",
                    BITS_PER_BYTE, MAX_BIT_SIZE, BITS_PER_BYTE, bits
                ),
            });
        }
        Ok(BitSize(bits))
    }

    pub fn value(&self) -> u16 {
        self.0
    }
}

/// An ARC-4 type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ABIType {
    Uint(BitSize),
    Address,
    Tuple(Vec<ABIType>),
    String,
    Byte,
    Bool,
    StaticArray(Box<ABIType>, usize),
    DynamicArray(Box<ABIType>),
}

impl AsRef<ABIType> for ABIType {
    fn as_ref(&self) -> &ABIType {
        self
    }
}

impl ABIType {
    /// Shorthand for `uint64`, the type of every reference index and most integers.
    pub fn uint64() -> Self {
        ABIType::Uint(BitSize(64))
    }

    pub fn uint8() -> Self {
        ABIType::Uint(BitSize(8))
    }

    pub fn encode(&self, value: &ABIValue) -> Result<Vec<u8>, ABIError> {
        match self {
            ABIType::Uint(_) => self.encode_uint(value),
            ABIType::Address => self.encode_address(value),
            ABIType::Tuple(_) => self.encode_tuple(value),
            ABIType::StaticArray(_, _) => self.encode_static_array(value),
            ABIType::DynamicArray(_) => self.encode_dynamic_array(value),
            ABIType::String => self.encode_string(value),
            ABIType::Byte => self.encode_byte(value),
            ABIType::Bool => self.encode_bool(value),
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<ABIValue, ABIError> {
        match self {
            ABIType::Uint(_) => self.decode_uint(bytes),
            ABIType::Address => self.decode_address(bytes),
            ABIType::String => self.decode_string(bytes),
            ABIType::Bool => self.decode_bool(bytes),
            ABIType::Byte => self.decode_byte(bytes),
            ABIType::Tuple(_) => self.decode_tuple(bytes),
            ABIType::StaticArray(_, _) => self.decode_static_array(bytes),
            ABIType::DynamicArray(_) => self.decode_dynamic_array(bytes),
        }
    }

    pub fn is_dynamic(&self) -> bool {
        match self {
            ABIType::StaticArray(child_type, _) => child_type.is_dynamic(),
            ABIType::Tuple(child_types) => child_types.iter().any(|t| t.is_dynamic()),
            ABIType::DynamicArray(_) | ABIType::String => true,
            _ => false,
        }
    }

    /// Encoded size of a static type.
    pub(crate) fn get_size(abi_type: &ABIType) -> Result<usize, ABIError> {
        match abi_type {
            ABIType::Uint(bit_size) => Ok((bit_size.value() / BITS_PER_BYTE as u16) as usize),
            ABIType::Address => Ok(ALGORAND_PUBLIC_KEY_BYTE_LENGTH),
            ABIType::Bool | ABIType::Byte => Ok(1),
            ABIType::StaticArray(child_type, size) => match child_type.as_ref() {
                ABIType::Bool => Ok((*size).div_ceil(BITS_PER_BYTE as usize)),
                _ => Ok(Self::get_size(child_type)? * *size),
            },
            ABIType::Tuple(child_types) => {
                let mut size = 0;
                let mut i = 0;
                while i < child_types.len() {
                    match &child_types[i] {
                        ABIType::Bool => {
                            let sequence_end_index = find_bool_sequence_end(child_types, i);
                            size += (sequence_end_index - i + 1).div_ceil(BITS_PER_BYTE as usize);
                            i = sequence_end_index + 1;
                        }
                        child_type => {
                            size += Self::get_size(child_type)?;
                            i += 1;
                        }
                    }
                }
                Ok(size)
            }
            ABIType::String | ABIType::DynamicArray(_) => Err(ABIError::DecodingError {
                message: format!("Failed to get size, {} is a dynamic type", abi_type),
            }),
        }
    }
}

impl Display for ABIType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ABIType::Uint(bit_size) => write!(f, "uint{}", bit_size.value()),
            ABIType::Address => write!(f, "address"),
            ABIType::Tuple(child_types) => {
                let type_strings: Vec<String> = child_types.iter().map(|t| t.to_string()).collect();
                write!(f, "({})", type_strings.join(","))
            }
            ABIType::String => write!(f, "string"),
            ABIType::Byte => write!(f, "byte"),
            ABIType::Bool => write!(f, "bool"),
            ABIType::StaticArray(child_type, length) => write!(f, "{}[{}]", child_type, length),
            ABIType::DynamicArray(child_type) => write!(f, "{}[]", child_type),
        }
    }
}

impl FromStr for ABIType {
    type Err = ABIError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(element_type_str) = s.strip_suffix("[]") {
            let element_type = ABIType::from_str(element_type_str)?;
            return Ok(ABIType::DynamicArray(Box::new(element_type)));
        }

        if s.ends_with(']') {
            let captures = STATIC_ARRAY_REGEX
                .captures(s)
                .ok_or_else(|| ABIError::ValidationError {
                    message: format!("Malformed static array string: {}", s),
                })?;
            let length = captures[2]
                .parse::<usize>()
                .map_err(|_| ABIError::ValidationError {
                    message: format!("Invalid array length: {}", &captures[2]),
                })?;
            let element_type = ABIType::from_str(&captures[1])?;
            return Ok(ABIType::StaticArray(Box::new(element_type), length));
        }

        if let Some(size_str) = s.strip_prefix("uint") {
            if size_str.is_empty() || !size_str.chars().all(|c| c.is_ascii_digit()) {
                return Err(ABIError::ValidationError {
                    message: format!("Malformed uint string: {}", size_str),
                });
            }
            let size = size_str
                .parse::<u16>()
                .map_err(|_| ABIError::ValidationError {
                    message: format!("Invalid uint size: {}", size_str),
                })?;
            return Ok(ABIType::Uint(BitSize::new(size)?));
        }

        if s.len() >= 2 && s.starts_with('(') && s.ends_with(')') {
            let child_types = parse_tuple_content(&s[1..s.len() - 1])?
                .iter()
                .map(|str| ABIType::from_str(str))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(ABIType::Tuple(child_types));
        }

        match s {
            "byte" => Ok(ABIType::Byte),
            "bool" => Ok(ABIType::Bool),
            "address" => Ok(ABIType::Address),
            "string" => Ok(ABIType::String),
            _ => Err(ABIError::ValidationError {
                message: format!("Cannot convert string '{}' to an ABI type", s),
            }),
        }
    }
}

/// Splits the inside of a tuple type string on its top level commas.
pub(crate) fn parse_tuple_content(content: &str) -> Result<Vec<String>, ABIError> {
    if content.is_empty() {
        return Ok(Vec::new());
    }

    if content.starts_with(',') || content.ends_with(',') {
        return Err(ABIError::ValidationError {
            message: "Tuple string should not start or end with a comma".to_string(),
        });
    }
    if content.contains(",,") {
        return Err(ABIError::ValidationError {
            message: "Tuple string should not have consecutive commas".to_string(),
        });
    }

    let mut tuple_strings: Vec<String> = Vec::new();
    let mut depth: i32 = 0;
    let mut word = String::new();

    for ch in content.chars() {
        match ch {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                tuple_strings.push(std::mem::take(&mut word));
                continue;
            }
            _ => {}
        }
        word.push(ch);
    }
    if !word.is_empty() {
        tuple_strings.push(word);
    }
    if depth != 0 {
        return Err(ABIError::ValidationError {
            message: "Tuple string has mismatched parentheses".to_string(),
        });
    }

    Ok(tuple_strings)
}
