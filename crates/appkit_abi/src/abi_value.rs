use num_bigint::BigUint;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// A value that can be encoded as, or was decoded from, an [`crate::ABIType`].
///
/// Tuples, static arrays and dynamic arrays all use [`ABIValue::Array`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ABIValue {
    Bool(bool),
    Uint(BigUint),
    String(String),
    Byte(u8),
    Array(Vec<ABIValue>),
    /// A 58 character address string.
    Address(String),
}

impl ABIValue {
    pub fn from_byte(value: u8) -> Self {
        ABIValue::Byte(value)
    }

    pub fn from_address<S: Into<String>>(value: S) -> Self {
        ABIValue::Address(value.into())
    }

    /// Builds a `byte[]` value.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        ABIValue::Array(bytes.iter().copied().map(ABIValue::Byte).collect())
    }

    pub fn as_uint(&self) -> Option<&BigUint> {
        match self {
            ABIValue::Uint(n) => Some(n),
            _ => None,
        }
    }

    /// The value as a `u64`, if it is an unsigned integer that fits.
    pub fn as_u64(&self) -> Option<u64> {
        self.as_uint().and_then(|n| u64::try_from(n).ok())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ABIValue::String(s) | ABIValue::Address(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ABIValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[ABIValue]> {
        match self {
            ABIValue::Array(values) => Some(values),
            _ => None,
        }
    }
}

impl Display for ABIValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ABIValue::Bool(b) => write!(f, "{}", b),
            ABIValue::Uint(n) => write!(f, "{}", n),
            ABIValue::String(s) => write!(f, "{:?}", s),
            ABIValue::Byte(b) => write!(f, "{}", b),
            ABIValue::Address(a) => write!(f, "{}", a),
            ABIValue::Array(values) => {
                let rendered: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
        }
    }
}

impl From<bool> for ABIValue {
    fn from(value: bool) -> Self {
        ABIValue::Bool(value)
    }
}

impl From<BigUint> for ABIValue {
    fn from(value: BigUint) -> Self {
        ABIValue::Uint(value)
    }
}

macro_rules! impl_from_uint {
    ($($t:ty),*) => {
        $(
            impl From<$t> for ABIValue {
                fn from(value: $t) -> Self {
                    ABIValue::Uint(BigUint::from(value))
                }
            }
        )*
    };
}

impl_from_uint!(u8, u16, u32, u64, u128, usize);

impl From<String> for ABIValue {
    fn from(value: String) -> Self {
        ABIValue::String(value)
    }
}

impl From<&str> for ABIValue {
    fn from(value: &str) -> Self {
        ABIValue::String(value.to_string())
    }
}

impl From<Vec<ABIValue>> for ABIValue {
    fn from(value: Vec<ABIValue>) -> Self {
        ABIValue::Array(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ABIValue::from(42u8), ABIValue::Uint(BigUint::from(42u8)))]
    #[case(ABIValue::from(1000u16), ABIValue::Uint(BigUint::from(1000u16)))]
    #[case(
        ABIValue::from(10000000000u64),
        ABIValue::Uint(BigUint::from(10000000000u64))
    )]
    #[case(ABIValue::from(12345usize), ABIValue::Uint(BigUint::from(12345usize)))]
    fn test_from_uint_types(#[case] abi_value_1: ABIValue, #[case] abi_value_2: ABIValue) {
        assert_eq!(abi_value_1, abi_value_2);
    }

    #[test]
    fn test_as_u64() {
        assert_eq!(ABIValue::from(7u64).as_u64(), Some(7));
        assert_eq!(ABIValue::from(u128::MAX).as_u64(), None);
        assert_eq!(ABIValue::from("7").as_u64(), None);
    }

    #[test]
    fn test_from_bytes() {
        assert_eq!(
            ABIValue::from_bytes(b"ab"),
            ABIValue::Array(vec![ABIValue::Byte(97), ABIValue::Byte(98)])
        );
    }

    #[test]
    fn test_display() {
        let value = ABIValue::Array(vec![ABIValue::from(1u8), ABIValue::from("x"), true.into()]);
        assert_eq!(value.to_string(), "[1, \"x\", true]");
    }
}
