use crate::{
    ABIError, ABIType, ABIValue,
    constants::{
        ALGORAND_ADDRESS_LENGTH, ALGORAND_CHECKSUM_BYTE_LENGTH, ALGORAND_PUBLIC_KEY_BYTE_LENGTH,
        BOOL_FALSE_BYTE, BOOL_TRUE_BYTE, HASH_BYTES_LENGTH, LENGTH_ENCODE_BYTE_SIZE,
    },
    utils,
};
use num_bigint::BigUint;
use sha2::{Digest, Sha512_256};

const BASE32_ALPHABET: base32::Alphabet = base32::Alphabet::Rfc4648 { padding: false };

fn encoding_error<T>(message: &str) -> Result<T, ABIError> {
    Err(ABIError::EncodingError {
        message: message.to_string(),
    })
}

fn decoding_error<T>(message: &str) -> Result<T, ABIError> {
    Err(ABIError::DecodingError {
        message: message.to_string(),
    })
}

impl ABIType {
    pub(crate) fn encode_uint(&self, value: &ABIValue) -> Result<Vec<u8>, ABIError> {
        let ABIType::Uint(bit_size) = self else {
            return encoding_error("ABI type mismatch, expected uint");
        };
        let ABIValue::Uint(value) = value else {
            return encoding_error("ABI value mismatch, expected uint");
        };

        let bit_size = bit_size.value();
        if value.bits() > bit_size as u64 {
            return Err(ABIError::EncodingError {
                message: format!("{} is too big to fit in uint{}", value, bit_size),
            });
        }

        Ok(utils::big_uint_to_bytes(value, (bit_size / 8) as usize))
    }

    pub(crate) fn decode_uint(&self, bytes: &[u8]) -> Result<ABIValue, ABIError> {
        let ABIType::Uint(bit_size) = self else {
            return decoding_error("ABI type mismatch, expected uint");
        };

        let expected_len = (bit_size.value() / 8) as usize;
        if bytes.len() != expected_len {
            return Err(ABIError::DecodingError {
                message: format!(
                    "Invalid byte array length, expected {} bytes, got {}",
                    expected_len,
                    bytes.len()
                ),
            });
        }

        Ok(ABIValue::Uint(BigUint::from_bytes_be(bytes)))
    }

    pub(crate) fn encode_bool(&self, value: &ABIValue) -> Result<Vec<u8>, ABIError> {
        match (self, value) {
            (ABIType::Bool, ABIValue::Bool(true)) => Ok(vec![BOOL_TRUE_BYTE]),
            (ABIType::Bool, ABIValue::Bool(false)) => Ok(vec![BOOL_FALSE_BYTE]),
            (ABIType::Bool, _) => encoding_error("ABI value mismatch, expected boolean"),
            _ => encoding_error("ABI type mismatch, expected bool"),
        }
    }

    pub(crate) fn decode_bool(&self, bytes: &[u8]) -> Result<ABIValue, ABIError> {
        if !matches!(self, ABIType::Bool) {
            return decoding_error("ABI type mismatch, expected bool");
        }
        match bytes {
            [BOOL_TRUE_BYTE] => Ok(ABIValue::Bool(true)),
            [BOOL_FALSE_BYTE] => Ok(ABIValue::Bool(false)),
            [_] => decoding_error("Boolean could not be decoded from the byte string"),
            _ => decoding_error("Bool string must be 1 byte long"),
        }
    }

    pub(crate) fn encode_byte(&self, value: &ABIValue) -> Result<Vec<u8>, ABIError> {
        match (self, value) {
            (ABIType::Byte, ABIValue::Byte(n)) => Ok(vec![*n]),
            (ABIType::Byte, _) => encoding_error("ABI value mismatch, expected byte"),
            _ => encoding_error("ABI type mismatch, expected byte"),
        }
    }

    pub(crate) fn decode_byte(&self, bytes: &[u8]) -> Result<ABIValue, ABIError> {
        if !matches!(self, ABIType::Byte) {
            return decoding_error("ABI type mismatch, expected byte");
        }
        match bytes {
            [byte] => Ok(ABIValue::Byte(*byte)),
            _ => decoding_error("Byte array must be 1 byte long"),
        }
    }

    pub(crate) fn encode_string(&self, value: &ABIValue) -> Result<Vec<u8>, ABIError> {
        if !matches!(self, ABIType::String) {
            return encoding_error("ABI type mismatch, expected string");
        }
        let ABIValue::String(value) = value else {
            return encoding_error("ABI value mismatch, expected string");
        };

        let utf8_bytes = value.as_bytes();
        let length = u16::try_from(utf8_bytes.len()).map_err(|_| ABIError::EncodingError {
            message: format!("String of {} bytes is too long to encode", utf8_bytes.len()),
        })?;
        let mut result = Vec::with_capacity(LENGTH_ENCODE_BYTE_SIZE + utf8_bytes.len());
        result.extend_from_slice(&length.to_be_bytes());
        result.extend_from_slice(utf8_bytes);
        Ok(result)
    }

    pub(crate) fn decode_string(&self, bytes: &[u8]) -> Result<ABIValue, ABIError> {
        if !matches!(self, ABIType::String) {
            return decoding_error("ABI type mismatch, expected string");
        }
        if bytes.len() < LENGTH_ENCODE_BYTE_SIZE {
            return decoding_error("Byte array is too short for string");
        }

        let length = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
        let content_bytes = &bytes[LENGTH_ENCODE_BYTE_SIZE..];
        if content_bytes.len() != length {
            return Err(ABIError::DecodingError {
                message: format!(
                    "Invalid byte array length for string, expected {} value, got {}",
                    length,
                    content_bytes.len()
                ),
            });
        }

        String::from_utf8(content_bytes.to_vec())
            .map(ABIValue::String)
            .map_err(|_| ABIError::DecodingError {
                message: "Invalid UTF-8 encoding".to_string(),
            })
    }

    pub(crate) fn encode_address(&self, value: &ABIValue) -> Result<Vec<u8>, ABIError> {
        if !matches!(self, ABIType::Address) {
            return encoding_error("ABI type mismatch, expected address");
        }
        let ABIValue::Address(address_str) = value else {
            return encoding_error("ABI value mismatch, expected address string");
        };

        if address_str.len() != ALGORAND_ADDRESS_LENGTH {
            return Err(ABIError::ValidationError {
                message: format!(
                    "Algorand address must be exactly {} characters",
                    ALGORAND_ADDRESS_LENGTH
                ),
            });
        }
        let decoded = base32::decode(BASE32_ALPHABET, address_str).ok_or_else(|| {
            ABIError::ValidationError {
                message: "Invalid base32 encoding for Algorand address".to_string(),
            }
        })?;
        let (public_key, checksum) = decoded.split_at(ALGORAND_PUBLIC_KEY_BYTE_LENGTH);
        if checksum != get_checksum(public_key) {
            return Err(ABIError::ValidationError {
                message: format!("Checksum is invalid for address {}", address_str),
            });
        }

        Ok(public_key.to_vec())
    }

    pub(crate) fn decode_address(&self, bytes: &[u8]) -> Result<ABIValue, ABIError> {
        if !matches!(self, ABIType::Address) {
            return decoding_error("ABI type mismatch, expected address");
        }
        if bytes.len() != ALGORAND_PUBLIC_KEY_BYTE_LENGTH {
            return Err(ABIError::DecodingError {
                message: format!(
                    "Address byte string must be {} bytes long",
                    ALGORAND_PUBLIC_KEY_BYTE_LENGTH
                ),
            });
        }

        let mut buffer = Vec::with_capacity(
            ALGORAND_PUBLIC_KEY_BYTE_LENGTH + ALGORAND_CHECKSUM_BYTE_LENGTH,
        );
        buffer.extend_from_slice(bytes);
        buffer.extend_from_slice(&get_checksum(bytes));

        Ok(ABIValue::Address(base32::encode(BASE32_ALPHABET, &buffer)))
    }
}

fn get_checksum(pub_key: &[u8]) -> [u8; ALGORAND_CHECKSUM_BYTE_LENGTH] {
    let digest = Sha512_256::digest(pub_key);
    let mut checksum = [0u8; ALGORAND_CHECKSUM_BYTE_LENGTH];
    checksum.copy_from_slice(&digest[(HASH_BYTES_LENGTH - ALGORAND_CHECKSUM_BYTE_LENGTH)..]);
    checksum
}

#[cfg(test)]
mod tests {
    use crate::{ABIType, ABIValue, BitSize};
    use num_bigint::BigUint;

    #[test]
    fn test_uint_decode_wrong_length() {
        let result = ABIType::uint8().decode(&[0u8, 0]);
        assert_eq!(
            result.unwrap_err().to_string(),
            "ABI decoding failed: Invalid byte array length, expected 1 bytes, got 2"
        );
    }

    #[test]
    fn test_uint_max_size() {
        let abi_type = ABIType::Uint(BitSize::new(512).unwrap());
        let value = ABIValue::Uint(BigUint::from(1u64) << 511);
        let encoded = abi_type.encode(&value).unwrap();
        assert_eq!(encoded.len(), 64);
        assert_eq!(abi_type.decode(&encoded).unwrap(), value);
    }

    #[test]
    fn test_bool_decode_invalid_value() {
        assert_eq!(
            ABIType::Bool.decode(&[0x30]).unwrap_err().to_string(),
            "ABI decoding failed: Boolean could not be decoded from the byte string"
        );
        assert_eq!(
            ABIType::Bool.decode(&[0x80, 0x00]).unwrap_err().to_string(),
            "ABI decoding failed: Bool string must be 1 byte long"
        );
    }

    #[test]
    fn test_string_length_mismatch() {
        let result = ABIType::String.decode(&[0, 5, 65, 66]);
        assert_eq!(
            result.unwrap_err().to_string(),
            "ABI decoding failed: Invalid byte array length for string, expected 5 value, got 2"
        );
    }

    #[test]
    fn test_string_wrong_value() {
        let result = ABIType::String.encode(&ABIValue::from(42u32));
        assert_eq!(
            result.unwrap_err().to_string(),
            "ABI encoding failed: ABI value mismatch, expected string"
        );
    }

    #[test]
    fn test_address_bad_checksum() {
        let value = ABIValue::from_address(
            "MO2H6ZU47Q36GJ6GVHUKGEBEQINN7ZWVACMWZQGIYUOE3RBSRVYHV4ACJA",
        );
        assert!(
            ABIType::Address
                .encode(&value)
                .unwrap_err()
                .to_string()
                .contains("Checksum is invalid")
        );
    }

    #[test]
    fn test_address_decode_wrong_length() {
        assert_eq!(
            ABIType::Address.decode(&[0u8; 31]).unwrap_err().to_string(),
            "ABI decoding failed: Address byte string must be 32 bytes long"
        );
    }
}
