use regex::Regex;
use std::sync::LazyLock;

pub const HASH_BYTES_LENGTH: usize = 32;
pub const LENGTH_ENCODE_BYTE_SIZE: usize = 2;
pub const ALGORAND_PUBLIC_KEY_BYTE_LENGTH: usize = 32;
pub const ALGORAND_CHECKSUM_BYTE_LENGTH: usize = 4;
pub const ALGORAND_ADDRESS_LENGTH: usize = 58;

// Boolean encoding
pub const BOOL_TRUE_BYTE: u8 = 0x80;
pub const BOOL_FALSE_BYTE: u8 = 0x00;

pub const BITS_PER_BYTE: u8 = 8;
pub const MAX_BIT_SIZE: u16 = 512;

/// Prefix of the log entry carrying a method's return value.
pub const RETURN_PREFIX: [u8; 4] = [0x15, 0x1f, 0x7c, 0x75];

pub const METHOD_SELECTOR_LENGTH: usize = 4;

/// Application args available for method arguments once the selector takes the first slot.
/// Arguments from the last slot onwards are packed into a single tuple.
pub const MAX_METHOD_ARG_SLOTS: usize = 15;

pub static STATIC_ARRAY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-z\d\[\](),]+)\[(0|[1-9][\d]*)]$").expect("Invalid static array regex")
});
