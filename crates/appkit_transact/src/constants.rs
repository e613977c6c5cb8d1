pub type Byte32 = [u8; 32];

pub const HASH_BYTES_LENGTH: usize = 32;
pub const ALGORAND_CHECKSUM_BYTE_LENGTH: usize = 4;
pub const ALGORAND_ADDRESS_LENGTH: usize = 58;
pub const ALGORAND_PUBLIC_KEY_BYTE_LENGTH: usize = 32;
pub const ALGORAND_SECRET_KEY_BYTE_LENGTH: usize = 32;
pub const ALGORAND_SIGNATURE_BYTE_LENGTH: usize = 64;
pub const ALGORAND_SIGNATURE_ENCODING_INCR: usize = 75;
pub const MAX_TX_GROUP_SIZE: usize = 16;

// Domain separators prepended before hashing
pub const TRANSACTION_DOMAIN_SEPARATOR: &[u8] = b"TX";
pub const TRANSACTION_GROUP_DOMAIN_SEPARATOR: &[u8] = b"TG";
pub const MULTISIG_DOMAIN_SEPARATOR: &[u8] = b"MultisigAddr";
pub const LOGIC_SIG_DOMAIN_SEPARATOR: &[u8] = b"Program";
pub const APP_ID_DOMAIN_SEPARATOR: &[u8] = b"appID";

// Application program size constraints
pub const MAX_EXTRA_PROGRAM_PAGES: u64 = 3;
pub const PROGRAM_PAGE_SIZE: usize = 2048; // In bytes

// Application reference limits
pub const MAX_APP_ARGS: usize = 16;
pub const MAX_ARGS_SIZE: usize = 2048;
pub const MAX_OVERALL_REFERENCES: usize = 8;
pub const MAX_ACCOUNT_REFERENCES: usize = 4;
pub const MAX_APP_REFERENCES: usize = 8;
pub const MAX_ASSET_REFERENCES: usize = 8;
pub const MAX_BOX_REFERENCES: usize = 8;

// Application state schema limits
pub const MAX_GLOBAL_STATE_KEYS: u64 = 64;
pub const MAX_LOCAL_STATE_KEYS: u64 = 16;
pub const MAX_STATE_KEY_LENGTH: usize = 64;
