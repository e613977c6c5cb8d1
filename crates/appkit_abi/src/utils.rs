use num_bigint::BigUint;

/// Big-endian bytes left-padded to `len`. Callers check that the value fits.
pub fn big_uint_to_bytes(value: &BigUint, len: usize) -> Vec<u8> {
    let bytes = value.to_bytes_be();
    let mut result = vec![0u8; len.saturating_sub(bytes.len())];
    result.extend_from_slice(&bytes);
    result
}
