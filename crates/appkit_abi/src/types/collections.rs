//! Tuples and arrays: the ARC-4 head/tail layout with packed consecutive bools.

use crate::{
    ABIError, ABIType, ABIValue,
    constants::{BITS_PER_BYTE, BOOL_FALSE_BYTE, BOOL_TRUE_BYTE, LENGTH_ENCODE_BYTE_SIZE},
};

impl ABIType {
    pub(crate) fn encode_tuple(&self, value: &ABIValue) -> Result<Vec<u8>, ABIError> {
        let ABIType::Tuple(child_types) = self else {
            return Err(ABIError::EncodingError {
                message: "ABI type mismatch, expected tuple".to_string(),
            });
        };
        let child_types: Vec<&ABIType> = child_types.iter().collect();
        encode_abi_types(&child_types, expect_array(value)?)
    }

    pub(crate) fn decode_tuple(&self, bytes: &[u8]) -> Result<ABIValue, ABIError> {
        let ABIType::Tuple(child_types) = self else {
            return Err(ABIError::DecodingError {
                message: "ABI type mismatch, expected tuple".to_string(),
            });
        };
        let child_types: Vec<&ABIType> = child_types.iter().collect();
        decode_abi_types(&child_types, bytes)
    }

    pub(crate) fn encode_static_array(&self, value: &ABIValue) -> Result<Vec<u8>, ABIError> {
        let ABIType::StaticArray(child_type, size) = self else {
            return Err(ABIError::EncodingError {
                message: "ABI type mismatch, expected static array".to_string(),
            });
        };
        let child_types = vec![child_type.as_ref(); *size];
        encode_abi_types(&child_types, expect_array(value)?)
    }

    pub(crate) fn decode_static_array(&self, bytes: &[u8]) -> Result<ABIValue, ABIError> {
        let ABIType::StaticArray(child_type, size) = self else {
            return Err(ABIError::DecodingError {
                message: "ABI type mismatch, expected static array".to_string(),
            });
        };
        let child_types = vec![child_type.as_ref(); *size];
        decode_abi_types(&child_types, bytes)
    }

    pub(crate) fn encode_dynamic_array(&self, value: &ABIValue) -> Result<Vec<u8>, ABIError> {
        let ABIType::DynamicArray(child_type) = self else {
            return Err(ABIError::EncodingError {
                message: "ABI type mismatch, expected dynamic array".to_string(),
            });
        };
        let values = expect_array(value)?;
        let length = u16::try_from(values.len()).map_err(|_| ABIError::EncodingError {
            message: format!("Array of {} elements is too long to encode", values.len()),
        })?;

        let child_types = vec![child_type.as_ref(); values.len()];
        let mut encoded = length.to_be_bytes().to_vec();
        encoded.extend(encode_abi_types(&child_types, values)?);
        Ok(encoded)
    }

    pub(crate) fn decode_dynamic_array(&self, bytes: &[u8]) -> Result<ABIValue, ABIError> {
        let ABIType::DynamicArray(child_type) = self else {
            return Err(ABIError::DecodingError {
                message: "ABI type mismatch, expected dynamic array".to_string(),
            });
        };
        if bytes.len() < LENGTH_ENCODE_BYTE_SIZE {
            return Err(ABIError::DecodingError {
                message: "Byte array is too short to be decoded as dynamic array".to_string(),
            });
        }

        let values_count = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
        let child_types = vec![child_type.as_ref(); values_count];
        decode_abi_types(&child_types, &bytes[LENGTH_ENCODE_BYTE_SIZE..])
    }
}

fn expect_array(value: &ABIValue) -> Result<&[ABIValue], ABIError> {
    value.as_array().ok_or_else(|| ABIError::EncodingError {
        message: "ABI value mismatch, expected an array of values".to_string(),
    })
}

pub(crate) fn encode_abi_types(
    abi_types: &[&ABIType],
    values: &[ABIValue],
) -> Result<Vec<u8>, ABIError> {
    if abi_types.len() != values.len() {
        return Err(ABIError::EncodingError {
            message: "Mismatch lengths between the values and types".to_string(),
        });
    }

    // A head of None marks a dynamic child whose offset is filled in once every head is sized.
    let mut heads: Vec<Option<Vec<u8>>> = Vec::new();
    let mut tails: Vec<Vec<u8>> = Vec::new();

    let mut cursor = 0;
    while cursor < abi_types.len() {
        let child_type = abi_types[cursor];

        if child_type.is_dynamic() {
            heads.push(None);
            tails.push(child_type.encode(&values[cursor])?);
        } else if let ABIType::Bool = child_type {
            let sequence_end = find_bool_sequence_end(abi_types, cursor);
            heads.push(Some(vec![compress_bools(&values[cursor..=sequence_end])?]));
            tails.push(vec![]);
            cursor = sequence_end;
        } else {
            heads.push(Some(child_type.encode(&values[cursor])?));
            tails.push(vec![]);
        }

        cursor += 1;
    }

    let head_length: usize = heads
        .iter()
        .map(|head| head.as_ref().map_or(LENGTH_ENCODE_BYTE_SIZE, Vec::len))
        .sum();

    let mut encoded = Vec::new();
    let mut tail_offset = head_length;
    for (head, tail) in heads.iter().zip(&tails) {
        match head {
            Some(bytes) => encoded.extend_from_slice(bytes),
            None => {
                let offset = u16::try_from(tail_offset).map_err(|_| ABIError::EncodingError {
                    message: format!("Value {} cannot fit in u16", tail_offset),
                })?;
                encoded.extend_from_slice(&offset.to_be_bytes());
            }
        }
        tail_offset += tail.len();
    }
    encoded.extend(tails.into_iter().flatten());

    Ok(encoded)
}

pub(crate) fn decode_abi_types(abi_types: &[&ABIType], bytes: &[u8]) -> Result<ABIValue, ABIError> {
    let partitions = extract_values(abi_types, bytes)?;

    abi_types
        .iter()
        .zip(partitions)
        .map(|(child_type, partition)| child_type.decode(&partition))
        .collect::<Result<Vec<_>, _>>()
        .map(ABIValue::Array)
}

fn compress_bools(values: &[ABIValue]) -> Result<u8, ABIError> {
    if values.len() > BITS_PER_BYTE as usize {
        return Err(ABIError::EncodingError {
            message: format!(
                "Expected no more than 8 bool values, received {}",
                values.len()
            ),
        });
    }

    values
        .iter()
        .enumerate()
        .try_fold(0u8, |packed, (i, value)| match value {
            ABIValue::Bool(true) => Ok(packed | (BOOL_TRUE_BYTE >> i)),
            ABIValue::Bool(false) => Ok(packed),
            _ => Err(ABIError::EncodingError {
                message: "Expected all values to be ABIValue::Bool".to_string(),
            }),
        })
}

/// Splits encoded bytes into one partition per child type.
fn extract_values(abi_types: &[&ABIType], bytes: &[u8]) -> Result<Vec<Vec<u8>>, ABIError> {
    let out_of_bounds = |start: usize, end: usize| ABIError::DecodingError {
        message: format!(
            "Index out of bounds: trying to access bytes[{}..{}] but slice has length {}",
            start,
            end,
            bytes.len()
        ),
    };

    let mut partitions: Vec<Option<Vec<u8>>> = Vec::with_capacity(abi_types.len());
    let mut dynamic_offsets: Vec<(usize, usize)> = Vec::new();
    let mut bytes_cursor: usize = 0;

    let mut cursor = 0;
    while cursor < abi_types.len() {
        let child_type = abi_types[cursor];

        if child_type.is_dynamic() {
            let offset_bytes = bytes
                .get(bytes_cursor..bytes_cursor + LENGTH_ENCODE_BYTE_SIZE)
                .ok_or_else(|| out_of_bounds(bytes_cursor, bytes_cursor + LENGTH_ENCODE_BYTE_SIZE))?;
            let offset = u16::from_be_bytes([offset_bytes[0], offset_bytes[1]]) as usize;
            dynamic_offsets.push((cursor, offset));
            partitions.push(None);
            bytes_cursor += LENGTH_ENCODE_BYTE_SIZE;
        } else if let ABIType::Bool = child_type {
            let sequence_end = find_bool_sequence_end(abi_types, cursor);
            let packed = *bytes
                .get(bytes_cursor)
                .ok_or_else(|| out_of_bounds(bytes_cursor, bytes_cursor + 1))?;
            for j in 0..=(sequence_end - cursor) {
                let bit = if packed & (BOOL_TRUE_BYTE >> j) > 0 {
                    BOOL_TRUE_BYTE
                } else {
                    BOOL_FALSE_BYTE
                };
                partitions.push(Some(vec![bit]));
            }
            cursor = sequence_end;
            bytes_cursor += 1;
        } else {
            let size = ABIType::get_size(child_type)?;
            let slice = bytes
                .get(bytes_cursor..bytes_cursor + size)
                .ok_or_else(|| out_of_bounds(bytes_cursor, bytes_cursor + size))?;
            partitions.push(Some(slice.to_vec()));
            bytes_cursor += size;
        }

        cursor += 1;
    }

    if dynamic_offsets.is_empty() && bytes_cursor < bytes.len() {
        return Err(ABIError::DecodingError {
            message: "Input bytes not fully consumed".to_string(),
        });
    }

    for (i, &(type_index, start)) in dynamic_offsets.iter().enumerate() {
        let end = dynamic_offsets
            .get(i + 1)
            .map_or(bytes.len(), |&(_, next_start)| next_start);
        if start > end {
            return Err(ABIError::DecodingError {
                message: "Dynamic segment should display a [l, r] space with l <= r".to_string(),
            });
        }
        let slice = bytes.get(start..end).ok_or_else(|| out_of_bounds(start, end))?;
        partitions[type_index] = Some(slice.to_vec());
    }

    partitions
        .into_iter()
        .enumerate()
        .map(|(i, partition)| {
            partition.ok_or_else(|| ABIError::DecodingError {
                message: format!("Value partition at index {} is None", i),
            })
        })
        .collect()
}

/// Index of the last bool in the run starting at `current_index`. Runs are capped at 8 so each
/// packs into a single byte.
pub(crate) fn find_bool_sequence_end<T>(abi_types: &[T], current_index: usize) -> usize
where
    T: AsRef<ABIType>,
{
    let mut cursor = current_index;
    while cursor + 1 < abi_types.len()
        && cursor - current_index + 1 < BITS_PER_BYTE as usize
        && matches!(abi_types[cursor + 1].as_ref(), ABIType::Bool)
    {
        cursor += 1;
    }
    cursor
}
