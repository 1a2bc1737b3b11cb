//! CBOR encoding of records.
//!
//! Hosts keep records as encoded bytes so that every read hands out a fresh
//! copy, the way a structured clone would.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;

/// Encodes a record to CBOR bytes.
///
/// # Errors
///
/// Returns an error if the writer fails, which cannot happen for an
/// in-memory buffer short of allocation failure.
pub fn to_cbor(value: &Value) -> CodecResult<Vec<u8>> {
    let mut buffer = Vec::new();
    ciborium::into_writer(value, &mut buffer)
        .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
    Ok(buffer)
}

/// Decodes a record from CBOR bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not well-formed CBOR or contain values
/// outside the record model, such as maps with non-text keys.
pub fn from_cbor(bytes: &[u8]) -> CodecResult<Value> {
    ciborium::from_reader(bytes).map_err(|e| CodecError::decoding_failed(e.to_string()))
}
