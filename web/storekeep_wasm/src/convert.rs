//! Conversions between records and JavaScript values.
//!
//! Maps become plain objects, byte strings become `Uint8Array`s. JavaScript
//! has a single number type, so integral numbers within the safe-integer
//! range come back as [`Value::Integer`] and every other number as
//! [`Value::Float`].

use serde::Serialize;
use serde_wasm_bindgen::Serializer;
use storekeep_codec::{Key, Value};
use storekeep_host::{HostError, HostResult};
use wasm_bindgen::JsValue;

/// Converts a record to a structured-clonable JavaScript value.
pub(crate) fn to_js(value: &Value) -> HostResult<JsValue> {
    value
        .serialize(&Serializer::new().serialize_maps_as_objects(true))
        .map_err(|e| HostError::data(e.to_string()))
}

/// Largest integer a JavaScript number holds exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Converts a JavaScript value to a record.
pub(crate) fn from_js(value: JsValue) -> HostResult<Value> {
    serde_wasm_bindgen::from_value(value)
        .map(integral_numbers)
        .map_err(|e| HostError::data(e.to_string()))
}

// Negative zero stays a float so that it reads back unchanged.
fn is_safe_integer(f: f64) -> bool {
    f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER && !(f == 0.0 && f.is_sign_negative())
}

#[allow(clippy::cast_possible_truncation)]
fn integral_numbers(value: Value) -> Value {
    match value {
        Value::Float(f) if is_safe_integer(f) => Value::Integer(f as i64),
        Value::Array(items) => Value::Array(items.into_iter().map(integral_numbers).collect()),
        Value::Map(fields) => Value::Map(
            fields
                .into_iter()
                .map(|(field, value)| (field, integral_numbers(value)))
                .collect(),
        ),
        other => other,
    }
}

/// Converts a key.
pub(crate) fn key_to_js(key: &Key) -> HostResult<JsValue> {
    to_js(&key.to_value())
}

/// Converts a JavaScript value to a key.
pub(crate) fn key_from_js(value: JsValue) -> HostResult<Key> {
    let value = from_js(value)?;
    Key::from_value(&value)
        .ok_or_else(|| HostError::data(format!("{} is not a valid key", value.type_name())))
}

/// Converts an optional record, `undefined` meaning absent.
pub(crate) fn optional_from_js(value: JsValue) -> HostResult<Option<Value>> {
    if value.is_undefined() {
        Ok(None)
    } else {
        from_js(value).map(Some)
    }
}
