//! Property-based test generators using proptest.
//!
//! Keys only use the key subset of values and floats are never NaN, so
//! every generated value is accepted by the host and compares equal to
//! itself after a round trip.

use proptest::prelude::*;
use storekeep_codec::{Key, Value};

/// Strategy for generating valid collection names.
pub fn collection_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for generating record field names.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,9}").expect("Invalid regex")
}

/// Strategy for generating keys, nested arrays included.
pub fn key_strategy() -> impl Strategy<Value = Key> {
    let leaf = prop_oneof![
        any::<i64>().prop_map(Key::Integer),
        (-1.0e9f64..1.0e9)
            .prop_filter("integral floats are integer keys", |f| f.fract() != 0.0)
            .prop_map(Key::Float),
        "[a-z0-9]{0,12}".prop_map(Key::Text),
        prop::collection::vec(any::<u8>(), 0..8).prop_map(Key::Bytes),
    ];
    leaf.prop_recursive(2, 12, 4, |inner| {
        prop::collection::vec(inner, 0..4).prop_map(Key::Array)
    })
}

/// Strategy for generating scalar values.
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        prop::num::f64::NORMAL.prop_map(Value::Float),
        ".{0,16}".prop_map(Value::Text),
        prop::collection::vec(any::<u8>(), 0..16).prop_map(Value::Bytes),
    ]
}

/// Strategy for generating arbitrary records.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    scalar_strategy().prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map(field_name_strategy(), inner, 0..6).prop_map(Value::Map),
        ]
    })
}

/// Strategy for generating map records, the usual shape of stored objects.
pub fn record_strategy() -> impl Strategy<Value = Value> {
    prop::collection::btree_map(field_name_strategy(), value_strategy(), 0..6)
        .prop_map(Value::Map)
}
