//! Primary and index keys.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// `2^63`, the first float past the `i64` range.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// A key identifying a record within a collection or an index.
///
/// Only a subset of [`Value`] can be a key. Keys are ordered the way hosts
/// order their key ranges: numbers first, then text, then byte strings, then
/// arrays (compared element by element). [`Key::Integer`] and [`Key::Float`]
/// are both numbers and compare by numeric value, so `Integer(1)` and
/// `Float(1.0)` are the same key. NaN is never a key.
#[derive(Debug, Clone)]
pub enum Key {
    /// Integer key (also used for generated keys).
    Integer(i64),
    /// Non-integral or out-of-range number key.
    Float(f64),
    /// Text key.
    Text(String),
    /// Binary key.
    Bytes(Vec<u8>),
    /// Array key; every element must itself be a key.
    Array(Vec<Key>),
}

impl Key {
    /// The smallest key, sorting before every key a value can produce.
    pub const MIN: Key = Key::Float(f64::NEG_INFINITY);

    /// Converts a value into a key, if the value is a valid key.
    ///
    /// Integral floats within the `i64` range become [`Key::Integer`].
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(n) => Some(Key::Integer(*n)),
            Value::Float(f) => Key::from_f64(*f),
            Value::Text(s) => Some(Key::Text(s.clone())),
            Value::Bytes(b) => Some(Key::Bytes(b.clone())),
            Value::Array(items) => items
                .iter()
                .map(Key::from_value)
                .collect::<Option<Vec<_>>>()
                .map(Key::Array),
            Value::Null | Value::Bool(_) | Value::Map(_) => None,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_f64(f: f64) -> Option<Self> {
        if f.is_nan() {
            None
        } else if f.fract() == 0.0 && (-I64_BOUND..I64_BOUND).contains(&f) {
            Some(Key::Integer(f as i64))
        } else {
            Some(Key::Float(f))
        }
    }

    /// Converts this key back into a record value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Key::Integer(n) => Value::Integer(*n),
            Key::Float(f) => Value::Float(*f),
            Key::Text(s) => Value::Text(s.clone()),
            Key::Bytes(b) => Value::Bytes(b.clone()),
            Key::Array(items) => Value::Array(items.iter().map(Key::to_value).collect()),
        }
    }

    /// Returns false if this key, or any element of it, is NaN.
    ///
    /// Keys built with [`Key::from_value`] are always valid.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        match self {
            Key::Float(f) => !f.is_nan(),
            Key::Array(items) => items.iter().all(Key::is_valid),
            Key::Integer(_) | Key::Text(_) | Key::Bytes(_) => true,
        }
    }

    /// Get this key as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Key::Integer(n) => Some(*n),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Key::Integer(_) | Key::Float(_) => 0,
            Key::Text(_) => 1,
            Key::Bytes(_) => 2,
            Key::Array(_) => 3,
        }
    }
}

/// Compares NaN as greater than every number.
#[inline]
fn cmp_float(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Exact comparison of an integer with a float.
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn cmp_integer_float(n: i64, f: f64) -> Ordering {
    if f.is_nan() || f >= I64_BOUND {
        Ordering::Less
    } else if f < -I64_BOUND {
        Ordering::Greater
    } else {
        // `f` is within range, so its integral part fits an i64.
        let whole = f.trunc();
        match n.cmp(&(whole as i64)) {
            Ordering::Equal => cmp_float(0.0, f - whole),
            other => other,
        }
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Key::Integer(a), Key::Integer(b)) => a.cmp(b),
            (Key::Float(a), Key::Float(b)) => cmp_float(*a, *b),
            (Key::Integer(a), Key::Float(b)) => cmp_integer_float(*a, *b),
            (Key::Float(a), Key::Integer(b)) => cmp_integer_float(*b, *a).reverse(),
            (Key::Text(a), Key::Text(b)) => a.cmp(b),
            (Key::Bytes(a), Key::Bytes(b)) => a.cmp(b),
            (Key::Array(a), Key::Array(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl Hash for Key {
    #[allow(clippy::cast_precision_loss)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            // Equal numbers must hash alike across both variants.
            Key::Integer(n) => (*n as f64).to_bits().hash(state),
            Key::Float(f) => {
                let f = if f.is_nan() {
                    f64::NAN
                } else if *f == 0.0 {
                    0.0
                } else {
                    *f
                };
                f.to_bits().hash(state);
            }
            Key::Text(s) => s.hash(state),
            Key::Bytes(b) => b.hash(state),
            Key::Array(items) => items.hash(state),
        }
    }
}

impl TryFrom<&Value> for Key {
    type Error = CodecError;

    fn try_from(value: &Value) -> CodecResult<Self> {
        Key::from_value(value).ok_or_else(|| {
            CodecError::invalid_key(format!("{} is not a valid key", value.type_name()))
        })
    }
}

impl TryFrom<Value> for Key {
    type Error = CodecError;

    fn try_from(value: Value) -> CodecResult<Self> {
        Key::try_from(&value)
    }
}

impl From<Key> for Value {
    fn from(key: Key) -> Self {
        key.to_value()
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Key::Integer(n)
    }
}

impl From<i32> for Key {
    fn from(n: i32) -> Self {
        Key::Integer(i64::from(n))
    }
}

impl From<f64> for Key {
    /// Integral values become [`Key::Integer`]. NaN is kept as a float and
    /// is rejected by hosts.
    fn from(f: f64) -> Self {
        Key::from_f64(f).unwrap_or(Key::Float(f))
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Text(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Text(s)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Integer(n) => write!(f, "{n}"),
            Key::Float(x) => write!(f, "{x}"),
            Key::Text(s) => write!(f, "{s:?}"),
            Key::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Key::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn type_ordering() {
        let mut keys = vec![
            Key::Array(vec![]),
            Key::Bytes(vec![0]),
            Key::Text("a".into()),
            Key::Integer(i64::MAX),
            Key::Integer(-5),
        ];
        keys.sort();

        assert_eq!(
            keys,
            vec![
                Key::Integer(-5),
                Key::Integer(i64::MAX),
                Key::Text("a".into()),
                Key::Bytes(vec![0]),
                Key::Array(vec![]),
            ]
        );
    }

    #[test]
    fn numbers_compare_by_value() {
        let mut keys = vec![
            Key::Text("0".into()),
            Key::Float(2.5),
            Key::Integer(2),
            Key::Float(f64::INFINITY),
            Key::Integer(3),
            Key::Float(-0.5),
            Key::MIN,
        ];
        keys.sort();

        assert_eq!(
            keys,
            vec![
                Key::MIN,
                Key::Float(-0.5),
                Key::Integer(2),
                Key::Float(2.5),
                Key::Integer(3),
                Key::Float(f64::INFINITY),
                Key::Text("0".into()),
            ]
        );
        assert!(Key::MIN < Key::Integer(i64::MIN));
    }

    #[test]
    fn integral_floats_are_integer_keys() {
        assert_eq!(Key::from_value(&Value::Float(4.0)), Some(Key::Integer(4)));
        assert_eq!(Key::from_value(&Value::Float(-0.0)), Some(Key::Integer(0)));
        assert_eq!(Key::from_value(&Value::Float(9.99)), Some(Key::Float(9.99)));
        assert_eq!(Key::from_value(&Value::Float(f64::NAN)), None);
        assert_eq!(Key::from(7.0), Key::Integer(7));
        assert_eq!(Key::Integer(1), Key::Float(1.0));
        assert!(!Key::Array(vec![Key::Float(f64::NAN)]).is_valid());
        assert!(Key::Float(f64::NEG_INFINITY).is_valid());
    }

    #[test]
    fn equal_numbers_hash_alike() {
        use std::collections::HashSet;

        let set: HashSet<Key> = [Key::Integer(1), Key::Float(1.0), Key::Float(1.5)]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn array_prefix_sorts_first() {
        let short = Key::Array(vec![Key::Integer(1)]);
        let long = Key::Array(vec![Key::Integer(1), Key::Integer(0)]);
        assert!(short < long);
    }

    #[test]
    fn non_key_values_rejected() {
        assert!(Key::from_value(&Value::Null).is_none());
        assert!(Key::from_value(&Value::Bool(true)).is_none());
        assert!(Key::from_value(&Value::empty_map()).is_none());
        assert!(Key::from_value(&Value::Array(vec![Value::Null])).is_none());
        assert!(matches!(
            Key::try_from(Value::Null),
            Err(CodecError::InvalidKey { .. })
        ));
    }

    #[test]
    fn display() {
        let key = Key::Array(vec![Key::Integer(1), Key::Text("x".into())]);
        assert_eq!(key.to_string(), "[1, \"x\"]");
    }

    proptest! {
        #[test]
        fn integer_order_matches_numeric(a in any::<i64>(), b in any::<i64>()) {
            prop_assert_eq!(Key::Integer(a).cmp(&Key::Integer(b)), a.cmp(&b));
        }

        #[test]
        fn mixed_number_order_matches_numeric(
            a in -1_000_000i64..1_000_000,
            b in -1.0e6f64..1.0e6,
        ) {
            #[allow(clippy::cast_precision_loss)]
            let expected = (a as f64).partial_cmp(&b).unwrap();
            prop_assert_eq!(Key::Integer(a).cmp(&Key::Float(b)), expected);
            prop_assert_eq!(Key::Float(b).cmp(&Key::Integer(a)), expected.reverse());
        }

        #[test]
        fn value_conversion_preserves_key(s in "[a-z]{0,12}", n in any::<i64>()) {
            let key = Key::Array(vec![Key::Text(s), Key::Integer(n)]);
            prop_assert_eq!(Key::from_value(&key.to_value()), Some(key));
        }
    }
}
