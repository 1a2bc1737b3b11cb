//! Key paths.

use crate::error::{CodecError, CodecResult};
use crate::key::Key;
use crate::value::Value;
use std::collections::BTreeMap;
use std::fmt;

/// A dotted path into a record, such as `"email"` or `"profile.id"`.
///
/// The empty path refers to the record itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPath(String);

impl KeyPath {
    /// Parses and validates a key path.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidKeyPath`] unless the path is empty or a
    /// dot-separated list of identifiers.
    pub fn parse(path: impl Into<String>) -> CodecResult<Self> {
        let path = path.into();
        if path.is_empty() || path.split('.').all(is_identifier) {
            Ok(Self(path))
        } else {
            Err(CodecError::InvalidKeyPath { path })
        }
    }

    /// Returns the path as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the empty path.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.').filter(|s| !s.is_empty())
    }

    /// Looks up the value at this path.
    pub fn evaluate<'v>(&self, record: &'v Value) -> Option<&'v Value> {
        self.segments()
            .try_fold(record, |current, segment| current.get(segment))
    }

    /// Derives a key from the record, if the path resolves to a valid key.
    pub fn extract_key(&self, record: &Value) -> Option<Key> {
        self.evaluate(record).and_then(Key::from_value)
    }

    /// Writes a generated key into the record at this path.
    ///
    /// Missing intermediate maps are created.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::KeyInjection`] when the path is empty or an
    /// intermediate value exists but is not a map.
    pub fn inject(&self, record: &mut Value, key: &Key) -> CodecResult<()> {
        let injection_error = || CodecError::KeyInjection {
            path: self.0.clone(),
        };

        let segments: Vec<&str> = self.segments().collect();
        let (last, parents) = segments.split_last().ok_or_else(injection_error)?;

        let mut current = record;
        for segment in parents {
            let Value::Map(fields) = current else {
                return Err(injection_error());
            };
            current = fields
                .entry((*segment).to_string())
                .or_insert_with(|| Value::Map(BTreeMap::new()));
        }

        match current {
            Value::Map(fields) => {
                fields.insert((*last).to_string(), key.to_value());
                Ok(())
            }
            _ => Err(injection_error()),
        }
    }
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for KeyPath {
    type Error = CodecError;

    fn try_from(path: &str) -> CodecResult<Self> {
        KeyPath::parse(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> Value {
        Value::from_pairs([
            ("email", Value::from("a@x.com")),
            ("profile", Value::from_pairs([("id", 7i64)])),
        ])
    }

    #[test]
    fn parse_accepts_identifiers() {
        assert!(KeyPath::parse("email").is_ok());
        assert!(KeyPath::parse("profile.id").is_ok());
        assert!(KeyPath::parse("_private$1").is_ok());
        assert!(KeyPath::parse("").unwrap().is_empty());
    }

    #[test]
    fn parse_rejects_garbage() {
        for bad in ["1abc", "a..b", "a.", ".a", "with space", "dash-ed"] {
            assert!(
                matches!(KeyPath::parse(bad), Err(CodecError::InvalidKeyPath { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn extract_nested_key() {
        let path = KeyPath::parse("profile.id").unwrap();
        assert_eq!(path.extract_key(&user()), Some(Key::Integer(7)));
    }

    #[test]
    fn extract_missing_key() {
        let path = KeyPath::parse("profile.name").unwrap();
        assert_eq!(path.extract_key(&user()), None);
    }

    #[test]
    fn empty_path_is_the_record() {
        let path = KeyPath::parse("").unwrap();
        assert_eq!(path.extract_key(&Value::from("k")), Some(Key::from("k")));
    }

    #[test]
    fn inject_creates_intermediate_maps() {
        let path = KeyPath::parse("meta.id").unwrap();
        let mut record = Value::from_pairs([("name", "A")]);
        path.inject(&mut record, &Key::Integer(3)).unwrap();
        assert_eq!(path.extract_key(&record), Some(Key::Integer(3)));
    }

    #[test]
    fn inject_into_scalar_fails() {
        let path = KeyPath::parse("id").unwrap();
        let mut record = Value::Integer(1);
        assert!(matches!(
            path.inject(&mut record, &Key::Integer(3)),
            Err(CodecError::KeyInjection { .. })
        ));
    }
}
