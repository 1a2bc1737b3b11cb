//! Read queries and their results.

use crate::error::{DbResult, ValidationError};
use storekeep_codec::{Key, Value};

/// What a read should return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadQuery {
    /// Every record, in primary key order.
    All,
    /// The record stored under a primary key.
    Key(Key),
    /// The first record whose indexed field equals `key`.
    Index {
        /// Index name, e.g. `by_email`.
        name: String,
        /// Value of the indexed field.
        key: Key,
    },
}

impl ReadQuery {
    /// Looks up by primary key.
    pub fn key(key: impl Into<Key>) -> Self {
        ReadQuery::Key(key.into())
    }

    /// Looks up through an index.
    pub fn index(name: impl Into<String>, key: impl Into<Key>) -> Self {
        ReadQuery::Index {
            name: name.into(),
            key: key.into(),
        }
    }

    /// Parses the loose query objects JavaScript callers pass.
    ///
    /// Accepted shapes:
    /// - `null` or `{}`: [`ReadQuery::All`]
    /// - `{ key }`: [`ReadQuery::Key`]
    /// - `{ indexName, indexKey }`: [`ReadQuery::Index`]
    ///
    /// # Errors
    ///
    /// Anything else, an invalid key, or an empty index name fails with
    /// [`ValidationError::BadQuery`].
    pub fn parse(query: &Value) -> DbResult<Self> {
        let fields = match query {
            Value::Null => return Ok(ReadQuery::All),
            Value::Map(fields) => fields,
            other => {
                return Err(bad(format!(
                    "expected an object, found {}",
                    other.type_name()
                )))
            }
        };

        let mut names: Vec<&str> = fields.keys().map(String::as_str).collect();
        names.sort_unstable();
        match names.as_slice() {
            [] => Ok(ReadQuery::All),
            ["key"] => Ok(ReadQuery::Key(parse_key(&fields["key"], "key")?)),
            ["indexKey", "indexName"] => {
                let name = fields["indexName"]
                    .as_text()
                    .ok_or_else(|| bad("indexName must be a string"))?;
                if name.is_empty() {
                    return Err(bad("indexName must not be empty"));
                }
                Ok(ReadQuery::Index {
                    name: name.to_string(),
                    key: parse_key(&fields["indexKey"], "indexKey")?,
                })
            }
            _ => Err(bad(format!(
                "unrecognized query fields {names:?}; expected {{}}, {{key}} or {{indexName, indexKey}}"
            ))),
        }
    }
}

impl Default for ReadQuery {
    fn default() -> Self {
        ReadQuery::All
    }
}

fn bad(reason: impl Into<String>) -> crate::DbError {
    ValidationError::bad_query(reason).into()
}

fn parse_key(value: &Value, field: &str) -> DbResult<Key> {
    Key::from_value(value)
        .ok_or_else(|| bad(format!("{field} is a {}, not a valid key", value.type_name())))
}

/// Result of a read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadResult {
    /// Outcome of a key or index lookup.
    Single(Option<Value>),
    /// Outcome of reading everything.
    Many(Vec<Value>),
}

impl ReadResult {
    /// The single record, if this is a lookup result that matched.
    #[must_use]
    pub fn into_single(self) -> Option<Value> {
        match self {
            ReadResult::Single(record) => record,
            ReadResult::Many(_) => None,
        }
    }

    /// Every record; a lookup yields zero or one.
    #[must_use]
    pub fn into_records(self) -> Vec<Value> {
        match self {
            ReadResult::Single(record) => record.into_iter().collect(),
            ReadResult::Many(records) => records,
        }
    }

    /// Converts to a plain value: the record, `null`, or an array.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            ReadResult::Single(record) => record.unwrap_or(Value::Null),
            ReadResult::Many(records) => Value::Array(records),
        }
    }
}
