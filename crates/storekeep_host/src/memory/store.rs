//! Object store contents for the in-memory engine.

use crate::engine::{IndexInfo, StoreInfo, StoreParams};
use crate::error::{HostError, HostResult};
use std::collections::{BTreeMap, BTreeSet};
use storekeep_codec::{from_cbor, to_cbor, Key, KeyPath, Value};

/// Largest key a generator hands out (2^53, the largest exact double).
pub(crate) const MAX_GENERATED_KEY: i64 = 1 << 53;

/// A secondary index.
#[derive(Debug, Clone)]
pub(crate) struct Index {
    pub(crate) key_path: KeyPath,
    pub(crate) unique: bool,
    /// (index key, primary key) pairs.
    entries: BTreeSet<(Key, Key)>,
    /// primary key -> index key.
    reverse: BTreeMap<Key, Key>,
}

impl Index {
    fn new(key_path: KeyPath, unique: bool) -> Self {
        Self {
            key_path,
            unique,
            entries: BTreeSet::new(),
            reverse: BTreeMap::new(),
        }
    }

    /// Primary key of some other record holding `index_key`.
    fn conflicting(&self, index_key: &Key, primary: &Key) -> Option<&Key> {
        self.entries
            .range((index_key.clone(), Key::MIN)..)
            .take_while(|(k, _)| k == index_key)
            .map(|(_, pk)| pk)
            .find(|pk| *pk != primary)
    }

    fn first(&self, index_key: &Key) -> Option<&Key> {
        self.entries
            .range((index_key.clone(), Key::MIN)..)
            .next()
            .filter(|(k, _)| k == index_key)
            .map(|(_, pk)| pk)
    }

    fn insert(&mut self, index_key: Key, primary: Key) {
        self.entries.insert((index_key.clone(), primary.clone()));
        self.reverse.insert(primary, index_key);
    }

    fn remove(&mut self, primary: &Key) {
        if let Some(index_key) = self.reverse.remove(primary) {
            self.entries.remove(&(index_key, primary.clone()));
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.reverse.clear();
    }
}

/// Records, key generator and indexes of one object store.
#[derive(Debug, Clone)]
pub(crate) struct ObjectStore {
    pub(crate) key_path: Option<KeyPath>,
    pub(crate) auto_increment: bool,
    /// Next generated key.
    pub(crate) next_key: i64,
    records: BTreeMap<Key, Vec<u8>>,
    indexes: BTreeMap<String, Index>,
}

impl ObjectStore {
    pub(crate) fn new(params: &StoreParams) -> Self {
        Self {
            key_path: params.key_path.clone(),
            auto_increment: params.auto_increment,
            next_key: 1,
            records: BTreeMap::new(),
            indexes: BTreeMap::new(),
        }
    }

    pub(crate) fn info(&self, name: &str) -> StoreInfo {
        StoreInfo {
            name: name.to_string(),
            key_path: self.key_path.clone(),
            auto_increment: self.auto_increment,
            indexes: self
                .indexes
                .iter()
                .map(|(index_name, index)| IndexInfo {
                    name: index_name.clone(),
                    key_path: index.key_path.clone(),
                    unique: index.unique,
                })
                .collect(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    /// Builds a new index over the existing records.
    pub(crate) fn add_index(&mut self, name: &str, key_path: &KeyPath, unique: bool) -> HostResult<()> {
        if self.indexes.contains_key(name) {
            return Err(HostError::constraint(format!("index {name:?} already exists")));
        }

        let mut index = Index::new(key_path.clone(), unique);
        for (primary, bytes) in &self.records {
            let record = from_cbor(bytes)?;
            if let Some(index_key) = key_path.extract_key(&record) {
                if unique && index.first(&index_key).is_some() {
                    return Err(unique_violation(name));
                }
                index.insert(index_key, primary.clone());
            }
        }

        self.indexes.insert(name.to_string(), index);
        Ok(())
    }

    /// Resolves the primary key for a put, generating one if needed.
    ///
    /// Returns the key and the record, which has the generated key injected
    /// when the store uses in-line keys.
    pub(crate) fn resolve_key(
        &mut self,
        mut record: Value,
        key: Option<Key>,
    ) -> HostResult<(Key, Value)> {
        let key_path = self.key_path.clone();
        let key = match (key_path.as_ref(), key) {
            (Some(path), Some(_)) => {
                return Err(HostError::data(format!(
                    "store uses in-line keys at {path:?}; an explicit key is not allowed"
                )));
            }
            (Some(path), None) => match path.evaluate(&record) {
                Some(value) => Key::from_value(value).ok_or_else(|| {
                    HostError::data(format!(
                        "value at key path {path:?} is a {}, not a valid key",
                        value.type_name()
                    ))
                })?,
                None if self.auto_increment => {
                    let generated = self.generate()?;
                    path.inject(&mut record, &generated)?;
                    generated
                }
                None => {
                    return Err(HostError::data(format!(
                        "record has no value at key path {path:?}"
                    )));
                }
            },
            (None, Some(key)) if !key.is_valid() => {
                return Err(HostError::data(format!("{key} is not a valid key")));
            }
            (None, Some(key)) => key,
            (None, None) if self.auto_increment => self.generate()?,
            (None, None) => {
                return Err(HostError::data(
                    "store has neither a key path nor a key generator and no key was provided",
                ));
            }
        };

        if self.auto_increment {
            self.bump_generator(&key);
        }

        Ok((key, record))
    }

    /// Moves the generator past an explicit number key.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn bump_generator(&mut self, key: &Key) {
        match *key {
            Key::Integer(n) if n >= self.next_key => self.next_key = n.saturating_add(1),
            // Saturates for keys beyond the i64 range, exhausting the generator.
            Key::Float(f) if f >= self.next_key as f64 => {
                self.next_key = (f.floor() as i64).saturating_add(1);
            }
            _ => {}
        }
    }

    fn generate(&mut self) -> HostResult<Key> {
        if self.next_key > MAX_GENERATED_KEY {
            return Err(HostError::constraint("key generator exhausted"));
        }
        let key = Key::Integer(self.next_key);
        self.next_key += 1;
        Ok(key)
    }

    /// Writes a record, maintaining indexes. Returns the replaced bytes.
    pub(crate) fn write(&mut self, key: Key, record: &Value) -> HostResult<Option<Vec<u8>>> {
        let index_keys = self.index_keys(record);

        for (name, index_key) in &index_keys {
            let index = &self.indexes[name.as_str()];
            if index.unique && index.conflicting(index_key, &key).is_some() {
                return Err(unique_violation(name));
            }
        }

        let bytes = to_cbor(record)?;

        for index in self.indexes.values_mut() {
            index.remove(&key);
        }
        for (name, index_key) in index_keys {
            if let Some(index) = self.indexes.get_mut(&name) {
                index.insert(index_key, key.clone());
            }
        }

        Ok(self.records.insert(key, bytes))
    }

    fn index_keys(&self, record: &Value) -> Vec<(String, Key)> {
        self.indexes
            .iter()
            .filter_map(|(name, index)| {
                index
                    .key_path
                    .extract_key(record)
                    .map(|index_key| (name.clone(), index_key))
            })
            .collect()
    }

    /// Removes a record. Returns the removed bytes.
    pub(crate) fn remove(&mut self, key: &Key) -> Option<Vec<u8>> {
        let removed = self.records.remove(key)?;
        for index in self.indexes.values_mut() {
            index.remove(key);
        }
        Some(removed)
    }

    /// Removes every record, returning them.
    pub(crate) fn take_all(&mut self) -> BTreeMap<Key, Vec<u8>> {
        for index in self.indexes.values_mut() {
            index.clear();
        }
        std::mem::take(&mut self.records)
    }

    /// Puts back the bytes a write or remove displaced.
    ///
    /// Only used to undo aborted transactions, so uniqueness is not
    /// rechecked: the restored state was valid before.
    pub(crate) fn restore(&mut self, key: Key, previous: Option<Vec<u8>>) -> HostResult<()> {
        self.remove(&key);
        if let Some(bytes) = previous {
            let record = from_cbor(&bytes)?;
            for (name, index_key) in self.index_keys(&record) {
                if let Some(index) = self.indexes.get_mut(&name) {
                    index.insert(index_key, key.clone());
                }
            }
            self.records.insert(key, bytes);
        }
        Ok(())
    }

    /// Puts back records removed by [`ObjectStore::take_all`].
    pub(crate) fn restore_all(&mut self, previous: BTreeMap<Key, Vec<u8>>) -> HostResult<()> {
        self.take_all();
        for (key, bytes) in previous {
            self.restore(key, Some(bytes))?;
        }
        Ok(())
    }

    pub(crate) fn get(&self, key: &Key) -> HostResult<Option<Value>> {
        self.records
            .get(key)
            .map(|bytes| from_cbor(bytes))
            .transpose()
            .map_err(HostError::from)
    }

    pub(crate) fn get_all(&self) -> HostResult<Vec<Value>> {
        self.records
            .values()
            .map(|bytes| from_cbor(bytes).map_err(HostError::from))
            .collect()
    }

    pub(crate) fn get_by_index(&self, index: &str, key: &Key) -> HostResult<Option<Value>> {
        let index = self
            .indexes
            .get(index)
            .ok_or_else(|| HostError::not_found(format!("index {index:?}")))?;
        match index.first(key) {
            Some(primary) => self.get(primary),
            None => Ok(None),
        }
    }
}

fn unique_violation(index: &str) -> HostError {
    HostError::constraint(format!(
        "unable to add key to index {index:?}: uniqueness requirement not satisfied"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(key_path: Option<&str>, auto_increment: bool) -> StoreParams {
        StoreParams {
            key_path: key_path.map(|p| KeyPath::parse(p).unwrap()),
            auto_increment,
        }
    }

    fn user(email: &str) -> Value {
        Value::from_pairs([("email", email)])
    }

    #[test]
    fn generator_starts_at_one() {
        let mut store = ObjectStore::new(&params(None, true));
        let (k1, _) = store.resolve_key(user("a"), None).unwrap();
        let (k2, _) = store.resolve_key(user("b"), None).unwrap();
        assert_eq!(k1, Key::Integer(1));
        assert_eq!(k2, Key::Integer(2));
    }

    #[test]
    fn explicit_key_bumps_generator() {
        let mut store = ObjectStore::new(&params(None, true));
        store.resolve_key(user("a"), Some(Key::Integer(10))).unwrap();
        let (next, _) = store.resolve_key(user("b"), None).unwrap();
        assert_eq!(next, Key::Integer(11));
    }

    #[test]
    fn fractional_key_bumps_generator_past_its_floor() {
        let mut store = ObjectStore::new(&params(None, true));
        store.resolve_key(user("a"), Some(Key::Float(4.5))).unwrap();
        let (next, _) = store.resolve_key(user("b"), None).unwrap();
        assert_eq!(next, Key::Integer(5));

        store.resolve_key(user("c"), Some(Key::Float(f64::INFINITY))).unwrap();
        assert!(matches!(
            store.resolve_key(user("d"), None),
            Err(HostError::Constraint { .. })
        ));
    }

    #[test]
    fn nan_key_is_a_data_error() {
        let mut store = ObjectStore::new(&params(None, false));
        let result = store.resolve_key(user("a"), Some(Key::Float(f64::NAN)));
        assert!(matches!(result, Err(HostError::Data { .. })));
    }

    #[test]
    fn text_key_leaves_generator_alone() {
        let mut store = ObjectStore::new(&params(None, true));
        store.resolve_key(user("a"), Some(Key::from("x"))).unwrap();
        let (next, _) = store.resolve_key(user("b"), None).unwrap();
        assert_eq!(next, Key::Integer(1));
    }

    #[test]
    fn inline_key_is_injected() {
        let mut store = ObjectStore::new(&params(Some("id"), true));
        let (key, record) = store.resolve_key(user("a"), None).unwrap();
        assert_eq!(key, Key::Integer(1));
        assert_eq!(record.get("id"), Some(&Value::Integer(1)));
    }

    #[test]
    fn inline_key_rejects_explicit_key() {
        let mut store = ObjectStore::new(&params(Some("email"), false));
        let result = store.resolve_key(user("a"), Some(Key::Integer(1)));
        assert!(matches!(result, Err(HostError::Data { .. })));
    }

    #[test]
    fn missing_key_is_a_data_error() {
        let mut store = ObjectStore::new(&params(None, false));
        assert!(matches!(
            store.resolve_key(user("a"), None),
            Err(HostError::Data { .. })
        ));

        let mut store = ObjectStore::new(&params(Some("id"), false));
        assert!(matches!(
            store.resolve_key(user("a"), None),
            Err(HostError::Data { .. })
        ));
    }

    #[test]
    fn unique_index_rejects_duplicates() {
        let mut store = ObjectStore::new(&params(None, true));
        store
            .add_index("by_email", &KeyPath::parse("email").unwrap(), true)
            .unwrap();

        store.write(Key::Integer(1), &user("a@x.com")).unwrap();
        let result = store.write(Key::Integer(2), &user("a@x.com"));
        assert!(matches!(result, Err(HostError::Constraint { .. })));
        assert_eq!(store.len(), 1);

        // Rewriting the same record under its own key is fine.
        store.write(Key::Integer(1), &user("a@x.com")).unwrap();
    }

    #[test]
    fn index_follows_overwrites() {
        let mut store = ObjectStore::new(&params(None, false));
        store
            .add_index("by_email", &KeyPath::parse("email").unwrap(), false)
            .unwrap();

        store.write(Key::Integer(1), &user("old")).unwrap();
        store.write(Key::Integer(1), &user("new")).unwrap();

        assert_eq!(store.get_by_index("by_email", &Key::from("old")).unwrap(), None);
        assert_eq!(
            store.get_by_index("by_email", &Key::from("new")).unwrap(),
            Some(user("new"))
        );
    }

    #[test]
    fn restore_undoes_write() {
        let mut store = ObjectStore::new(&params(None, false));
        store
            .add_index("by_email", &KeyPath::parse("email").unwrap(), true)
            .unwrap();

        store.write(Key::Integer(1), &user("a")).unwrap();
        let previous = store.write(Key::Integer(1), &user("b")).unwrap();
        store.restore(Key::Integer(1), previous).unwrap();

        assert_eq!(store.get(&Key::Integer(1)).unwrap(), Some(user("a")));
        assert!(store.get_by_index("by_email", &Key::from("b")).unwrap().is_none());
    }

    #[test]
    fn unique_index_over_duplicates_fails() {
        let mut store = ObjectStore::new(&params(None, false));
        store.write(Key::Integer(1), &user("same")).unwrap();
        store.write(Key::Integer(2), &user("same")).unwrap();

        let result = store.add_index("by_email", &KeyPath::parse("email").unwrap(), true);
        assert!(matches!(result, Err(HostError::Constraint { .. })));
    }
}
