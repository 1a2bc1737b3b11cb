//! Browser IndexedDB as a [`HostEngine`].
//!
//! ## Blocked Opens
//!
//! A browser keeps a blocked version change pending until the other
//! connections close, rather than failing it. Every [`IdbConnection`] closes
//! itself when another connection asks for a version change, so schema
//! changes from other tabs running these bindings go through; a page that
//! holds a connection open indefinitely stalls the open. Blocked opens are
//! reported on the console.

use crate::convert::{from_js, key_from_js, key_to_js, optional_from_js, to_js};
use crate::error::{host_error, WasmError, WasmResult};
use crate::request::{completion, wait};
use crate::utils::{console_warn, sorted_names};
use js_sys::{Array, Object, Reflect};
use std::cell::RefCell;
use std::rc::Rc;
use storekeep_codec::{Key, KeyPath, Value};
use storekeep_host::{
    DatabaseInfo, HostConnection, HostEngine, HostError, HostResult, HostTransaction, IndexInfo,
    OpenRequest, SchemaEditor, StoreInfo, StoreParams, TransactionMode, VersionChange,
};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    Event, IdbDatabase, IdbFactory, IdbIndexParameters, IdbObjectStore, IdbObjectStoreParameters,
    IdbOpenDbRequest, IdbTransaction, IdbTransactionMode, IdbVersionChangeEvent,
};

/// Largest version a browser engine accepts.
const MAX_VERSION: u64 = (1 << 53) - 1;

/// The IndexedDB factory of the current global scope.
#[derive(Debug, Clone)]
pub struct IdbHost {
    factory: IdbFactory,
}

impl IdbHost {
    /// Looks up `indexedDB` on the global object (window or worker).
    ///
    /// # Errors
    ///
    /// Fails with [`WasmError::NotSupported`] where IndexedDB is unavailable.
    pub fn new() -> WasmResult<Self> {
        let factory = Reflect::get(&js_sys::global(), &"indexedDB".into())
            .ok()
            .and_then(|f| f.dyn_into::<IdbFactory>().ok())
            .ok_or_else(|| WasmError::NotSupported("IndexedDB not available".into()))?;
        Ok(Self { factory })
    }

    fn open_request(&self, name: &str, version: Option<u64>) -> HostResult<IdbOpenDbRequest> {
        match version {
            Some(v) if v == 0 || v > MAX_VERSION => Err(HostError::InvalidVersion { version: v }),
            Some(v) => self.factory.open_with_f64(name, v as f64).map_err(host_error),
            None => self.factory.open(name).map_err(host_error),
        }
    }
}

impl HostEngine for IdbHost {
    type Connection = IdbConnection;

    async fn open(&self, name: &str, request: OpenRequest) -> HostResult<IdbConnection> {
        let open = self.open_request(name, request.version)?;
        let aborted: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));

        let on_upgrade = request.on_upgrade.map(|callback| {
            let open = open.clone();
            let aborted = Rc::clone(&aborted);
            Closure::once(move |event: IdbVersionChangeEvent| {
                let change = VersionChange {
                    old_version: event.old_version() as u64,
                    new_version: event.new_version().unwrap_or_default() as u64,
                };
                let Some(tx) = open.transaction() else {
                    return;
                };
                let db = match open.result() {
                    Ok(db) => db.unchecked_into::<IdbDatabase>(),
                    Err(_) => return,
                };
                let mut editor = IdbSchemaEditor { db, tx: tx.clone() };
                if let Err(err) = callback(&mut editor, change) {
                    *aborted.borrow_mut() = Some(err.to_string());
                    let _ = tx.abort();
                }
            })
        });
        if let Some(closure) = &on_upgrade {
            open.set_onupgradeneeded(Some(closure.as_ref().unchecked_ref()));
        }
        let on_blocked = {
            let name = name.to_string();
            Closure::once(move |_: Event| {
                console_warn(&format!("open of {name:?} blocked by other connections"));
            })
        };
        open.set_onblocked(Some(on_blocked.as_ref().unchecked_ref()));

        let result = wait(&open).await;
        open.set_onupgradeneeded(None);
        open.set_onblocked(None);

        match result {
            Ok(db) => Ok(IdbConnection::new(db.unchecked_into())),
            Err(err) => match aborted.borrow_mut().take() {
                Some(message) => Err(HostError::UpgradeAborted { message }),
                None => Err(err),
            },
        }
    }

    async fn delete_database(&self, name: &str) -> HostResult<()> {
        let request = self.factory.delete_database(name).map_err(host_error)?;
        wait(&request).await.map(|_| ())
    }

    async fn databases(&self) -> HostResult<Vec<DatabaseInfo>> {
        // `indexedDB.databases()` is not in every engine's bindings yet.
        let method = Reflect::get(&self.factory, &"databases".into()).map_err(host_error)?;
        let method: js_sys::Function = method.dyn_into().map_err(|_| HostError::Engine {
            name: "NotSupportedError".into(),
            message: "indexedDB.databases() is not available".into(),
        })?;
        let promise: js_sys::Promise = method
            .call0(&self.factory)
            .map_err(host_error)?
            .unchecked_into();
        let list = JsFuture::from(promise).await.map_err(host_error)?;

        let mut databases: Vec<DatabaseInfo> = Array::from(&list)
            .iter()
            .filter_map(|entry| {
                let name = Reflect::get(&entry, &"name".into()).ok()?.as_string()?;
                let version = Reflect::get(&entry, &"version".into()).ok()?.as_f64()? as u64;
                (version > 0).then_some(DatabaseInfo { name, version })
            })
            .collect();
        databases.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(databases)
    }
}

/// An open `IDBDatabase`.
///
/// Closes when dropped, and when another connection requests a version
/// change.
pub struct IdbConnection {
    db: IdbDatabase,
    name: String,
    version: u64,
    _on_version_change: Closure<dyn FnMut(Event)>,
}

impl IdbConnection {
    fn new(db: IdbDatabase) -> Self {
        let on_version_change = {
            let db = db.clone();
            Closure::<dyn FnMut(Event)>::new(move |_: Event| db.close())
        };
        db.set_onversionchange(Some(on_version_change.as_ref().unchecked_ref()));
        Self {
            name: db.name(),
            version: db.version() as u64,
            db,
            _on_version_change: on_version_change,
        }
    }
}

impl HostConnection for IdbConnection {
    type Transaction = IdbTransactionHandle;

    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn object_store_names(&self) -> Vec<String> {
        sorted_names(&self.db.object_store_names())
    }

    fn contains_store(&self, name: &str) -> bool {
        self.db.object_store_names().contains(name)
    }

    fn transaction(
        &self,
        stores: &[&str],
        mode: TransactionMode,
    ) -> HostResult<IdbTransactionHandle> {
        if stores.is_empty() {
            return Err(HostError::invalid_access("transaction scope is empty"));
        }
        if let Some(missing) = stores.iter().find(|s| !self.contains_store(s)) {
            return Err(HostError::not_found(format!("object store {missing:?}")));
        }
        let names: Array = stores.iter().map(|s| JsValue::from_str(s)).collect();
        let idb_mode = match mode {
            TransactionMode::ReadOnly => IdbTransactionMode::Readonly,
            TransactionMode::ReadWrite => IdbTransactionMode::Readwrite,
        };
        let tx = self
            .db
            .transaction_with_str_sequence_and_mode(&names, idb_mode)
            .map_err(host_error)?;
        Ok(IdbTransactionHandle {
            tx,
            mode,
            finished: false,
        })
    }

    fn close(self) {
        drop(self);
    }
}

impl Drop for IdbConnection {
    fn drop(&mut self) {
        self.db.set_onversionchange(None);
        self.db.close();
    }
}

/// A transaction over an `IDBDatabase`. Aborts when dropped uncommitted.
pub struct IdbTransactionHandle {
    tx: IdbTransaction,
    mode: TransactionMode,
    finished: bool,
}

impl IdbTransactionHandle {
    fn store(&self, name: &str) -> HostResult<IdbObjectStore> {
        self.tx.object_store(name).map_err(host_error)
    }

    fn writable(&self, name: &str) -> HostResult<IdbObjectStore> {
        if self.mode == TransactionMode::ReadOnly {
            return Err(HostError::ReadOnly {
                store: name.to_string(),
            });
        }
        self.store(name)
    }
}

impl HostTransaction for IdbTransactionHandle {
    fn mode(&self) -> TransactionMode {
        self.mode
    }

    fn store_info(&self, store: &str) -> HostResult<StoreInfo> {
        let object_store = self.store(store)?;
        let mut indexes = Vec::new();
        for name in sorted_names(&object_store.index_names()) {
            let index = object_store.index(&name).map_err(host_error)?;
            let key_path = key_path_from_js(index.key_path().map_err(host_error)?)?
                .ok_or_else(|| HostError::data(format!("index {name:?} has no field path")))?;
            indexes.push(IndexInfo {
                name,
                key_path,
                unique: index.unique(),
            });
        }
        Ok(StoreInfo {
            name: store.to_string(),
            key_path: key_path_from_js(object_store.key_path().map_err(host_error)?)?,
            auto_increment: object_store.auto_increment(),
            indexes,
        })
    }

    async fn put(&self, store: &str, record: Value, key: Option<Key>) -> HostResult<Key> {
        let object_store = self.writable(store)?;
        let value = to_js(&record)?;
        let request = match &key {
            Some(key) => object_store.put_with_key(&value, &key_to_js(key)?),
            None => object_store.put(&value),
        }
        .map_err(host_error)?;
        let stored = wait(&request).await?;
        match key {
            Some(key) => Ok(key),
            None => key_from_js(stored),
        }
    }

    async fn get(&self, store: &str, key: &Key) -> HostResult<Option<Value>> {
        let request = self
            .store(store)?
            .get(&key_to_js(key)?)
            .map_err(host_error)?;
        optional_from_js(wait(&request).await?)
    }

    async fn get_all(&self, store: &str) -> HostResult<Vec<Value>> {
        let request = self.store(store)?.get_all().map_err(host_error)?;
        let records = wait(&request).await?;
        Array::from(&records).iter().map(from_js).collect()
    }

    async fn get_by_index(&self, store: &str, index: &str, key: &Key) -> HostResult<Option<Value>> {
        let index = self.store(store)?.index(index).map_err(host_error)?;
        let request = index.get(&key_to_js(key)?).map_err(host_error)?;
        optional_from_js(wait(&request).await?)
    }

    async fn delete(&self, store: &str, key: &Key) -> HostResult<()> {
        let request = self
            .writable(store)?
            .delete(&key_to_js(key)?)
            .map_err(host_error)?;
        wait(&request).await.map(|_| ())
    }

    async fn clear(&self, store: &str) -> HostResult<()> {
        let request = self.writable(store)?.clear().map_err(host_error)?;
        wait(&request).await.map(|_| ())
    }

    async fn count(&self, store: &str) -> HostResult<u64> {
        let request = self.store(store)?.count().map_err(host_error)?;
        let count = wait(&request).await?;
        Ok(count.as_f64().unwrap_or_default() as u64)
    }

    async fn commit(mut self) -> HostResult<()> {
        self.finished = true;
        completion(&self.tx).await
    }
}

impl Drop for IdbTransactionHandle {
    fn drop(&mut self) {
        if !self.finished {
            // Fails only if the transaction already finished.
            let _ = self.tx.abort();
        }
    }
}

/// Schema edits through the `versionchange` transaction of an open.
struct IdbSchemaEditor {
    db: IdbDatabase,
    tx: IdbTransaction,
}

impl SchemaEditor for IdbSchemaEditor {
    fn object_store_names(&self) -> Vec<String> {
        sorted_names(&self.db.object_store_names())
    }

    fn create_object_store(&mut self, name: &str, params: &StoreParams) -> HostResult<()> {
        if params.auto_increment && params.key_path.as_ref().is_some_and(KeyPath::is_empty) {
            return Err(HostError::invalid_access(
                "auto-increment requires a non-empty key path",
            ));
        }
        let options = Object::new();
        set_option(&options, "autoIncrement", &params.auto_increment.into())?;
        if let Some(path) = &params.key_path {
            set_option(&options, "keyPath", &path.as_str().into())?;
        }
        self.db
            .create_object_store_with_optional_parameters(
                name,
                options.unchecked_ref::<IdbObjectStoreParameters>(),
            )
            .map_err(host_error)?;
        Ok(())
    }

    fn create_index(
        &mut self,
        store: &str,
        name: &str,
        key_path: &KeyPath,
        unique: bool,
    ) -> HostResult<()> {
        let options = Object::new();
        set_option(&options, "unique", &unique.into())?;
        self.tx
            .object_store(store)
            .map_err(host_error)?
            .create_index_with_str_and_optional_parameters(
                name,
                key_path.as_str(),
                options.unchecked_ref::<IdbIndexParameters>(),
            )
            .map_err(host_error)?;
        Ok(())
    }

    fn delete_object_store(&mut self, name: &str) -> HostResult<()> {
        self.db.delete_object_store(name).map_err(host_error)
    }
}

fn set_option(options: &Object, field: &str, value: &JsValue) -> HostResult<()> {
    Reflect::set(options, &field.into(), value)
        .map(|_| ())
        .map_err(host_error)
}

/// Reads an engine key path; only string paths are produced by these bindings.
fn key_path_from_js(path: JsValue) -> HostResult<Option<KeyPath>> {
    match path.as_string() {
        Some(path) => KeyPath::parse(path).map(Some).map_err(HostError::from),
        None => Ok(None),
    }
}
