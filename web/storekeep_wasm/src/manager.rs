//! The JavaScript-facing manager.

use crate::convert::{from_js, key_from_js, key_to_js, to_js};
use crate::error::{WasmError, WasmResult};
use crate::host::IdbHost;
use js_sys::{Array, Promise};
use std::future::Future;
use std::rc::Rc;
use std::sync::Arc;
use storekeep_codec::Key;
use storekeep_core::{CollectionConfig, DbManager as CoreManager, MigrationReport};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

/// A manager for one IndexedDB database.
///
/// Every method returns a `Promise`. Rejections are `Error`s whose `name`
/// is the error family and whose `kind` names the specific failure.
///
/// ## Example
///
/// ```javascript
/// const db = new DbManager("app");
/// await db.createCollection("users", {
///     primaryKey: { autoIncrement: true },
///     indexes: [{ name: "email", unique: true }],
/// });
///
/// const key = await db.put("users", { name: "A", email: "a@x.com" });
/// const user = await db.read("users", { indexName: "by_email", indexKey: "a@x.com" });
/// ```
#[wasm_bindgen]
pub struct DbManager {
    inner: Rc<CoreManager<IdbHost>>,
}

#[wasm_bindgen]
impl DbManager {
    /// Creates a manager for the database `name`. Nothing is opened yet.
    #[wasm_bindgen(constructor)]
    pub fn new(name: &str) -> Result<DbManager, JsValue> {
        let host = IdbHost::new()?;
        #[allow(clippy::arc_with_non_send_sync)]
        let inner = CoreManager::new(Arc::new(host), name).map_err(WasmError::from)?;
        Ok(DbManager {
            inner: Rc::new(inner),
        })
    }

    /// Database name.
    #[wasm_bindgen(getter)]
    pub fn name(&self) -> String {
        self.inner.name().to_string()
    }

    /// Creates a collection: `{primaryKey: {keyPath?, autoIncrement?}, indexes: [{name, unique}]}`.
    ///
    /// Resolves to the new schema version.
    #[wasm_bindgen(js_name = createCollection)]
    pub fn create_collection(&self, name: String, config: JsValue) -> Promise {
        self.spawn(move |db| async move {
            let config: CollectionConfig = if config.is_undefined() || config.is_null() {
                CollectionConfig::new()
            } else {
                serde_wasm_bindgen::from_value(config)?
            };
            let report = db.create_collection(&name, config).await?;
            Ok(report_to_js(&report))
        })
    }

    /// Deletes a collection and its records, resolving to the new schema version.
    #[wasm_bindgen(js_name = deleteCollection)]
    pub fn delete_collection(&self, name: String) -> Promise {
        self.spawn(move |db| async move {
            let report = db.delete_collection(&name).await?;
            Ok(report_to_js(&report))
        })
    }

    /// Inserts or replaces a record, resolving to its key.
    pub fn put(&self, store: String, record: JsValue, key: JsValue) -> Promise {
        self.spawn(move |db| async move {
            let record = from_js(record).map_err(input_error)?;
            let key = optional_key(key)?;
            let key = db.put(&store, record, key).await?;
            key_to_js(&key).map_err(input_error)
        })
    }

    /// Deletes the record under `key`.
    pub fn delete(&self, store: String, key: JsValue) -> Promise {
        self.spawn(move |db| async move {
            let key = key_from_js(key).map_err(input_error)?;
            db.delete(&store, key).await?;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Deletes every record in a collection.
    #[wasm_bindgen(js_name = deleteAll)]
    pub fn delete_all(&self, store: String) -> Promise {
        self.spawn(move |db| async move {
            db.delete_all(&store).await?;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Reads by `{key}`, by `{indexName, indexKey}`, or everything.
    pub fn read(&self, store: String, query: JsValue) -> Promise {
        self.spawn(move |db| async move {
            let query = from_js(query).map_err(input_error)?;
            let result = db.read_value(&store, &query).await?;
            to_js(&result.into_value()).map_err(input_error)
        })
    }

    /// Number of records in a collection.
    pub fn count(&self, store: String) -> Promise {
        self.spawn(move |db| async move {
            let count = db.count(&store).await?;
            Ok(JsValue::from_f64(count as f64))
        })
    }

    /// Names of the collections.
    #[wasm_bindgen(js_name = collectionNames)]
    pub fn collection_names(&self) -> Promise {
        self.spawn(move |db| async move {
            let names = db.collection_names().await?;
            Ok(names.into_iter().map(JsValue::from).collect::<Array>().into())
        })
    }

    /// Stored schema version.
    pub fn version(&self) -> Promise {
        self.spawn(move |db| async move {
            let version = db.version().await?;
            Ok(JsValue::from_f64(version as f64))
        })
    }

    /// Deletes the whole database.
    #[wasm_bindgen(js_name = deleteDatabase)]
    pub fn delete_database(&self) -> Promise {
        self.spawn(move |db| async move {
            db.delete_database().await?;
            Ok(JsValue::UNDEFINED)
        })
    }
}

impl DbManager {
    fn spawn<F, Fut>(&self, operation: F) -> Promise
    where
        F: FnOnce(Rc<CoreManager<IdbHost>>) -> Fut,
        Fut: Future<Output = WasmResult<JsValue>> + 'static,
    {
        let future = operation(Rc::clone(&self.inner));
        future_to_promise(async move { future.await.map_err(JsValue::from) })
    }
}

fn input_error(err: storekeep_host::HostError) -> WasmError {
    WasmError::InvalidInput(err.to_string())
}

fn optional_key(key: JsValue) -> WasmResult<Option<Key>> {
    if key.is_undefined() || key.is_null() {
        Ok(None)
    } else {
        key_from_js(key).map(Some).map_err(input_error)
    }
}

fn report_to_js(report: &MigrationReport) -> JsValue {
    JsValue::from_f64(report.new_version as f64)
}
