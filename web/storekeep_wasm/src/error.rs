//! Error types for WASM bindings.

use storekeep_core::DbError;
use storekeep_host::HostError;
use thiserror::Error;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::DomException;

/// Errors that can occur in the WASM bindings.
#[derive(Debug, Error)]
pub enum WasmError {
    /// A manager operation failed.
    #[error(transparent)]
    Db(#[from] DbError),

    /// A record, key or configuration could not be read from JavaScript.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Feature not supported in current environment.
    #[error("not supported: {0}")]
    NotSupported(String),
}

impl WasmError {
    /// Error family, used as the JavaScript `Error.name`.
    pub fn name(&self) -> &'static str {
        match self {
            WasmError::Db(err) => err.kind().family(),
            WasmError::InvalidInput(_) => "ValidationError",
            WasmError::NotSupported(_) => "ConnectionError",
        }
    }

    /// Specific kind, exposed as the `kind` property.
    pub fn kind(&self) -> &'static str {
        match self {
            WasmError::Db(err) => err.kind().as_str(),
            WasmError::InvalidInput(_) => "InvalidInput",
            WasmError::NotSupported(_) => "NotSupported",
        }
    }
}

impl From<WasmError> for JsValue {
    fn from(err: WasmError) -> Self {
        let error = js_sys::Error::new(&err.to_string());
        error.set_name(err.name());
        // Setting a property on a fresh Error object cannot fail.
        let _ = js_sys::Reflect::set(&error, &"kind".into(), &err.kind().into());
        error.into()
    }
}

impl From<serde_wasm_bindgen::Error> for WasmError {
    fn from(err: serde_wasm_bindgen::Error) -> Self {
        WasmError::InvalidInput(err.to_string())
    }
}

/// Result type for WASM operations.
pub type WasmResult<T> = Result<T, WasmError>;

/// Maps an exception thrown by an IndexedDB call to a host error.
pub(crate) fn host_error(value: JsValue) -> HostError {
    if let Some(exception) = value.dyn_ref::<DomException>() {
        return dom_error(exception);
    }
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        return HostError::Engine {
            name: String::from(error.name()),
            message: String::from(error.message()),
        };
    }
    HostError::Engine {
        name: "UnknownError".into(),
        message: value.as_string().unwrap_or_else(|| format!("{value:?}")),
    }
}

/// Maps a `DOMException` by name.
pub(crate) fn dom_error(exception: &DomException) -> HostError {
    let message = exception.message();
    match exception.name().as_str() {
        "NotFoundError" => HostError::not_found(message),
        "ConstraintError" => HostError::constraint(message),
        "DataError" => HostError::data(message),
        "InvalidAccessError" => HostError::invalid_access(message),
        "TransactionInactiveError" => HostError::TransactionInactive,
        "InvalidStateError" => HostError::Closed,
        name => HostError::Engine {
            name: name.to_string(),
            message,
        },
    }
}
