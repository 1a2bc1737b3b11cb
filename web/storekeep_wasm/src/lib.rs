//! # Storekeep WASM
//!
//! WebAssembly bindings for Storekeep over browser IndexedDB.
//!
//! This crate provides:
//! - [`IdbHost`], the browser's IndexedDB as a `storekeep_host::HostEngine`
//! - [`DbManager`], the JavaScript-friendly manager via wasm-bindgen
//! - Errors surfaced as JavaScript `Error`s named by family
//!
//! ## Usage
//!
//! ```javascript
//! import init, { DbManager } from 'storekeep_wasm';
//!
//! async function main() {
//!     await init();
//!
//!     const db = new DbManager("app");
//!     await db.createCollection("notes", {});
//!     await db.put("notes", { text: "hello" }, "n1");
//!
//!     const note = await db.read("notes", { key: "n1" });
//!     console.log(note);
//!
//!     try {
//!         await db.createCollection("notes", {});
//!     } catch (e) {
//!         console.log(e.name, e.kind); // "SchemaError" "DuplicateCollection"
//!     }
//! }
//! ```
//!
//! Works in windows and in Web Workers, wherever `indexedDB` is defined.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod convert;
mod error;
mod host;
mod manager;
mod request;
mod utils;

pub use error::*;
pub use host::{IdbConnection, IdbHost, IdbTransactionHandle};
pub use manager::*;

use wasm_bindgen::prelude::*;

/// Initialize the WASM module.
///
/// This sets up panic hooks for better error messages in the browser console.
#[wasm_bindgen(start)]
pub fn init() {
    utils::set_panic_hook();
}
