//! # Storekeep Codec
//!
//! Record values, keys and key paths for Storekeep.
//!
//! This crate provides:
//! - [`Value`], the structured record model stored in collections
//! - [`Key`], the totally ordered subset of values usable as primary and
//!   index keys
//! - [`KeyPath`], dotted field paths used to derive keys from records
//! - CBOR encoding of records, used by hosts to store structured clones
//!
//! ## Key Ordering
//!
//! Keys compare by type first, then by content:
//! number < text < bytes < array. Integer and float keys are both numbers
//! and compare by value. Arrays compare element by element, a shorter array
//! sorting before any longer array it prefixes.
//!
//! ## Usage
//!
//! ```
//! use storekeep_codec::{from_cbor, to_cbor, Key, KeyPath, Value};
//!
//! let record = Value::from_pairs([("email", Value::from("a@x.com"))]);
//! let path = KeyPath::parse("email").unwrap();
//! assert_eq!(path.extract_key(&record), Some(Key::from("a@x.com")));
//!
//! let bytes = to_cbor(&record).unwrap();
//! assert_eq!(from_cbor(&bytes).unwrap(), record);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cbor;
mod error;
mod key;
mod path;
mod value;

pub use cbor::{from_cbor, to_cbor};
pub use error::{CodecError, CodecResult};
pub use key::Key;
pub use path::KeyPath;
pub use value::Value;
