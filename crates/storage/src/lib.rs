//! Storage abstraction and implementations for progmon.
//!
//! This crate provides a trait-based state store with a JSON file
//! reference implementation, plus the atomic write primitive it is built on.

#![warn(missing_docs)]

pub mod trait_;
pub mod json_storage;
pub mod atomic;

pub use trait_::{StateStore, StorageError, Result};
pub use json_storage::JsonStateStore;
pub use atomic::write_text_atomic;
