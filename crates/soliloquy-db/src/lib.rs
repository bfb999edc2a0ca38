//! `SQLite` persistence for soliloquy.
//!
//! Provides the [`SqliteKeyValueStore`] implementation of the core
//! `KeyValueStore` port plus database setup.

#![deny(unsafe_code)]

pub mod factory;
pub mod kv_store;
pub mod setup;

pub use factory::CoreFactory;
pub use kv_store::SqliteKeyValueStore;

pub use setup::setup_database;
#[cfg(any(test, feature = "test-utils"))]
pub use setup::setup_test_database;
