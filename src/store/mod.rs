//! Transactional persistence facade — key-addressed JSON documents with
//! in-memory caching and atomic snapshot-to-disk writes.

pub mod data_store;

pub use data_store::{DataStore, DataStoreFactory};
