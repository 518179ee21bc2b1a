//! resgpu-store: Node record storage
//!
//! This crate provides the key-value stores node records live in:
//! - The `Store` trait and record key layout
//! - An in-memory store for embedded runs
//! - A JSON file store for persistent runs

pub mod file;
pub mod memory;
pub mod traits;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use traits::{node_key, KeyValue, Store};

use resgpu_core::{StoreBackend, StoreConfig};
use std::sync::Arc;

/// Open the store described by `config`
pub fn open(config: &StoreConfig) -> Arc<dyn Store> {
    match config.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::File => Arc::new(FileStore::new(config.path.clone())),
    }
}
