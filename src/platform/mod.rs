//! Platform abstraction layer
//!
//! The storage system only ever talks to a durable string key-value store.
//! Backends:
//! - `MemoryStore`: shared in-memory map (tests, headless hosts)
//! - `FileStore`: JSON file with atomic commit (native)
//! - `LocalStorage`: browser `window.localStorage` (wasm32)

pub mod storage;

#[cfg(not(target_arch = "wasm32"))]
pub mod file;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use storage::{KeyValueStore, MemoryStore};

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileStore;

#[cfg(target_arch = "wasm32")]
pub use web::LocalStorage;
