//! Slotkeeper - versioned save slots over a key-value store
//!
//! Core modules:
//! - `persistence`: Record registry, change tracking, debounced flushing
//! - `platform`: Key-value store backends (memory, file, LocalStorage)
//! - `settings`: Flush interval and key naming
//! - `common`, `highscores`: Ready-made save slots

pub mod common;
pub mod error;
pub mod highscores;
pub mod persistence;
pub mod platform;
pub mod settings;

pub use common::StorageCommon;
pub use error::{StorageError, StorageResult, StoreError};
pub use highscores::HighScores;
pub use persistence::{
    ChangeTracker, FlushOutcome, Record, RecordSet, Registry, Reset, RunOnce, StorageModule,
};
pub use platform::{KeyValueStore, MemoryStore};
pub use settings::StorageSettings;

/// Storage configuration constants
pub mod consts {
    /// Seconds between automatic flushes of dirty data
    pub const DEFAULT_SAVE_INTERVAL: f32 = 1.0;
    /// Prefix for every durable key
    pub const DEFAULT_KEY_PREFIX: &str = "slotkeeper";
}
