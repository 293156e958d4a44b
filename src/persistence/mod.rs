//! Versioned, dirty-tracked save slots
//!
//! Features:
//! - Per-record change tracking feeding one monotonic local version
//! - Debounced flush (interval or forced) of the whole registry
//! - Base64-wrapped JSON payload, merged field-by-field on load
//! - Non-finite floats and 128-bit integers survive the JSON round trip
//! - Deferred update tasks drained right before each flush
//! - Durable run-once sentinel

mod codec;
mod json;
pub mod manager;
pub mod module;
pub mod record;
pub mod reset;
pub mod tasks;

pub use manager::{FlushOutcome, RunOnce, StorageManager};
pub use module::StorageModule;
pub use record::{ChangeTracker, Record, RecordSet, Registry, record_name};
pub use reset::{Reset, reset_to_default};
pub use tasks::{TaskQueue, UpdateTask};
