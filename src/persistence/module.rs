//! Host-facing storage module
//!
//! Wraps a [`StorageManager`] and tracks whether the system is live. While it
//! is not, every operation is a no-op (or `NotInitialized` for lookups), so a
//! host can wire ticks up before the save data exists.

use crate::error::{StorageError, StorageResult};
use crate::platform::KeyValueStore;
use crate::settings::StorageSettings;

use super::manager::{RunOnce, StorageManager};
use super::record::{Record, RecordSet, Registry};
use super::tasks::TaskQueue;

#[derive(Debug)]
pub struct StorageModule<S: KeyValueStore> {
    manager: StorageManager<S>,
    initialized: bool,
}

impl<S: KeyValueStore> StorageModule<S> {
    pub fn new(store: S) -> Self {
        Self::with_settings(store, StorageSettings::default())
    }

    pub fn with_settings(store: S, settings: StorageSettings) -> Self {
        Self {
            manager: StorageManager::new(store, &settings),
            initialized: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Register the save slots and load stored data into them.
    ///
    /// With `fully_initialize == false` the data is loaded but the module
    /// stays not-live, and `initialize` may be called again later.
    pub fn initialize(&mut self, records: RecordSet, fully_initialize: bool) -> StorageResult<()> {
        if self.initialized {
            log::error!("Storage system has already been initialized!");
            return Err(StorageError::AlreadyInitialized);
        }

        if records.is_empty() {
            log::error!("Storage list is empty!");
            return Err(StorageError::EmptyRegistry);
        }

        if let Err(e) = self.manager.initialize(records) {
            log::error!("Storage initialization failed: {}", e);
            return Err(e);
        }

        self.initialized = fully_initialize;
        if self.initialized {
            log::info!(
                "Storage system initialized successfully ({} records, version {})",
                self.manager.registry().len(),
                self.manager.local_version()
            );
        }
        Ok(())
    }

    pub fn get<T: Record>(&self) -> StorageResult<&T> {
        if !self.initialized {
            return Err(StorageError::NotInitialized);
        }
        self.manager.get::<T>()
    }

    pub fn get_mut<T: Record>(&mut self) -> StorageResult<&mut T> {
        if !self.initialized {
            return Err(StorageError::NotInitialized);
        }
        self.manager.get_mut::<T>()
    }

    pub fn force_save_to_disk(&mut self) {
        if self.initialized {
            self.manager.force_save_to_disk();
        }
    }

    pub fn add_update_task<F>(&self, task: F)
    where
        F: FnOnce(&mut Registry) + Send + 'static,
    {
        if self.initialized {
            self.manager.add_update_task(task);
        }
    }

    /// Handle for enqueueing update tasks from other threads.
    ///
    /// Tasks pushed while the module is not live are dropped by the next
    /// `initialize`, never run against the next set of records.
    pub fn task_queue(&self) -> TaskQueue {
        self.manager.task_queue()
    }

    pub fn run_once<F, E>(&mut self, callback: F) -> Result<RunOnce, E>
    where
        F: FnOnce(&mut Registry) -> Result<(), E>,
    {
        if !self.initialized {
            return Ok(RunOnce::Skipped);
        }
        self.manager.run_once(callback)
    }

    pub fn clear(&mut self) {
        if self.initialized {
            self.manager.clear();
        }
    }

    /// Host tick. Returns whether this tick wrote to the store.
    pub fn tick(&mut self, elapsed: f32) -> bool {
        if !self.initialized {
            return false;
        }
        self.manager.tick(elapsed)
    }

    /// Flush one last time and drop every record
    pub fn shutdown(&mut self) {
        if self.manager.is_loaded() {
            self.manager.shutdown();
            log::info!("Storage system shut down");
        }
        self.initialized = false;
    }

    /// Wipe the durable keys so the next start is a first run
    pub fn delete_local_storage(&mut self) -> StorageResult<()> {
        self.manager.delete_local_storage()
    }

    pub fn local_version(&self) -> u64 {
        self.manager.local_version()
    }

    pub fn last_saved_version(&self) -> u64 {
        self.manager.last_saved_version()
    }

    pub fn save_interval(&self) -> f32 {
        self.manager.save_interval()
    }

    pub fn set_save_interval(&mut self, seconds: f32) {
        self.manager.set_save_interval(seconds);
    }

    pub fn store(&self) -> &S {
        self.manager.store()
    }

    pub fn into_store(self) -> S {
        self.manager.into_store()
    }
}
