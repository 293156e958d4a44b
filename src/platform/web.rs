//! Browser LocalStorage backend (wasm32 only)
//!
//! LocalStorage writes are synchronous, so `save()` has nothing to commit.

use web_sys::Storage;

use crate::error::StoreError;

use super::storage::KeyValueStore;

pub struct LocalStorage {
    storage: Storage,
}

impl LocalStorage {
    /// Grab `window.localStorage`, if the browser exposes it
    pub fn open() -> Result<Self, StoreError> {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten()
            .ok_or_else(|| StoreError::Unavailable("window.localStorage".to_string()))?;
        Ok(Self { storage })
    }
}

impl KeyValueStore for LocalStorage {
    fn has_key(&self, key: &str) -> bool {
        matches!(self.storage.get_item(key), Ok(Some(_)))
    }

    fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.storage
            .get_item(key)
            .map_err(|e| StoreError::Unavailable(format!("{:?}", e)))
    }

    fn set_string(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        // Quota exceeded surfaces here
        self.storage
            .set_item(key, value)
            .map_err(|_| StoreError::WriteRejected(key.to_string()))
    }

    fn delete_key(&mut self, key: &str) -> Result<(), StoreError> {
        self.storage
            .remove_item(key)
            .map_err(|e| StoreError::Unavailable(format!("{:?}", e)))
    }

    fn save(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}
