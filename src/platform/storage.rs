//! Key-value store contract and the in-memory backend

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::StoreError;

/// Durable string key-value store (PlayerPrefs / LocalStorage style).
///
/// Writes may be buffered until [`KeyValueStore::save`] commits them.
pub trait KeyValueStore {
    fn has_key(&self, key: &str) -> bool;

    /// Returns `None` when the key is absent.
    fn get_string(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set_string(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    fn delete_key(&mut self, key: &str) -> Result<(), StoreError>;

    /// Commit pending writes to the backing medium
    fn save(&mut self) -> Result<(), StoreError>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn has_key(&self, key: &str) -> bool {
        (**self).has_key(key)
    }

    fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get_string(key)
    }

    fn set_string(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set_string(key, value)
    }

    fn delete_key(&mut self, key: &str) -> Result<(), StoreError> {
        (**self).delete_key(key)
    }

    fn save(&mut self) -> Result<(), StoreError> {
        (**self).save()
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    entries: HashMap<String, String>,
    fail_writes: bool,
    write_count: usize,
    save_count: usize,
}

/// In-memory store.
///
/// Clones share the same map, so a test can hand one clone to the storage
/// module and keep another to inspect what was written, or to start a second
/// "process lifetime" against the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `set_string`/`save` fail until switched off
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.lock().fail_writes = fail;
    }

    /// Number of successful `set_string` calls
    pub fn write_count(&self) -> usize {
        self.inner.lock().write_count
    }

    /// Number of successful `save` calls
    pub fn save_count(&self) -> usize {
        self.inner.lock().save_count
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn has_key(&self, key: &str) -> bool {
        self.inner.lock().entries.contains_key(key)
    }

    fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.inner.lock().entries.get(key).cloned())
    }

    fn set_string(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.fail_writes {
            return Err(StoreError::WriteRejected(key.to_string()));
        }
        inner.entries.insert(key.to_string(), value.to_string());
        inner.write_count += 1;
        Ok(())
    }

    fn delete_key(&mut self, key: &str) -> Result<(), StoreError> {
        self.inner.lock().entries.remove(key);
        Ok(())
    }

    fn save(&mut self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.fail_writes {
            return Err(StoreError::Unavailable("memory store is read-only".to_string()));
        }
        inner.save_count += 1;
        Ok(())
    }
}
