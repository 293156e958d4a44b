//! Records, change tracking and the record registry
//!
//! A record is a plain serde struct. Setters route writes through the
//! record's [`ChangeTracker`], which bumps the manager's local version once
//! per value-changing write. The tracker is a weak back-reference handed out
//! at registration, so it goes inert once the manager shuts down.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{StorageError, StorageResult};

use super::reset::Reset;
use super::{codec, json};

/// Registry name for a record type: the last path segment of its type name,
/// generics stripped (`my_game::save::Inventory<u8>` → `Inventory`).
pub fn record_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Change-notification handle held by every registered record
#[derive(Debug, Clone, Default)]
pub struct ChangeTracker {
    version: Weak<AtomicU64>,
}

impl ChangeTracker {
    pub(crate) fn new(version: &Arc<AtomicU64>) -> Self {
        Self {
            version: Arc::downgrade(version),
        }
    }

    /// Whether the owning manager is still alive
    pub fn is_attached(&self) -> bool {
        self.version.strong_count() > 0
    }

    /// Record one change. No-op when detached.
    pub fn mark_dirty(&self) {
        if let Some(version) = self.version.upgrade() {
            version.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Store `value` into `slot`, marking dirty only if it differs.
    /// Returns whether anything changed.
    pub fn set<T: PartialEq>(&self, slot: &mut T, value: T) -> bool {
        if *slot == value {
            return false;
        }
        *slot = value;
        self.mark_dirty();
        true
    }
}

/// A persisted save slot.
///
/// Implementors keep a `#[serde(skip)]` [`ChangeTracker`] field and route
/// every setter through it. Records that embed other records override
/// [`Record::attach_nested`] so the nested ones report changes too.
pub trait Record: Serialize + DeserializeOwned + Reset + 'static {
    fn tracker_mut(&mut self) -> &mut ChangeTracker;

    fn attach_nested(&mut self, _tracker: &ChangeTracker) {}

    /// Take on the persisted fields of `loaded`, a copy of this record with
    /// stored values merged in. The tracker is reattached afterwards.
    ///
    /// The default replaces the whole value. Records holding other
    /// `#[serde(skip)]` state override this to keep it.
    fn absorb(&mut self, loaded: Self) {
        *self = loaded;
    }

    fn attach(&mut self, tracker: ChangeTracker) {
        self.attach_nested(&tracker);
        *self.tracker_mut() = tracker;
    }
}

/// Object-safe view of a [`Record`] used inside the registry
pub(crate) trait DynRecord {
    fn name(&self) -> &'static str;
    fn attach_tracker(&mut self, tracker: ChangeTracker);
    fn encode_value(&self) -> serde_json::Result<Value>;
    fn merge_stored(&mut self, stored: &Value) -> serde_json::Result<()>;
    fn reset_record(&mut self);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Record> DynRecord for T {
    fn name(&self) -> &'static str {
        record_name::<T>()
    }

    fn attach_tracker(&mut self, tracker: ChangeTracker) {
        self.attach(tracker);
    }

    fn encode_value(&self) -> serde_json::Result<Value> {
        json::to_value(self)
    }

    /// Overlay stored fields onto the live value. Either every field lands
    /// or, on a type mismatch, none do.
    fn merge_stored(&mut self, stored: &Value) -> serde_json::Result<()> {
        if !stored.is_object() {
            return Err(serde::de::Error::custom(format!(
                "expected an object for '{}'",
                record_name::<T>()
            )));
        }

        let mut current = json::to_value(&*self)?;
        codec::overlay(&mut current, stored);
        let merged: T = json::from_value(current)?;

        let tracker = std::mem::take(self.tracker_mut());
        self.absorb(merged);
        self.attach(tracker);
        Ok(())
    }

    fn reset_record(&mut self) {
        Reset::reset(self);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Records handed to `initialize`, in the order given
#[derive(Default)]
pub struct RecordSet {
    records: Vec<Box<dyn DynRecord>>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T: Record>(mut self, record: T) -> Self {
        self.push(record);
        self
    }

    pub fn push<T: Record>(&mut self, record: T) {
        self.records.push(Box::new(record));
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl fmt::Debug for RecordSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.records.iter().map(|r| r.name()))
            .finish()
    }
}

/// Name → record map. Membership is fixed once built.
///
/// Field writes are single-owner: only whoever drives the ticks touches the
/// records, which `&mut` access enforces.
#[derive(Default)]
pub struct Registry {
    records: HashMap<&'static str, Box<dyn DynRecord>>,
}

impl Registry {
    /// Build from a record set, attaching `tracker` to every record
    pub(crate) fn build(set: RecordSet, tracker: &ChangeTracker) -> StorageResult<Self> {
        let mut records: HashMap<&'static str, Box<dyn DynRecord>> =
            HashMap::with_capacity(set.records.len());

        for mut record in set.records {
            let name = record.name();
            if records.contains_key(name) {
                return Err(StorageError::DuplicateRecord(name));
            }
            record.attach_tracker(tracker.clone());
            records.insert(name, record);
        }

        Ok(Self { records })
    }

    pub fn get<T: Record>(&self) -> StorageResult<&T> {
        let name = record_name::<T>();
        self.records
            .get(name)
            .and_then(|r| r.as_any().downcast_ref::<T>())
            .ok_or_else(|| StorageError::RecordNotFound(name.to_string()))
    }

    pub fn get_mut<T: Record>(&mut self) -> StorageResult<&mut T> {
        let name = record_name::<T>();
        self.records
            .get_mut(name)
            .and_then(|r| r.as_any_mut().downcast_mut::<T>())
            .ok_or_else(|| StorageError::RecordNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.records.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&'static str, &dyn DynRecord)> {
        self.records.iter().map(|(name, r)| (*name, &**r))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (&'static str, &mut Box<dyn DynRecord>)> {
        self.records.iter_mut().map(|(name, r)| (*name, r))
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("records", &self.names())
            .finish()
    }
}
