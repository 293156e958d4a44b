//! Storage manager: registry, versions, debounced flushing
//!
//! Version bookkeeping:
//! - `local_version` bumps once per value-changing record write
//! - `last_saved_version` is `local_version` as of the last committed flush
//! - a flush writes only when `last_saved_version < local_version` or a
//!   forced save is pending
//!
//! A flush either commits (payload, version key and `save()` all succeed, then
//! `last_saved_version` advances) or changes nothing in memory.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Map, Value};

use crate::error::{StorageError, StorageResult};
use crate::platform::KeyValueStore;
use crate::settings::{StorageKeys, StorageSettings};

use super::codec;
use super::record::{ChangeTracker, Record, RecordSet, Registry};
use super::tasks::TaskQueue;

/// Result of a flush attempt that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing dirty and no forced save pending
    Unchanged,
    /// Payload and version committed
    Saved { version: u64 },
}

/// Result of [`StorageManager::run_once`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOnce {
    /// Callback invoked and the sentinel set
    Ran,
    /// Sentinel already present; callback not invoked
    AlreadyRun,
    /// Storage not live; callback not invoked
    Skipped,
}

pub struct StorageManager<S: KeyValueStore> {
    store: S,
    keys: StorageKeys,
    save_interval: f32,
    registry: Registry,
    local_version: Arc<AtomicU64>,
    last_saved_version: u64,
    tasks: TaskQueue,
    elapsed_since_save: f32,
    force_save: bool,
}

impl<S: KeyValueStore> StorageManager<S> {
    pub fn new(store: S, settings: &StorageSettings) -> Self {
        Self {
            store,
            keys: settings.keys(),
            save_interval: settings.effective_save_interval(),
            registry: Registry::default(),
            local_version: Arc::new(AtomicU64::new(0)),
            last_saved_version: 0,
            tasks: TaskQueue::new(),
            elapsed_since_save: 0.0,
            force_save: false,
        }
    }

    /// Register `records`, then load the stored version and payload into them
    pub fn initialize(&mut self, records: RecordSet) -> StorageResult<()> {
        if records.is_empty() {
            return Err(StorageError::EmptyRegistry);
        }

        // A fresh counter detaches anything registered before
        let local_version = Arc::new(AtomicU64::new(0));
        let registry = Registry::build(records, &ChangeTracker::new(&local_version))?;

        self.registry = registry;
        self.local_version = local_version;
        self.last_saved_version = 0;
        self.elapsed_since_save = 0.0;
        self.force_save = false;
        // Tasks queued while nothing was registered belong to no lifetime
        self.tasks.clear();

        self.load_local_version();
        self.load_local_data();
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        !self.registry.is_empty()
    }

    pub fn get<T: Record>(&self) -> StorageResult<&T> {
        self.registry.get::<T>()
    }

    pub fn get_mut<T: Record>(&mut self) -> StorageResult<&mut T> {
        self.registry.get_mut::<T>()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn local_version(&self) -> u64 {
        self.local_version.load(Ordering::Relaxed)
    }

    pub fn last_saved_version(&self) -> u64 {
        self.last_saved_version
    }

    pub fn is_dirty(&self) -> bool {
        self.last_saved_version < self.local_version()
    }

    pub fn is_force_save_pending(&self) -> bool {
        self.force_save
    }

    pub fn save_interval(&self) -> f32 {
        self.save_interval
    }

    pub fn set_save_interval(&mut self, seconds: f32) {
        self.save_interval = seconds.max(0.0);
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn task_queue(&self) -> TaskQueue {
        self.tasks.clone()
    }

    pub fn add_update_task<F>(&self, task: F)
    where
        F: FnOnce(&mut Registry) + Send + 'static,
    {
        self.tasks.push(task);
    }

    pub fn force_save_to_disk(&mut self) {
        self.force_save = true;
    }

    /// Advance the debounce timer and flush when due.
    /// Returns whether anything was written.
    pub fn tick(&mut self, elapsed: f32) -> bool {
        self.elapsed_since_save += elapsed;
        if !self.force_save && self.elapsed_since_save <= self.save_interval {
            return false;
        }

        match self.flush() {
            Ok(FlushOutcome::Saved { .. }) => {
                self.elapsed_since_save = 0.0;
                self.force_save = false;
                true
            }
            Ok(FlushOutcome::Unchanged) => false,
            Err(e) => {
                log::error!("Failed to save storage: {}", e);
                false
            }
        }
    }

    /// Write the registry to the store if dirty or forced
    pub fn flush(&mut self) -> StorageResult<FlushOutcome> {
        if !self.is_dirty() && !self.force_save {
            return Ok(FlushOutcome::Unchanged);
        }

        let ran = self.tasks.drain_into(&mut self.registry);
        if ran > 0 {
            log::debug!("Ran {} storage update task(s)", ran);
        }

        // Read after the tasks so their writes count
        let version = self.local_version();
        let payload = codec::encode_payload(&self.registry)?;

        self.store.set_string(&self.keys.data, &payload)?;
        self.store.set_string(&self.keys.version, &version.to_string())?;
        self.store.save()?;

        self.last_saved_version = version;
        self.force_save = false;
        log::debug!("Storage saved. Version: {}", version);
        Ok(FlushOutcome::Saved { version })
    }

    /// Merge a stored (base64) payload into the registered records.
    /// Returns how many records took stored values.
    pub fn merge_payload(&mut self, encoded: &str) -> StorageResult<usize> {
        let stored = codec::decode_payload(encoded)?;
        Ok(self.merge(&stored))
    }

    fn merge(&mut self, stored: &Map<String, Value>) -> usize {
        let mut merged = 0;
        for (name, record) in self.registry.iter_mut() {
            let Some(value) = stored.get(name) else {
                log::debug!("No stored data for '{}', keeping defaults", name);
                continue;
            };
            match record.merge_stored(value) {
                Ok(()) => merged += 1,
                Err(e) => log::error!("Failed to load storage '{}': {}", name, e),
            }
        }

        for name in stored.keys().filter(|name| !self.registry.contains(name)) {
            log::debug!("Ignoring stored data for unregistered storage '{}'", name);
        }

        merged
    }

    /// Invoke `callback` the first time this store ever sees it.
    ///
    /// The sentinel is set and a save forced whether or not the callback
    /// fails, so a failing callback is not retried. Its error is returned.
    pub fn run_once<F, E>(&mut self, callback: F) -> Result<RunOnce, E>
    where
        F: FnOnce(&mut Registry) -> Result<(), E>,
    {
        if self.store.has_key(&self.keys.run_once) {
            return Ok(RunOnce::AlreadyRun);
        }

        let result = callback(&mut self.registry);

        if let Err(e) = self.store.set_string(&self.keys.run_once, "true") {
            log::error!("Failed to record run-once flag: {}", e);
        }
        self.force_save_to_disk();

        result.map(|()| RunOnce::Ran)
    }

    /// Reset every record to type defaults. Not a change: nothing is marked
    /// dirty and no save is forced.
    pub fn clear(&mut self) {
        for (_, record) in self.registry.iter_mut() {
            record.reset_record();
        }
        log::debug!("Storage cleared ({} records)", self.registry.len());
    }

    /// Remove every durable key this manager owns and commit
    pub fn delete_local_storage(&mut self) -> StorageResult<()> {
        self.store.delete_key(&self.keys.data)?;
        self.store.delete_key(&self.keys.version)?;
        self.store.delete_key(&self.keys.run_once)?;
        self.store.save()?;
        log::info!("Local storage deleted");
        Ok(())
    }

    /// Final unconditional flush, then drop every record
    pub fn shutdown(&mut self) {
        self.force_save = true;
        if let Err(e) = self.flush() {
            log::error!("Failed to save storage on shutdown: {}", e);
        }

        self.registry = Registry::default();
        self.local_version = Arc::new(AtomicU64::new(0));
        self.last_saved_version = 0;
        self.elapsed_since_save = 0.0;
        self.force_save = false;
        self.tasks.clear();
    }

    fn load_local_version(&mut self) {
        match self.store.get_string(&self.keys.version) {
            Ok(Some(text)) => match text.trim().parse::<u64>() {
                Ok(version) => {
                    self.local_version.store(version, Ordering::Relaxed);
                    self.last_saved_version = version;
                    log::debug!("Loaded storage version: {}", version);
                }
                Err(e) => log::warn!("Unreadable storage version '{}': {}", text, e),
            },
            Ok(None) => log::debug!("No storage version found, starting from 0"),
            Err(e) => log::error!("Failed to read storage version: {}", e),
        }
    }

    fn load_local_data(&mut self) {
        let encoded = match self.store.get_string(&self.keys.data) {
            Ok(Some(encoded)) => encoded,
            Ok(None) => {
                log::debug!("No local storage data found");
                return;
            }
            Err(e) => {
                log::error!("Failed to read local storage: {}", e);
                return;
            }
        };

        match self.merge_payload(&encoded) {
            Ok(merged) => log::debug!("Loaded {} storage record(s)", merged),
            Err(e) => log::error!("Failed to load storage from local: {}", e),
        }
    }
}

impl<S: KeyValueStore + std::fmt::Debug> std::fmt::Debug for StorageManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageManager")
            .field("store", &self.store)
            .field("registry", &self.registry)
            .field("local_version", &self.local_version())
            .field("last_saved_version", &self.last_saved_version)
            .field("force_save", &self.force_save)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::StorageCommon;
    use crate::highscores::HighScores;
    use crate::persistence::{ChangeTracker, Reset};
    use crate::platform::{FileStore, MemoryStore};
    use proptest::prelude::*;
    use serde::{Deserialize, Serialize};

    /// One field of every primitive kind
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(default)]
    struct Gauges {
        flag: bool,
        tiny: u8,
        small: u16,
        signed: i8,
        wide: i64,
        huge: u128,
        ratio: f32,
        precise: f64,
        maybe: Option<f64>,
        label: String,
        #[serde(skip)]
        tracker: ChangeTracker,
    }

    impl Reset for Gauges {
        fn reset(&mut self) {
            self.flag.reset();
            self.tiny.reset();
            self.small.reset();
            self.signed.reset();
            self.wide.reset();
            self.huge.reset();
            self.ratio.reset();
            self.precise.reset();
            self.maybe.reset();
            self.label.reset();
        }
    }

    impl Record for Gauges {
        fn tracker_mut(&mut self) -> &mut ChangeTracker {
            &mut self.tracker
        }
    }

    fn same_f64(a: f64, b: f64) -> bool {
        (a.is_nan() && b.is_nan()) || a == b
    }

    fn same_f32(a: f32, b: f32) -> bool {
        (a.is_nan() && b.is_nan()) || a == b
    }

    /// Save `gauges` through a manager, then load it into a fresh one
    fn reload_gauges(gauges: Gauges) -> Gauges {
        let store = MemoryStore::new();
        let mut first = StorageManager::new(store.clone(), &StorageSettings::default());
        first.initialize(RecordSet::new().with(gauges)).unwrap();
        first.shutdown();

        let mut second = StorageManager::new(store, &StorageSettings::default());
        second.initialize(RecordSet::new().with(Gauges::default())).unwrap();
        second.get::<Gauges>().unwrap().clone()
    }

    fn manager(store: MemoryStore) -> StorageManager<MemoryStore> {
        let mut manager = StorageManager::new(store, &StorageSettings::default());
        manager
            .initialize(RecordSet::new().with(StorageCommon::default()))
            .unwrap();
        manager
    }

    #[test]
    fn test_initialize_rejects_empty() {
        let mut manager = StorageManager::new(MemoryStore::new(), &StorageSettings::default());
        assert!(matches!(
            manager.initialize(RecordSet::new()),
            Err(StorageError::EmptyRegistry)
        ));
        assert!(!manager.is_loaded());
    }

    #[test]
    fn test_flush_unchanged_when_clean() {
        let store = MemoryStore::new();
        let mut manager = manager(store.clone());
        assert_eq!(manager.flush().unwrap(), FlushOutcome::Unchanged);
        assert_eq!(store.write_count(), 0);
        assert!(!manager.is_dirty());
    }

    #[test]
    fn test_force_flag_cleared_only_on_success() {
        let store = MemoryStore::new();
        let mut manager = manager(store.clone());
        manager.force_save_to_disk();

        store.set_fail_writes(true);
        assert!(manager.flush().is_err());
        assert!(manager.is_force_save_pending());

        store.set_fail_writes(false);
        assert_eq!(manager.flush().unwrap(), FlushOutcome::Saved { version: 0 });
        assert!(!manager.is_force_save_pending());
    }

    #[test]
    fn test_accumulator_kept_on_failure() {
        let store = MemoryStore::new();
        let mut manager = manager(store.clone());
        manager.get_mut::<StorageCommon>().unwrap().set_level(2);

        store.set_fail_writes(true);
        assert!(!manager.tick(1.5));
        store.set_fail_writes(false);
        // Still past the interval from before, so a zero-length tick flushes
        assert!(manager.tick(0.0));
        // Reset after success
        manager.get_mut::<StorageCommon>().unwrap().set_level(3);
        assert!(!manager.tick(0.0));
    }

    #[test]
    fn test_merge_payload_reports_decode_error() {
        let mut manager = manager(MemoryStore::new());
        assert!(matches!(
            manager.merge_payload("not base64!"),
            Err(StorageError::Decode(_))
        ));
    }

    #[test]
    fn test_shutdown_detaches_records() {
        let mut manager = manager(MemoryStore::new());
        manager.shutdown();
        assert!(!manager.is_loaded());
        assert_eq!(manager.local_version(), 0);
        assert!(manager.get::<StorageCommon>().is_err());
    }

    #[test]
    fn test_file_store_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("save.json");

        {
            let store = FileStore::open(&path).unwrap();
            let mut manager = StorageManager::new(store, &StorageSettings::default());
            manager
                .initialize(
                    RecordSet::new()
                        .with(StorageCommon::default())
                        .with(HighScores::default()),
                )
                .unwrap();
            let outcome = manager
                .run_once(|registry| {
                    registry.get_mut::<StorageCommon>()?.set_player_name("Ada");
                    Ok::<(), StorageError>(())
                })
                .unwrap();
            assert_eq!(outcome, RunOnce::Ran);
            manager.get_mut::<HighScores>().unwrap().add_score(77, 2, 0.0);
            manager.shutdown();
        }

        let store = FileStore::open(&path).unwrap();
        let mut manager = StorageManager::new(store, &StorageSettings::default());
        manager
            .initialize(
                RecordSet::new()
                    .with(StorageCommon::default())
                    .with(HighScores::default()),
            )
            .unwrap();
        assert_eq!(manager.get::<StorageCommon>().unwrap().player_name(), "Ada");
        assert_eq!(manager.get::<HighScores>().unwrap().top_score(), Some(77));
        assert_eq!(manager.local_version(), 2);

        let again = manager
            .run_once(|_| -> Result<(), StorageError> { panic!("must not run twice") })
            .unwrap();
        assert_eq!(again, RunOnce::AlreadyRun);
    }

    #[test]
    fn test_round_trip_max_edges() {
        let loaded = reload_gauges(Gauges {
            flag: true,
            tiny: u8::MAX,
            small: u16::MAX,
            signed: i8::MIN,
            wide: i64::MIN,
            huge: u128::MAX,
            ratio: f32::MAX,
            precise: f64::MAX,
            maybe: Some(f64::MIN_POSITIVE),
            label: "\u{0}edge\u{1F600}".into(),
            ..Gauges::default()
        });

        assert!(loaded.flag);
        assert_eq!(loaded.tiny, u8::MAX);
        assert_eq!(loaded.small, u16::MAX);
        assert_eq!(loaded.signed, i8::MIN);
        assert_eq!(loaded.wide, i64::MIN);
        assert_eq!(loaded.huge, u128::MAX);
        assert_eq!(loaded.ratio, f32::MAX);
        assert_eq!(loaded.precise, f64::MAX);
        assert_eq!(loaded.maybe, Some(f64::MIN_POSITIVE));
        assert_eq!(loaded.label, "\u{0}edge\u{1F600}");
    }

    #[test]
    fn test_round_trip_zero_edges() {
        let mut zero = Gauges {
            flag: true,
            tiny: 9,
            wide: 9,
            huge: 9,
            precise: 9.0,
            label: "set".into(),
            ..Gauges::default()
        };
        zero.reset();

        let loaded = reload_gauges(zero);
        assert!(!loaded.flag);
        assert_eq!(loaded.tiny, 0);
        assert_eq!(loaded.wide, 0);
        assert_eq!(loaded.huge, 0);
        assert_eq!(loaded.precise, 0.0);
        assert_eq!(loaded.maybe, None);
        assert_eq!(loaded.label, "");
    }

    #[test]
    fn test_round_trip_non_finite_floats() {
        let loaded = reload_gauges(Gauges {
            ratio: f32::NEG_INFINITY,
            precise: f64::INFINITY,
            maybe: Some(f64::NAN),
            ..Gauges::default()
        });

        assert_eq!(loaded.ratio, f32::NEG_INFINITY);
        assert_eq!(loaded.precise, f64::INFINITY);
        assert!(loaded.maybe.is_some_and(f64::is_nan));
    }

    #[test]
    fn test_high_scores_survive_infinite_timestamp() {
        let store = MemoryStore::new();
        {
            let mut manager = StorageManager::new(store.clone(), &StorageSettings::default());
            manager.initialize(RecordSet::new().with(HighScores::default())).unwrap();
            let scores = manager.get_mut::<HighScores>().unwrap();
            scores.add_score(500, 3, 1.0);
            scores.add_score(900, 4, f64::INFINITY);
            scores.stats_mut().record_run(4);
            manager.shutdown();
        }

        let mut manager = StorageManager::new(store, &StorageSettings::default());
        manager.initialize(RecordSet::new().with(HighScores::default())).unwrap();
        let scores = manager.get::<HighScores>().unwrap();
        assert_eq!(scores.entries().len(), 2);
        assert_eq!(scores.entries()[0].timestamp, f64::INFINITY);
        assert_eq!(scores.stats().games_played(), 1);
    }

    #[test]
    fn test_initialize_drops_tasks_queued_while_unregistered() {
        let mut manager = StorageManager::new(MemoryStore::new(), &StorageSettings::default());
        manager.add_update_task(|registry| {
            if let Ok(common) = registry.get_mut::<StorageCommon>() {
                common.set_coins(1000);
            }
        });

        manager.initialize(RecordSet::new().with(StorageCommon::default())).unwrap();
        manager.force_save_to_disk();
        manager.flush().unwrap();
        assert_eq!(manager.get::<StorageCommon>().unwrap().coins(), 0);
    }

    proptest! {
        #[test]
        fn prop_primitive_fields_round_trip(
            flag in any::<bool>(),
            tiny in any::<u8>(),
            small in any::<u16>(),
            signed in any::<i8>(),
            wide in prop_oneof![Just(0i64), Just(i64::MIN), Just(i64::MAX), any::<i64>()],
            huge in prop_oneof![Just(0u128), Just(u128::MAX), any::<u128>()],
            ratio in prop_oneof![Just(f32::NAN), Just(f32::INFINITY), Just(f32::MIN), any::<f32>()],
            precise in prop_oneof![
                Just(f64::NAN),
                Just(f64::NEG_INFINITY),
                Just(f64::MAX),
                Just(f64::MIN_POSITIVE),
                any::<f64>()
            ],
            label in ".{0,16}",
        ) {
            let loaded = reload_gauges(Gauges {
                flag,
                tiny,
                small,
                signed,
                wide,
                huge,
                ratio,
                precise,
                maybe: Some(precise),
                label: label.clone(),
                ..Gauges::default()
            });

            prop_assert_eq!(loaded.flag, flag);
            prop_assert_eq!(loaded.tiny, tiny);
            prop_assert_eq!(loaded.small, small);
            prop_assert_eq!(loaded.signed, signed);
            prop_assert_eq!(loaded.wide, wide);
            prop_assert_eq!(loaded.huge, huge);
            prop_assert!(same_f32(loaded.ratio, ratio), "ratio {} reloaded as {}", ratio, loaded.ratio);
            prop_assert!(same_f64(loaded.precise, precise), "precise {} reloaded as {}", precise, loaded.precise);
            prop_assert!(loaded.maybe.is_some_and(|m| same_f64(m, precise)));
            prop_assert_eq!(loaded.label, label);
        }

        #[test]
        fn prop_version_counts_value_changes(levels in proptest::collection::vec(-3i32..3, 0..40)) {
            let mut manager = manager(MemoryStore::new());
            let before = manager.local_version();

            let mut current = StorageCommon::default().level();
            let mut changes = 0u64;
            for level in levels {
                if level != current {
                    changes += 1;
                    current = level;
                }
                manager.get_mut::<StorageCommon>().unwrap().set_level(level);
            }

            prop_assert_eq!(manager.local_version(), before + changes);
            prop_assert!(manager.last_saved_version() <= manager.local_version());
        }

        #[test]
        fn prop_round_trip_preserves_fields(
            name in ".{0,24}",
            level in any::<i32>(),
            experience in any::<u64>(),
            coins in prop_oneof![Just(0u64), Just(u64::MAX), any::<u64>()],
            login in any::<u64>(),
        ) {
            let store = MemoryStore::new();
            let mut first = manager(store.clone());
            {
                let common = first.get_mut::<StorageCommon>().unwrap();
                common.set_player_name(name.clone());
                common.set_level(level);
                common.set_experience(experience);
                common.set_coins(coins);
                common.set_last_login_time(login);
            }
            first.force_save_to_disk();
            prop_assert!(
                matches!(first.flush(), Ok(FlushOutcome::Saved { .. })),
                "forced flush did not save"
            );

            let second = manager(store);
            let common = second.get::<StorageCommon>().unwrap();
            prop_assert_eq!(common.player_name(), name.as_str());
            prop_assert_eq!(common.level(), level);
            prop_assert_eq!(common.experience(), experience);
            prop_assert_eq!(common.coins(), coins);
            prop_assert_eq!(common.last_login_time(), login);
            prop_assert_eq!(second.local_version(), first.local_version());
        }
    }
}
