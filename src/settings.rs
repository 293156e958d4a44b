//! Storage settings
//!
//! Persisted separately from the save slots, under their own key in the same
//! store, so a host can tune the flush interval without touching save data.

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_KEY_PREFIX, DEFAULT_SAVE_INTERVAL};
use crate::error::StorageResult;
use crate::platform::KeyValueStore;

/// Durable key names derived from a prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    /// Base64 payload of every record
    pub data: String,
    /// Decimal local version at the last flush
    pub version: String,
    /// Presence-only run-once sentinel
    pub run_once: String,
    /// JSON-encoded [`StorageSettings`]
    pub settings: String,
}

impl StorageKeys {
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            data: format!("{prefix}_storage_data"),
            version: format!("{prefix}_storage_version"),
            run_once: format!("{prefix}_run_once"),
            settings: format!("{prefix}_settings"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Seconds between automatic flushes of dirty data
    pub save_interval: f32,
    /// Prefix for every durable key
    pub key_prefix: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            save_interval: DEFAULT_SAVE_INTERVAL,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

impl StorageSettings {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            key_prefix: prefix.into(),
            ..Self::default()
        }
    }

    /// Parse from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Save interval with nonsense values (negative, NaN) replaced by the default
    pub fn effective_save_interval(&self) -> f32 {
        if self.save_interval.is_finite() && self.save_interval >= 0.0 {
            self.save_interval
        } else {
            DEFAULT_SAVE_INTERVAL
        }
    }

    /// Prefix with an empty value replaced by the default
    pub fn effective_key_prefix(&self) -> &str {
        if self.key_prefix.trim().is_empty() {
            DEFAULT_KEY_PREFIX
        } else {
            &self.key_prefix
        }
    }

    pub fn keys(&self) -> StorageKeys {
        StorageKeys::with_prefix(self.effective_key_prefix())
    }

    /// Load the settings kept under `prefix`, falling back to defaults for
    /// that prefix. The prefix the settings were found under always wins
    /// over any stored `key_prefix`.
    pub fn load(store: &impl KeyValueStore, prefix: &str) -> Self {
        let fallback = Self::with_prefix(prefix);
        let key = fallback.keys().settings;

        match store.get_string(&key) {
            Ok(Some(json)) => match Self::from_json(&json) {
                Ok(settings) => {
                    log::info!("Loaded storage settings from '{}'", key);
                    return Self {
                        key_prefix: fallback.key_prefix,
                        ..settings
                    };
                }
                Err(e) => log::warn!("Ignoring unreadable storage settings: {}", e),
            },
            Ok(None) => {}
            Err(e) => log::warn!("Failed to read storage settings: {}", e),
        }

        log::info!("Using default storage settings");
        fallback
    }

    /// Write settings under their own prefix and commit
    pub fn save(&self, store: &mut impl KeyValueStore) -> StorageResult<()> {
        let json = serde_json::to_string(self)?;
        store.set_string(&self.keys().settings, &json)?;
        store.save()?;
        log::info!("Storage settings saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MemoryStore;

    #[test]
    fn test_default_keys() {
        let keys = StorageSettings::default().keys();
        assert_eq!(keys.data, "slotkeeper_storage_data");
        assert_eq!(keys.version, "slotkeeper_storage_version");
        assert_eq!(keys.run_once, "slotkeeper_run_once");
        assert_eq!(keys.settings, "slotkeeper_settings");
    }

    #[test]
    fn test_custom_and_empty_prefix() {
        assert_eq!(StorageSettings::with_prefix("game").keys().data, "game_storage_data");
        assert_eq!(StorageSettings::with_prefix("  ").keys(), StorageSettings::default().keys());
    }

    #[test]
    fn test_from_json_partial() {
        let settings = StorageSettings::from_json(r#"{"save_interval": 5.0}"#).unwrap();
        assert_eq!(settings.save_interval, 5.0);
        assert_eq!(settings.key_prefix, DEFAULT_KEY_PREFIX);
    }

    #[test]
    fn test_effective_save_interval() {
        let mut settings = StorageSettings::default();
        settings.save_interval = -3.0;
        assert_eq!(settings.effective_save_interval(), DEFAULT_SAVE_INTERVAL);
        settings.save_interval = f32::NAN;
        assert_eq!(settings.effective_save_interval(), DEFAULT_SAVE_INTERVAL);
        settings.save_interval = 0.0;
        assert_eq!(settings.effective_save_interval(), 0.0);
    }

    #[test]
    fn test_load_save_roundtrip_through_store() {
        let mut store = MemoryStore::new();
        assert_eq!(
            StorageSettings::load(&store, DEFAULT_KEY_PREFIX),
            StorageSettings::default()
        );

        let settings = StorageSettings {
            save_interval: 2.5,
            key_prefix: "demo".into(),
        };
        settings.save(&mut store).unwrap();
        assert!(store.has_key("demo_settings"));
        assert_eq!(StorageSettings::load(&store, "demo"), settings);
    }

    #[test]
    fn test_prefixes_keep_separate_settings() {
        let mut store = MemoryStore::new();
        let fast = StorageSettings {
            save_interval: 0.5,
            key_prefix: "fast".into(),
        };
        let slow = StorageSettings {
            save_interval: 30.0,
            key_prefix: "slow".into(),
        };
        fast.save(&mut store).unwrap();
        slow.save(&mut store).unwrap();

        assert_eq!(StorageSettings::load(&store, "fast"), fast);
        assert_eq!(StorageSettings::load(&store, "slow"), slow);
        assert_eq!(
            StorageSettings::load(&store, "other"),
            StorageSettings::with_prefix("other")
        );
    }

    #[test]
    fn test_load_ignores_garbage() {
        let mut store = MemoryStore::new();
        store.set_string("slotkeeper_settings", "not json").unwrap();
        assert_eq!(
            StorageSettings::load(&store, DEFAULT_KEY_PREFIX),
            StorageSettings::default()
        );
    }

    #[test]
    fn test_save_reports_store_failure() {
        let mut store = MemoryStore::new();
        store.set_fail_writes(true);
        let err = StorageSettings::default().save(&mut store).unwrap_err();
        assert!(matches!(err, crate::error::StorageError::Store(_)));
    }
}
