//! General-purpose player save slot
//!
//! A ready-made record for the data almost every game keeps. Projects with
//! more specific needs define their own records the same way.

use serde::{Deserialize, Serialize};

use crate::persistence::{ChangeTracker, Record, Reset};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageCommon {
    player_name: String,
    level: i32,
    experience: u64,
    coins: u64,
    /// Unix timestamp (seconds)
    last_login_time: u64,
    #[serde(skip)]
    tracker: ChangeTracker,
}

impl Default for StorageCommon {
    fn default() -> Self {
        Self {
            player_name: String::new(),
            level: 1,
            experience: 0,
            coins: 0,
            last_login_time: 0,
            tracker: ChangeTracker::default(),
        }
    }
}

impl StorageCommon {
    pub fn player_name(&self) -> &str {
        &self.player_name
    }

    pub fn set_player_name(&mut self, name: impl Into<String>) {
        self.tracker.set(&mut self.player_name, name.into());
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    pub fn set_level(&mut self, level: i32) {
        self.tracker.set(&mut self.level, level);
    }

    pub fn experience(&self) -> u64 {
        self.experience
    }

    pub fn set_experience(&mut self, experience: u64) {
        self.tracker.set(&mut self.experience, experience);
    }

    pub fn coins(&self) -> u64 {
        self.coins
    }

    pub fn set_coins(&mut self, coins: u64) {
        self.tracker.set(&mut self.coins, coins);
    }

    /// Add coins, saturating at `u64::MAX`
    pub fn add_coins(&mut self, amount: u64) {
        let coins = self.coins.saturating_add(amount);
        self.set_coins(coins);
    }

    /// Spend coins if the balance covers it
    pub fn try_spend_coins(&mut self, amount: u64) -> bool {
        match self.coins.checked_sub(amount) {
            Some(left) => {
                self.set_coins(left);
                true
            }
            None => false,
        }
    }

    pub fn last_login_time(&self) -> u64 {
        self.last_login_time
    }

    pub fn set_last_login_time(&mut self, timestamp: u64) {
        self.tracker.set(&mut self.last_login_time, timestamp);
    }
}

impl Reset for StorageCommon {
    fn reset(&mut self) {
        self.player_name.reset();
        self.level.reset();
        self.experience.reset();
        self.coins.reset();
        self.last_login_time.reset();
    }
}

impl Record for StorageCommon {
    fn tracker_mut(&mut self) -> &mut ChangeTracker {
        &mut self.tracker
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let common = StorageCommon::default();
        assert_eq!(common.player_name(), "");
        assert_eq!(common.level(), 1);
        assert_eq!(common.coins(), 0);
    }

    #[test]
    fn test_coin_helpers() {
        let mut common = StorageCommon::default();
        common.add_coins(10);
        assert!(common.try_spend_coins(4));
        assert!(!common.try_spend_coins(7));
        assert_eq!(common.coins(), 6);

        common.set_coins(u64::MAX - 1);
        common.add_coins(5);
        assert_eq!(common.coins(), u64::MAX);
    }

    #[test]
    fn test_reset_zeroes_level_too() {
        let mut common = StorageCommon::default();
        common.set_player_name("Player1");
        common.set_level(10);
        common.reset();
        assert_eq!(common.player_name(), "");
        assert_eq!(common.level(), 0);
    }

    #[test]
    fn test_serialized_field_names() {
        let value = serde_json::to_value(StorageCommon::default()).unwrap();
        let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            vec!["coins", "experience", "last_login_time", "level", "player_name"]
        );
    }
}
