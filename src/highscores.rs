//! High score save slot
//!
//! Shows a record composed of another record: [`RunStats`] is registered
//! only through [`HighScores`], is stored inside its payload entry, and
//! reports changes through the same tracker once attached.

use serde::{Deserialize, Serialize};

use crate::persistence::{ChangeTracker, Record, Reset};

/// Maximum number of high scores to keep
pub const MAX_HIGH_SCORES: usize = 10;

/// A single high score entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighScoreEntry {
    /// Player's score
    pub score: u64,
    /// Wave reached
    pub wave: u32,
    /// Unix timestamp (ms) when achieved
    pub timestamp: f64,
}

/// Lifetime run counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunStats {
    games_played: u32,
    best_wave: u32,
    #[serde(skip)]
    tracker: ChangeTracker,
}

impl RunStats {
    pub fn games_played(&self) -> u32 {
        self.games_played
    }

    pub fn best_wave(&self) -> u32 {
        self.best_wave
    }

    /// Count a finished run
    pub fn record_run(&mut self, wave: u32) {
        let played = self.games_played.saturating_add(1);
        self.tracker.set(&mut self.games_played, played);
        let best = self.best_wave.max(wave);
        self.tracker.set(&mut self.best_wave, best);
    }
}

impl Reset for RunStats {
    fn reset(&mut self) {
        self.games_played.reset();
        self.best_wave.reset();
    }
}

impl Record for RunStats {
    fn tracker_mut(&mut self) -> &mut ChangeTracker {
        &mut self.tracker
    }
}

/// High score leaderboard
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HighScores {
    entries: Vec<HighScoreEntry>,
    stats: RunStats,
    #[serde(skip)]
    tracker: ChangeTracker,
}

impl HighScores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[HighScoreEntry] {
        &self.entries
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut RunStats {
        &mut self.stats
    }

    /// Insert a score in descending order, keeping the best
    /// [`MAX_HIGH_SCORES`]. Returns the 1-based rank, or `None` for a zero
    /// score or one that falls off the end.
    pub fn add_score(&mut self, score: u64, wave: u32, timestamp: f64) -> Option<usize> {
        // Ties rank below earlier entries
        let index = self.entries.partition_point(|e| e.score >= score);
        if score == 0 || index >= MAX_HIGH_SCORES {
            return None;
        }

        self.entries.insert(
            index,
            HighScoreEntry {
                score,
                wave,
                timestamp,
            },
        );
        self.entries.truncate(MAX_HIGH_SCORES);
        self.tracker.mark_dirty();
        Some(index + 1)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn top_score(&self) -> Option<u64> {
        self.entries.first().map(|e| e.score)
    }
}

impl Reset for HighScores {
    fn reset(&mut self) {
        self.entries.reset();
        self.stats.reset();
    }
}

impl Record for HighScores {
    fn tracker_mut(&mut self) -> &mut ChangeTracker {
        &mut self.tracker
    }

    fn attach_nested(&mut self, tracker: &ChangeTracker) {
        self.stats.attach(tracker.clone());
    }
}
