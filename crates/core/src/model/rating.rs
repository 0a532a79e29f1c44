use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

use crate::model::session::score_percent;
use crate::model::{Level, UserId};
use crate::scoring::RatingChange;

/// Rating assigned to a user when their first session starts.
pub const INITIAL_MMR: u32 = 1000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RatingError {
    #[error("invalid persisted rating: {0}")]
    InvalidPersistedState(String),
}

//
// ─── LEVEL STATISTICS ─────────────────────────────────────────────────────────
//

/// Running score statistics for one level.
///
/// Display-only; the authoritative skill measure is `UserRating::mmr`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LevelStats {
    pub tests: u32,
    pub average_percent: f64,
    pub best_percent: f64,
}

impl LevelStats {
    fn record(&mut self, percent: f64) {
        self.tests = self.tests.saturating_add(1);
        self.average_percent += (percent - self.average_percent) / f64::from(self.tests);
        self.best_percent = self.best_percent.max(percent);
    }
}

/// Per-level running averages, one slot per tier.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LevelAverages {
    pub junior: LevelStats,
    pub middle: LevelStats,
    pub senior: LevelStats,
}

impl LevelAverages {
    #[must_use]
    pub fn get(&self, level: Level) -> &LevelStats {
        match level {
            Level::Junior => &self.junior,
            Level::Middle => &self.middle,
            Level::Senior => &self.senior,
        }
    }

    fn get_mut(&mut self, level: Level) -> &mut LevelStats {
        match level {
            Level::Junior => &mut self.junior,
            Level::Middle => &mut self.middle,
            Level::Senior => &mut self.senior,
        }
    }

    /// Best score across all levels.
    #[must_use]
    pub fn best_percent(&self) -> f64 {
        Level::ALL
            .iter()
            .map(|level| self.get(*level).best_percent)
            .fold(0.0, f64::max)
    }

    #[must_use]
    pub fn total_tests(&self) -> u32 {
        Level::ALL
            .iter()
            .map(|level| self.get(*level).tests)
            .fold(0, u32::saturating_add)
    }
}

//
// ─── USER RATING ──────────────────────────────────────────────────────────────
//

/// Cumulative rating and statistics for one user.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRating {
    user_id: UserId,
    display_name: String,
    mmr: u32,
    total_tests: u32,
    last_test_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    level_stats: LevelAverages,
}

impl UserRating {
    /// Create the default rating for a user who has never finished a test.
    ///
    /// A blank `display_name` falls back to `User{id}`.
    #[must_use]
    pub fn new(user_id: UserId, display_name: &str, created_at: DateTime<Utc>) -> Self {
        let display_name = match display_name.trim() {
            "" => default_display_name(user_id),
            name => name.to_owned(),
        };
        Self {
            user_id,
            display_name,
            mmr: INITIAL_MMR,
            total_tests: 0,
            last_test_at: None,
            created_at,
            level_stats: LevelAverages::default(),
        }
    }

    /// Rehydrate a rating from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `RatingError::InvalidPersistedState` if the test counters and
    /// timestamps disagree.
    pub fn from_persisted(
        user_id: UserId,
        display_name: String,
        mmr: u32,
        total_tests: u32,
        last_test_at: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
        level_stats: LevelAverages,
    ) -> Result<Self, RatingError> {
        if (total_tests == 0) != last_test_at.is_none() {
            return Err(RatingError::InvalidPersistedState(format!(
                "total_tests={total_tests} but last_test_at={last_test_at:?}"
            )));
        }
        if level_stats.total_tests() > total_tests {
            return Err(RatingError::InvalidPersistedState(
                "level statistics count more tests than total_tests".into(),
            ));
        }
        Ok(Self {
            user_id,
            display_name,
            mmr,
            total_tests,
            last_test_at,
            created_at,
            level_stats,
        })
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[must_use]
    pub fn mmr(&self) -> u32 {
        self.mmr
    }

    #[must_use]
    pub fn total_tests(&self) -> u32 {
        self.total_tests
    }

    #[must_use]
    pub fn last_test_at(&self) -> Option<DateTime<Utc>> {
        self.last_test_at
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn level_stats(&self) -> &LevelAverages {
        &self.level_stats
    }

    /// Users appear on the leaderboard once they have finished a test.
    #[must_use]
    pub fn is_ranked(&self) -> bool {
        self.total_tests > 0
    }

    /// Fold a finished session into this rating.
    pub fn apply_completion(
        &mut self,
        change: &RatingChange,
        level: Level,
        correct_count: u8,
        completed_at: DateTime<Utc>,
    ) {
        self.mmr = change.new;
        self.total_tests = self.total_tests.saturating_add(1);
        self.last_test_at = Some(completed_at);
        self.level_stats
            .get_mut(level)
            .record(score_percent(correct_count));
    }

    /// Leaderboard order: higher mmr first, then earlier last test, then lower id.
    #[must_use]
    pub fn leaderboard_cmp(&self, other: &Self) -> Ordering {
        other
            .mmr
            .cmp(&self.mmr)
            .then_with(|| self.last_test_at.cmp(&other.last_test_at))
            .then_with(|| self.user_id.cmp(&other.user_id))
    }
}

#[must_use]
pub fn default_display_name(user_id: UserId) -> String {
    format!("User{user_id}")
}
