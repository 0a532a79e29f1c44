//! Elo-style rating updates for finished quiz sessions.
//!
//! A session is scored as a single match against a fixed reference opponent.
//! Everything here is pure so it can be tested without storage.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Level, QUESTIONS_PER_SESSION};

/// Points at stake in a junior-level session before weighting.
pub const BASE_POINTS: f64 = 25.0;

/// Rating of the imaginary opponent every session is scored against.
pub const REFERENCE_OPPONENT: f64 = 1500.0;

/// Rating difference that makes a tenfold change in the odds.
pub const ELO_SCALE: f64 = 400.0;

pub const MIN_DELTA: i32 = -50;
pub const MAX_DELTA: i32 = 100;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScoringError {
    #[error("correct count must be at most {max}, got {got}")]
    CorrectCountOutOfRange { got: u8, max: usize },
}

//
// ─── RATING CHANGE ─────────────────────────────────────────────────────────────
//

/// Rating before and after a session, with the applied delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingChange {
    pub previous: u32,
    pub delta: i32,
    pub new: u32,
}

//
// ─── FORMULA ───────────────────────────────────────────────────────────────────
//

/// Weight of a level; the same for every subject.
#[must_use]
pub fn level_multiplier(level: Level) -> f64 {
    match level {
        Level::Junior => 1.0,
        Level::Middle => 1.5,
        Level::Senior => 2.0,
    }
}

/// Probability of beating the reference opponent at `current_mmr`.
///
/// ```
/// # use quiz_core::scoring::expected_score;
/// assert!((expected_score(1500) - 0.5).abs() < 1e-12);
/// ```
#[must_use]
pub fn expected_score(current_mmr: u32) -> f64 {
    let exponent = (REFERENCE_OPPONENT - f64::from(current_mmr)) / ELO_SCALE;
    1.0 / (1.0 + 10_f64.powf(exponent))
}

/// Fraction of the session answered correctly.
///
/// # Errors
///
/// Returns `ScoringError::CorrectCountOutOfRange` above `QUESTIONS_PER_SESSION`.
pub fn actual_score(correct_count: u8) -> Result<f64, ScoringError> {
    if usize::from(correct_count) > QUESTIONS_PER_SESSION {
        return Err(ScoringError::CorrectCountOutOfRange {
            got: correct_count,
            max: QUESTIONS_PER_SESSION,
        });
    }
    #[allow(clippy::cast_precision_loss)]
    let total = QUESTIONS_PER_SESSION as f64;
    Ok(f64::from(correct_count) / total)
}

/// Rounded and clamped rating delta for a session.
///
/// # Errors
///
/// Returns `ScoringError::CorrectCountOutOfRange` for impossible scores.
pub fn rating_delta(
    correct_count: u8,
    level: Level,
    current_mmr: u32,
) -> Result<i32, ScoringError> {
    let actual = actual_score(correct_count)?;
    let raw = BASE_POINTS * level_multiplier(level) * (actual - expected_score(current_mmr));
    let clamped = raw.round().clamp(f64::from(MIN_DELTA), f64::from(MAX_DELTA));

    // clamped to [MIN_DELTA, MAX_DELTA], so the cast cannot truncate
    #[allow(clippy::cast_possible_truncation)]
    let delta = clamped as i32;
    Ok(delta)
}

/// Apply a delta, flooring the rating at zero.
#[must_use]
pub fn apply_delta(current_mmr: u32, delta: i32) -> u32 {
    let next = (i64::from(current_mmr) + i64::from(delta)).max(0);
    u32::try_from(next).unwrap_or(u32::MAX)
}

/// Score a finished session.
///
/// ```
/// # use quiz_core::model::Level;
/// # use quiz_core::scoring::rate;
/// let change = rate(10, Level::Junior, 1500).unwrap();
/// assert_eq!(change.delta, 13);
/// assert_eq!(change.new, 1513);
/// ```
///
/// # Errors
///
/// Returns `ScoringError::CorrectCountOutOfRange` for impossible scores.
pub fn rate(
    correct_count: u8,
    level: Level,
    current_mmr: u32,
) -> Result<RatingChange, ScoringError> {
    let delta = rating_delta(correct_count, level, current_mmr)?;
    Ok(RatingChange {
        previous: current_mmr,
        delta,
        new: apply_delta(current_mmr, delta),
    })
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
