use std::sync::Arc;

use chrono::{DateTime, Utc};
use quiz_core::model::{QuizSession, SessionCompleted, UserId, UserRating};
use quiz_core::scoring;
use storage::repository::{RatingRepository, SessionPersistence};

use crate::error::QuizError;

/// One row of the ranked leaderboard.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    /// 1-based position.
    pub rank: u32,
    pub rating: UserRating,
}

/// Applies finished sessions to user ratings and ranks users.
#[derive(Clone)]
pub struct StatsAggregator {
    ratings: Arc<dyn RatingRepository>,
    persistence: Arc<dyn SessionPersistence>,
}

impl StatsAggregator {
    #[must_use]
    pub fn new(
        ratings: Arc<dyn RatingRepository>,
        persistence: Arc<dyn SessionPersistence>,
    ) -> Self {
        Self {
            ratings,
            persistence,
        }
    }

    /// Score a terminal session and commit it together with the updated rating.
    ///
    /// On success the session carries its `SessionCompleted` summary. On error
    /// nothing is persisted and the caller's session must be discarded.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Session` if the session is still in progress or was
    /// already completed, `QuizError::Scoring` for an impossible score, and
    /// `QuizError::Storage` if the commit fails or lost a race with another commit.
    pub async fn record_completion(
        &self,
        session: &mut QuizSession,
        completed_at: DateTime<Utc>,
    ) -> Result<UserRating, QuizError> {
        let user_id = session.user_id();
        let level = session.tag().level();
        let correct_count = session.correct_count();

        let mut rating = match self.ratings.get_rating(user_id).await? {
            Some(rating) => rating,
            None => {
                tracing::warn!(%user_id, "rating missing at completion, using defaults");
                UserRating::new(user_id, "", session.started_at())
            }
        };

        let change = scoring::rate(correct_count, level, rating.mmr())?;
        session.complete(SessionCompleted {
            correct_count,
            rating_delta: change.delta,
            new_rating: change.new,
        })?;
        rating.apply_completion(&change, level, correct_count, completed_at);

        self.persistence.commit_completion(session, &rating).await?;

        tracing::info!(
            %user_id,
            tag = %session.tag(),
            correct_count,
            delta = change.delta,
            mmr = change.new,
            "quiz completed"
        );
        Ok(rating)
    }

    /// The `top_n` ranked users, best first.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Storage` if the lookup fails.
    pub async fn leaderboard(&self, top_n: u32) -> Result<Vec<LeaderboardEntry>, QuizError> {
        let ratings = self.ratings.list_top_ratings(top_n).await?;
        Ok((1..)
            .zip(ratings)
            .map(|(rank, rating)| LeaderboardEntry { rank, rating })
            .collect())
    }

    /// # Errors
    ///
    /// Returns `QuizError::Storage` if the lookup fails.
    pub async fn rating(&self, user_id: UserId) -> Result<Option<UserRating>, QuizError> {
        Ok(self.ratings.get_rating(user_id).await?)
    }
}
