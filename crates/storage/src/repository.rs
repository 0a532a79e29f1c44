use async_trait::async_trait;
use quiz_core::model::{
    LevelTag, QuestionId, QuestionItem, QuizSession, UserId, UserRating,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Read access to the question bank, plus the insert path used for seeding.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Insert or replace a question.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn upsert_question(&self, question: &QuestionItem) -> Result<(), StorageError>;

    /// All questions whose subject and level match `tag` exactly, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the lookup fails.
    async fn query_questions(&self, tag: &LevelTag) -> Result<Vec<QuestionItem>, StorageError>;

    /// Fetch questions by id, in the order of `ids`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if any id is missing, or other storage errors.
    async fn get_questions(&self, ids: &[QuestionId]) -> Result<Vec<QuestionItem>, StorageError>;

    /// Every known pool with its question count, ordered by tag.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the lookup fails.
    async fn pool_sizes(&self) -> Result<Vec<(LevelTag, usize)>, StorageError>;
}

/// One session record per user.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the lookup fails.
    async fn get_session(&self, user_id: UserId) -> Result<Option<QuizSession>, StorageError>;

    /// Insert or replace the user's session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be stored.
    async fn upsert_session(&self, session: &QuizSession) -> Result<(), StorageError>;

    /// Remove the user's session; a missing session is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    async fn delete_session(&self, user_id: UserId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait RatingRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the lookup fails.
    async fn get_rating(&self, user_id: UserId) -> Result<Option<UserRating>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the rating cannot be stored.
    async fn upsert_rating(&self, rating: &UserRating) -> Result<(), StorageError>;

    /// Ranked users (at least one finished test) in leaderboard order:
    /// mmr descending, then last test ascending, then user id ascending.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the lookup fails.
    async fn list_top_ratings(&self, limit: u32) -> Result<Vec<UserRating>, StorageError>;
}

/// Multi-record writes that must commit atomically.
#[async_trait]
pub trait SessionPersistence: Send + Sync {
    /// Replace the user's session with `session`, and insert `new_rating` if the
    /// user has no rating yet, in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if either write fails; nothing is applied then.
    async fn begin_session(
        &self,
        session: &QuizSession,
        new_rating: Option<&UserRating>,
    ) -> Result<(), StorageError>;

    /// Store a terminal session together with the updated rating.
    ///
    /// `session` must carry its completion summary. The stored session must
    /// still be the same, active attempt; otherwise
    /// the completion was already applied (or the session was replaced) and
    /// `StorageError::Conflict` is returned without writing anything.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` as above, or other storage errors.
    async fn commit_completion(
        &self,
        session: &QuizSession,
        rating: &UserRating,
    ) -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct MemoryState {
    questions: BTreeMap<QuestionId, QuestionItem>,
    sessions: HashMap<UserId, QuizSession>,
    ratings: HashMap<UserId, UserRating>,
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// All tables sit behind one lock, which makes the multi-record writes atomic.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn upsert_question(&self, question: &QuestionItem) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.questions.insert(question.id(), question.clone());
        Ok(())
    }

    async fn query_questions(&self, tag: &LevelTag) -> Result<Vec<QuestionItem>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .questions
            .values()
            .filter(|q| q.tag() == tag)
            .cloned()
            .collect())
    }

    async fn get_questions(&self, ids: &[QuestionId]) -> Result<Vec<QuestionItem>, StorageError> {
        let guard = self.lock()?;
        ids.iter()
            .map(|id| guard.questions.get(id).cloned().ok_or(StorageError::NotFound))
            .collect()
    }

    async fn pool_sizes(&self) -> Result<Vec<(LevelTag, usize)>, StorageError> {
        let guard = self.lock()?;
        let mut sizes: BTreeMap<(String, quiz_core::model::Level), (LevelTag, usize)> =
            BTreeMap::new();
        for question in guard.questions.values() {
            let tag = question.tag();
            sizes
                .entry((tag.subject().as_str().to_owned(), tag.level()))
                .or_insert_with(|| (tag.clone(), 0))
                .1 += 1;
        }
        Ok(sizes.into_values().collect())
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn get_session(&self, user_id: UserId) -> Result<Option<QuizSession>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.sessions.get(&user_id).cloned())
    }

    async fn upsert_session(&self, session: &QuizSession) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.sessions.insert(session.user_id(), session.clone());
        Ok(())
    }

    async fn delete_session(&self, user_id: UserId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.sessions.remove(&user_id);
        Ok(())
    }
}

#[async_trait]
impl RatingRepository for InMemoryRepository {
    async fn get_rating(&self, user_id: UserId) -> Result<Option<UserRating>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.ratings.get(&user_id).cloned())
    }

    async fn upsert_rating(&self, rating: &UserRating) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.ratings.insert(rating.user_id(), rating.clone());
        Ok(())
    }

    async fn list_top_ratings(&self, limit: u32) -> Result<Vec<UserRating>, StorageError> {
        let guard = self.lock()?;
        let mut ranked: Vec<UserRating> = guard
            .ratings
            .values()
            .filter(|r| r.is_ranked())
            .cloned()
            .collect();
        ranked.sort_by(UserRating::leaderboard_cmp);
        ranked.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(ranked)
    }
}

#[async_trait]
impl SessionPersistence for InMemoryRepository {
    async fn begin_session(
        &self,
        session: &QuizSession,
        new_rating: Option<&UserRating>,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if let Some(rating) = new_rating {
            guard
                .ratings
                .entry(rating.user_id())
                .or_insert_with(|| rating.clone());
        }
        guard.sessions.insert(session.user_id(), session.clone());
        Ok(())
    }

    async fn commit_completion(
        &self,
        session: &QuizSession,
        rating: &UserRating,
    ) -> Result<(), StorageError> {
        if session.user_id() != rating.user_id() || session.completion().is_none() {
            return Err(StorageError::Conflict);
        }
        let mut guard = self.lock()?;
        match guard.sessions.get(&session.user_id()) {
            Some(stored) if stored.is_active() && stored.started_at() == session.started_at() => {}
            _ => return Err(StorageError::Conflict),
        }
        guard.sessions.insert(session.user_id(), session.clone());
        guard.ratings.insert(rating.user_id(), rating.clone());
        Ok(())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub ratings: Arc<dyn RatingRepository>,
    pub persistence: Arc<dyn SessionPersistence>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    /// Use one repository value for every role.
    #[must_use]
    pub fn from_repository<R>(repo: R) -> Self
    where
        R: QuestionRepository
            + SessionRepository
            + RatingRepository
            + SessionPersistence
            + Clone
            + 'static,
    {
        let questions: Arc<dyn QuestionRepository> = Arc::new(repo.clone());
        let sessions: Arc<dyn SessionRepository> = Arc::new(repo.clone());
        let ratings: Arc<dyn RatingRepository> = Arc::new(repo.clone());
        let persistence: Arc<dyn SessionPersistence> = Arc::new(repo);
        Self {
            questions,
            sessions,
            ratings,
            persistence,
        }
    }
}
