use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::instrument;

use quiz_core::model::{
    AnswerOption, AnswerOutcome, LevelTag, QUESTIONS_PER_SESSION, QuestionId, QuestionItem,
    QuizSession, UserId, UserRating,
};
use storage::repository::{SessionPersistence, SessionRepository, Storage, StorageError};

use super::locks::UserLocks;
use super::progress::SessionProgress;
use super::view::{AnswerResult, CurrentQuestion};
use crate::Clock;
use crate::error::QuizError;
use crate::question_bank::{self, QuestionBank};
use crate::stats::StatsAggregator;

/// Drives each user's quiz: start, answer, complete.
///
/// Mutating calls for the same user run one at a time; calls for different
/// users proceed in parallel. Cloning is cheap and clones share the lock registry.
#[derive(Clone)]
pub struct SessionManager {
    clock: Clock,
    bank: QuestionBank,
    sessions: Arc<dyn SessionRepository>,
    persistence: Arc<dyn SessionPersistence>,
    stats: StatsAggregator,
    locks: UserLocks,
    session_ttl: Option<Duration>,
    rng: Option<Arc<Mutex<StdRng>>>,
}

impl SessionManager {
    #[must_use]
    pub fn new(
        clock: Clock,
        bank: QuestionBank,
        sessions: Arc<dyn SessionRepository>,
        persistence: Arc<dyn SessionPersistence>,
        stats: StatsAggregator,
    ) -> Self {
        Self {
            clock,
            bank,
            sessions,
            persistence,
            stats,
            locks: UserLocks::default(),
            session_ttl: None,
            rng: None,
        }
    }

    /// Wire every collaborator from one `Storage` bundle.
    #[must_use]
    pub fn from_storage(clock: Clock, storage: &Storage) -> Self {
        let bank = QuestionBank::new(Arc::clone(&storage.questions));
        let stats = StatsAggregator::new(
            Arc::clone(&storage.ratings),
            Arc::clone(&storage.persistence),
        );
        Self::new(
            clock,
            bank,
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.persistence),
            stats,
        )
    }

    /// Discard active sessions idle for longer than `ttl`. `None` keeps them forever.
    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.session_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Draw questions from a seeded generator instead of the thread RNG.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Some(Arc::new(Mutex::new(StdRng::seed_from_u64(seed))));
        self
    }

    #[must_use]
    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    #[must_use]
    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    /// Start a fresh session, replacing any existing one, and return its first question.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::InsufficientPool` if fewer than ten questions match
    /// `tag`, or `QuizError::Storage` if persistence fails.
    pub async fn start(&self, user_id: UserId, tag: &LevelTag) -> Result<QuestionItem, QuizError> {
        self.start_as(user_id, "", tag).await
    }

    /// Like [`SessionManager::start`], naming the user if this creates their rating.
    ///
    /// An existing rating keeps its display name.
    ///
    /// # Errors
    ///
    /// See [`SessionManager::start`].
    #[instrument(skip(self, display_name, tag), fields(tag = %tag))]
    pub async fn start_as(
        &self,
        user_id: UserId,
        display_name: &str,
        tag: &LevelTag,
    ) -> Result<QuestionItem, QuizError> {
        let _guard = self.locks.acquire(user_id).await;
        let now = self.clock.now();

        let pool = self.bank.pool(tag).await?;
        let ids = self.draw(tag, &pool)?;
        let session = QuizSession::new(user_id, tag.clone(), ids, now)?;
        let first = session
            .current_question_id()
            .and_then(|id| pool.iter().find(|q| q.id() == id))
            .cloned()
            .ok_or(StorageError::NotFound)?;

        let new_rating = match self.stats.rating(user_id).await? {
            Some(_) => None,
            None => Some(UserRating::new(user_id, display_name, now)),
        };
        self.persistence
            .begin_session(&session, new_rating.as_ref())
            .await?;

        tracing::info!(
            pool = pool.len(),
            new_user = new_rating.is_some(),
            "quiz session started"
        );
        Ok(first)
    }

    /// The question the user should answer next. Never mutates state.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Storage` if persistence fails.
    pub async fn current_question(&self, user_id: UserId) -> Result<CurrentQuestion, QuizError> {
        let Some(session) = self.session(user_id).await? else {
            return Ok(CurrentQuestion::NoSession);
        };

        match session.current_question_id() {
            Some(id) => Ok(CurrentQuestion::Question {
                index: session.current_index(),
                item: self.bank.question(id).await?,
            }),
            None => Ok(session
                .completion()
                .map_or(CurrentQuestion::NoSession, CurrentQuestion::Completed)),
        }
    }

    /// Answer the current question with option 1-4.
    ///
    /// The tenth answer also scores the session and commits the new rating.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::NoActiveSession` if the user has no session in
    /// progress, `QuizError::InvalidOption` if `option` is outside 1-4 (nothing
    /// changes), or `QuizError::Storage` if persistence fails.
    #[instrument(skip(self))]
    pub async fn submit_answer(
        &self,
        user_id: UserId,
        option: u8,
    ) -> Result<AnswerResult, QuizError> {
        let _guard = self.locks.acquire(user_id).await;
        let now = self.clock.now();

        let session = self
            .load_live(user_id, now)
            .await?
            .filter(QuizSession::is_active)
            .ok_or(QuizError::NoActiveSession)?;
        let option = parse_option(option)?;

        self.answer_current(session, option, now).await
    }

    /// Answer the question at 0-based `question_index`, as shown to the client.
    ///
    /// An index that was already answered is a redelivery: the recorded
    /// outcome is returned with `replayed = true` and nothing changes.
    ///
    /// # Errors
    ///
    /// As [`SessionManager::submit_answer`], plus `QuizError::QuestionOutOfSync`
    /// when `question_index` is ahead of the session.
    #[instrument(skip(self))]
    pub async fn submit_answer_for(
        &self,
        user_id: UserId,
        question_index: usize,
        option: u8,
    ) -> Result<AnswerResult, QuizError> {
        let _guard = self.locks.acquire(user_id).await;
        let now = self.clock.now();

        let session = self
            .load_live(user_id, now)
            .await?
            .ok_or(QuizError::NoActiveSession)?;
        let option = parse_option(option)?;

        let current = session.current_index();
        if question_index < current {
            return self.replay(&session, question_index).await;
        }
        if !session.is_active() {
            return Err(QuizError::NoActiveSession);
        }
        if question_index > current {
            return Err(QuizError::QuestionOutOfSync {
                expected: current,
                got: question_index,
            });
        }

        self.answer_current(session, option, now).await
    }

    /// The user's stored session, or `None` if absent or expired.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Storage` if the lookup fails.
    pub async fn session(&self, user_id: UserId) -> Result<Option<QuizSession>, QuizError> {
        let now = self.clock.now();
        Ok(self
            .sessions
            .get_session(user_id)
            .await?
            .filter(|s| !self.is_expired(s, now)))
    }

    /// # Errors
    ///
    /// Returns `QuizError::Storage` if the lookup fails.
    pub async fn progress(&self, user_id: UserId) -> Result<Option<SessionProgress>, QuizError> {
        Ok(self.session(user_id).await?.as_ref().map(SessionProgress::of))
    }

    fn draw(&self, tag: &LevelTag, pool: &[QuestionItem]) -> Result<Vec<QuestionId>, QuizError> {
        match &self.rng {
            Some(rng) => {
                let mut rng = rng.lock().unwrap_or_else(PoisonError::into_inner);
                question_bank::sample_with(tag, pool, QUESTIONS_PER_SESSION, &mut *rng)
            }
            None => question_bank::sample(tag, pool, QUESTIONS_PER_SESSION),
        }
    }

    fn is_expired(&self, session: &QuizSession, now: DateTime<Utc>) -> bool {
        self.session_ttl
            .is_some_and(|ttl| session.is_expired(now, ttl))
    }

    /// Load the session for a mutating call, dropping it if it has expired.
    async fn load_live(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<QuizSession>, QuizError> {
        let Some(session) = self.sessions.get_session(user_id).await? else {
            return Ok(None);
        };
        if self.is_expired(&session, now) {
            self.sessions.delete_session(user_id).await?;
            tracing::info!(
                answered = session.current_index(),
                idle_since = %session.last_activity_at(),
                "expired quiz session discarded"
            );
            return Ok(None);
        }
        Ok(Some(session))
    }

    async fn answer_current(
        &self,
        mut session: QuizSession,
        option: AnswerOption,
        now: DateTime<Utc>,
    ) -> Result<AnswerResult, QuizError> {
        let id = session
            .current_question_id()
            .ok_or(QuizError::NoActiveSession)?;
        let question = self.bank.question(id).await?;
        let outcome = session.record_answer(&question, option, now)?;

        if session.is_active() {
            self.sessions.upsert_session(&session).await?;
            tracing::debug!(
                answered = session.current_index(),
                correct = outcome.correct,
                "answer recorded"
            );
            return Ok(AnswerResult {
                outcome,
                completed: None,
                replayed: false,
            });
        }

        self.stats.record_completion(&mut session, now).await?;
        Ok(AnswerResult {
            outcome,
            completed: session.completion(),
            replayed: false,
        })
    }

    async fn replay(&self, session: &QuizSession, index: usize) -> Result<AnswerResult, QuizError> {
        let (Some(id), Some(selected)) = (session.question_id_at(index), session.answer_at(index))
        else {
            return Err(QuizError::QuestionOutOfSync {
                expected: session.current_index(),
                got: index,
            });
        };
        let question = self.bank.question(id).await?;
        let completed = if index + 1 == QUESTIONS_PER_SESSION {
            session.completion()
        } else {
            None
        };

        tracing::debug!(index, "duplicate answer replayed");
        Ok(AnswerResult {
            outcome: AnswerOutcome::evaluate(&question, selected),
            completed,
            replayed: true,
        })
    }
}

fn parse_option(option: u8) -> Result<AnswerOption, QuizError> {
    AnswerOption::new(option).map_err(|_| QuizError::InvalidOption(option))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{Level, Subject};
    use quiz_core::time::fixed_now;
    use storage::repository::{QuestionRepository, RatingRepository};

    fn tag() -> LevelTag {
        LevelTag::new(Subject::new("go").unwrap(), Level::Junior)
    }

    async fn manager_with_pool(size: u64) -> (SessionManager, Storage) {
        let storage = Storage::in_memory();
        for id in 1..=size {
            let question = QuestionItem::new(
                QuestionId::new(id),
                tag(),
                format!("Q{id}"),
                ["w".into(), "x".into(), "y".into(), "z".into()],
                1,
            )
            .unwrap();
            storage.questions.upsert_question(&question).await.unwrap();
        }
        let manager =
            SessionManager::from_storage(Clock::fixed(fixed_now()), &storage).with_seed(3);
        (manager, storage)
    }

    #[tokio::test]
    async fn start_creates_rating_once_with_first_name() {
        let (manager, storage) = manager_with_pool(12).await;
        let user = UserId::new(5);

        manager.start_as(user, "ada", &tag()).await.unwrap();
        manager.start_as(user, "lovelace", &tag()).await.unwrap();

        let rating = storage.ratings.get_rating(user).await.unwrap().unwrap();
        assert_eq!(rating.display_name(), "ada");
        assert_eq!(rating.total_tests(), 0);
    }

    #[tokio::test]
    async fn first_question_matches_current_question() {
        let (manager, _storage) = manager_with_pool(12).await;
        let user = UserId::new(6);

        let first = manager.start(user, &tag()).await.unwrap();
        match manager.current_question(user).await.unwrap() {
            CurrentQuestion::Question { index, item } => {
                assert_eq!(index, 0);
                assert_eq!(item, first);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_option_is_checked_after_session_presence() {
        let (manager, _storage) = manager_with_pool(12).await;
        let user = UserId::new(7);

        assert!(matches!(
            manager.submit_answer(user, 9).await,
            Err(QuizError::NoActiveSession)
        ));

        manager.start(user, &tag()).await.unwrap();
        assert!(matches!(
            manager.submit_answer(user, 0).await,
            Err(QuizError::InvalidOption(0))
        ));
        assert_eq!(manager.session(user).await.unwrap().unwrap().current_index(), 0);
    }

    #[tokio::test]
    async fn ahead_of_session_is_out_of_sync() {
        let (manager, _storage) = manager_with_pool(12).await;
        let user = UserId::new(8);
        manager.start(user, &tag()).await.unwrap();

        let err = manager.submit_answer_for(user, 2, 1).await.unwrap_err();
        assert!(matches!(
            err,
            QuizError::QuestionOutOfSync {
                expected: 0,
                got: 2
            }
        ));
    }

    #[tokio::test]
    async fn progress_reflects_answers() {
        let (manager, _storage) = manager_with_pool(12).await;
        let user = UserId::new(9);
        assert!(manager.progress(user).await.unwrap().is_none());

        manager.start(user, &tag()).await.unwrap();
        manager.submit_answer(user, 1).await.unwrap();
        manager.submit_answer(user, 2).await.unwrap();

        let progress = manager.progress(user).await.unwrap().unwrap();
        assert_eq!(progress.answered, 2);
        assert_eq!(progress.remaining, 8);
        assert_eq!(progress.correct, 1);
        assert!(!progress.is_complete);
    }
}
