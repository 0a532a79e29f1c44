use std::sync::Arc;

use rand::Rng;
use rand::seq::index;

use quiz_core::model::{LevelTag, QuestionId, QuestionItem};
use storage::repository::QuestionRepository;

use crate::error::QuizError;

/// Read side of the question store, plus random draws for new sessions.
#[derive(Clone)]
pub struct QuestionBank {
    questions: Arc<dyn QuestionRepository>,
}

impl QuestionBank {
    #[must_use]
    pub fn new(questions: Arc<dyn QuestionRepository>) -> Self {
        Self { questions }
    }

    /// All questions tagged with exactly `tag`.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Storage` if the lookup fails.
    pub async fn pool(&self, tag: &LevelTag) -> Result<Vec<QuestionItem>, QuizError> {
        Ok(self.questions.query_questions(tag).await?)
    }

    /// Resolve ids back to questions, keeping the order of `ids`.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Storage` if any id is unknown or the lookup fails.
    pub async fn questions(&self, ids: &[QuestionId]) -> Result<Vec<QuestionItem>, QuizError> {
        Ok(self.questions.get_questions(ids).await?)
    }

    /// # Errors
    ///
    /// Returns `QuizError::Storage` if the id is unknown or the lookup fails.
    pub async fn question(&self, id: QuestionId) -> Result<QuestionItem, QuizError> {
        let mut found = self.questions.get_questions(&[id]).await?;
        found
            .pop()
            .ok_or(QuizError::Storage(storage::StorageError::NotFound))
    }

    /// Insert or replace a question. Used by seeding only.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Storage` if the write fails.
    pub async fn add(&self, question: &QuestionItem) -> Result<(), QuizError> {
        self.questions.upsert_question(question).await?;
        tracing::debug!(question_id = %question.id(), tag = %question.tag(), "question stored");
        Ok(())
    }

    /// Question counts per subject/level.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Storage` if the lookup fails.
    pub async fn pool_sizes(&self) -> Result<Vec<(LevelTag, usize)>, QuizError> {
        Ok(self.questions.pool_sizes().await?)
    }
}

/// Draw `count` distinct ids from `pool` using the thread-local RNG.
///
/// # Errors
///
/// Returns `QuizError::InsufficientPool` if `pool` holds fewer than `count` questions.
pub fn sample(
    tag: &LevelTag,
    pool: &[QuestionItem],
    count: usize,
) -> Result<Vec<QuestionId>, QuizError> {
    sample_with(tag, pool, count, &mut rand::rng())
}

/// Draw `count` distinct ids from `pool`, uniformly without replacement.
///
/// The returned order is the draw order and becomes the question order of the session.
///
/// # Errors
///
/// Returns `QuizError::InsufficientPool` if `pool` holds fewer than `count` questions.
pub fn sample_with<R: Rng + ?Sized>(
    tag: &LevelTag,
    pool: &[QuestionItem],
    count: usize,
    rng: &mut R,
) -> Result<Vec<QuestionId>, QuizError> {
    if pool.len() < count {
        return Err(QuizError::InsufficientPool {
            tag: tag.clone(),
            available: pool.len(),
            required: count,
        });
    }

    Ok(index::sample(rng, pool.len(), count)
        .into_iter()
        .map(|i| pool[i].id())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{Level, Subject};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;
    use storage::repository::InMemoryRepository;

    fn tag() -> LevelTag {
        LevelTag::new(Subject::new("python").unwrap(), Level::Middle)
    }

    fn pool(size: u64) -> Vec<QuestionItem> {
        (1..=size)
            .map(|id| {
                QuestionItem::new(
                    QuestionId::new(id),
                    tag(),
                    format!("Q{id}"),
                    ["a".into(), "b".into(), "c".into(), "d".into()],
                    1,
                )
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn sample_returns_distinct_members_of_the_pool() {
        let pool = pool(25);
        let known: HashSet<_> = pool.iter().map(QuestionItem::id).collect();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..50 {
            let ids = sample_with(&tag(), &pool, 10, &mut rng).unwrap();
            assert_eq!(ids.len(), 10);
            let unique: HashSet<_> = ids.iter().copied().collect();
            assert_eq!(unique.len(), 10);
            assert!(unique.is_subset(&known));
        }
    }

    #[test]
    fn sample_is_deterministic_for_a_seed() {
        let pool = pool(30);
        let a = sample_with(&tag(), &pool, 10, &mut StdRng::seed_from_u64(42)).unwrap();
        let b = sample_with(&tag(), &pool, 10, &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn exact_pool_uses_every_question() {
        let pool = pool(10);
        let ids = sample(&tag(), &pool, 10).unwrap();
        let unique: HashSet<_> = ids.into_iter().collect();
        assert_eq!(unique.len(), 10);
    }

    #[test]
    fn small_pool_is_rejected() {
        let err = sample(&tag(), &pool(5), 10).unwrap_err();
        assert!(matches!(
            err,
            QuizError::InsufficientPool {
                available: 5,
                required: 10,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn bank_resolves_single_questions() {
        let bank = QuestionBank::new(Arc::new(InMemoryRepository::new()));
        for question in pool(3) {
            bank.add(&question).await.unwrap();
        }

        let q = bank.question(QuestionId::new(2)).await.unwrap();
        assert_eq!(q.text(), "Q2");
        assert!(matches!(
            bank.question(QuestionId::new(9)).await,
            Err(QuizError::Storage(storage::StorageError::NotFound))
        ));
        assert_eq!(bank.pool(&tag()).await.unwrap().len(), 3);
        assert_eq!(bank.pool_sizes().await.unwrap(), vec![(tag(), 3)]);
    }
}
