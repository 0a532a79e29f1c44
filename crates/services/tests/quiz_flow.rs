use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::Duration;
use quiz_core::model::{
    Level, LevelTag, QuestionId, QuestionItem, QuizSession, ScoreBand, Subject, UserId,
    UserRating,
};
use quiz_core::time::fixed_now;
use services::{AnswerResult, Clock, CurrentQuestion, QuizError, SessionManager};
use storage::repository::{
    InMemoryRepository, QuestionRepository, SessionPersistence, SessionRepository, Storage,
    StorageError,
};

fn tag(subject: &str, level: Level) -> LevelTag {
    LevelTag::new(Subject::new(subject).unwrap(), level)
}

async fn seed(storage: &Storage, tag: &LevelTag, first_id: u64, count: u64) {
    for id in first_id..first_id + count {
        let correct = u8::try_from(id % 4).unwrap() + 1;
        let question = QuestionItem::new(
            QuestionId::new(id),
            tag.clone(),
            format!("{tag} question {id}"),
            [
                format!("option {id}.1"),
                format!("option {id}.2"),
                format!("option {id}.3"),
                format!("option {id}.4"),
            ],
            correct,
        )
        .unwrap();
        storage.questions.upsert_question(&question).await.unwrap();
    }
}

fn manager(storage: &Storage) -> SessionManager {
    SessionManager::from_storage(Clock::fixed(fixed_now()), storage).with_seed(11)
}

async fn answer_next(manager: &SessionManager, user: UserId, correct: bool) -> AnswerResult {
    let CurrentQuestion::Question { item, .. } = manager.current_question(user).await.unwrap()
    else {
        panic!("expected a pending question");
    };
    let right = item.correct_option().value();
    let pick = if correct { right } else { right % 4 + 1 };
    manager.submit_answer(user, pick).await.unwrap()
}

async fn play(manager: &SessionManager, user: UserId, correct: usize) -> AnswerResult {
    let mut last = None;
    for i in 0..10 {
        last = Some(answer_next(manager, user, i < correct).await);
    }
    last.unwrap()
}

#[tokio::test]
async fn full_session_scores_and_ranks_user() {
    let storage = Storage::in_memory();
    let middle = tag("java", Level::Middle);
    seed(&storage, &middle, 1, 15).await;
    let manager = manager(&storage);
    let user = UserId::new(100);

    manager.start_as(user, "Ada", &middle).await.unwrap();

    let mut correct_seen = 0;
    for i in 0..10 {
        let result = answer_next(&manager, user, i < 7).await;
        assert!(!result.replayed);
        assert_eq!(result.outcome.correct, i < 7);
        if result.outcome.correct {
            correct_seen += 1;
            assert_eq!(
                result.outcome.selected_option_text,
                result.outcome.correct_option_text
            );
        }
        assert_eq!(result.is_complete(), i == 9);
    }
    assert_eq!(correct_seen, 7);

    let CurrentQuestion::Completed(summary) = manager.current_question(user).await.unwrap() else {
        panic!("session should be completed");
    };
    assert_eq!(summary.correct_count, 7);
    assert_eq!(summary.rating_delta, 24);
    assert_eq!(summary.new_rating, 1024);
    assert_eq!(summary.band(), ScoreBand::Good);

    let rating = manager.stats().rating(user).await.unwrap().unwrap();
    assert_eq!(rating.mmr(), 1024);
    assert_eq!(rating.total_tests(), 1);
    assert_eq!(rating.display_name(), "Ada");
    assert_eq!(rating.level_stats().get(Level::Middle).tests, 1);

    let board = manager.stats().leaderboard(5).await.unwrap();
    assert_eq!(board.len(), 1);
    assert_eq!(board[0].rank, 1);
    assert_eq!(board[0].rating.user_id(), user);
}

#[tokio::test]
async fn small_pool_fails_without_side_effects() {
    let storage = Storage::in_memory();
    let senior = tag("sql", Level::Senior);
    seed(&storage, &senior, 1, 5).await;
    seed(&storage, &tag("sql", Level::Junior), 100, 20).await;
    let manager = manager(&storage);
    let user = UserId::new(1);

    let err = manager.start(user, &senior).await.unwrap_err();
    assert!(matches!(
        err,
        QuizError::InsufficientPool {
            available: 5,
            required: 10,
            ..
        }
    ));
    assert!(manager.session(user).await.unwrap().is_none());
    assert!(manager.stats().rating(user).await.unwrap().is_none());
}

#[tokio::test]
async fn drawn_questions_stay_within_the_requested_tag() {
    let storage = Storage::in_memory();
    let junior = tag("python", Level::Junior);
    seed(&storage, &junior, 1, 12).await;
    seed(&storage, &tag("python", Level::Senior), 100, 12).await;
    seed(&storage, &tag("java", Level::Junior), 200, 12).await;
    let manager = manager(&storage);
    let user = UserId::new(2);

    manager.start(user, &junior).await.unwrap();
    let session = manager.session(user).await.unwrap().unwrap();
    let questions = manager.bank().questions(session.question_ids()).await.unwrap();
    assert_eq!(questions.len(), 10);
    assert!(questions.iter().all(|q| q.tag() == &junior));
}

#[tokio::test]
async fn invalid_option_does_not_advance() {
    let storage = Storage::in_memory();
    let junior = tag("java", Level::Junior);
    seed(&storage, &junior, 1, 10).await;
    let manager = manager(&storage);
    let user = UserId::new(3);

    manager.start(user, &junior).await.unwrap();
    answer_next(&manager, user, true).await;
    let before = manager.session(user).await.unwrap().unwrap();

    for bad in [0, 5, 255] {
        let err = manager.submit_answer(user, bad).await.unwrap_err();
        assert!(matches!(err, QuizError::InvalidOption(v) if v == bad));
    }
    assert_eq!(manager.session(user).await.unwrap().unwrap(), before);
}

#[tokio::test]
async fn completed_session_rejects_further_answers() {
    let storage = Storage::in_memory();
    let junior = tag("java", Level::Junior);
    seed(&storage, &junior, 1, 10).await;
    let manager = manager(&storage);
    let user = UserId::new(4);

    manager.start(user, &junior).await.unwrap();
    let last = play(&manager, user, 10).await;
    assert_eq!(last.completed.unwrap().correct_count, 10);

    assert!(matches!(
        manager.submit_answer(user, 1).await,
        Err(QuizError::NoActiveSession)
    ));
    assert!(matches!(
        manager.submit_answer_for(user, 10, 1).await,
        Err(QuizError::NoActiveSession)
    ));
}

#[tokio::test]
async fn redelivered_answers_are_replayed_not_counted() {
    let storage = Storage::in_memory();
    let junior = tag("java", Level::Junior);
    seed(&storage, &junior, 1, 10).await;
    let manager = manager(&storage);
    let user = UserId::new(5);

    manager.start(user, &junior).await.unwrap();
    let first = answer_next(&manager, user, true).await;

    let replay = manager.submit_answer_for(user, 0, 3).await.unwrap();
    assert!(replay.replayed);
    assert_eq!(replay.outcome, first.outcome);
    let session = manager.session(user).await.unwrap().unwrap();
    assert_eq!(session.current_index(), 1);
    assert_eq!(session.correct_count(), 1);

    for _ in 1..9 {
        answer_next(&manager, user, false).await;
    }
    let CurrentQuestion::Question { index, item } = manager.current_question(user).await.unwrap()
    else {
        panic!("last question pending");
    };
    assert_eq!(index, 9);
    let last = manager
        .submit_answer_for(user, 9, item.correct_option().value())
        .await
        .unwrap();
    let completed = last.completed.unwrap();

    let again = manager
        .submit_answer_for(user, 9, item.correct_option().value())
        .await
        .unwrap();
    assert!(again.replayed);
    assert_eq!(again.completed, Some(completed));
    assert_eq!(again.outcome, last.outcome);

    let rating = manager.stats().rating(user).await.unwrap().unwrap();
    assert_eq!(rating.total_tests(), 1);
    assert_eq!(rating.mmr(), completed.new_rating);
}

#[tokio::test]
async fn restart_discards_previous_progress() {
    let storage = Storage::in_memory();
    let junior = tag("java", Level::Junior);
    let middle = tag("java", Level::Middle);
    seed(&storage, &junior, 1, 10).await;
    seed(&storage, &middle, 100, 10).await;
    let manager = manager(&storage);
    let user = UserId::new(6);

    manager.start(user, &junior).await.unwrap();
    for _ in 0..4 {
        answer_next(&manager, user, true).await;
    }

    manager.start(user, &middle).await.unwrap();
    let session = manager.session(user).await.unwrap().unwrap();
    assert_eq!(session.current_index(), 0);
    assert_eq!(session.correct_count(), 0);
    assert_eq!(session.tag(), &middle);

    let rating = manager.stats().rating(user).await.unwrap().unwrap();
    assert_eq!(rating.total_tests(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_answers_for_one_user_are_serialized() {
    let storage = Storage::in_memory();
    let junior = tag("go", Level::Junior);
    seed(&storage, &junior, 1, 10).await;
    let manager = manager(&storage);
    let user = UserId::new(7);
    manager.start(user, &junior).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let manager = manager.clone();
        handles.push(tokio::spawn(
            async move { manager.submit_answer(user, 1).await },
        ));
    }

    let mut completions = 0;
    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        if result.completed.is_some() {
            completions += 1;
        }
    }
    assert_eq!(completions, 1);

    let session = manager.session(user).await.unwrap().unwrap();
    assert!(!session.is_active());
    assert_eq!(session.answers().len(), 10);
    let rating = manager.stats().rating(user).await.unwrap().unwrap();
    assert_eq!(rating.total_tests(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn different_users_progress_independently() {
    let storage = Storage::in_memory();
    let junior = tag("go", Level::Junior);
    seed(&storage, &junior, 1, 20).await;
    let manager = manager(&storage);

    let mut handles = Vec::new();
    for id in 1..=8_u64 {
        let manager = manager.clone();
        let junior = junior.clone();
        handles.push(tokio::spawn(async move {
            let user = UserId::new(id);
            manager.start(user, &junior).await.unwrap();
            play(&manager, user, usize::try_from(id).unwrap()).await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().completed.is_some());
    }

    let board = manager.stats().leaderboard(3).await.unwrap();
    let ids: Vec<u64> = board.iter().map(|e| e.rating.user_id().value()).collect();
    assert_eq!(ids, vec![8, 7, 6]);
}

#[tokio::test]
async fn equal_ratings_rank_earlier_finisher_first() {
    let storage = Storage::in_memory();
    let junior = tag("java", Level::Junior);
    seed(&storage, &junior, 1, 10).await;
    let base = manager(&storage);

    let late = base
        .clone()
        .with_clock(Clock::fixed(fixed_now()).advanced(Duration::minutes(10)));
    late.start(UserId::new(1), &junior).await.unwrap();
    play(&late, UserId::new(1), 6).await;

    let early = base
        .clone()
        .with_clock(Clock::fixed(fixed_now()).advanced(Duration::minutes(5)));
    early.start(UserId::new(2), &junior).await.unwrap();
    play(&early, UserId::new(2), 6).await;

    let board = base.stats().leaderboard(5).await.unwrap();
    assert_eq!(board[0].rating.mmr(), board[1].rating.mmr());
    assert_eq!(board[0].rating.user_id(), UserId::new(2));
    assert_eq!(board[1].rating.user_id(), UserId::new(1));
}

#[tokio::test]
async fn idle_session_expires_when_ttl_is_set() {
    let storage = Storage::in_memory();
    let junior = tag("java", Level::Junior);
    seed(&storage, &junior, 1, 10).await;
    let ttl = Some(Duration::minutes(30));
    let manager = manager(&storage).with_session_ttl(ttl);
    let user = UserId::new(9);

    manager.start(user, &junior).await.unwrap();
    answer_next(&manager, user, true).await;

    let later = manager
        .clone()
        .with_clock(Clock::fixed(fixed_now()).advanced(Duration::minutes(31)));
    assert!(matches!(
        later.current_question(user).await.unwrap(),
        CurrentQuestion::NoSession
    ));
    assert!(matches!(
        later.submit_answer(user, 1).await,
        Err(QuizError::NoActiveSession)
    ));
    assert!(storage.sessions.get_session(user).await.unwrap().is_none());
}

#[tokio::test]
async fn sessions_never_expire_without_ttl() {
    let storage = Storage::in_memory();
    let junior = tag("java", Level::Junior);
    seed(&storage, &junior, 1, 10).await;
    let manager = manager(&storage);
    let user = UserId::new(10);

    manager.start(user, &junior).await.unwrap();
    let much_later = manager
        .clone()
        .with_clock(Clock::fixed(fixed_now()).advanced(Duration::days(30)));
    assert!(matches!(
        much_later.current_question(user).await.unwrap(),
        CurrentQuestion::Question { index: 0, .. }
    ));
    much_later.submit_answer(user, 1).await.unwrap();
}

/// Delegates to the in-memory store but fails the first `failures` completion commits.
struct FailingCommits {
    inner: InMemoryRepository,
    failures: AtomicU32,
}

#[async_trait::async_trait]
impl SessionPersistence for FailingCommits {
    async fn begin_session(
        &self,
        session: &QuizSession,
        new_rating: Option<&UserRating>,
    ) -> Result<(), StorageError> {
        self.inner.begin_session(session, new_rating).await
    }

    async fn commit_completion(
        &self,
        session: &QuizSession,
        rating: &UserRating,
    ) -> Result<(), StorageError> {
        let pending = self.failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.failures.store(pending - 1, Ordering::SeqCst);
            return Err(StorageError::Connection("disk unavailable".into()));
        }
        self.inner.commit_completion(session, rating).await
    }
}

#[tokio::test]
async fn failed_completion_keeps_session_open_and_retry_rates_once() {
    let repo = InMemoryRepository::new();
    let mut storage = Storage::from_repository(repo.clone());
    storage.persistence = Arc::new(FailingCommits {
        inner: repo,
        failures: AtomicU32::new(1),
    });
    let junior = tag("java", Level::Junior);
    seed(&storage, &junior, 1, 12).await;
    let manager = manager(&storage);
    let user = UserId::new(77);

    manager.start(user, &junior).await.unwrap();
    for _ in 0..9 {
        answer_next(&manager, user, true).await;
    }

    let CurrentQuestion::Question { item, .. } = manager.current_question(user).await.unwrap()
    else {
        panic!("expected the last question");
    };
    let err = manager
        .submit_answer(user, item.correct_option().value())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        QuizError::Storage(StorageError::Connection(_))
    ));

    let stored = manager.session(user).await.unwrap().unwrap();
    assert_eq!(stored.current_index(), 9);
    assert!(stored.is_active());
    let rating = manager.stats().rating(user).await.unwrap().unwrap();
    assert_eq!(rating.total_tests(), 0);
    assert_eq!(rating.mmr(), 1000);

    let retried = answer_next(&manager, user, true).await;
    let summary = retried.completed.expect("retry completes the session");
    assert_eq!(summary.correct_count, 10);

    let rating = manager.stats().rating(user).await.unwrap().unwrap();
    assert_eq!(rating.total_tests(), 1);
    assert_eq!(rating.mmr(), summary.new_rating);
    assert!(matches!(
        manager.submit_answer(user, 1).await,
        Err(QuizError::NoActiveSession)
    ));
}
