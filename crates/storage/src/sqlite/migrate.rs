use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Applies schema migrations that have not run yet.
///
/// Version 1 creates the question bank, per-user sessions and ratings.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS questions (
                    id INTEGER PRIMARY KEY,
                    subject TEXT NOT NULL,
                    level TEXT NOT NULL CHECK (level IN ('junior', 'middle', 'senior')),
                    question_text TEXT NOT NULL,
                    option1 TEXT NOT NULL,
                    option2 TEXT NOT NULL,
                    option3 TEXT NOT NULL,
                    option4 TEXT NOT NULL,
                    correct_option INTEGER NOT NULL CHECK (correct_option BETWEEN 1 AND 4)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS quiz_sessions (
                    user_id INTEGER PRIMARY KEY,
                    subject TEXT NOT NULL,
                    level TEXT NOT NULL,
                    question_ids TEXT NOT NULL,
                    answers TEXT NOT NULL,
                    correct_count INTEGER NOT NULL CHECK (correct_count BETWEEN 0 AND 10),
                    active INTEGER NOT NULL CHECK (active IN (0, 1)),
                    started_at TEXT NOT NULL,
                    last_answer_at TEXT,
                    completed_delta INTEGER,
                    completed_rating INTEGER
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS user_ratings (
                    user_id INTEGER PRIMARY KEY,
                    display_name TEXT NOT NULL,
                    mmr INTEGER NOT NULL CHECK (mmr >= 0),
                    total_tests INTEGER NOT NULL CHECK (total_tests >= 0),
                    last_test_at TEXT,
                    created_at TEXT NOT NULL,
                    level_stats TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_questions_subject_level
                    ON questions (subject, level);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_user_ratings_leaderboard
                    ON user_ratings (mmr DESC, last_test_at ASC, user_id ASC)
                    WHERE total_tests > 0;
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(version = 1, "applied schema migration");
    }

    Ok(())
}
