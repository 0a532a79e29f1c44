//! `quiz`: multiple-choice quizzes with Elo-style ratings, on the command line.

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use quiz_core::model::{Level, LevelTag, Subject, UserId};
use services::{Clock, SessionManager};
use storage::repository::Storage;

mod commands;
mod config;
mod db;

#[derive(Parser)]
#[command(name = "quiz", version, about = "Ten-question quizzes with a rating leaderboard")]
struct Cli {
    /// Config file path (defaults to ./quiz.toml when present)
    #[arg(long, global = true, env = "QUIZ_CONFIG")]
    config: Option<PathBuf>,

    /// Database url or file path, overriding the config
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Insert or replace questions from a JSON file
    Seed {
        #[arg(long)]
        file: PathBuf,
    },

    /// Take a ten-question quiz
    Play {
        #[arg(long)]
        user: u64,

        /// Display name used when the user is new
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        subject: String,

        /// junior, middle or senior
        #[arg(long)]
        level: Level,

        /// Continue an unfinished quiz instead of starting over
        #[arg(long)]
        resume: bool,
    },

    /// Show the best players
    Leaderboard {
        /// Number of rows (defaults to the configured leaderboard size)
        #[arg(long)]
        top: Option<u32>,
    },

    /// Show a user's rating and current quiz
    Status {
        #[arg(long)]
        user: u64,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quiz=info")),
        )
        .init();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = config::load_config_from(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.db_url = db;
    }

    // Open + migrate SQLite here so the library crates never touch the filesystem.
    let db_url = db::normalize_sqlite_url(&config.db_url);
    db::prepare_sqlite_file(&db_url)?;
    let storage = Storage::sqlite(&db_url)
        .await
        .with_context(|| format!("failed to open database {db_url}"))?;
    tracing::debug!(%db_url, ttl = ?config.session_ttl_minutes, "storage ready");

    let manager = SessionManager::from_storage(Clock::default(), &storage)
        .with_session_ttl(config.session_ttl());

    match cli.command {
        Commands::Seed { file } => commands::seed::execute(manager.bank(), &file).await,
        Commands::Play {
            user,
            name,
            subject,
            level,
            resume,
        } => {
            let tag = LevelTag::new(Subject::new(&subject)?, level);
            commands::play::execute(
                &manager,
                UserId::new(user),
                name.as_deref().unwrap_or_default(),
                &tag,
                resume,
            )
            .await
        }
        Commands::Leaderboard { top } => {
            let top = top.unwrap_or(config.leaderboard_size);
            commands::leaderboard::execute(manager.stats(), top).await
        }
        Commands::Status { user } => {
            commands::status::execute(&manager, UserId::new(user)).await
        }
    }
}
