//! Runtime configuration for the `quiz` binary.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DB_URL_ENV: &str = "QUIZ_DB_URL";
pub const SESSION_TTL_ENV: &str = "QUIZ_SESSION_TTL_MINUTES";

/// Top-level quiz configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizConfig {
    /// `SQLite` database url or path.
    #[serde(default = "default_db_url")]
    pub db_url: String,
    /// Idle minutes after which an unfinished session is dropped. Unset keeps sessions forever.
    #[serde(default)]
    pub session_ttl_minutes: Option<u32>,
    /// Rows shown by `quiz leaderboard` when `--top` is not given.
    #[serde(default = "default_leaderboard_size")]
    pub leaderboard_size: u32,
}

fn default_db_url() -> String {
    "sqlite://quiz.sqlite3".to_string()
}

fn default_leaderboard_size() -> u32 {
    5
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            db_url: default_db_url(),
            session_ttl_minutes: None,
            leaderboard_size: default_leaderboard_size(),
        }
    }
}

impl QuizConfig {
    #[must_use]
    pub fn session_ttl(&self) -> Option<chrono::Duration> {
        self.session_ttl_minutes
            .map(|minutes| chrono::Duration::minutes(i64::from(minutes)))
    }

    /// Apply `QUIZ_*` overrides; `lookup` reads one variable.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(DB_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.db_url = url;
        }
        if let Some(raw) = lookup(SESSION_TTL_ENV) {
            let raw = raw.trim();
            self.session_ttl_minutes = match raw {
                "" | "0" | "none" => None,
                minutes => Some(
                    minutes
                        .parse()
                        .with_context(|| format!("invalid {SESSION_TTL_ENV}: {minutes}"))?,
                ),
            };
        }
        Ok(())
    }
}

/// Load config from an explicit path, or from `quiz.toml` in the current
/// directory if it exists, then apply environment overrides.
pub fn load_config_from(path: Option<&Path>) -> Result<QuizConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => Some(PathBuf::from("quiz.toml")).filter(|p| p.exists()),
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            let config = toml::from_str::<QuizConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?;
            tracing::debug!(path = %path.display(), "config loaded");
            config
        }
        None => QuizConfig::default(),
    };

    config.apply_env(|name| std::env::var(name).ok())?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config: QuizConfig = toml::from_str("").unwrap();
        assert_eq!(config, QuizConfig::default());
        assert_eq!(config.db_url, "sqlite://quiz.sqlite3");
        assert_eq!(config.leaderboard_size, 5);
        assert!(config.session_ttl().is_none());
    }

    #[test]
    fn file_values_are_read() {
        let config: QuizConfig = toml::from_str(
            r#"
                db_url = "sqlite://data/quiz.db"
                session_ttl_minutes = 45
                leaderboard_size = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.db_url, "sqlite://data/quiz.db");
        assert_eq!(config.session_ttl(), Some(chrono::Duration::minutes(45)));
        assert_eq!(config.leaderboard_size, 10);
    }

    #[test]
    fn environment_overrides_file() {
        let mut config = QuizConfig {
            session_ttl_minutes: Some(10),
            ..QuizConfig::default()
        };
        config
            .apply_env(env(&[
                (DB_URL_ENV, "sqlite::memory:"),
                (SESSION_TTL_ENV, "none"),
            ]))
            .unwrap();
        assert_eq!(config.db_url, "sqlite::memory:");
        assert_eq!(config.session_ttl_minutes, None);

        config.apply_env(env(&[(SESSION_TTL_ENV, "90")])).unwrap();
        assert_eq!(config.session_ttl_minutes, Some(90));
        assert!(config.apply_env(env(&[(SESSION_TTL_ENV, "soon")])).is_err());
    }

    #[test]
    fn explicit_path_must_exist() {
        let err = load_config_from(Some(Path::new("/definitely/missing/quiz.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn explicit_path_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "leaderboard_size = 3").unwrap();
        let config = load_config_from(Some(file.path())).unwrap();
        assert_eq!(config.leaderboard_size, 3);
    }
}
