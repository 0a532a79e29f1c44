use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

const MEMORY_URL: &str = "sqlite::memory:";

/// Turn a bare path or `sqlite:` url into an absolute `sqlite://` url.
pub fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == MEMORY_URL || trimmed.starts_with("sqlite://") {
        return trimmed.to_string();
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Make sure the database file and its directory exist before connecting.
pub fn prepare_sqlite_file(db_url: &str) -> Result<()> {
    if db_url == MEMORY_URL {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .with_context(|| format!("invalid database url: {db_url}"))?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        anyhow::bail!("invalid database url: {db_url}");
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        tracing::info!(path = %path.display(), "created database file");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_that_are_already_normal_pass_through() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(
            normalize_sqlite_url(" sqlite:///tmp/quiz.db "),
            "sqlite:///tmp/quiz.db"
        );
    }

    #[test]
    fn bare_paths_become_absolute_urls() {
        assert_eq!(normalize_sqlite_url("/var/lib/quiz.db"), "sqlite:///var/lib/quiz.db");
        assert_eq!(normalize_sqlite_url("sqlite:/srv/q.db"), "sqlite:///srv/q.db");

        let relative = normalize_sqlite_url("quiz.sqlite3");
        assert!(relative.starts_with("sqlite:///"));
        assert!(relative.ends_with("/quiz.sqlite3"));
    }

    #[test]
    fn prepare_creates_missing_file_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("quiz.db");
        let url = format!("sqlite://{}?mode=rwc", path.display());

        prepare_sqlite_file(&url).unwrap();
        assert!(path.exists());
        prepare_sqlite_file(&url).unwrap();
    }

    #[test]
    fn prepare_rejects_foreign_urls() {
        assert!(prepare_sqlite_file("postgres://localhost/quiz").is_err());
        assert!(prepare_sqlite_file("sqlite://").is_err());
        assert!(prepare_sqlite_file("sqlite::memory:").is_ok());
    }
}
