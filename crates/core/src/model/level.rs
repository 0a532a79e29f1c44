use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown level: {raw} (expected junior, middle or senior)")]
pub struct ParseLevelError {
    raw: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SubjectError {
    #[error("subject must not be empty")]
    Empty,
    #[error("subject must not contain '/': {0}")]
    InvalidCharacter(String),
    #[error("level tag must look like subject/level, got {0}")]
    MalformedTag(String),
}

//
// ─── LEVEL ────────────────────────────────────────────────────────────────────
//

/// Difficulty tier of a question pool.
///
/// The same three tiers apply to every subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Junior,
    Middle,
    Senior,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Junior, Level::Middle, Level::Senior];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Junior => "junior",
            Level::Middle => "middle",
            Level::Senior => "senior",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "junior" => Ok(Level::Junior),
            "middle" => Ok(Level::Middle),
            "senior" => Ok(Level::Senior),
            _ => Err(ParseLevelError { raw: s.to_owned() }),
        }
    }
}

//
// ─── SUBJECT ──────────────────────────────────────────────────────────────────
//

/// Knowledge area a question belongs to, e.g. `java` or `sql`.
///
/// Stored trimmed and lower-cased so lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Subject(String);

impl Subject {
    /// Normalize and validate a subject name.
    ///
    /// # Errors
    ///
    /// Returns `SubjectError::Empty` for blank input and
    /// `SubjectError::InvalidCharacter` if the name contains the tag separator.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, SubjectError> {
        let normalized = raw.as_ref().trim().to_lowercase();
        if normalized.is_empty() {
            return Err(SubjectError::Empty);
        }
        if normalized.contains('/') {
            return Err(SubjectError::InvalidCharacter(normalized));
        }
        Ok(Self(normalized))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Subject {
    type Error = SubjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Subject> for String {
    fn from(value: Subject) -> Self {
        value.0
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Subject {
    type Err = SubjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

//
// ─── LEVEL TAG ────────────────────────────────────────────────────────────────
//

/// Subject plus level; identifies exactly one question pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LevelTag {
    subject: Subject,
    level: Level,
}

impl LevelTag {
    #[must_use]
    pub fn new(subject: Subject, level: Level) -> Self {
        Self { subject, level }
    }

    #[must_use]
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }
}

impl fmt::Display for LevelTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.subject, self.level)
    }
}

impl FromStr for LevelTag {
    type Err = SubjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (subject, level) = s
            .split_once('/')
            .ok_or_else(|| SubjectError::MalformedTag(s.to_owned()))?;
        let level = level
            .parse::<Level>()
            .map_err(|_| SubjectError::MalformedTag(s.to_owned()))?;
        Ok(Self::new(Subject::new(subject)?, level))
    }
}
