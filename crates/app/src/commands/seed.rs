//! The `quiz seed` command.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use quiz_core::model::{Level, LevelTag, OPTION_COUNT, QuestionId, QuestionItem, Subject};
use services::QuestionBank;

/// One question as written in a seed file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuestionRecord {
    pub id: u64,
    pub subject: String,
    pub level: String,
    pub question: String,
    pub options: [String; OPTION_COUNT],
    /// 1-based.
    pub correct_option: u8,
}

impl QuestionRecord {
    pub fn into_item(self) -> Result<QuestionItem, quiz_core::Error> {
        let tag = LevelTag::new(Subject::new(&self.subject)?, self.level.parse::<Level>()?);
        Ok(QuestionItem::new(
            QuestionId::new(self.id),
            tag,
            self.question,
            self.options,
            self.correct_option,
        )?)
    }
}

/// Parse a JSON array of questions, rejecting the whole file on the first bad record.
pub fn parse_questions(json: &str) -> Result<Vec<QuestionItem>> {
    let records: Vec<QuestionRecord> =
        serde_json::from_str(json).context("seed file is not a JSON array of questions")?;
    records
        .into_iter()
        .enumerate()
        .map(|(i, record)| {
            let id = record.id;
            record
                .into_item()
                .with_context(|| format!("record {i} (id {id}) is invalid"))
        })
        .collect()
}

pub async fn execute(bank: &QuestionBank, file: &Path) -> Result<()> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read seed file: {}", file.display()))?;
    let questions = parse_questions(&json)?;

    for question in &questions {
        bank.add(question).await?;
    }
    tracing::info!(count = questions.len(), file = %file.display(), "questions seeded");

    println!("Stored {} questions.", questions.len());
    for (tag, size) in bank.pool_sizes().await? {
        println!("  {tag:<24} {size}");
    }
    Ok(())
}
