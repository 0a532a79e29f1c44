//! The `quiz play` command: an interactive session on stdin/stdout.

use std::io::Write;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use quiz_core::model::{LevelTag, QuestionItem, RatingTrend, ScoreBand, SessionCompleted, UserId};
use services::{AnswerResult, CurrentQuestion, QuizError, SessionManager};

pub async fn execute(
    manager: &SessionManager,
    user_id: UserId,
    name: &str,
    tag: &LevelTag,
    resume: bool,
) -> Result<()> {
    let pending = matches!(
        manager.current_question(user_id).await?,
        CurrentQuestion::Question { .. }
    );
    if resume && pending {
        println!("Resuming your quiz.");
    } else {
        manager
            .start_as(user_id, name, tag)
            .await
            .with_context(|| format!("could not start a {tag} quiz"))?;
        println!("Starting a {tag} quiz. Answer with 1-4, Ctrl-D to pause.");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let (index, item) = match manager.current_question(user_id).await? {
            CurrentQuestion::Question { index, item } => (index, item),
            CurrentQuestion::Completed(summary) => {
                print_summary(&summary);
                return Ok(());
            }
            CurrentQuestion::NoSession => {
                anyhow::bail!("the quiz session is gone; start a new one")
            }
        };
        print_question(index, &item);

        let Some(option) = read_option(&mut lines).await? else {
            println!("\nPaused. Run again with --resume to continue.");
            return Ok(());
        };

        match manager.submit_answer_for(user_id, index, option).await {
            Ok(result) => {
                print_feedback(&result);
                if let Some(summary) = result.completed {
                    print_summary(&summary);
                    return Ok(());
                }
            }
            Err(QuizError::InvalidOption(_)) => println!("Please pick an option from 1 to 4."),
            Err(err) => return Err(err.into()),
        }
    }
}

/// `None` on end of input.
async fn read_option<R>(lines: &mut tokio::io::Lines<R>) -> Result<Option<u8>>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            return Ok(None);
        };
        match line.trim().parse::<u8>() {
            Ok(option) => return Ok(Some(option)),
            Err(_) => println!("Please enter a number from 1 to 4."),
        }
    }
}

fn print_question(index: usize, item: &QuestionItem) {
    println!();
    println!("Question {}/10: {}", index + 1, item.text());
    for (number, option) in (1..).zip(item.options()) {
        println!("  {number}. {option}");
    }
}

fn print_feedback(result: &AnswerResult) {
    let outcome = &result.outcome;
    if outcome.correct {
        println!("Correct!");
    } else {
        println!(
            "Wrong. You chose \"{}\", the answer is \"{}\".",
            outcome.selected_option_text, outcome.correct_option_text
        );
    }
}

fn print_summary(summary: &SessionCompleted) {
    println!();
    println!("{}", band_message(summary.band()));
    println!(
        "Correct answers: {}/10 ({:.1}%)",
        summary.correct_count,
        summary.score_percent()
    );
    println!(
        "MMR: {} {} {} = {}",
        summary.previous_rating(),
        trend_marker(summary.trend()),
        summary.rating_delta.unsigned_abs(),
        summary.new_rating
    );
}

pub(crate) fn band_message(band: ScoreBand) -> &'static str {
    match band {
        ScoreBand::Excellent => "Excellent! You really know this.",
        ScoreBand::Good => "Good result, with a few gaps left.",
        ScoreBand::NeedsPractice => "You should practice a bit more.",
        ScoreBand::KeepLearning => "Don't give up, keep learning!",
    }
}

fn trend_marker(trend: RatingTrend) -> &'static str {
    match trend {
        RatingTrend::Up => "+",
        RatingTrend::Down => "-",
        RatingTrend::Flat => "±",
    }
}
