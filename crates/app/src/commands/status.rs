//! The `quiz status` command.

use anyhow::Result;
use comfy_table::{Cell, Table};

use quiz_core::model::{Level, UserId, UserRating};
use services::SessionManager;

pub async fn execute(manager: &SessionManager, user_id: UserId) -> Result<()> {
    let Some(rating) = manager.stats().rating(user_id).await? else {
        println!("User {user_id} has not started a quiz yet.");
        return Ok(());
    };

    println!("{} (id {})", rating.display_name(), rating.user_id());
    println!("MMR: {}", rating.mmr());
    println!("Tests finished: {}", rating.total_tests());
    if let Some(at) = rating.last_test_at() {
        println!("Last test: {}", at.format("%Y-%m-%d %H:%M UTC"));
    }
    if rating.total_tests() > 0 {
        println!("{}", level_table(&rating));
    }

    match manager.progress(user_id).await? {
        Some(progress) if !progress.is_complete => println!(
            "In progress: {} question {}/{} ({} correct so far)",
            progress.tag,
            progress.answered + 1,
            progress.total,
            progress.correct
        ),
        Some(progress) => println!(
            "Last quiz: {} finished with {}/{} correct",
            progress.tag, progress.correct, progress.total
        ),
        None => println!("No quiz in progress."),
    }
    Ok(())
}

fn level_table(rating: &UserRating) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Level", "Tests", "Average", "Best"]);
    for level in Level::ALL {
        let stats = rating.level_stats().get(level);
        if stats.tests == 0 {
            continue;
        }
        table.add_row(vec![
            Cell::new(level),
            Cell::new(stats.tests),
            Cell::new(format!("{:.1}%", stats.average_percent)),
            Cell::new(format!("{:.1}%", stats.best_percent)),
        ]);
    }
    table
}
