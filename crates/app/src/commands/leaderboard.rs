//! The `quiz leaderboard` command.

use anyhow::Result;
use comfy_table::{Cell, Table};

use quiz_core::model::INITIAL_MMR;
use services::{LeaderboardEntry, StatsAggregator};

pub async fn execute(stats: &StatsAggregator, top: u32) -> Result<()> {
    let board = stats.leaderboard(top).await?;
    if board.is_empty() {
        println!("Nobody has finished a quiz yet. Be the first!");
        return Ok(());
    }
    println!("{}", render(&board));
    Ok(())
}

fn render(board: &[LeaderboardEntry]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["#", "Player", "Title", "MMR", "Stars", "Tests", "Last test"]);

    for entry in board {
        let rating = &entry.rating;
        let last_test = rating
            .last_test_at()
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(entry.rank),
            Cell::new(rating.display_name()),
            Cell::new(title(entry.rank, rating.mmr())),
            Cell::new(rating.mmr()),
            Cell::new(stars(rating.mmr())),
            Cell::new(rating.total_tests()),
            Cell::new(last_test),
        ]);
    }
    table
}

/// Named titles go to ranks 1 to 4 at or above the starting rating; everyone else is a Novice.
fn title(rank: u32, mmr: u32) -> &'static str {
    if mmr < INITIAL_MMR {
        return "Novice";
    }
    match rank {
        1 => "Grandmaster",
        2 => "Master",
        3 => "Expert",
        4 => "Specialist",
        _ => "Novice",
    }
}

/// One star per 200 rating points.
fn stars(mmr: u32) -> String {
    "*".repeat(usize::try_from(mmr / 200).unwrap_or(0))
}
