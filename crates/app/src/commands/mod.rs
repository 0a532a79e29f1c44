pub mod leaderboard;
pub mod play;
pub mod seed;
pub mod status;
