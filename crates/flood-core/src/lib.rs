pub mod difficulty;
pub mod protocol;
pub mod score;
pub mod streak;
pub mod window;

pub use difficulty::Difficulty;
pub use score::{attempt_penalty, beats_bot, compute_score, ScoreInput};
pub use streak::Streak;
pub use window::{day_key, parse_day_key, windowed_sums, DayMap, RollingSums};
