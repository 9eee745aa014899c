//! Composite score for a single solve of one puzzle at one difficulty.
//!
//! Despite the name this is not a two-player Elo rating: it is a
//! deterministic reward computed from the attempt facts alone. The exact
//! arithmetic (including rounding half away from zero on the summed float)
//! is load-bearing; stored scores from the legacy backend must reproduce
//! bit-for-bit.

use crate::difficulty::Difficulty;

/// Attempt penalties stop growing past this attempt number.
const PENALTY_CAP: u32 = 30;

/// Facts about one winning attempt, as seen by the scorer.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInput {
    pub difficulty: Difficulty,
    /// Par: the bot's move count for this puzzle + difficulty.
    pub bot_moves: u32,
    pub user_moves: u32,
    /// Attempt number of the first win, if any.
    pub win_attempt: Option<u32>,
    /// Attempt number used for the penalty term. Callers pick, in priority
    /// order: first beat-bot attempt, first tie attempt, first win attempt.
    pub penalty_attempt: Option<u32>,
    pub first_to_beat_bot: bool,
}

/// Compute the composite score for one attempt.
pub fn compute_score(input: &ScoreInput) -> i64 {
    let multiplier = input.difficulty.multiplier();

    let win_bonus = if input.win_attempt.is_some() {
        200.0 * multiplier
    } else {
        0.0
    };

    let tie_or_beat_bonus = if input.user_moves <= input.bot_moves {
        input.difficulty.tie_beat_base()
            * f64::from(input.bot_moves - input.user_moves + 1)
    } else {
        0.0
    };

    let first_to_beat_bonus = if input.first_to_beat_bot {
        input.difficulty.first_to_beat_bonus()
    } else {
        0.0
    };

    let total =
        win_bonus + tie_or_beat_bonus + attempt_penalty(input.penalty_attempt) + first_to_beat_bonus;
    // f64::round rounds half away from zero, matching the legacy scores.
    total.round() as i64
}

/// Cumulative penalty for needing `attempt` tries: each extra attempt k
/// costs -0.5 / sqrt(k - 1), flat-capped after attempt 30.
pub fn attempt_penalty(attempt: Option<u32>) -> f64 {
    let Some(attempt) = attempt else {
        return 0.0;
    };
    if attempt <= 1 {
        return 0.0;
    }
    (2..=attempt.min(PENALTY_CAP))
        .map(|k| -0.5 / f64::from(k - 1).sqrt())
        .sum()
}

/// Whether `user_moves` beats the bot by the difficulty-scaled margin.
/// Shared by the first-to-beat-bot check and the record-broken
/// notification trigger.
pub fn beats_bot(difficulty: Difficulty, user_moves: u32, bot_moves: u32) -> bool {
    i64::from(bot_moves) - i64::from(user_moves) >= i64::from(difficulty.beat_bot_margin())
}
