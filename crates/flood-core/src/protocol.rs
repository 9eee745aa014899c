//! Wire types shared by the server and its clients.

use serde::{Deserialize, Serialize};

use crate::difficulty::Difficulty;

// ── Attempt recording ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordAttemptRequest {
    pub puzzle_id: String,
    pub difficulty: Difficulty,
    /// Moves the player used this attempt.
    pub moves: u32,
    pub hint_used: bool,
    pub won: bool,
    /// Serialized solve, kept only when it becomes the board-wide best.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replay: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordAttemptResponse {
    pub first_try: bool,
    pub first_to_beat_bot: bool,
    /// Change to the stored score for this puzzle + difficulty.
    pub elo_delta: i64,
}

// ── Leaderboards ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user_id: i64,
    pub username: String,
    pub value: i64,
    /// Streak boards only: the running streak next to the ranked longest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<i64>,
    /// Streak boards only: whether the run is still alive (current == longest).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_current: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardResponse {
    pub top: Vec<LeaderboardEntry>,
    /// The requesting player's own placement when ranked below the top ten.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester: Option<LeaderboardEntry>,
}

// ── Auth & profile ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestAuthRequest {
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub username: String,
    pub total_attempts: i64,
    pub total_solved: i64,
    pub total_moves: i64,
    pub streak_current: i64,
    pub streak_longest: i64,
    pub elo_all_time: i64,
    pub elo_last_30: i64,
    pub elo_last_7: i64,
}

// ── Admin ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedPuzzleRequest {
    pub puzzle_id: String,
    /// Calendar day this puzzle belongs to, `YYYY-MM-DD`.
    pub day: String,
    pub difficulty: Difficulty,
    /// Par: the solver bot's move count.
    pub bot_moves: u32,
}
