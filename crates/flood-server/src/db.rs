use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{Executor, Row, Sqlite, SqlitePool};

use flood_core::window::DayMap;
use flood_core::{day_key, Difficulty, Streak};

/// Create all tables if they don't exist.
pub async fn init_db(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            username TEXT UNIQUE NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL,
            expires_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS puzzles (
            puzzle_id TEXT NOT NULL,
            difficulty TEXT NOT NULL,
            day TEXT NOT NULL,
            bot_moves INTEGER NOT NULL,
            PRIMARY KEY (puzzle_id, difficulty)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS puzzle_records (
            user_id INTEGER NOT NULL,
            puzzle_id TEXT NOT NULL,
            difficulty TEXT NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0,
            won INTEGER NOT NULL DEFAULT 0,
            win_attempt INTEGER,
            best_moves INTEGER,
            tie_attempt INTEGER,
            beat_attempt INTEGER,
            elo INTEGER,
            first_try INTEGER NOT NULL DEFAULT 0,
            first_to_beat_bot INTEGER NOT NULL DEFAULT 0,
            hint_used INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (user_id, puzzle_id, difficulty)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS user_aggregates (
            user_id INTEGER PRIMARY KEY,
            total_moves INTEGER NOT NULL DEFAULT 0,
            total_attempts INTEGER NOT NULL DEFAULT 0,
            total_solved INTEGER NOT NULL DEFAULT 0,
            completion_current INTEGER NOT NULL DEFAULT 0,
            completion_longest INTEGER NOT NULL DEFAULT 0,
            completion_last_day TEXT,
            elo_days TEXT NOT NULL DEFAULT '{}',
            elo_all_time INTEGER NOT NULL DEFAULT 0,
            elo_last_30 INTEGER NOT NULL DEFAULT 0,
            elo_last_7 INTEGER NOT NULL DEFAULT 0
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS difficulty_aggregates (
            user_id INTEGER NOT NULL,
            difficulty TEXT NOT NULL,
            first_try_current INTEGER NOT NULL DEFAULT 0,
            first_try_longest INTEGER NOT NULL DEFAULT 0,
            first_try_last_day TEXT,
            beat_bot_current INTEGER NOT NULL DEFAULT 0,
            beat_bot_longest INTEGER NOT NULL DEFAULT 0,
            beat_bot_last_day TEXT,
            goals_achieved INTEGER NOT NULL DEFAULT 0,
            goals_achieved_last_day TEXT,
            goals_beaten INTEGER NOT NULL DEFAULT 0,
            goals_beaten_last_day TEXT,
            PRIMARY KEY (user_id, difficulty)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS daily_boards (
            puzzle_id TEXT NOT NULL,
            difficulty TEXT NOT NULL,
            user_id INTEGER NOT NULL,
            moves INTEGER NOT NULL,
            PRIMARY KEY (puzzle_id, difficulty, user_id)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS best_scores (
            puzzle_id TEXT NOT NULL,
            difficulty TEXT NOT NULL,
            owner_id INTEGER NOT NULL,
            owner_name TEXT NOT NULL,
            moves INTEGER NOT NULL,
            replay TEXT NOT NULL,
            PRIMARY KEY (puzzle_id, difficulty)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS leaderboard_snapshots (
            category TEXT NOT NULL,
            subcategory TEXT NOT NULL,
            difficulty TEXT NOT NULL DEFAULT '',
            entries TEXT NOT NULL,
            user_ranks TEXT NOT NULL,
            total_entries INTEGER NOT NULL,
            built_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (category, subcategory, difficulty)
        )",
    )
    .execute(pool)
    .await?;

    Ok(())
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn parse_day(raw: Option<String>) -> Option<NaiveDate> {
    raw.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok())
}

fn encode_day(day: Option<NaiveDate>) -> Option<String> {
    day.map(day_key)
}

/// Decode a JSON day map, dropping non-numeric values and anything that
/// isn't an object. Legacy data is not trusted to be well-formed.
pub fn decode_day_map(raw: &str) -> DayMap {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(raw) else {
        return DayMap::new();
    };
    let Some(obj) = value.as_object() else {
        return DayMap::new();
    };
    obj.iter()
        .filter_map(|(k, v)| v.as_i64().map(|n| (k.clone(), n)))
        .collect()
}

fn encode_day_map(days: &DayMap) -> String {
    serde_json::to_string(days).unwrap_or_else(|_| "{}".to_string())
}

// ── Users & sessions ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
}

/// Insert the user if missing, then return the local id.
pub async fn upsert_user(pool: &SqlitePool, username: &str) -> Result<i64, sqlx::Error> {
    sqlx::query("INSERT INTO users (username) VALUES (?1) ON CONFLICT(username) DO NOTHING")
        .bind(username)
        .execute(pool)
        .await?;

    let row = sqlx::query("SELECT id FROM users WHERE username = ?1")
        .bind(username)
        .fetch_one(pool)
        .await?;

    Ok(row.get::<i64, _>("id"))
}

/// Create a new session token for the given user. Returns the token string.
pub async fn create_session(pool: &SqlitePool, user_id: i64) -> Result<String, sqlx::Error> {
    let token: String = {
        use rand::RngExt;
        let mut rng = rand::rng();
        (0..64)
            .map(|_| {
                let idx = rng.random_range(0..36u8);
                if idx < 10 {
                    (b'0' + idx) as char
                } else {
                    (b'a' + idx - 10) as char
                }
            })
            .collect()
    };

    // Expire in 30 days
    sqlx::query(
        "INSERT INTO sessions (token, user_id, expires_at)
         VALUES (?1, ?2, datetime('now', '+30 days'))",
    )
    .bind(&token)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(token)
}

/// Validate a session token. Returns the user if valid.
pub async fn get_session(pool: &SqlitePool, token: &str) -> Result<Option<UserRow>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT s.user_id, u.username FROM sessions s
         JOIN users u ON u.id = s.user_id
         WHERE s.token = ?1 AND s.expires_at > datetime('now')",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| UserRow {
        id: r.get("user_id"),
        username: r.get("username"),
    }))
}

pub async fn get_user_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<UserRow>, sqlx::Error> {
    let row = sqlx::query("SELECT id, username FROM users WHERE username = ?1")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| UserRow {
        id: r.get("id"),
        username: r.get("username"),
    }))
}

/// Batched id → username lookup. Missing ids are simply absent from the
/// result; callers synthesize a fallback name.
pub async fn get_usernames(
    pool: &SqlitePool,
    ids: &[i64],
) -> Result<BTreeMap<i64, String>, sqlx::Error> {
    let mut names = BTreeMap::new();
    // Identity lookups are capped at 100 ids per query.
    for chunk in ids.chunks(100) {
        let placeholders = vec!["?"; chunk.len()].join(",");
        let sql = format!("SELECT id, username FROM users WHERE id IN ({placeholders})");
        let mut query = sqlx::query(&sql);
        for id in chunk {
            query = query.bind(id);
        }
        for row in query.fetch_all(pool).await? {
            names.insert(row.get::<i64, _>("id"), row.get::<String, _>("username"));
        }
    }
    Ok(names)
}

// ── Puzzle reference provider ───────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PuzzleRow {
    pub puzzle_id: String,
    pub difficulty: Difficulty,
    /// Calendar day the puzzle belongs to; doubles as the day-map key.
    pub day: String,
    pub bot_moves: i64,
}

pub async fn upsert_puzzle(
    pool: &SqlitePool,
    puzzle_id: &str,
    difficulty: Difficulty,
    day: &str,
    bot_moves: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO puzzles (puzzle_id, difficulty, day, bot_moves)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(puzzle_id, difficulty) DO UPDATE SET day = ?3, bot_moves = ?4",
    )
    .bind(puzzle_id)
    .bind(difficulty.key())
    .bind(day)
    .bind(bot_moves)
    .execute(pool)
    .await?;
    Ok(())
}

/// Par lookup: the bot's reference move count for a puzzle + difficulty.
pub async fn get_puzzle(
    pool: &SqlitePool,
    puzzle_id: &str,
    difficulty: Difficulty,
) -> Result<Option<PuzzleRow>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT puzzle_id, day, bot_moves FROM puzzles
         WHERE puzzle_id = ?1 AND difficulty = ?2",
    )
    .bind(puzzle_id)
    .bind(difficulty.key())
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| PuzzleRow {
        puzzle_id: r.get("puzzle_id"),
        difficulty,
        day: r.get("day"),
        bot_moves: r.get("bot_moves"),
    }))
}

// ── Per-user puzzle records ─────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PuzzleRecordRow {
    pub user_id: i64,
    pub puzzle_id: String,
    pub difficulty: Difficulty,
    pub attempts: i64,
    pub won: bool,
    /// Attempt number of the first win; set once, like the tie/beat indices.
    pub win_attempt: Option<i64>,
    pub best_moves: Option<i64>,
    pub tie_attempt: Option<i64>,
    pub beat_attempt: Option<i64>,
    pub elo: Option<i64>,
    pub first_try: bool,
    pub first_to_beat_bot: bool,
    pub hint_used: bool,
}

impl PuzzleRecordRow {
    pub fn new(user_id: i64, puzzle_id: &str, difficulty: Difficulty) -> Self {
        Self {
            user_id,
            puzzle_id: puzzle_id.to_string(),
            difficulty,
            attempts: 0,
            won: false,
            win_attempt: None,
            best_moves: None,
            tie_attempt: None,
            beat_attempt: None,
            elo: None,
            first_try: false,
            first_to_beat_bot: false,
            hint_used: false,
        }
    }
}

fn record_from_row(row: &sqlx::sqlite::SqliteRow, difficulty: Difficulty) -> PuzzleRecordRow {
    PuzzleRecordRow {
        user_id: row.get("user_id"),
        puzzle_id: row.get("puzzle_id"),
        difficulty,
        attempts: row.get("attempts"),
        won: row.get::<i64, _>("won") != 0,
        win_attempt: row.get("win_attempt"),
        best_moves: row.get("best_moves"),
        tie_attempt: row.get("tie_attempt"),
        beat_attempt: row.get("beat_attempt"),
        elo: row.get("elo"),
        first_try: row.get::<i64, _>("first_try") != 0,
        first_to_beat_bot: row.get::<i64, _>("first_to_beat_bot") != 0,
        hint_used: row.get::<i64, _>("hint_used") != 0,
    }
}

pub async fn get_record<'e, E>(
    executor: E,
    user_id: i64,
    puzzle_id: &str,
    difficulty: Difficulty,
) -> Result<Option<PuzzleRecordRow>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        "SELECT user_id, puzzle_id, attempts, won, win_attempt, best_moves, tie_attempt,
                beat_attempt, elo, first_try, first_to_beat_bot, hint_used
         FROM puzzle_records
         WHERE user_id = ?1 AND puzzle_id = ?2 AND difficulty = ?3",
    )
    .bind(user_id)
    .bind(puzzle_id)
    .bind(difficulty.key())
    .fetch_optional(executor)
    .await?;

    Ok(row.map(|r| record_from_row(&r, difficulty)))
}

pub async fn upsert_record<'e, E>(executor: E, rec: &PuzzleRecordRow) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO puzzle_records (user_id, puzzle_id, difficulty, attempts, won, win_attempt,
                                     best_moves, tie_attempt, beat_attempt, elo, first_try,
                                     first_to_beat_bot, hint_used)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
         ON CONFLICT(user_id, puzzle_id, difficulty) DO UPDATE SET
             attempts = ?4, won = ?5, win_attempt = ?6, best_moves = ?7, tie_attempt = ?8,
             beat_attempt = ?9, elo = ?10, first_try = ?11,
             first_to_beat_bot = ?12, hint_used = ?13",
    )
    .bind(rec.user_id)
    .bind(&rec.puzzle_id)
    .bind(rec.difficulty.key())
    .bind(rec.attempts)
    .bind(rec.won as i64)
    .bind(rec.win_attempt)
    .bind(rec.best_moves)
    .bind(rec.tie_attempt)
    .bind(rec.beat_attempt)
    .bind(rec.elo)
    .bind(rec.first_try as i64)
    .bind(rec.first_to_beat_bot as i64)
    .bind(rec.hint_used as i64)
    .execute(executor)
    .await?;
    Ok(())
}

// ── Level-agnostic aggregate ────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct UserAggregateRow {
    pub user_id: i64,
    pub total_moves: i64,
    pub total_attempts: i64,
    pub total_solved: i64,
    pub completion: Streak,
    pub elo_days: DayMap,
    /// Cached rolling sums; never authoritative.
    pub elo_all_time: i64,
    pub elo_last_30: i64,
    pub elo_last_7: i64,
}

impl UserAggregateRow {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            total_moves: 0,
            total_attempts: 0,
            total_solved: 0,
            completion: Streak::default(),
            elo_days: DayMap::new(),
            elo_all_time: 0,
            elo_last_30: 0,
            elo_last_7: 0,
        }
    }
}

fn aggregate_from_row(row: &sqlx::sqlite::SqliteRow) -> UserAggregateRow {
    UserAggregateRow {
        user_id: row.get("user_id"),
        total_moves: row.get("total_moves"),
        total_attempts: row.get("total_attempts"),
        total_solved: row.get("total_solved"),
        completion: Streak {
            current: row.get::<i64, _>("completion_current") as u32,
            longest: row.get::<i64, _>("completion_longest") as u32,
            last_day: parse_day(row.get("completion_last_day")),
        },
        elo_days: decode_day_map(&row.get::<String, _>("elo_days")),
        elo_all_time: row.get("elo_all_time"),
        elo_last_30: row.get("elo_last_30"),
        elo_last_7: row.get("elo_last_7"),
    }
}

const AGGREGATE_COLUMNS: &str = "user_id, total_moves, total_attempts, total_solved, \
     completion_current, completion_longest, completion_last_day, \
     elo_days, elo_all_time, elo_last_30, elo_last_7";

pub async fn get_user_aggregate<'e, E>(
    executor: E,
    user_id: i64,
) -> Result<Option<UserAggregateRow>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {AGGREGATE_COLUMNS} FROM user_aggregates WHERE user_id = ?1");
    let row = sqlx::query(&sql).bind(user_id).fetch_optional(executor).await?;
    Ok(row.map(|r| aggregate_from_row(&r)))
}

/// Full-table scan in id order, for leaderboard rebuilds.
pub async fn scan_user_aggregates(pool: &SqlitePool) -> Result<Vec<UserAggregateRow>, sqlx::Error> {
    let sql = format!("SELECT {AGGREGATE_COLUMNS} FROM user_aggregates ORDER BY user_id");
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    Ok(rows.iter().map(aggregate_from_row).collect())
}

pub async fn upsert_user_aggregate<'e, E>(
    executor: E,
    agg: &UserAggregateRow,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO user_aggregates (user_id, total_moves, total_attempts, total_solved,
                                      completion_current, completion_longest, completion_last_day,
                                      elo_days, elo_all_time, elo_last_30, elo_last_7)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(user_id) DO UPDATE SET
             total_moves = ?2, total_attempts = ?3, total_solved = ?4,
             completion_current = ?5, completion_longest = ?6, completion_last_day = ?7,
             elo_days = ?8, elo_all_time = ?9, elo_last_30 = ?10, elo_last_7 = ?11",
    )
    .bind(agg.user_id)
    .bind(agg.total_moves)
    .bind(agg.total_attempts)
    .bind(agg.total_solved)
    .bind(agg.completion.current as i64)
    .bind(agg.completion.longest as i64)
    .bind(encode_day(agg.completion.last_day))
    .bind(encode_day_map(&agg.elo_days))
    .bind(agg.elo_all_time)
    .bind(agg.elo_last_30)
    .bind(agg.elo_last_7)
    .execute(executor)
    .await?;
    Ok(())
}

// ── Per-difficulty aggregate ────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DifficultyAggregateRow {
    pub user_id: i64,
    pub difficulty: Difficulty,
    pub first_try: Streak,
    pub beat_bot: Streak,
    pub goals_achieved: i64,
    pub goals_achieved_last_day: Option<NaiveDate>,
    pub goals_beaten: i64,
    pub goals_beaten_last_day: Option<NaiveDate>,
}

impl DifficultyAggregateRow {
    pub fn new(user_id: i64, difficulty: Difficulty) -> Self {
        Self {
            user_id,
            difficulty,
            first_try: Streak::default(),
            beat_bot: Streak::default(),
            goals_achieved: 0,
            goals_achieved_last_day: None,
            goals_beaten: 0,
            goals_beaten_last_day: None,
        }
    }
}

fn difficulty_aggregate_from_row(
    row: &sqlx::sqlite::SqliteRow,
    difficulty: Difficulty,
) -> DifficultyAggregateRow {
    DifficultyAggregateRow {
        user_id: row.get("user_id"),
        difficulty,
        first_try: Streak {
            current: row.get::<i64, _>("first_try_current") as u32,
            longest: row.get::<i64, _>("first_try_longest") as u32,
            last_day: parse_day(row.get("first_try_last_day")),
        },
        beat_bot: Streak {
            current: row.get::<i64, _>("beat_bot_current") as u32,
            longest: row.get::<i64, _>("beat_bot_longest") as u32,
            last_day: parse_day(row.get("beat_bot_last_day")),
        },
        goals_achieved: row.get("goals_achieved"),
        goals_achieved_last_day: parse_day(row.get("goals_achieved_last_day")),
        goals_beaten: row.get("goals_beaten"),
        goals_beaten_last_day: parse_day(row.get("goals_beaten_last_day")),
    }
}

const DIFF_AGGREGATE_COLUMNS: &str = "user_id, first_try_current, first_try_longest, \
     first_try_last_day, beat_bot_current, beat_bot_longest, beat_bot_last_day, \
     goals_achieved, goals_achieved_last_day, goals_beaten, goals_beaten_last_day";

pub async fn get_difficulty_aggregate<'e, E>(
    executor: E,
    user_id: i64,
    difficulty: Difficulty,
) -> Result<Option<DifficultyAggregateRow>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {DIFF_AGGREGATE_COLUMNS} FROM difficulty_aggregates
         WHERE user_id = ?1 AND difficulty = ?2"
    );
    let row = sqlx::query(&sql)
        .bind(user_id)
        .bind(difficulty.key())
        .fetch_optional(executor)
        .await?;
    Ok(row.map(|r| difficulty_aggregate_from_row(&r, difficulty)))
}

/// Scan all users' aggregates for one difficulty, in id order.
pub async fn scan_difficulty_aggregates(
    pool: &SqlitePool,
    difficulty: Difficulty,
) -> Result<Vec<DifficultyAggregateRow>, sqlx::Error> {
    let sql = format!(
        "SELECT {DIFF_AGGREGATE_COLUMNS} FROM difficulty_aggregates
         WHERE difficulty = ?1 ORDER BY user_id"
    );
    let rows = sqlx::query(&sql).bind(difficulty.key()).fetch_all(pool).await?;
    Ok(rows
        .iter()
        .map(|r| difficulty_aggregate_from_row(r, difficulty))
        .collect())
}

pub async fn upsert_difficulty_aggregate<'e, E>(
    executor: E,
    agg: &DifficultyAggregateRow,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO difficulty_aggregates (user_id, difficulty,
             first_try_current, first_try_longest, first_try_last_day,
             beat_bot_current, beat_bot_longest, beat_bot_last_day,
             goals_achieved, goals_achieved_last_day, goals_beaten, goals_beaten_last_day)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
         ON CONFLICT(user_id, difficulty) DO UPDATE SET
             first_try_current = ?3, first_try_longest = ?4, first_try_last_day = ?5,
             beat_bot_current = ?6, beat_bot_longest = ?7, beat_bot_last_day = ?8,
             goals_achieved = ?9, goals_achieved_last_day = ?10,
             goals_beaten = ?11, goals_beaten_last_day = ?12",
    )
    .bind(agg.user_id)
    .bind(agg.difficulty.key())
    .bind(agg.first_try.current as i64)
    .bind(agg.first_try.longest as i64)
    .bind(encode_day(agg.first_try.last_day))
    .bind(agg.beat_bot.current as i64)
    .bind(agg.beat_bot.longest as i64)
    .bind(encode_day(agg.beat_bot.last_day))
    .bind(agg.goals_achieved)
    .bind(encode_day(agg.goals_achieved_last_day))
    .bind(agg.goals_beaten)
    .bind(encode_day(agg.goals_beaten_last_day))
    .execute(executor)
    .await?;
    Ok(())
}

// ── Daily score board ───────────────────────────────────────────────────

/// user id → lowest recorded move count for one puzzle + difficulty.
pub type BoardScores = BTreeMap<i64, i64>;

pub async fn get_daily_board(
    pool: &SqlitePool,
    puzzle_id: &str,
    difficulty: Difficulty,
) -> Result<BoardScores, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT user_id, moves FROM daily_boards WHERE puzzle_id = ?1 AND difficulty = ?2",
    )
    .bind(puzzle_id)
    .bind(difficulty.key())
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|r| (r.get::<i64, _>("user_id"), r.get::<i64, _>("moves")))
        .collect())
}

/// Merge one user's move count into the shared board, keeping the lower of
/// the stored and offered values. One conditional upsert per user row, so
/// concurrent finishers never clobber each other. Idempotent.
pub async fn merge_daily_board(
    pool: &SqlitePool,
    puzzle_id: &str,
    difficulty: Difficulty,
    user_id: i64,
    moves: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO daily_boards (puzzle_id, difficulty, user_id, moves)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(puzzle_id, difficulty, user_id)
         DO UPDATE SET moves = min(moves, excluded.moves)",
    )
    .bind(puzzle_id)
    .bind(difficulty.key())
    .bind(user_id)
    .bind(moves)
    .execute(pool)
    .await?;
    Ok(())
}

// ── Board-wide best score ───────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct BestScoreRow {
    pub puzzle_id: String,
    pub difficulty: Difficulty,
    pub owner_id: i64,
    pub owner_name: String,
    pub moves: i64,
    pub replay: String,
}

pub async fn get_best_score(
    pool: &SqlitePool,
    puzzle_id: &str,
    difficulty: Difficulty,
) -> Result<Option<BestScoreRow>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT puzzle_id, owner_id, owner_name, moves, replay FROM best_scores
         WHERE puzzle_id = ?1 AND difficulty = ?2",
    )
    .bind(puzzle_id)
    .bind(difficulty.key())
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| BestScoreRow {
        puzzle_id: r.get("puzzle_id"),
        difficulty,
        owner_id: r.get("owner_id"),
        owner_name: r.get("owner_name"),
        moves: r.get("moves"),
        replay: r.get("replay"),
    }))
}

/// Take the board-wide best only on a strictly lower move count; the
/// conditional upsert keeps concurrent replacements from regressing it.
pub async fn replace_best_score(pool: &SqlitePool, best: &BestScoreRow) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO best_scores (puzzle_id, difficulty, owner_id, owner_name, moves, replay)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(puzzle_id, difficulty) DO UPDATE SET
             owner_id = ?3, owner_name = ?4, moves = ?5, replay = ?6
         WHERE excluded.moves < best_scores.moves",
    )
    .bind(&best.puzzle_id)
    .bind(best.difficulty.key())
    .bind(best.owner_id)
    .bind(&best.owner_name)
    .bind(best.moves)
    .bind(&best.replay)
    .execute(pool)
    .await?;
    Ok(())
}

// ── Leaderboard snapshots ───────────────────────────────────────────────

/// One ranked user inside a persisted snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub user_id: i64,
    pub value: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct SnapshotRow {
    /// Top 100 in rank order.
    pub entries: Vec<SnapshotEntry>,
    /// Every ranked user → 1-based rank, not just the top 100.
    pub user_ranks: BTreeMap<i64, u32>,
    /// Exact ranked-user count before truncation.
    pub total_entries: i64,
}

pub async fn get_snapshot(
    pool: &SqlitePool,
    category: &str,
    subcategory: &str,
    difficulty: Option<Difficulty>,
) -> Result<Option<SnapshotRow>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT entries, user_ranks, total_entries FROM leaderboard_snapshots
         WHERE category = ?1 AND subcategory = ?2 AND difficulty = ?3",
    )
    .bind(category)
    .bind(subcategory)
    .bind(difficulty.map(|d| d.key()).unwrap_or(""))
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let entries = serde_json::from_str(&row.get::<String, _>("entries")).unwrap_or_default();
    let user_ranks = serde_json::from_str(&row.get::<String, _>("user_ranks")).unwrap_or_default();
    Ok(Some(SnapshotRow {
        entries,
        user_ranks,
        total_entries: row.get("total_entries"),
    }))
}

pub async fn upsert_snapshot(
    pool: &SqlitePool,
    category: &str,
    subcategory: &str,
    difficulty: Option<Difficulty>,
    snapshot: &SnapshotRow,
) -> Result<(), sqlx::Error> {
    let entries = serde_json::to_string(&snapshot.entries).unwrap_or_else(|_| "[]".to_string());
    let ranks = serde_json::to_string(&snapshot.user_ranks).unwrap_or_else(|_| "{}".to_string());
    sqlx::query(
        "INSERT INTO leaderboard_snapshots
             (category, subcategory, difficulty, entries, user_ranks, total_entries, built_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))
         ON CONFLICT(category, subcategory, difficulty) DO UPDATE SET
             entries = ?4, user_ranks = ?5, total_entries = ?6, built_at = datetime('now')",
    )
    .bind(category)
    .bind(subcategory)
    .bind(difficulty.map(|d| d.key()).unwrap_or(""))
    .bind(entries)
    .bind(ranks)
    .bind(snapshot.total_entries)
    .execute(pool)
    .await?;
    Ok(())
}
