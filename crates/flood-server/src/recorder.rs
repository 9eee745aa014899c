//! Attempt recording: one atomic read-then-write transaction per attempt,
//! scoped to a single user's aggregate rows, followed by best-effort
//! mirrors into the shared per-puzzle stores.
//!
//! The transaction body is `apply_attempt`, a pure function of the read
//! snapshot; everything externally visible (daily board merge, best-score
//! replacement) happens strictly after commit.

use std::time::Duration;

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use thiserror::Error;

use flood_core::protocol::RecordAttemptResponse;
use flood_core::score::{beats_bot, compute_score, ScoreInput};
use flood_core::window::windowed_sums;
use flood_core::{day_key, Difficulty};

use crate::db::{
    self, DifficultyAggregateRow, PuzzleRecordRow, UserAggregateRow,
};

/// Whole-attempt deadline; on expiry the transaction aborts with no
/// partial state visible.
const TXN_TIMEOUT: Duration = Duration::from_secs(5);

/// Bounded retries for sqlite busy/locked write conflicts.
const TXN_RETRIES: u32 = 3;

const MAX_PUZZLE_ID_LEN: usize = 64;
const MAX_MOVES: u32 = 10_000;
const MAX_REPLAY_LEN: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("invalid attempt: {0}")]
    Invalid(&'static str),
    #[error("unknown puzzle")]
    UnknownPuzzle,
    #[error("write conflict, retry the attempt")]
    Conflict,
    #[error("attempt transaction timed out")]
    Timeout,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct AttemptInput {
    pub user_id: i64,
    pub puzzle_id: String,
    pub difficulty: Difficulty,
    pub moves: u32,
    pub hint_used: bool,
    pub won: bool,
    pub replay: Option<String>,
}

/// Facts resolved outside the transaction: par, calendar context and the
/// shared board snapshot used for the first-to-beat-bot check.
#[derive(Debug, Clone, Copy)]
struct AttemptContext {
    bot_moves: u32,
    /// The puzzle's calendar day; keys the day map and drives streaks.
    day: NaiveDate,
    /// UTC today, for the rolling window cutoffs.
    today: NaiveDate,
    /// Lowest move count on the daily board from any *other* user.
    others_best: Option<i64>,
}

/// All per-user state read inside the transaction, before any write.
#[derive(Debug, Clone, Default)]
struct TxnSnapshot {
    record: Option<PuzzleRecordRow>,
    /// Best scores for this puzzle's other difficulties; inputs to the
    /// level-agnostic day sum.
    sibling_elos: Vec<i64>,
    aggregate: Option<UserAggregateRow>,
    diff_aggregate: Option<DifficultyAggregateRow>,
}

/// Everything the transaction decided: rows to write and mirrors to push.
#[derive(Debug, Clone)]
struct Outcome {
    record: PuzzleRecordRow,
    aggregate: UserAggregateRow,
    /// Only present when a streak/goal field actually changed.
    diff_aggregate: Option<DifficultyAggregateRow>,
    response: RecordAttemptResponse,
    /// Best move count to merge into the daily board after commit.
    mirror_moves: Option<i64>,
    /// Whether this attempt may beat the board-wide best replay.
    best_candidate: bool,
}

/// Record one attempt and return the derived flags and score change.
pub async fn record_attempt(
    pool: &SqlitePool,
    input: AttemptInput,
) -> Result<RecordAttemptResponse, RecordError> {
    validate(&input)?;

    let puzzle = db::get_puzzle(pool, &input.puzzle_id, input.difficulty)
        .await?
        .ok_or(RecordError::UnknownPuzzle)?;

    let today = Utc::now().date_naive();
    let day = NaiveDate::parse_from_str(&puzzle.day, "%Y-%m-%d").unwrap_or(today);

    // Shared-board snapshot read before the per-user transaction; the
    // transaction itself only touches this user's rows.
    let board = db::get_daily_board(pool, &input.puzzle_id, input.difficulty).await?;
    let others_best = board
        .iter()
        .filter(|(id, _)| **id != input.user_id)
        .map(|(_, moves)| *moves)
        .min();

    let ctx = AttemptContext {
        bot_moves: puzzle.bot_moves.max(0) as u32,
        day,
        today,
        others_best,
    };

    let outcome = tokio::time::timeout(TXN_TIMEOUT, run_transaction(pool, &input, ctx))
        .await
        .map_err(|_| RecordError::Timeout)??;

    // Post-commit, best-effort. Failures are logged, never surfaced: these
    // are supplementary mirrors, not sources of truth.
    if let Some(moves) = outcome.mirror_moves {
        if let Err(err) =
            db::merge_daily_board(pool, &input.puzzle_id, input.difficulty, input.user_id, moves)
                .await
        {
            tracing::warn!(puzzle = %input.puzzle_id, %err, "daily board mirror failed");
        }
    }
    if outcome.best_candidate {
        if let Err(err) = maybe_replace_best(pool, &input).await {
            tracing::warn!(puzzle = %input.puzzle_id, %err, "best score update failed");
        }
    }

    Ok(outcome.response)
}

fn validate(input: &AttemptInput) -> Result<(), RecordError> {
    if input.puzzle_id.is_empty() || input.puzzle_id.len() > MAX_PUZZLE_ID_LEN {
        return Err(RecordError::Invalid("bad puzzle id"));
    }
    if !input
        .puzzle_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(RecordError::Invalid("bad puzzle id"));
    }
    if input.moves == 0 || input.moves > MAX_MOVES {
        return Err(RecordError::Invalid("bad move count"));
    }
    if input.replay.as_ref().is_some_and(|r| r.len() > MAX_REPLAY_LEN) {
        return Err(RecordError::Invalid("replay too large"));
    }
    Ok(())
}

async fn run_transaction(
    pool: &SqlitePool,
    input: &AttemptInput,
    ctx: AttemptContext,
) -> Result<Outcome, RecordError> {
    let mut tries = 0;
    loop {
        match try_transaction(pool, input, ctx).await {
            Ok(outcome) => return Ok(outcome),
            Err(err) if is_write_conflict(&err) => {
                tries += 1;
                if tries >= TXN_RETRIES {
                    return Err(RecordError::Conflict);
                }
                tokio::time::sleep(Duration::from_millis(20 * u64::from(tries))).await;
            }
            Err(err) => return Err(RecordError::Db(err)),
        }
    }
}

fn is_write_conflict(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = db_err.message();
            msg.contains("locked") || msg.contains("busy")
        }
        _ => false,
    }
}

async fn try_transaction(
    pool: &SqlitePool,
    input: &AttemptInput,
    ctx: AttemptContext,
) -> Result<Outcome, sqlx::Error> {
    let mut tx = pool.begin().await?;

    // All reads complete before the first write.
    let record = db::get_record(&mut *tx, input.user_id, &input.puzzle_id, input.difficulty).await?;
    let mut sibling_elos = Vec::new();
    for other in Difficulty::all() {
        if *other == input.difficulty {
            continue;
        }
        if let Some(rec) =
            db::get_record(&mut *tx, input.user_id, &input.puzzle_id, *other).await?
        {
            if let Some(elo) = rec.elo {
                sibling_elos.push(elo);
            }
        }
    }
    let aggregate = db::get_user_aggregate(&mut *tx, input.user_id).await?;
    let diff_aggregate =
        db::get_difficulty_aggregate(&mut *tx, input.user_id, input.difficulty).await?;

    let outcome = apply_attempt(
        input,
        ctx,
        TxnSnapshot {
            record,
            sibling_elos,
            aggregate,
            diff_aggregate,
        },
    );

    db::upsert_record(&mut *tx, &outcome.record).await?;
    db::upsert_user_aggregate(&mut *tx, &outcome.aggregate).await?;
    if let Some(diff) = &outcome.diff_aggregate {
        db::upsert_difficulty_aggregate(&mut *tx, diff).await?;
    }

    tx.commit().await?;
    Ok(outcome)
}

/// Pure per-attempt state transition. Given the transaction's read
/// snapshot, produce the complete new rows; no I/O, no clock reads.
fn apply_attempt(input: &AttemptInput, ctx: AttemptContext, snapshot: TxnSnapshot) -> Outcome {
    let mut rec = snapshot
        .record
        .unwrap_or_else(|| PuzzleRecordRow::new(input.user_id, &input.puzzle_id, input.difficulty));
    let mut agg = snapshot
        .aggregate
        .unwrap_or_else(|| UserAggregateRow::new(input.user_id));

    // Attempt counters move on every attempt, win or lose, hint or not.
    rec.attempts += 1;
    let attempt_no = rec.attempts as u32;
    agg.total_attempts += 1;
    agg.total_moves += i64::from(input.moves);

    // Hint use is sticky: once true it permanently suppresses score,
    // streak and best-score writes for this puzzle + difficulty.
    rec.hint_used = rec.hint_used || input.hint_used;

    let mut response = RecordAttemptResponse {
        first_try: rec.first_try,
        first_to_beat_bot: rec.first_to_beat_bot,
        elo_delta: 0,
    };

    if !input.won {
        // Loss: counters only. First loss leaves a placeholder record with
        // null score fields; streaks are untouched.
        return Outcome {
            record: rec,
            aggregate: agg,
            diff_aggregate: None,
            response,
            mirror_moves: None,
            best_candidate: false,
        };
    }

    if !rec.won {
        rec.won = true;
        rec.win_attempt = Some(attempt_no as i64);
        agg.total_solved += 1;
    }

    if rec.hint_used {
        return Outcome {
            record: rec,
            aggregate: agg,
            diff_aggregate: None,
            response,
            mirror_moves: None,
            best_candidate: false,
        };
    }

    let tie = input.moves <= ctx.bot_moves;
    let beat = input.moves < ctx.bot_moves;

    // Computed once on attempt #1; later attempts never re-derive it.
    if attempt_no == 1 && tie {
        rec.first_try = true;
    }

    // First-recorded indices are preserved forever once set.
    if tie && rec.tie_attempt.is_none() {
        rec.tie_attempt = Some(attempt_no as i64);
    }
    if beat && rec.beat_attempt.is_none() {
        rec.beat_attempt = Some(attempt_no as i64);
    }

    // First to beat the bot: difficulty-scaled margin, and no other user
    // already on the board with a strictly lower score. Never reverted.
    if !rec.first_to_beat_bot
        && beats_bot(input.difficulty, input.moves, ctx.bot_moves)
        && ctx.others_best.is_none_or(|best| best >= i64::from(input.moves))
    {
        rec.first_to_beat_bot = true;
    }

    // Best moves and score replace only on a strict improvement.
    let improved = rec.best_moves.is_none_or(|best| i64::from(input.moves) < best);
    if improved {
        let penalty_attempt = rec
            .beat_attempt
            .or(rec.tie_attempt)
            .or(rec.win_attempt)
            .map(|a| a as u32);
        let elo = compute_score(&ScoreInput {
            difficulty: input.difficulty,
            bot_moves: ctx.bot_moves,
            user_moves: input.moves,
            win_attempt: rec.win_attempt.map(|a| a as u32),
            penalty_attempt,
            first_to_beat_bot: rec.first_to_beat_bot,
        });
        response.elo_delta = elo - rec.elo.unwrap_or(0);
        rec.best_moves = Some(i64::from(input.moves));
        rec.elo = Some(elo);
    }

    // Level-agnostic day total: this puzzle's per-difficulty bests summed.
    // The per-difficulty score above is always computed first; the day map
    // only ever ratchets upward.
    let day_total: i64 = rec.elo.unwrap_or(0) + snapshot.sibling_elos.iter().sum::<i64>();
    let key = day_key(ctx.day);
    if day_total > agg.elo_days.get(&key).copied().unwrap_or(0) {
        agg.elo_days.insert(key, day_total);
        let sums = windowed_sums(&agg.elo_days, ctx.today);
        agg.elo_all_time = sums.all_time;
        agg.elo_last_30 = sums.last_30;
        agg.elo_last_7 = sums.last_7;
    }

    // Any un-hinted win counts toward the completion streak.
    agg.completion.record_qualifying(ctx.day);

    let mut diff = snapshot
        .diff_aggregate
        .unwrap_or_else(|| DifficultyAggregateRow::new(input.user_id, input.difficulty));

    if rec.first_try && attempt_no == 1 {
        diff.first_try.record_qualifying(ctx.day);
    } else {
        diff.first_try.record_non_qualifying(ctx.day);
    }

    if tie {
        diff.beat_bot.record_qualifying(ctx.day);
    } else {
        diff.beat_bot.record_non_qualifying(ctx.day);
    }

    // Goal counters tick at most once per calendar day. The guard is on
    // day order, not equality, or late solves of older puzzles would
    // re-fire it.
    if tie && diff.goals_achieved_last_day.is_none_or(|d| d < ctx.day) {
        diff.goals_achieved += 1;
        diff.goals_achieved_last_day = Some(ctx.day);
    }
    if beat && diff.goals_beaten_last_day.is_none_or(|d| d < ctx.day) {
        diff.goals_beaten += 1;
        diff.goals_beaten_last_day = Some(ctx.day);
    }

    response.first_try = rec.first_try;
    response.first_to_beat_bot = rec.first_to_beat_bot;

    Outcome {
        mirror_moves: rec.best_moves,
        best_candidate: improved && input.replay.is_some(),
        record: rec,
        aggregate: agg,
        diff_aggregate: Some(diff),
        response,
    }
}

/// Replace the board-wide best replay when this attempt's score beats it.
async fn maybe_replace_best(pool: &SqlitePool, input: &AttemptInput) -> Result<(), sqlx::Error> {
    let Some(replay) = &input.replay else {
        return Ok(());
    };
    let moves = i64::from(input.moves);

    // The conditional upsert in replace_best_score is the authoritative
    // guard; this read only skips the name lookup when clearly beaten.
    let stored = db::get_best_score(pool, &input.puzzle_id, input.difficulty).await?;
    if stored.is_some_and(|best| best.moves <= moves) {
        return Ok(());
    }

    let owner_name = db::get_usernames(pool, &[input.user_id])
        .await?
        .remove(&input.user_id)
        .unwrap_or_else(|| format!("player-{}", input.user_id));

    db::replace_best_score(
        pool,
        &db::BestScoreRow {
            puzzle_id: input.puzzle_id.clone(),
            difficulty: input.difficulty,
            owner_id: input.user_id,
            owner_name,
            moves,
            replay: replay.clone(),
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn input(moves: u32, won: bool) -> AttemptInput {
        AttemptInput {
            user_id: 7,
            puzzle_id: "p1".to_string(),
            difficulty: Difficulty::Hard,
            moves,
            hint_used: false,
            won,
            replay: None,
        }
    }

    fn ctx(bot_moves: u32, day: &str) -> AttemptContext {
        AttemptContext {
            bot_moves,
            day: date(day),
            today: date(day),
            others_best: None,
        }
    }

    fn snapshot_of(outcome: &Outcome) -> TxnSnapshot {
        TxnSnapshot {
            record: Some(outcome.record.clone()),
            sibling_elos: Vec::new(),
            aggregate: Some(outcome.aggregate.clone()),
            diff_aggregate: outcome.diff_aggregate.clone(),
        }
    }

    #[test]
    fn first_win_at_par_scores_400() {
        let out = apply_attempt(&input(10, true), ctx(10, "2025-05-01"), TxnSnapshot::default());
        assert!(out.response.first_try);
        assert_eq!(out.response.elo_delta, 400);
        assert_eq!(out.record.elo, Some(400));
        assert_eq!(out.record.best_moves, Some(10));
        assert_eq!(out.record.tie_attempt, Some(1));
        assert_eq!(out.aggregate.total_solved, 1);
        assert_eq!(out.aggregate.completion.current, 1);
    }

    #[test]
    fn improvement_keeps_first_try_and_rescores() {
        let first = apply_attempt(&input(10, true), ctx(10, "2025-05-01"), TxnSnapshot::default());
        let second = apply_attempt(&input(8, true), ctx(10, "2025-05-01"), snapshot_of(&first));

        // first_try was computed on attempt 1 and stays true.
        assert!(second.response.first_try);
        assert_eq!(second.record.best_moves, Some(8));
        // Hard, moves 8 vs par 10, attempt 2, first to beat the bot:
        // 200 win + 600 beat + 200 first-to-beat - 0.5 penalty = round(999.5).
        assert!(second.response.first_to_beat_bot);
        assert_eq!(second.record.elo, Some(1000));
        assert_eq!(second.response.elo_delta, 600);
        // Tie index from attempt 1 is preserved; beat index is new.
        assert_eq!(second.record.tie_attempt, Some(1));
        assert_eq!(second.record.beat_attempt, Some(2));
        // Solved is counted once per puzzle + difficulty.
        assert_eq!(second.aggregate.total_solved, 1);
    }

    #[test]
    fn above_par_improvement_keeps_first_win_penalty_index() {
        let loss = apply_attempt(&input(12, false), ctx(10, "2025-05-01"), TxnSnapshot::default());
        // Win on attempt 2, above par: 200 win - 0.5 penalty = round(199.5).
        let win = apply_attempt(&input(12, true), ctx(10, "2025-05-01"), snapshot_of(&loss));
        assert_eq!(win.record.win_attempt, Some(2));
        assert_eq!(win.record.elo, Some(200));

        // An above-par improvement on attempt 3 re-scores with the stored
        // first-win index, not the current attempt number.
        let better = apply_attempt(&input(11, true), ctx(10, "2025-05-01"), snapshot_of(&win));
        assert_eq!(better.record.win_attempt, Some(2));
        assert_eq!(better.record.best_moves, Some(11));
        assert_eq!(better.record.elo, Some(200));
        assert_eq!(better.response.elo_delta, 0);
    }

    #[test]
    fn older_puzzle_solved_late_cannot_double_count_goals() {
        let first = apply_attempt(&input(9, true), ctx(10, "2025-05-02"), TxnSnapshot::default());
        let d1 = first.diff_aggregate.clone().unwrap();
        assert_eq!(d1.goals_achieved, 1);
        assert_eq!(d1.goals_beaten, 1);

        // Catch up on the previous day's puzzle afterwards.
        let mut old = input(9, true);
        old.puzzle_id = "p0".to_string();
        let mut snap = snapshot_of(&first);
        snap.record = None;
        let second = apply_attempt(&old, ctx(10, "2025-05-01"), snap);

        let d2 = second.diff_aggregate.unwrap();
        assert_eq!(d2.goals_achieved, 1);
        assert_eq!(d2.goals_beaten, 1);
        assert_eq!(d2.beat_bot.current, 1);
        assert_eq!(d2.beat_bot.last_day, Some(date("2025-05-02")));
        assert_eq!(second.aggregate.completion.current, 1);
        assert_eq!(second.aggregate.completion.last_day, Some(date("2025-05-02")));
    }

    #[test]
    fn worse_win_does_not_touch_best() {
        let first = apply_attempt(&input(8, true), ctx(10, "2025-05-01"), TxnSnapshot::default());
        let second = apply_attempt(&input(9, true), ctx(10, "2025-05-01"), snapshot_of(&first));
        assert_eq!(second.record.best_moves, Some(8));
        assert_eq!(second.record.elo, first.record.elo);
        assert_eq!(second.response.elo_delta, 0);
        assert_eq!(second.record.attempts, 2);
    }

    #[test]
    fn loss_only_counts_attempts() {
        let out = apply_attempt(&input(15, false), ctx(10, "2025-05-01"), TxnSnapshot::default());
        assert_eq!(out.record.attempts, 1);
        assert!(!out.record.won);
        assert_eq!(out.record.best_moves, None);
        assert_eq!(out.record.elo, None);
        assert!(out.diff_aggregate.is_none());
        assert_eq!(out.aggregate.completion.current, 0);
        assert_eq!(out.aggregate.total_attempts, 1);
        assert!(out.mirror_moves.is_none());
    }

    #[test]
    fn hint_is_sticky_and_suppresses_scoring() {
        let mut hinted = input(10, true);
        hinted.hint_used = true;
        let first = apply_attempt(&hinted, ctx(10, "2025-05-01"), TxnSnapshot::default());
        assert!(first.record.hint_used);
        assert_eq!(first.record.elo, None);
        assert!(!first.response.first_try);

        // A clean win afterwards still scores nothing, but attempts move.
        let second = apply_attempt(&input(8, true), ctx(10, "2025-05-01"), snapshot_of(&first));
        assert!(second.record.hint_used);
        assert_eq!(second.record.attempts, 2);
        assert_eq!(second.record.elo, None);
        assert_eq!(second.record.best_moves, None);
        assert_eq!(second.response.elo_delta, 0);
        assert!(second.diff_aggregate.is_none());
        // Solved still counts; the hint gates scores, not completion facts.
        assert_eq!(second.aggregate.total_solved, 1);
    }

    #[test]
    fn first_to_beat_bot_blocked_by_lower_board_score() {
        let mut context = ctx(10, "2025-05-01");
        context.others_best = Some(8);
        let out = apply_attempt(&input(9, true), context, TxnSnapshot::default());
        assert!(!out.response.first_to_beat_bot);

        // Equal board score does not block: nobody is strictly lower.
        let mut context = ctx(10, "2025-05-01");
        context.others_best = Some(9);
        let out = apply_attempt(&input(9, true), context, TxnSnapshot::default());
        assert!(out.response.first_to_beat_bot);
    }

    #[test]
    fn day_map_is_max_preserving() {
        let first = apply_attempt(&input(10, true), ctx(10, "2025-05-01"), TxnSnapshot::default());
        assert_eq!(first.aggregate.elo_days.get("2025-05-01"), Some(&400));
        assert_eq!(first.aggregate.elo_all_time, 400);

        // Pre-seed a higher stored total for the same day; it must not drop.
        let mut snap = snapshot_of(&first);
        snap.aggregate
            .as_mut()
            .unwrap()
            .elo_days
            .insert("2025-05-01".to_string(), 5000);
        let mut worse = input(10, true);
        worse.moves = 10;
        let second = apply_attempt(&worse, ctx(10, "2025-05-01"), snap);
        assert_eq!(second.aggregate.elo_days.get("2025-05-01"), Some(&5000));
    }

    #[test]
    fn sibling_difficulty_scores_feed_day_total() {
        let mut snap = TxnSnapshot::default();
        snap.sibling_elos = vec![300, 150];
        let out = apply_attempt(&input(10, true), ctx(10, "2025-05-01"), snap);
        assert_eq!(out.aggregate.elo_days.get("2025-05-01"), Some(&850));
    }

    #[test]
    fn streaks_follow_consecutive_puzzle_days() {
        let first = apply_attempt(&input(10, true), ctx(10, "2025-05-01"), TxnSnapshot::default());
        let mut next = input(10, true);
        next.puzzle_id = "p2".to_string();
        // New puzzle, next day: record starts fresh but aggregates carry.
        let mut snap = snapshot_of(&first);
        snap.record = None;
        let second = apply_attempt(&next, ctx(10, "2025-05-02"), snap);
        assert_eq!(second.aggregate.completion.current, 2);
        let diff = second.diff_aggregate.unwrap();
        assert_eq!(diff.first_try.current, 2);
        assert_eq!(diff.goals_achieved, 2);
    }

    #[test]
    fn non_first_try_win_on_new_day_drops_first_try_run() {
        let first = apply_attempt(&input(10, true), ctx(10, "2025-05-01"), TxnSnapshot::default());

        let mut next = input(15, false);
        next.puzzle_id = "p2".to_string();
        let mut snap = snapshot_of(&first);
        snap.record = None;
        let loss = apply_attempt(&next, ctx(10, "2025-05-02"), snap);
        // Losses never touch streaks.
        assert_eq!(
            loss.aggregate.completion.current,
            first.aggregate.completion.current
        );

        // Winning on attempt 2 the next day is a non-qualifying first-try.
        // The loss wrote no difficulty aggregate, so the next transaction
        // still reads the one from the first day.
        let mut win = input(10, true);
        win.puzzle_id = "p2".to_string();
        let snap = TxnSnapshot {
            record: Some(loss.record.clone()),
            sibling_elos: Vec::new(),
            aggregate: Some(loss.aggregate.clone()),
            diff_aggregate: first.diff_aggregate.clone(),
        };
        let second = apply_attempt(&win, ctx(10, "2025-05-02"), snap);
        let diff = second.diff_aggregate.unwrap();
        assert_eq!(diff.first_try.current, 0);
        assert_eq!(diff.first_try.longest, 1);
        // The completion streak still extends: the puzzle was solved clean.
        assert_eq!(second.aggregate.completion.current, 2);
    }

    #[test]
    fn goal_counters_tick_once_per_day() {
        let first = apply_attempt(&input(9, true), ctx(10, "2025-05-01"), TxnSnapshot::default());
        let d1 = first.diff_aggregate.clone().unwrap();
        assert_eq!(d1.goals_achieved, 1);
        assert_eq!(d1.goals_beaten, 1);

        let mut again = input(8, true);
        again.puzzle_id = "p2".to_string();
        let mut snap = snapshot_of(&first);
        snap.record = None;
        let second = apply_attempt(&again, ctx(10, "2025-05-01"), snap);
        let d2 = second.diff_aggregate.unwrap();
        assert_eq!(d2.goals_achieved, 1);
        assert_eq!(d2.goals_beaten, 1);
    }

    #[test]
    fn validation_rejects_malformed_input() {
        let mut bad = input(10, true);
        bad.puzzle_id = String::new();
        assert!(matches!(validate(&bad), Err(RecordError::Invalid(_))));

        let mut bad = input(10, true);
        bad.puzzle_id = "p 1".to_string();
        assert!(matches!(validate(&bad), Err(RecordError::Invalid(_))));

        let bad = input(0, true);
        assert!(matches!(validate(&bad), Err(RecordError::Invalid(_))));

        assert!(validate(&input(10, true)).is_ok());
    }
}
