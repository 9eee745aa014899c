//! Two-tier leaderboards: a periodic full rebuild persists ranked
//! snapshots; the read path serves the top ten plus the requester's own
//! placement, falling back to a live scan when no snapshot exists yet.
//!
//! Rebuilds are deliberately full scans. The max-preserving day map and
//! the recompute-from-source window rule make incremental maintenance
//! error-prone under concurrent per-user writes; a periodic rebuild is
//! stale by at most one interval and trivial to audit.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;

use flood_core::protocol::{LeaderboardEntry, LeaderboardResponse};
use flood_core::window::windowed_sums;
use flood_core::Difficulty;

use crate::db::{self, SnapshotEntry, SnapshotRow};

const TOP_ENTRIES: usize = 100;
const TOP_VISIBLE: usize = 10;

// ── Ranked dimensions ───────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScoreWindow {
    AllTime,
    Last30,
    Last7,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreakKind {
    Completion,
    FirstTry,
    BeatBot,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GoalKind {
    Achieved,
    Beaten,
}

/// One rankable (category, subcategory[, difficulty]) combination.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dimension {
    Score(ScoreWindow),
    Streak(StreakKind, Option<Difficulty>),
    Goals(GoalKind, Difficulty),
}

impl Dimension {
    /// Every dimension the rebuild job maintains.
    pub fn all() -> Vec<Dimension> {
        let mut dims = vec![
            Dimension::Score(ScoreWindow::AllTime),
            Dimension::Score(ScoreWindow::Last30),
            Dimension::Score(ScoreWindow::Last7),
            Dimension::Streak(StreakKind::Completion, None),
        ];
        for d in Difficulty::all() {
            dims.push(Dimension::Streak(StreakKind::FirstTry, Some(*d)));
            dims.push(Dimension::Streak(StreakKind::BeatBot, Some(*d)));
            dims.push(Dimension::Goals(GoalKind::Achieved, *d));
            dims.push(Dimension::Goals(GoalKind::Beaten, *d));
        }
        dims
    }

    pub fn parse(
        category: &str,
        subcategory: &str,
        difficulty: Option<Difficulty>,
    ) -> Option<Dimension> {
        match (category, subcategory) {
            ("score", "all_time") => Some(Dimension::Score(ScoreWindow::AllTime)),
            ("score", "last_30") => Some(Dimension::Score(ScoreWindow::Last30)),
            ("score", "last_7") => Some(Dimension::Score(ScoreWindow::Last7)),
            ("streak", "completion") => Some(Dimension::Streak(StreakKind::Completion, None)),
            ("streak", "first_try") => {
                Some(Dimension::Streak(StreakKind::FirstTry, Some(difficulty?)))
            }
            ("streak", "beat_bot") => {
                Some(Dimension::Streak(StreakKind::BeatBot, Some(difficulty?)))
            }
            ("goals", "achieved") => Some(Dimension::Goals(GoalKind::Achieved, difficulty?)),
            ("goals", "beaten") => Some(Dimension::Goals(GoalKind::Beaten, difficulty?)),
            _ => None,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Dimension::Score(_) => "score",
            Dimension::Streak(..) => "streak",
            Dimension::Goals(..) => "goals",
        }
    }

    pub fn subcategory(&self) -> &'static str {
        match self {
            Dimension::Score(ScoreWindow::AllTime) => "all_time",
            Dimension::Score(ScoreWindow::Last30) => "last_30",
            Dimension::Score(ScoreWindow::Last7) => "last_7",
            Dimension::Streak(StreakKind::Completion, _) => "completion",
            Dimension::Streak(StreakKind::FirstTry, _) => "first_try",
            Dimension::Streak(StreakKind::BeatBot, _) => "beat_bot",
            Dimension::Goals(GoalKind::Achieved, _) => "achieved",
            Dimension::Goals(GoalKind::Beaten, _) => "beaten",
        }
    }

    pub fn difficulty(&self) -> Option<Difficulty> {
        match self {
            Dimension::Score(_) => None,
            Dimension::Streak(_, d) => *d,
            Dimension::Goals(_, d) => Some(*d),
        }
    }

    fn is_streak(&self) -> bool {
        matches!(self, Dimension::Streak(..))
    }
}

/// Parse the path + query form used by the HTTP surface.
pub fn parse_dimension(
    category: &str,
    subcategory: &str,
    difficulty: Option<&str>,
) -> Option<Dimension> {
    let difficulty = match difficulty {
        Some(raw) => Some(Difficulty::from_str(raw).ok()?),
        None => None,
    };
    Dimension::parse(category, subcategory, difficulty)
}

// ── Builder ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Candidate {
    user_id: i64,
    value: i64,
    current: Option<i64>,
}

/// Rebuild every dimension's snapshot from scratch.
pub async fn rebuild_all(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let today = Utc::now().date_naive();
    for dim in Dimension::all() {
        rebuild_dimension(pool, dim, today).await?;
    }
    Ok(())
}

async fn rebuild_dimension(
    pool: &SqlitePool,
    dim: Dimension,
    today: NaiveDate,
) -> Result<(), sqlx::Error> {
    let candidates = collect_candidates(pool, dim, today).await?;
    let snapshot = rank(candidates);
    tracing::debug!(
        category = dim.category(),
        subcategory = dim.subcategory(),
        total = snapshot.total_entries,
        "leaderboard rebuilt"
    );
    db::upsert_snapshot(
        pool,
        dim.category(),
        dim.subcategory(),
        dim.difficulty(),
        &snapshot,
    )
    .await
}

/// One unlocked scan over the relevant aggregates. The scan tolerates
/// users changing mid-scan; the output is advisory until the next rebuild.
async fn collect_candidates(
    pool: &SqlitePool,
    dim: Dimension,
    today: NaiveDate,
) -> Result<Vec<Candidate>, sqlx::Error> {
    let mut candidates = Vec::new();
    match dim {
        Dimension::Score(window) => {
            for agg in db::scan_user_aggregates(pool).await? {
                // Cached rolling sums may be stale; always recompute from
                // the source-of-truth day map.
                let sums = windowed_sums(&agg.elo_days, today);
                let value = match window {
                    ScoreWindow::AllTime => sums.all_time,
                    ScoreWindow::Last30 => sums.last_30,
                    ScoreWindow::Last7 => sums.last_7,
                };
                candidates.push(Candidate {
                    user_id: agg.user_id,
                    value,
                    current: None,
                });
            }
        }
        Dimension::Streak(StreakKind::Completion, _) => {
            for agg in db::scan_user_aggregates(pool).await? {
                candidates.push(Candidate {
                    user_id: agg.user_id,
                    value: i64::from(agg.completion.longest),
                    current: Some(i64::from(agg.completion.current)),
                });
            }
        }
        Dimension::Streak(kind, Some(difficulty)) => {
            for agg in db::scan_difficulty_aggregates(pool, difficulty).await? {
                let streak = match kind {
                    StreakKind::FirstTry => agg.first_try,
                    _ => agg.beat_bot,
                };
                candidates.push(Candidate {
                    user_id: agg.user_id,
                    value: i64::from(streak.longest),
                    current: Some(i64::from(streak.current)),
                });
            }
        }
        Dimension::Streak(_, None) => {}
        Dimension::Goals(kind, difficulty) => {
            for agg in db::scan_difficulty_aggregates(pool, difficulty).await? {
                let value = match kind {
                    GoalKind::Achieved => agg.goals_achieved,
                    GoalKind::Beaten => agg.goals_beaten,
                };
                candidates.push(Candidate {
                    user_id: agg.user_id,
                    value,
                    current: None,
                });
            }
        }
    }
    Ok(candidates)
}

/// Sort, truncate and index the candidates. Zero-valued users are
/// unranked; ties keep scan order (stable sort).
fn rank(mut candidates: Vec<Candidate>) -> SnapshotRow {
    candidates.retain(|c| c.value > 0);
    candidates.sort_by(|a, b| b.value.cmp(&a.value));

    let total_entries = candidates.len() as i64;
    let mut user_ranks = BTreeMap::new();
    for (i, c) in candidates.iter().enumerate() {
        user_ranks.insert(c.user_id, (i + 1) as u32);
    }

    let entries = candidates
        .into_iter()
        .take(TOP_ENTRIES)
        .map(|c| SnapshotEntry {
            user_id: c.user_id,
            value: c.value,
            current: c.current,
        })
        .collect();

    SnapshotRow {
        entries,
        user_ranks,
        total_entries,
    }
}

// ── Reader ──────────────────────────────────────────────────────────────

/// Serve the top ten plus the requester's own placement.
pub async fn read(
    pool: &SqlitePool,
    dim: Dimension,
    requester: Option<i64>,
) -> Result<LeaderboardResponse, sqlx::Error> {
    // A missing snapshot is a normal condition: fall back to the builder's
    // scan-and-rank, live. Degraded cost, same answer.
    let snapshot = match db::get_snapshot(
        pool,
        dim.category(),
        dim.subcategory(),
        dim.difficulty(),
    )
    .await?
    {
        Some(snapshot) => snapshot,
        None => rank(collect_candidates(pool, dim, Utc::now().date_naive()).await?),
    };

    let requester_entry = match requester {
        Some(user_id) => locate_requester(pool, dim, &snapshot, user_id).await?,
        None => None,
    };

    // Resolve display names for everyone we are about to return.
    let mut ids: Vec<i64> = snapshot
        .entries
        .iter()
        .take(TOP_VISIBLE)
        .map(|e| e.user_id)
        .collect();
    if let Some((user_id, ..)) = requester_entry {
        ids.push(user_id);
    }
    let names = db::get_usernames(pool, &ids).await?;
    let display = |id: i64| {
        names
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("player-{id}"))
    };

    let top = snapshot
        .entries
        .iter()
        .take(TOP_VISIBLE)
        .enumerate()
        .map(|(i, e)| make_entry(dim, (i + 1) as u32, e.user_id, e.value, e.current, &display))
        .collect();

    let requester = requester_entry
        .map(|(user_id, rank, value, current)| {
            make_entry(dim, rank, user_id, value, current, &display)
        });

    Ok(LeaderboardResponse { top, requester })
}

fn make_entry(
    dim: Dimension,
    rank: u32,
    user_id: i64,
    value: i64,
    current: Option<i64>,
    display: &impl Fn(i64) -> String,
) -> LeaderboardEntry {
    let (current, is_current) = if dim.is_streak() {
        (current, current.map(|c| c == value))
    } else {
        (None, None)
    };
    LeaderboardEntry {
        rank,
        user_id,
        username: display(user_id),
        value,
        current,
        is_current,
    }
}

/// Find the requester's (rank, value): directly from the snapshot's entry
/// array when ranked in the top 100, otherwise via the full rank map plus
/// one targeted aggregate read for a live value. Bounded cost either way.
async fn locate_requester(
    pool: &SqlitePool,
    dim: Dimension,
    snapshot: &SnapshotRow,
    user_id: i64,
) -> Result<Option<(i64, u32, i64, Option<i64>)>, sqlx::Error> {
    if let Some(idx) = snapshot.entries.iter().position(|e| e.user_id == user_id) {
        let entry = &snapshot.entries[idx];
        return Ok(Some((user_id, (idx + 1) as u32, entry.value, entry.current)));
    }

    let Some(rank) = snapshot.user_ranks.get(&user_id).copied() else {
        // Unranked: zero value at rebuild time, or never played.
        return Ok(None);
    };

    let live = read_user_value(pool, dim, user_id).await?;
    let (value, current) = live.unwrap_or((0, None));
    Ok(Some((user_id, rank, value, current)))
}

/// Targeted single-user read of one dimension's value.
async fn read_user_value(
    pool: &SqlitePool,
    dim: Dimension,
    user_id: i64,
) -> Result<Option<(i64, Option<i64>)>, sqlx::Error> {
    match dim {
        Dimension::Score(window) => {
            let Some(agg) = db::get_user_aggregate(pool, user_id).await? else {
                return Ok(None);
            };
            let sums = windowed_sums(&agg.elo_days, Utc::now().date_naive());
            let value = match window {
                ScoreWindow::AllTime => sums.all_time,
                ScoreWindow::Last30 => sums.last_30,
                ScoreWindow::Last7 => sums.last_7,
            };
            Ok(Some((value, None)))
        }
        Dimension::Streak(StreakKind::Completion, _) => {
            let Some(agg) = db::get_user_aggregate(pool, user_id).await? else {
                return Ok(None);
            };
            Ok(Some((
                i64::from(agg.completion.longest),
                Some(i64::from(agg.completion.current)),
            )))
        }
        Dimension::Streak(kind, Some(difficulty)) => {
            let Some(agg) = db::get_difficulty_aggregate(pool, user_id, difficulty).await? else {
                return Ok(None);
            };
            let streak = match kind {
                StreakKind::FirstTry => agg.first_try,
                _ => agg.beat_bot,
            };
            Ok(Some((
                i64::from(streak.longest),
                Some(i64::from(streak.current)),
            )))
        }
        Dimension::Streak(_, None) => Ok(None),
        Dimension::Goals(kind, difficulty) => {
            let Some(agg) = db::get_difficulty_aggregate(pool, user_id, difficulty).await? else {
                return Ok(None);
            };
            let value = match kind {
                GoalKind::Achieved => agg.goals_achieved,
                GoalKind::Beaten => agg.goals_beaten,
            };
            Ok(Some((value, None)))
        }
    }
}
