use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use flood_core::protocol::{
    AuthResponse, GuestAuthRequest, LeaderboardResponse, ProfileResponse, RecordAttemptRequest,
    RecordAttemptResponse, SeedPuzzleRequest,
};
use flood_core::windowed_sums;

use crate::db;
use crate::leaderboard;
use crate::recorder::{self, AttemptInput, RecordError};
use crate::state::AppState;

/// Forced rebuilds get the same time box as scheduled ones.
const REBUILD_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);

// ── Health ──────────────────────────────────────────────────────────────

pub async fn health() -> &'static str {
    "ok"
}

// ── Auth ────────────────────────────────────────────────────────────────

fn valid_username(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 32
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn random_guest_name() -> String {
    use rand::RngExt;
    let mut rng = rand::rng();
    let suffix: String = (0..8)
        .map(|_| {
            let idx = rng.random_range(0..36u8);
            if idx < 10 {
                (b'0' + idx) as char
            } else {
                (b'a' + idx - 10) as char
            }
        })
        .collect();
    format!("guest_{suffix}")
}

pub async fn guest_auth(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GuestAuthRequest>,
) -> Result<Json<AuthResponse>, StatusCode> {
    let username = match req.username {
        Some(name) if valid_username(&name) => name,
        Some(_) => return Err(StatusCode::BAD_REQUEST),
        None => random_guest_name(),
    };

    let user_id = db::upsert_user(&state.db, &username)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let token = db::create_session(&state.db, user_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(AuthResponse { token, username }))
}

/// Resolve the authenticated caller from a `Bearer` token.
async fn bearer_user(state: &AppState, headers: &HeaderMap) -> Result<db::UserRow, StatusCode> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    db::get_session(&state.db, token)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::UNAUTHORIZED)
}

/// Like `bearer_user` but anonymous callers are fine.
async fn maybe_bearer_user(state: &AppState, headers: &HeaderMap) -> Option<db::UserRow> {
    bearer_user(state, headers).await.ok()
}

// ── Attempt recording ───────────────────────────────────────────────────

pub async fn record_attempt(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<RecordAttemptRequest>,
) -> Result<Json<RecordAttemptResponse>, StatusCode> {
    let user = bearer_user(&state, &headers).await?;

    let input = AttemptInput {
        user_id: user.id,
        puzzle_id: req.puzzle_id,
        difficulty: req.difficulty,
        moves: req.moves,
        hint_used: req.hint_used,
        won: req.won,
        replay: req.replay,
    };

    recorder::record_attempt(&state.db, input)
        .await
        .map(Json)
        .map_err(|err| match err {
            RecordError::Invalid(_) => StatusCode::BAD_REQUEST,
            RecordError::UnknownPuzzle => StatusCode::NOT_FOUND,
            RecordError::Conflict => StatusCode::CONFLICT,
            RecordError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            RecordError::Db(err) => {
                tracing::error!(%err, "attempt recording failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        })
}

// ── Leaderboard ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub difficulty: Option<String>,
}

pub async fn read_leaderboard(
    State(state): State<Arc<AppState>>,
    Path((category, subcategory)): Path<(String, String)>,
    Query(query): Query<LeaderboardQuery>,
    headers: HeaderMap,
) -> Result<Json<LeaderboardResponse>, StatusCode> {
    let dim = leaderboard::parse_dimension(&category, &subcategory, query.difficulty.as_deref())
        .ok_or(StatusCode::NOT_FOUND)?;

    let requester = maybe_bearer_user(&state, &headers).await.map(|u| u.id);

    let resp = leaderboard::read(&state.db, dim, requester)
        .await
        .map_err(|err| {
            tracing::error!(%err, "leaderboard read failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(resp))
}

// ── Profile ─────────────────────────────────────────────────────────────

pub async fn profile(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<Json<ProfileResponse>, StatusCode> {
    let user = db::get_user_by_username(&state.db, &username)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let agg = db::get_user_aggregate(&state.db, user.id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .unwrap_or_else(|| db::UserAggregateRow::new(user.id));

    // Serve live sums from the day map, not the cached columns.
    let sums = windowed_sums(&agg.elo_days, Utc::now().date_naive());

    Ok(Json(ProfileResponse {
        username: user.username,
        total_attempts: agg.total_attempts,
        total_solved: agg.total_solved,
        total_moves: agg.total_moves,
        streak_current: i64::from(agg.completion.current),
        streak_longest: i64::from(agg.completion.longest),
        elo_all_time: sums.all_time,
        elo_last_30: sums.last_30,
        elo_last_7: sums.last_7,
    }))
}

// ── Admin ───────────────────────────────────────────────────────────────

pub async fn seed_puzzle(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SeedPuzzleRequest>,
) -> Result<StatusCode, StatusCode> {
    let user = bearer_user(&state, &headers).await?;
    if !state.config.is_admin(&user.username) {
        return Err(StatusCode::FORBIDDEN);
    }

    if req.puzzle_id.is_empty() || req.bot_moves == 0 {
        return Err(StatusCode::BAD_REQUEST);
    }
    if NaiveDate::parse_from_str(&req.day, "%Y-%m-%d").is_err() {
        return Err(StatusCode::BAD_REQUEST);
    }

    db::upsert_puzzle(
        &state.db,
        &req.puzzle_id,
        req.difficulty,
        &req.day,
        i64::from(req.bot_moves),
    )
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn trigger_rebuild(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, StatusCode> {
    let user = bearer_user(&state, &headers).await?;
    if !state.config.is_admin(&user.username) {
        return Err(StatusCode::FORBIDDEN);
    }

    match tokio::time::timeout(REBUILD_TIMEOUT, leaderboard::rebuild_all(&state.db)).await {
        Ok(Ok(())) => Ok(StatusCode::NO_CONTENT),
        Ok(Err(err)) => {
            tracing::error!(%err, "forced rebuild failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
        Err(_) => Err(StatusCode::GATEWAY_TIMEOUT),
    }
}
