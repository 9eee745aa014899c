use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio::net::TcpListener;

use flood_core::day_key;
use flood_core::protocol::{
    AuthResponse, LeaderboardResponse, ProfileResponse, RecordAttemptResponse,
};
use flood_server::Config;

/// Spin up a test server on a random port, return the base URL.
async fn start_server() -> String {
    // In-memory SQLite so tests don't clash.
    let config = Config {
        admins: HashSet::from(["admin".to_string()]),
        rebuild_interval: Duration::from_secs(3600),
    };
    let (app, _state) = flood_server::build_app("sqlite::memory:", config).await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start.
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("http://127.0.0.1:{}", port)
}

/// Authenticate as `name`, return the session token.
async fn auth(base: &str, name: &str) -> String {
    let resp: AuthResponse = reqwest::Client::new()
        .post(format!("{}/auth/guest", base))
        .json(&json!({ "username": name }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    resp.token
}

/// Seed one puzzle + difficulty with the admin account.
async fn seed_puzzle(base: &str, admin_token: &str, puzzle_id: &str, day: &str, bot_moves: u32) {
    let resp = reqwest::Client::new()
        .post(format!("{}/admin/puzzles", base))
        .bearer_auth(admin_token)
        .json(&json!({
            "puzzle_id": puzzle_id,
            "day": day,
            "difficulty": "Hard",
            "bot_moves": bot_moves,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
}

async fn record(
    base: &str,
    token: &str,
    puzzle_id: &str,
    moves: u32,
    won: bool,
    hint_used: bool,
) -> RecordAttemptResponse {
    let resp = reqwest::Client::new()
        .post(format!("{}/attempts", base))
        .bearer_auth(token)
        .json(&json!({
            "puzzle_id": puzzle_id,
            "difficulty": "Hard",
            "moves": moves,
            "hint_used": hint_used,
            "won": won,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    resp.json().await.unwrap()
}

async fn profile(base: &str, name: &str) -> ProfileResponse {
    reqwest::get(format!("{}/profile/{}", base, name))
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

// ── Tests ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health() {
    let base = start_server().await;
    let resp = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(resp, "ok");
}

#[tokio::test]
async fn test_guest_auth_creates_unique_users() {
    let base = start_server().await;

    let client = reqwest::Client::new();
    let a: AuthResponse = client
        .post(format!("{}/auth/guest", base))
        .json(&json!({}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let b: AuthResponse = client
        .post(format!("{}/auth/guest", base))
        .json(&json!({}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_ne!(a.token, b.token);
    assert_ne!(a.username, b.username);
    assert!(a.username.starts_with("guest_"));
}

#[tokio::test]
async fn test_attempt_requires_auth() {
    let base = start_server().await;
    let resp = reqwest::Client::new()
        .post(format!("{}/attempts", base))
        .json(&json!({
            "puzzle_id": "p1", "difficulty": "Hard",
            "moves": 10, "hint_used": false, "won": true,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_unknown_puzzle_is_404() {
    let base = start_server().await;
    let token = auth(&base, "solo").await;

    let resp = reqwest::Client::new()
        .post(format!("{}/attempts", base))
        .bearer_auth(&token)
        .json(&json!({
            "puzzle_id": "nope", "difficulty": "Hard",
            "moves": 10, "hint_used": false, "won": true,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_non_admin_cannot_seed_puzzles() {
    let base = start_server().await;
    let token = auth(&base, "mallory").await;

    let resp = reqwest::Client::new()
        .post(format!("{}/admin/puzzles", base))
        .bearer_auth(&token)
        .json(&json!({
            "puzzle_id": "p1", "day": "2025-05-01",
            "difficulty": "Hard", "bot_moves": 10,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn test_first_try_win_then_improvement() {
    let base = start_server().await;
    let admin = auth(&base, "admin").await;
    let today = day_key(Utc::now().date_naive());
    seed_puzzle(&base, &admin, "p1", &today, 10).await;

    let token = auth(&base, "alice").await;

    // Attempt 1: tie par on Hard. 200 win + 200 tie = 400.
    let first = record(&base, &token, "p1", 10, true, false).await;
    assert!(first.first_try);
    assert!(!first.first_to_beat_bot);
    assert_eq!(first.elo_delta, 400);

    // Attempt 2: beat par by 2, first on the board to do so.
    // 200 win + 600 beat + 200 first-to-beat - 0.5 penalty, rounded: 1000.
    let second = record(&base, &token, "p1", 8, true, false).await;
    assert!(second.first_try);
    assert!(second.first_to_beat_bot);
    assert_eq!(second.elo_delta, 600);

    let prof = profile(&base, "alice").await;
    assert_eq!(prof.total_attempts, 2);
    assert_eq!(prof.total_solved, 1);
    assert_eq!(prof.elo_all_time, 1000);
    assert_eq!(prof.elo_last_7, 1000);
    assert_eq!(prof.streak_current, 1);
}

#[tokio::test]
async fn test_second_player_is_not_first_to_beat_bot() {
    let base = start_server().await;
    let admin = auth(&base, "admin").await;
    seed_puzzle(&base, &admin, "p1", "2025-05-01", 10).await;

    let alice = auth(&base, "alice").await;
    let bob = auth(&base, "bob").await;

    let first = record(&base, &alice, "p1", 8, true, false).await;
    assert!(first.first_to_beat_bot);

    // Bob beats par too, but Alice's 8 is already on the board.
    let second = record(&base, &bob, "p1", 9, true, false).await;
    assert!(!second.first_to_beat_bot);
}

#[tokio::test]
async fn test_hint_is_sticky() {
    let base = start_server().await;
    let admin = auth(&base, "admin").await;
    seed_puzzle(&base, &admin, "p1", "2025-05-01", 10).await;

    let token = auth(&base, "carol").await;

    let hinted = record(&base, &token, "p1", 10, true, true).await;
    assert!(!hinted.first_try);
    assert_eq!(hinted.elo_delta, 0);

    // A clean win afterwards still scores nothing for this puzzle.
    let clean = record(&base, &token, "p1", 8, true, false).await;
    assert_eq!(clean.elo_delta, 0);
    assert!(!clean.first_to_beat_bot);

    let prof = profile(&base, "carol").await;
    assert_eq!(prof.total_attempts, 2);
    assert_eq!(prof.total_solved, 1);
    assert_eq!(prof.elo_all_time, 0);
    assert_eq!(prof.streak_current, 0);
}

#[tokio::test]
async fn test_loss_only_counts_attempts() {
    let base = start_server().await;
    let admin = auth(&base, "admin").await;
    seed_puzzle(&base, &admin, "p1", "2025-05-01", 10).await;

    let token = auth(&base, "dave").await;
    let resp = record(&base, &token, "p1", 25, false, false).await;
    assert!(!resp.first_try);
    assert_eq!(resp.elo_delta, 0);

    let prof = profile(&base, "dave").await;
    assert_eq!(prof.total_attempts, 1);
    assert_eq!(prof.total_solved, 0);
    assert_eq!(prof.elo_all_time, 0);
}

#[tokio::test]
async fn test_leaderboard_snapshot_and_requester_rank() {
    let base = start_server().await;
    let admin = auth(&base, "admin").await;
    let today = day_key(Utc::now().date_naive());
    seed_puzzle(&base, &admin, "p1", &today, 20).await;

    // Twelve players; player i solves in 20 - i moves, so player 12 tops
    // the board and player 1 ranks last.
    let mut tokens = Vec::new();
    for i in 1..=12u32 {
        let token = auth(&base, &format!("player{}", i)).await;
        record(&base, &token, "p1", 20 - i, true, false).await;
        tokens.push(token);
    }

    // Force a rebuild.
    let resp = reqwest::Client::new()
        .post(format!("{}/admin/rebuild", base))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let lb: LeaderboardResponse = reqwest::Client::new()
        .get(format!("{}/leaderboard/score/all_time", base))
        .bearer_auth(&tokens[0])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(lb.top.len(), 10);
    assert_eq!(lb.top[0].rank, 1);
    assert_eq!(lb.top[0].username, "player12");
    assert!(lb.top[0].value > lb.top[9].value);

    let me = lb.requester.unwrap();
    assert_eq!(me.rank, 12);
    assert_eq!(me.username, "player1");
}

#[tokio::test]
async fn test_leaderboard_falls_back_without_snapshot() {
    let base = start_server().await;
    let admin = auth(&base, "admin").await;
    let today = day_key(Utc::now().date_naive());
    seed_puzzle(&base, &admin, "p1", &today, 10).await;

    let token = auth(&base, "erin").await;
    record(&base, &token, "p1", 9, true, false).await;

    // No rebuild has run; the reader scans live.
    let lb: LeaderboardResponse = reqwest::Client::new()
        .get(format!("{}/leaderboard/score/all_time", base))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(lb.top.len(), 1);
    assert_eq!(lb.top[0].username, "erin");
    assert_eq!(lb.requester.unwrap().rank, 1);
}

#[tokio::test]
async fn test_streak_leaderboard_marks_live_runs() {
    let base = start_server().await;
    let admin = auth(&base, "admin").await;
    let today = day_key(Utc::now().date_naive());
    seed_puzzle(&base, &admin, "p1", &today, 10).await;

    let token = auth(&base, "frank").await;
    record(&base, &token, "p1", 10, true, false).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/admin/rebuild", base))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let lb: LeaderboardResponse = reqwest::Client::new()
        .get(format!("{}/leaderboard/streak/completion", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(lb.top[0].username, "frank");
    assert_eq!(lb.top[0].value, 1);
    assert_eq!(lb.top[0].current, Some(1));
    assert_eq!(lb.top[0].is_current, Some(true));
}

#[tokio::test]
async fn test_unknown_dimension_is_404() {
    let base = start_server().await;
    let resp = reqwest::get(format!("{}/leaderboard/score/bogus", base))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    // Per-difficulty dimensions require the difficulty parameter.
    let resp = reqwest::get(format!("{}/leaderboard/goals/beaten", base))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = reqwest::get(format!("{}/leaderboard/goals/beaten?difficulty=hard", base))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}
