use std::collections::HashSet;
use std::time::Duration;

use sqlx::SqlitePool;

/// Immutable process configuration, read from the environment exactly once
/// at startup and passed to handlers through `AppState`. Handlers never
/// consult ambient env state per request.
#[derive(Debug, Clone)]
pub struct Config {
    /// Usernames allowed to seed puzzles and force rebuilds.
    pub admins: HashSet<String>,
    pub rebuild_interval: Duration,
}

impl Config {
    pub fn from_env() -> Config {
        let admins = std::env::var("ADMIN_USERS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(String::from)
            .collect();

        let rebuild_interval = std::env::var("REBUILD_INTERVAL_SECS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(300));

        Config {
            admins,
            rebuild_interval,
        }
    }

    pub fn is_admin(&self, username: &str) -> bool {
        self.admins.contains(username)
    }
}

/// Shared application state.
pub struct AppState {
    pub db: SqlitePool,
    pub config: Config,
}
