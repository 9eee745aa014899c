use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }

    /// Lowercase key used in storage and URLs.
    pub fn key(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// Multiplier applied to the flat win bonus.
    pub fn multiplier(&self) -> f64 {
        match self {
            Difficulty::Easy => 0.5,
            Difficulty::Medium => 0.75,
            Difficulty::Hard => 1.0,
        }
    }

    /// Per-move base for the tie-or-beat bonus. Deliberately not scaled
    /// by `multiplier`; legacy scores depend on these exact values.
    pub fn tie_beat_base(&self) -> f64 {
        match self {
            Difficulty::Easy => 30.0,
            Difficulty::Medium => 60.0,
            Difficulty::Hard => 200.0,
        }
    }

    /// One-time bonus for being the first player to beat the bot.
    pub fn first_to_beat_bonus(&self) -> f64 {
        match self {
            Difficulty::Easy => 50.0,
            Difficulty::Medium => 100.0,
            Difficulty::Hard => 200.0,
        }
    }

    /// Moves under par required to count as beating the bot. Easier
    /// difficulties demand a wider margin.
    pub fn beat_bot_margin(&self) -> u32 {
        match self {
            Difficulty::Easy => 3,
            Difficulty::Medium => 2,
            Difficulty::Hard => 1,
        }
    }

    pub fn all() -> &'static [Difficulty] {
        &[Difficulty::Easy, Difficulty::Medium, Difficulty::Hard]
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Difficulty {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(()),
        }
    }
}
