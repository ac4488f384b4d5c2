//! Experience and level rules.
//!
//! # Invariants
//! - Rewards: easy=10, normal=20, hard=40; unknown or missing difficulty=20.
//! - `level = xp / 100 + 1` (integer division), recomputed on every credit.

use super::task::Difficulty;

pub const XP_PER_LEVEL: u32 = 100;
pub const DEFAULT_REWARD: u32 = 20;

/// Experience points for completing a task of the given difficulty.
pub fn experience_for(difficulty: Difficulty) -> u32 {
    match difficulty {
        Difficulty::Easy => 10,
        Difficulty::Normal => DEFAULT_REWARD,
        Difficulty::Hard => 40,
    }
}

/// Reward for a raw stored difficulty token, which may be missing or legacy.
pub fn experience_for_stored(token: Option<&str>) -> u32 {
    token
        .and_then(Difficulty::parse)
        .map_or(DEFAULT_REWARD, experience_for)
}

/// Level derived from cumulative experience.
pub fn level_for(xp: u32) -> u32 {
    xp / XP_PER_LEVEL + 1
}

/// Achievement title shown on the achievements screen.
pub fn achievement_title(xp: u32) -> &'static str {
    if xp > XP_PER_LEVEL {
        "⭐ Advanced learner"
    } else {
        "🐣 Newcomer"
    }
}

/// Read-model for the stats screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSummary {
    pub level: u32,
    pub xp: u32,
    pub active_tasks: usize,
    pub title: &'static str,
}

impl ProgressSummary {
    pub fn new(xp: u32, active_tasks: usize) -> Self {
        Self {
            level: level_for(xp),
            xp,
            active_tasks,
            title: achievement_title(xp),
        }
    }
}
