//! Tunables for every aggregator. All fields default, so an empty or missing
//! config file yields the stock behaviour.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::InsightsError;
use crate::week::{WeekAligner, WeekStart};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightsConfig {
    pub activity: ActivityConfig,
    pub rating: RatingConfig,
    pub matchups: MatchupConfig,
    pub sessions: SessionConfig,
    pub build: BuildConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityConfig {
    /// Active weeks shown in the grid
    pub max_weeks: usize,
    /// Fewer active days than this is "not enough activity"
    pub min_active_days: usize,
    /// Lowest allowed intensity cap
    pub cap_floor: u32,
    pub cap_quantile: f64,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            max_weeks: 12,
            min_active_days: 3,
            cap_floor: 5,
            cap_quantile: 0.9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    pub week_start: WeekStart,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            week_start: WeekStart::Monday,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchupConfig {
    pub min_stable_games: u32,
    /// Rows shown on the best/worst summary cards
    pub top_n: usize,
}

impl Default for MatchupConfig {
    fn default() -> Self {
        Self {
            min_stable_games: 10,
            top_n: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub gap_minutes: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { gap_minutes: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// IANA name of the zone that decides which day a match was played on
    pub timezone: String,
    /// Ratings above this predate the current rating system and are dropped
    pub rating_max: f64,
    pub ranked_mode: String,
    /// Matchup curves start once this many games were played
    pub baseline_games: u32,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            timezone: "America/New_York".to_string(),
            rating_max: 2500.0,
            ranked_mode: "rank".to_string(),
            baseline_games: 5,
        }
    }
}

impl InsightsConfig {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        tracing::debug!(?config, "loaded config");
        Ok(config)
    }

    /// Sunday-start weeks for the activity grid.
    pub fn activity_aligner(&self) -> Result<WeekAligner, InsightsError> {
        WeekAligner::named(&self.build.timezone, WeekStart::Sunday)
    }

    pub fn rating_aligner(&self) -> Result<WeekAligner, InsightsError> {
        WeekAligner::named(&self.build.timezone, self.rating.week_start)
    }
}
