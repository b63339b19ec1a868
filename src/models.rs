use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::stats::round_to;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub match_hash: String,
    pub played_at: DateTime<Utc>,
    pub mode: String,
    pub player_character: Option<String>,
    pub opponent_character: String,
    pub won: bool,
    pub player_rating: Option<f64>,
    pub opponent_rating: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub matches: u32,
    #[serde(default)]
    pub wins: u32,
}

fn winrate(wins: u32, matches: u32) -> Option<f64> {
    (matches > 0).then(|| round_to(wins as f64 / matches as f64, 4))
}

impl Serialize for DailyCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("DailyCount", 4)?;
        state.serialize_field("date", &self.date)?;
        state.serialize_field("matches", &self.matches)?;
        state.serialize_field("wins", &self.wins)?;
        state.serialize_field("winrate", &winrate(self.wins, self.matches))?;
        state.end()
    }
}

/// One Sunday..Saturday (or Monday..Sunday) week, always seven day slots.
/// Serialized with its start date and week totals alongside the days.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WeekBucket {
    pub week_end: NaiveDate,
    pub days: [DailyCount; 7],
}

impl WeekBucket {
    pub fn week_start(&self) -> NaiveDate {
        self.week_end - Duration::days(6)
    }

    pub fn total(&self) -> u32 {
        self.days.iter().map(|d| d.matches).sum()
    }

    pub fn wins(&self) -> u32 {
        self.days.iter().map(|d| d.wins).sum()
    }
}

impl Serialize for WeekBucket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (matches, wins) = (self.total(), self.wins());
        let mut state = serializer.serialize_struct("WeekBucket", 6)?;
        state.serialize_field("week_start", &self.week_start())?;
        state.serialize_field("week_end", &self.week_end)?;
        state.serialize_field("matches", &matches)?;
        state.serialize_field("wins", &wins)?;
        state.serialize_field("winrate", &winrate(wins, matches))?;
        state.serialize_field("days", &self.days)?;
        state.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyActivityGrid {
    pub weeks: Vec<WeekBucket>,
    /// Per-week display intensities, `min(matches, cap)`, parallel to `weeks`.
    pub intensity: Vec<[u32; 7]>,
    pub cap: u32,
    pub active_days: usize,
    pub active_days_per_week: f64,
    pub typical_matches: f64,
    pub longest_streak: usize,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingPoint {
    pub ts: DateTime<Utc>,
    pub rating: f64,
    pub win: bool,
    #[serde(default)]
    pub opponent: Option<String>,
    #[serde(default)]
    pub character: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyRatingDelta {
    pub week_start: NaiveDate,
    pub delta: f64,
}

/// A week on a continuous rating axis. Carried weeks repeat the previous
/// value and never carry a delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingTrendPoint {
    pub week_start: NaiveDate,
    pub value: f64,
    pub carried: bool,
    pub delta: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchupRow {
    pub opponent: String,
    pub games: u32,
    #[serde(default)]
    pub wins: Option<u32>,
    pub winrate_pct: f64,
    #[serde(default)]
    pub avg_opponent_mr: Option<f64>,
}

impl MatchupRow {
    /// Wins against this opponent, recovered from the rate when the row
    /// does not carry a count.
    pub fn win_count(&self) -> f64 {
        match self.wins {
            Some(wins) => wins as f64,
            None => self.winrate_pct / 100.0 * self.games as f64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixOneResult {
    pub opponent: String,
    pub games: u32,
    pub current_winrate_pct: f64,
    pub simulated_winrate_pct: f64,
    pub overall_winrate_pct: f64,
    pub new_overall_winrate_pct: f64,
    pub lift_pct_points: f64,
}
