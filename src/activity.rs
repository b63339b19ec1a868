use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::config::ActivityConfig;
use crate::models::{DailyCount, MatchRecord, WeekBucket, WeeklyActivityGrid};
use crate::stats::{median, quantile, round_to};
use crate::week::WeekAligner;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActivityOutcome {
    Ready(WeeklyActivityGrid),
    /// Too few active days to say anything; render a placeholder.
    Insufficient { active_days: usize },
}

/// Builds the activity grid from day-aligned weeks. Zero weeks are dropped
/// before the window is applied, so the window always spans active weeks.
pub fn aggregate(
    weeks: &[WeekBucket],
    source: Option<&str>,
    config: &ActivityConfig,
) -> ActivityOutcome {
    let active: Vec<&WeekBucket> = weeks.iter().filter(|w| w.total() > 0).collect();
    let kept = &active[active.len().saturating_sub(config.max_weeks)..];

    let values: Vec<u32> = kept
        .iter()
        .flat_map(|w| w.days.iter().map(|d| d.matches))
        .filter(|&m| m > 0)
        .collect();

    if kept.is_empty() || values.len() < config.min_active_days {
        tracing::debug!(active_days = values.len(), "not enough activity for grid");
        return ActivityOutcome::Insufficient {
            active_days: values.len(),
        };
    }

    let mut sorted: Vec<f64> = values.iter().map(|&v| v as f64).collect();
    sorted.sort_by(f64::total_cmp);

    let cap = (quantile(&sorted, config.cap_quantile).round() as u32).max(config.cap_floor);
    let intensity = kept
        .iter()
        .map(|w| w.days.map(|d| d.matches.min(cap)))
        .collect();

    ActivityOutcome::Ready(WeeklyActivityGrid {
        weeks: kept.iter().map(|w| (*w).clone()).collect(),
        intensity,
        cap,
        active_days: values.len(),
        active_days_per_week: values.len() as f64 / kept.len() as f64,
        typical_matches: median(&sorted).unwrap_or(0.0),
        longest_streak: longest_active_streak(kept),
        source: source.map(str::to_string),
    })
}

/// Consecutive active calendar days, scanned across week boundaries. A gap
/// between two non-adjacent weeks breaks the run.
fn longest_active_streak(weeks: &[&WeekBucket]) -> usize {
    let mut best = 0;
    let mut run = 0;
    let mut last: Option<NaiveDate> = None;

    for day in weeks.iter().flat_map(|w| w.days.iter()) {
        if day.matches == 0 {
            run = 0;
            last = None;
            continue;
        }
        run = match last {
            Some(prev) if prev.succ_opt() == Some(day.date) => run + 1,
            _ => 1,
        };
        last = Some(day.date);
        best = best.max(run);
    }

    best
}

impl WeeklyActivityGrid {
    pub fn summary_line(&self) -> String {
        let weeks = self.weeks.len();
        let label = self
            .source
            .as_deref()
            .map(|s| format!(" {s}"))
            .unwrap_or_default();
        let mut line = String::new();
        let _ = write!(
            line,
            "Over the last {} active week{}{}: ~{:.1} days/week active, typically ~{} matches when active (best streak: {} day{}).",
            weeks,
            if weeks == 1 { "" } else { "s" },
            label,
            self.active_days_per_week,
            self.typical_matches.round() as u64,
            self.longest_streak,
            if self.longest_streak == 1 { "" } else { "s" },
        );
        line
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyActivity {
    pub date: NaiveDate,
    pub matches: u32,
    pub wins: u32,
    pub winrate: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivityByMode {
    pub all: Vec<WeekBucket>,
    pub modes: BTreeMap<String, Vec<WeekBucket>>,
}

fn counts_by_date(
    matches: &[MatchRecord],
    aligner: &WeekAligner,
) -> BTreeMap<NaiveDate, (u32, u32)> {
    let mut by_date: BTreeMap<NaiveDate, (u32, u32)> = BTreeMap::new();
    for record in matches {
        let entry = by_date.entry(aligner.local_date(record.played_at)).or_insert((0, 0));
        entry.0 += 1;
        if record.won {
            entry.1 += 1;
        }
    }
    by_date
}

pub fn daily_activity(matches: &[MatchRecord], aligner: &WeekAligner) -> Vec<DailyActivity> {
    counts_by_date(matches, aligner)
        .into_iter()
        .map(|(date, (matches, wins))| DailyActivity {
            date,
            matches,
            wins,
            winrate: (matches > 0).then(|| round_to(wins as f64 / matches as f64, 4)),
        })
        .collect()
}

/// Groups matches into full seven-day weeks of the aligner's reference zone,
/// oldest first, keeping the last `max_weeks` weeks that saw play.
pub fn weekly_buckets(
    matches: &[MatchRecord],
    aligner: &WeekAligner,
    max_weeks: usize,
) -> Vec<WeekBucket> {
    let by_date = counts_by_date(matches, aligner);
    let starts: BTreeSet<NaiveDate> = by_date.keys().map(|d| aligner.week_start_of(*d)).collect();

    let weeks: Vec<WeekBucket> = starts
        .into_iter()
        .map(|start| WeekBucket {
            week_end: start + Duration::days(6),
            days: aligner.week_days(start).map(|date| {
                let (matches, wins) = by_date.get(&date).copied().unwrap_or((0, 0));
                DailyCount { date, matches, wins }
            }),
        })
        .filter(|w| w.total() > 0)
        .collect();

    let skip = weeks.len().saturating_sub(max_weeks);
    weeks.into_iter().skip(skip).collect()
}

pub fn weekly_buckets_by_mode(
    matches: &[MatchRecord],
    aligner: &WeekAligner,
    max_weeks: usize,
) -> ActivityByMode {
    let mut grouped: BTreeMap<String, Vec<MatchRecord>> = BTreeMap::new();
    for record in matches {
        grouped
            .entry(record.mode.clone())
            .or_default()
            .push(record.clone());
    }

    ActivityByMode {
        all: weekly_buckets(matches, aligner, max_weeks),
        modes: grouped
            .into_iter()
            .map(|(mode, subset)| (mode, weekly_buckets(&subset, aligner, max_weeks)))
            .filter(|(_, weeks)| !weeks.is_empty())
            .collect(),
    }
}
