//! Play sessions: runs of matches separated by less than the configured gap.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};
use serde::Serialize;

use crate::models::MatchRecord;
use crate::stats::{longest_run, mean, round_to};
use crate::week::{WeekAligner, WeekStart};

const BUCKET_ORDER: [&str; 4] = ["1-5", "6-10", "11-15", "16+"];
const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    #[serde(rename = "start_ts")]
    pub started_at: DateTime<Utc>,
    pub size: usize,
    #[serde(skip)]
    pub wins: usize,
    pub bucket: &'static str,
    pub winrate: f64,
    #[serde(rename = "mr_delta")]
    pub rating_delta: f64,
    pub max_win_streak: usize,
    pub max_loss_streak: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LengthBucketStats {
    pub range: &'static str,
    pub avg_winrate: f64,
    #[serde(rename = "avg_mr_delta")]
    pub avg_rating_delta: f64,
    pub count: usize,
}

/// Sessions of one length bucket that started in one Monday week.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyLengthStats {
    pub week_start: NaiveDate,
    pub bucket: &'static str,
    pub count: usize,
    /// Game-weighted win rate across the bucket's sessions
    pub avg_winrate: Option<f64>,
    #[serde(rename = "avg_mr_delta")]
    pub avg_rating_delta: Option<f64>,
}

/// Win rate by position inside a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WarmupStats {
    #[serde(rename = "1", skip_serializing_if = "Option::is_none")]
    pub first_game: Option<f64>,
    #[serde(rename = "2", skip_serializing_if = "Option::is_none")]
    pub second_game: Option<f64>,
    #[serde(rename = "3-5", skip_serializing_if = "Option::is_none")]
    pub games_three_to_five: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CooldownStats {
    /// Win rate over the last three games of each session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last3: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeOfDayCell {
    pub day: &'static str,
    /// Start of the two-hour local window, 0, 2, .. 22
    pub hour_bucket: u32,
    pub winrate: f64,
    pub games: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionStats {
    #[serde(rename = "sessions_raw")]
    pub sessions: Vec<SessionSummary>,
    pub by_length: Vec<LengthBucketStats>,
    pub weekly_by_length: Vec<WeeklyLengthStats>,
    pub warmup: WarmupStats,
    pub cooldown: CooldownStats,
    pub time_of_day: Vec<TimeOfDayCell>,
}

fn bucket_label(size: usize) -> &'static str {
    match size {
        0..=5 => BUCKET_ORDER[0],
        6..=10 => BUCKET_ORDER[1],
        11..=15 => BUCKET_ORDER[2],
        _ => BUCKET_ORDER[3],
    }
}

fn bucket_rank(bucket: &str) -> usize {
    BUCKET_ORDER
        .iter()
        .position(|b| *b == bucket)
        .unwrap_or(BUCKET_ORDER.len())
}

fn win_rate(outcomes: &[bool]) -> Option<f64> {
    if outcomes.is_empty() {
        return None;
    }
    let wins = outcomes.iter().filter(|&&w| w).count();
    Some(round_to(wins as f64 / outcomes.len() as f64, 4))
}

/// Splits time-ordered matches wherever the gap to the previous match is at
/// least `gap_minutes`.
pub fn split_sessions(matches: &[MatchRecord], gap_minutes: i64) -> Vec<Vec<&MatchRecord>> {
    let mut ordered: Vec<&MatchRecord> = matches.iter().collect();
    ordered.sort_by_key(|m| m.played_at);

    let gap = Duration::minutes(gap_minutes);
    let mut sessions: Vec<Vec<&MatchRecord>> = Vec::new();
    let mut current: Vec<&MatchRecord> = Vec::new();

    for record in ordered {
        if let Some(prev) = current.last() {
            if record.played_at - prev.played_at >= gap {
                sessions.push(std::mem::take(&mut current));
            }
        }
        current.push(record);
    }
    if !current.is_empty() {
        sessions.push(current);
    }

    sessions
}

fn summarize(session: &[&MatchRecord]) -> Option<SessionSummary> {
    let first = session.first()?;
    let last = session.last()?;
    let outcomes: Vec<bool> = session.iter().map(|m| m.won).collect();
    let wins = outcomes.iter().filter(|&&w| w).count();

    let rating_delta = match (first.player_rating, last.player_rating) {
        (Some(start), Some(end)) if session.len() > 1 => end - start,
        _ => 0.0,
    };

    Some(SessionSummary {
        started_at: first.played_at,
        size: session.len(),
        wins,
        bucket: bucket_label(session.len()),
        winrate: round_to(wins as f64 / session.len() as f64, 4),
        rating_delta: round_to(rating_delta, 1),
        max_win_streak: longest_run(&outcomes, true),
        max_loss_streak: longest_run(&outcomes, false),
    })
}

fn length_buckets(sessions: &[SessionSummary]) -> Vec<LengthBucketStats> {
    BUCKET_ORDER
        .iter()
        .filter_map(|&range| {
            let members: Vec<&SessionSummary> =
                sessions.iter().filter(|s| s.bucket == range).collect();
            let winrates: Vec<f64> = members.iter().map(|s| s.winrate).collect();
            let deltas: Vec<f64> = members.iter().map(|s| s.rating_delta).collect();
            Some(LengthBucketStats {
                range,
                avg_winrate: round_to(mean(&winrates)?, 4),
                avg_rating_delta: round_to(mean(&deltas)?, 1),
                count: members.len(),
            })
        })
        .collect()
}

fn weekly_by_length(
    sessions: &[SessionSummary],
    aligner: &WeekAligner,
) -> Vec<WeeklyLengthStats> {
    let monday = aligner.with_start(WeekStart::Monday);
    // (sessions, games, wins, summed rating delta)
    let mut grouped: BTreeMap<(NaiveDate, usize), (usize, usize, usize, f64)> = BTreeMap::new();
    for session in sessions {
        let key = (monday.week_start(session.started_at), bucket_rank(session.bucket));
        let entry = grouped.entry(key).or_insert((0, 0, 0, 0.0));
        entry.0 += 1;
        entry.1 += session.size;
        entry.2 += session.wins;
        entry.3 += session.rating_delta;
    }

    grouped
        .into_iter()
        .map(|((week_start, rank), (count, games, wins, delta))| WeeklyLengthStats {
            week_start,
            bucket: BUCKET_ORDER[rank.min(BUCKET_ORDER.len() - 1)],
            count,
            avg_winrate: (games > 0).then(|| round_to(wins as f64 / games as f64, 4)),
            avg_rating_delta: (count > 0).then(|| round_to(delta / count as f64, 2)),
        })
        .collect()
}

fn warmup_and_cooldown(sessions: &[Vec<&MatchRecord>]) -> (WarmupStats, CooldownStats) {
    let mut first = Vec::new();
    let mut second = Vec::new();
    let mut middle = Vec::new();
    let mut closing = Vec::new();

    for session in sessions {
        let outcomes: Vec<bool> = session.iter().map(|m| m.won).collect();
        if let Some(&won) = outcomes.first() {
            first.push(won);
        }
        if let Some(&won) = outcomes.get(1) {
            second.push(won);
        }
        middle.extend(outcomes.iter().skip(2).take(3));
        closing.extend(&outcomes[outcomes.len().saturating_sub(3)..]);
    }

    (
        WarmupStats {
            first_game: win_rate(&first),
            second_game: win_rate(&second),
            games_three_to_five: win_rate(&middle),
        },
        CooldownStats {
            last3: win_rate(&closing),
        },
    )
}

/// Win rate per local weekday and two-hour window. Days run Monday first.
fn time_of_day(matches: &[MatchRecord], aligner: &WeekAligner) -> Vec<TimeOfDayCell> {
    let mut cells: BTreeMap<(usize, u32), Vec<bool>> = BTreeMap::new();
    for record in matches {
        let local = aligner.local(record.played_at);
        let day = local.weekday().num_days_from_monday() as usize;
        cells.entry((day, local.hour() / 2 * 2)).or_default().push(record.won);
    }

    cells
        .into_iter()
        .filter_map(|((day, hour_bucket), outcomes)| {
            Some(TimeOfDayCell {
                day: DAY_NAMES.get(day).copied()?,
                hour_bucket,
                winrate: win_rate(&outcomes)?,
                games: outcomes.len(),
            })
        })
        .collect()
}

/// Session insights over time-ordered ranked matches. `aligner` supplies the
/// reference zone for the weekly and time-of-day views.
pub fn session_stats(
    matches: &[MatchRecord],
    gap_minutes: i64,
    aligner: &WeekAligner,
) -> SessionStats {
    let split = split_sessions(matches, gap_minutes);
    let sessions: Vec<SessionSummary> = split.iter().filter_map(|s| summarize(s)).collect();
    let (warmup, cooldown) = warmup_and_cooldown(&split);

    SessionStats {
        by_length: length_buckets(&sessions),
        weekly_by_length: weekly_by_length(&sessions, aligner),
        warmup,
        cooldown,
        time_of_day: time_of_day(matches, aligner),
        sessions,
    }
}
