//! Builds the published per-player report from raw match history.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::activity::{self, ActivityByMode, DailyActivity};
use crate::config::InsightsConfig;
use crate::error::InsightsError;
use crate::matchups::{self, title_case, FixOneOutcome, MatchupRanking};
use crate::models::{FixOneResult, MatchRecord, MatchupRow, RatingPoint, WeekBucket};
use crate::rating;
use crate::sessions::{self, SessionStats};
use crate::stats::{mean, round_to};

#[derive(Debug, Clone, Serialize)]
pub struct ModeShare {
    pub mode: String,
    pub matches: usize,
    pub share_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CharacterShare {
    pub character: String,
    pub games: usize,
    pub share_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverallSummary {
    pub matches_analyzed: usize,
    pub dataset_start: Option<NaiveDate>,
    pub dataset_end: Option<NaiveDate>,
    pub mode_breakdown: Vec<ModeShare>,
    pub character_breakdown: Vec<CharacterShare>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeeklyRatingRow {
    pub week_start: NaiveDate,
    pub mr_delta: f64,
    pub mr_start: f64,
    pub mr_end: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedSummary {
    pub main_character: Option<String>,
    pub matches_analyzed: usize,
    pub dataset_start: Option<NaiveDate>,
    pub dataset_end: Option<NaiveDate>,
    pub overall_winrate: f64,
    pub overall_winrate_pct: f64,
    pub avg_mr: Option<f64>,
    pub avg_opponent_mr: Option<f64>,
    pub most_played_matchup: Option<MatchupRow>,
    pub best_matchup: Option<MatchupRow>,
    pub worst_matchup: Option<MatchupRow>,
    pub min_games_for_stable: u32,
    pub matchup_table: Vec<MatchupRow>,
    pub fix_one_matchup: Option<FixOneResult>,
    pub character_breakdown: Vec<CharacterShare>,
    pub session_stats: SessionStats,
    pub activity_by_day: Vec<DailyActivity>,
    pub activity_by_week: Vec<WeekBucket>,
    pub mr_timeseries: Vec<SeriesRow>,
    pub mr_timeseries_by_character: BTreeMap<String, Vec<SeriesRow>>,
    pub mr_weekly_delta: Vec<WeeklyRatingRow>,
}

/// Wire form of a rating point, using the report's `mr` naming.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesRow {
    pub ts: DateTime<Utc>,
    pub mr: f64,
    pub opp_mr: Option<f64>,
    pub win: u8,
    pub opponent: String,
    pub character: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub overall: OverallSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ranked: Option<RankedSummary>,
    pub activity_by_week_modes: ActivityByMode,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchupCurve {
    pub opponent: String,
    pub games: Vec<u32>,
    pub cum_winrate: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerReport {
    pub player_cfn: String,
    pub generated_at: DateTime<Utc>,
    pub baseline_n: u32,
    pub summary: ReportSummary,
    pub matchups: Vec<MatchupCurve>,
}

fn dataset_range(matches: &[MatchRecord]) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let start = matches.iter().map(|m| m.played_at).min();
    let end = matches.iter().map(|m| m.played_at).max();
    (start.map(|t| t.date_naive()), end.map(|t| t.date_naive()))
}

fn share(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        round_to(100.0 * part as f64 / total as f64, 1)
    }
}

/// Largest share first, ties by label.
fn sorted_counts(counts: HashMap<String, usize>) -> Vec<(String, usize)> {
    let mut rows: Vec<(String, usize)> = counts.into_iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    rows
}

fn character_of(record: &MatchRecord) -> Option<&str> {
    record
        .player_character
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
}

/// Title-cased character shares, with matches lacking a character counted
/// as "Unknown".
fn character_breakdown(matches: &[MatchRecord]) -> Vec<CharacterShare> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut unknown = 0;
    for record in matches {
        match character_of(record) {
            Some(character) => *counts.entry(title_case(character)).or_default() += 1,
            None => unknown += 1,
        }
    }

    let total = matches.len();
    let mut rows: Vec<CharacterShare> = sorted_counts(counts)
        .into_iter()
        .map(|(character, games)| CharacterShare {
            share_pct: share(games, total),
            character,
            games,
        })
        .collect();
    if unknown > 0 {
        rows.push(CharacterShare {
            character: "Unknown".to_string(),
            games: unknown,
            share_pct: share(unknown, total),
        });
    }
    rows
}

fn main_character(matches: &[MatchRecord]) -> Option<String> {
    character_breakdown(matches)
        .into_iter()
        .find(|row| row.character != "Unknown")
        .map(|row| row.character)
}

fn overall_summary(matches: &[MatchRecord]) -> OverallSummary {
    let mut modes: HashMap<String, usize> = HashMap::new();
    for record in matches {
        *modes.entry(record.mode.clone()).or_default() += 1;
    }
    let (dataset_start, dataset_end) = dataset_range(matches);

    OverallSummary {
        matches_analyzed: matches.len(),
        dataset_start,
        dataset_end,
        mode_breakdown: sorted_counts(modes)
            .into_iter()
            .map(|(mode, count)| ModeShare {
                share_pct: share(count, matches.len()),
                mode,
                matches: count,
            })
            .collect(),
        character_breakdown: character_breakdown(matches),
    }
}

fn series_row(record: &MatchRecord) -> Option<SeriesRow> {
    Some(SeriesRow {
        ts: record.played_at,
        mr: record.player_rating?,
        opp_mr: record.opponent_rating,
        win: u8::from(record.won),
        opponent: title_case(record.opponent_character.trim()),
        character: character_of(record).map(title_case),
    })
}

/// Within-week movement: last rating of the week minus the first.
fn weekly_rating_rows(
    ranked: &[MatchRecord],
    config: &InsightsConfig,
) -> Result<Vec<WeeklyRatingRow>, InsightsError> {
    let aligner = config.rating_aligner()?;
    let mut weeks: BTreeMap<NaiveDate, (f64, f64)> = BTreeMap::new();
    for record in ranked {
        let Some(rating) = record.player_rating else {
            continue;
        };
        weeks
            .entry(aligner.week_start(record.played_at))
            .and_modify(|(_, last)| *last = rating)
            .or_insert((rating, rating));
    }

    Ok(weeks
        .into_iter()
        .map(|(week_start, (first, last))| WeeklyRatingRow {
            week_start,
            mr_delta: round_to(last - first, 1),
            mr_start: round_to(first, 1),
            mr_end: round_to(last, 1),
        })
        .collect())
}

/// Cumulative win rate against each opponent, starting once `baseline`
/// games have been played.
fn matchup_curves(ranked: &[MatchRecord], baseline: u32) -> Vec<MatchupCurve> {
    let mut by_opponent: BTreeMap<String, Vec<bool>> = BTreeMap::new();
    for record in ranked {
        by_opponent
            .entry(record.opponent_character.trim().to_lowercase())
            .or_default()
            .push(record.won);
    }

    by_opponent
        .into_iter()
        .filter_map(|(opponent, outcomes)| {
            let mut games = Vec::new();
            let mut cum_winrate = Vec::new();
            let mut wins = 0u32;
            for (i, won) in outcomes.into_iter().enumerate() {
                let played = i as u32 + 1;
                if won {
                    wins += 1;
                }
                if played >= baseline {
                    games.push(played);
                    cum_winrate.push(round_to(wins as f64 / played as f64, 4));
                }
            }
            (!games.is_empty()).then(|| MatchupCurve {
                opponent: title_case(&opponent),
                games,
                cum_winrate,
            })
        })
        .collect()
}

fn is_rating_valid(record: &MatchRecord, rating_max: f64) -> bool {
    matches!(
        (record.player_rating, record.opponent_rating),
        (Some(p), Some(o)) if p <= rating_max && o <= rating_max
    )
}

/// `ranked` must be in time order.
fn ranked_summary(
    ranked: &[MatchRecord],
    all: &[MatchRecord],
    config: &InsightsConfig,
) -> Result<RankedSummary, InsightsError> {
    let min_stable = config.matchups.min_stable_games;
    let wins = ranked.iter().filter(|m| m.won).count();
    let overall = wins as f64 / ranked.len().max(1) as f64;

    let table = matchups::matchup_table(ranked);
    let ranking = matchups::rank(&table, min_stable);
    let fix_one =
        match matchups::fix_one(&table, overall * 100.0, ranked.len() as u32, min_stable) {
            FixOneOutcome::Recommend(result) => Some(result),
            _ => None,
        };
    let (best_matchup, worst_matchup) = match &ranking {
        MatchupRanking::Ranked { .. } => (ranking.best().cloned(), ranking.worst().cloned()),
        MatchupRanking::NoStableMatchups => (None, None),
    };

    let series: Vec<SeriesRow> = ranked.iter().filter_map(series_row).collect();

    let points: Vec<RatingPoint> = series
        .iter()
        .map(|row| RatingPoint {
            ts: row.ts,
            rating: row.mr,
            win: row.win == 1,
            opponent: Some(row.opponent.clone()),
            character: row.character.clone(),
        })
        .collect();
    let by_character: BTreeMap<String, Vec<SeriesRow>> = rating::series_by_character(&points)
        .into_keys()
        .map(|character| {
            let rows: Vec<SeriesRow> = series
                .iter()
                .filter(|row| row.character.as_deref() == Some(character.as_str()))
                .cloned()
                .collect();
            (character, rows)
        })
        .collect();

    let activity_aligner = config.activity_aligner()?;
    let (dataset_start, dataset_end) = dataset_range(ranked);
    let player_ratings: Vec<f64> = ranked.iter().filter_map(|m| m.player_rating).collect();
    let opponent_ratings: Vec<f64> = ranked.iter().filter_map(|m| m.opponent_rating).collect();

    Ok(RankedSummary {
        main_character: main_character(all),
        matches_analyzed: ranked.len(),
        dataset_start,
        dataset_end,
        overall_winrate: round_to(overall, 4),
        overall_winrate_pct: round_to(overall * 100.0, 1),
        avg_mr: mean(&player_ratings),
        avg_opponent_mr: mean(&opponent_ratings),
        most_played_matchup: matchups::most_played(&table).cloned(),
        best_matchup,
        worst_matchup,
        min_games_for_stable: min_stable,
        fix_one_matchup: fix_one,
        character_breakdown: character_breakdown(all),
        session_stats: sessions::session_stats(
            ranked,
            config.sessions.gap_minutes,
            &activity_aligner,
        ),
        activity_by_day: activity::daily_activity(ranked, &activity_aligner),
        activity_by_week: activity::weekly_buckets(
            ranked,
            &activity_aligner,
            config.activity.max_weeks,
        ),
        mr_timeseries: series,
        mr_timeseries_by_character: by_character,
        mr_weekly_delta: weekly_rating_rows(ranked, config)?,
        matchup_table: table,
    })
}

pub fn build_player_report(
    player: &str,
    matches: &[MatchRecord],
    config: &InsightsConfig,
    generated_at: DateTime<Utc>,
) -> Result<PlayerReport, InsightsError> {
    let build = &config.build;
    let mut ranked: Vec<MatchRecord> = matches
        .iter()
        .filter(|m| m.mode.trim().eq_ignore_ascii_case(&build.ranked_mode))
        .filter(|m| is_rating_valid(m, build.rating_max))
        .cloned()
        .collect();
    ranked.sort_by_key(|m| m.played_at);

    tracing::info!(
        player,
        matches = matches.len(),
        ranked = ranked.len(),
        "building player report"
    );

    let ranked_summary = if ranked.is_empty() {
        None
    } else {
        Some(ranked_summary(&ranked, matches, config)?)
    };

    let activity_aligner = config.activity_aligner()?;

    Ok(PlayerReport {
        player_cfn: player.to_string(),
        generated_at,
        baseline_n: build.baseline_games,
        summary: ReportSummary {
            overall: overall_summary(matches),
            ranked: ranked_summary,
            activity_by_week_modes: activity::weekly_buckets_by_mode(
                matches,
                &activity_aligner,
                config.activity.max_weeks,
            ),
        },
        matchups: matchup_curves(&ranked, build.baseline_games),
    })
}
