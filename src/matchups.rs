use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use crate::models::{FixOneResult, MatchRecord, MatchupRow};
use crate::stats::{mean, round_to};

const LIFT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchupRanking {
    Ranked {
        best: Vec<MatchupRow>,
        worst: Vec<MatchupRow>,
    },
    NoStableMatchups,
}

impl MatchupRanking {
    pub fn best(&self) -> Option<&MatchupRow> {
        match self {
            MatchupRanking::Ranked { best, .. } => best.first(),
            MatchupRanking::NoStableMatchups => None,
        }
    }

    pub fn worst(&self) -> Option<&MatchupRow> {
        match self {
            MatchupRanking::Ranked { worst, .. } => worst.first(),
            MatchupRanking::NoStableMatchups => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FixOneOutcome {
    Recommend(FixOneResult),
    /// Every stable matchup is already at or above 50%.
    NoActionable,
    NoStableMatchups,
}

fn stable(rows: &[MatchupRow], min_stable_games: u32) -> Vec<&MatchupRow> {
    rows.iter()
        .filter(|r| r.games >= min_stable_games && r.winrate_pct.is_finite())
        .collect()
}

/// Equal win rates: more games first, then opponent name.
fn tie_break(a: &MatchupRow, b: &MatchupRow) -> Ordering {
    b.games.cmp(&a.games).then_with(|| a.opponent.cmp(&b.opponent))
}

pub fn rank(rows: &[MatchupRow], min_stable_games: u32) -> MatchupRanking {
    let eligible = stable(rows, min_stable_games);
    if eligible.is_empty() {
        return MatchupRanking::NoStableMatchups;
    }

    let mut best: Vec<MatchupRow> = eligible.into_iter().cloned().collect();
    let mut worst = best.clone();

    best.sort_by(|a, b| {
        b.winrate_pct
            .total_cmp(&a.winrate_pct)
            .then_with(|| tie_break(a, b))
    });
    worst.sort_by(|a, b| {
        a.winrate_pct
            .total_cmp(&b.winrate_pct)
            .then_with(|| tie_break(a, b))
    });

    MatchupRanking::Ranked { best, worst }
}

/// Simulates lifting each stable matchup to exactly 50% while every other
/// matchup keeps its wins, and recommends the one that moves the overall win
/// rate the most. `overall_winrate_pct` and `total_games` cover every ranked
/// match, not only stable matchups.
pub fn fix_one(
    rows: &[MatchupRow],
    overall_winrate_pct: f64,
    total_games: u32,
    min_stable_games: u32,
) -> FixOneOutcome {
    let mut eligible = stable(rows, min_stable_games);
    if eligible.is_empty() || total_games == 0 || !overall_winrate_pct.is_finite() {
        return FixOneOutcome::NoStableMatchups;
    }
    eligible.sort_by(|a, b| tie_break(a, b));

    let total = total_games as f64;
    let base_rate = overall_winrate_pct / 100.0;
    let total_wins = base_rate * total;

    let mut best: Option<(&MatchupRow, f64, f64)> = None;
    for row in eligible {
        let new_wins = total_wins - row.win_count() + 0.5 * row.games as f64;
        let new_rate = new_wins / total;
        let gain = new_rate - base_rate;
        let best_gain = best.map(|(_, g, _)| g).unwrap_or(0.0);
        if gain > best_gain + LIFT_EPSILON {
            best = Some((row, gain, new_rate));
        }
    }

    match best {
        Some((row, gain, new_rate)) => FixOneOutcome::Recommend(FixOneResult {
            opponent: row.opponent.clone(),
            games: row.games,
            current_winrate_pct: round_to(row.winrate_pct, 1),
            simulated_winrate_pct: 50.0,
            overall_winrate_pct: round_to(overall_winrate_pct, 1),
            new_overall_winrate_pct: round_to(new_rate * 100.0, 1),
            lift_pct_points: round_to(gain * 100.0, 1),
        }),
        None => FixOneOutcome::NoActionable,
    }
}

pub fn most_played(rows: &[MatchupRow]) -> Option<&MatchupRow> {
    rows.iter().min_by(|a, b| tie_break(a, b))
}

/// Per-opponent table from raw matches. Opponents are grouped on their
/// trimmed, lower-cased name and labelled in title case.
pub fn matchup_table(matches: &[MatchRecord]) -> Vec<MatchupRow> {
    let mut grouped: HashMap<String, (u32, u32, Vec<f64>)> = HashMap::new();

    for record in matches {
        let key = record.opponent_character.trim().to_lowercase();
        let entry = grouped.entry(key).or_insert((0, 0, Vec::new()));
        entry.0 += 1;
        if record.won {
            entry.1 += 1;
        }
        if let Some(rating) = record.opponent_rating {
            entry.2.push(rating);
        }
    }

    let mut rows: Vec<MatchupRow> = grouped
        .into_iter()
        .map(|(opponent, (games, wins, ratings))| MatchupRow {
            opponent: title_case(&opponent),
            games,
            wins: Some(wins),
            winrate_pct: round_to(wins as f64 / games as f64 * 100.0, 1),
            avg_opponent_mr: mean(&ratings).map(|r| round_to(r, 1)),
        })
        .collect();

    rows.sort_by(|a, b| a.opponent.cmp(&b.opponent));
    rows
}

/// Upper-cases every letter that follows a non-letter: "m. bison" -> "M. Bison".
pub fn title_case(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut after_letter = false;
    for ch in raw.chars() {
        if ch.is_alphabetic() {
            if after_letter {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            after_letter = true;
        } else {
            out.push(ch);
            after_letter = false;
        }
    }
    out
}
