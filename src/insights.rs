use serde::Serialize;
use tracing::debug;

use crate::activity::{self, ActivityOutcome};
use crate::config::InsightsConfig;
use crate::error::InsightsError;
use crate::ingest::ReportInputs;
use crate::matchups::{self, FixOneOutcome, MatchupRanking};
use crate::rating::{self, RatingDeltaOutcome};

/// Every derived panel for one report. Panels are computed independently;
/// one missing input leaves the others untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insights {
    pub player: Option<String>,
    pub activity: ActivityOutcome,
    pub rating: RatingDeltaOutcome,
    pub character_rating: Option<RatingDeltaOutcome>,
    pub matchups: MatchupRanking,
    pub fix_one: FixOneOutcome,
    pub min_stable_games: u32,
}

pub fn derive_insights(
    inputs: &ReportInputs,
    config: &InsightsConfig,
    character: Option<&str>,
) -> Result<Insights, InsightsError> {
    let rating_aligner = config.rating_aligner()?;
    let min_stable_games = config.matchups.min_stable_games;

    let activity = match &inputs.activity_weeks {
        Some(weeks) => activity::aggregate(
            weeks,
            inputs.activity_source.map(|s| s.label()),
            &config.activity,
        ),
        None => ActivityOutcome::Insufficient { active_days: 0 },
    };

    let rating = rating::weekly_deltas(
        inputs.precomputed_deltas.as_deref(),
        inputs.rating_points.as_deref(),
        &rating_aligner,
    );

    let character_rating = character.map(|requested| {
        let grouped;
        let series = match &inputs.character_series {
            Some(series) => series,
            None => {
                let points = inputs.rating_points.as_deref().unwrap_or_default();
                grouped = rating::series_by_character(points);
                &grouped
            }
        };
        rating::character_deltas(series, requested, &rating_aligner)
    });

    let rows = inputs.matchup_table.as_deref().unwrap_or_default();
    let matchups = matchups::rank(rows, min_stable_games);

    let total_games = inputs
        .total_games
        .unwrap_or_else(|| rows.iter().map(|r| r.games).sum());
    let overall_winrate_pct = inputs.overall_winrate_pct.or_else(|| {
        (total_games > 0).then(|| {
            rows.iter().map(|r| r.win_count()).sum::<f64>() / total_games as f64 * 100.0
        })
    });
    let fix_one = match overall_winrate_pct {
        Some(overall) => matchups::fix_one(rows, overall, total_games, min_stable_games),
        None => FixOneOutcome::NoStableMatchups,
    };

    debug!(
        player = inputs.player.as_deref().unwrap_or("unknown"),
        "derived report insights"
    );

    Ok(Insights {
        player: inputs.player.clone(),
        activity,
        rating,
        character_rating,
        matchups,
        fix_one,
        min_stable_games,
    })
}
