use std::fmt::Write;

use crate::activity::ActivityOutcome;
use crate::insights::Insights;
use crate::matchups::{FixOneOutcome, MatchupRanking};
use crate::models::MatchupRow;
use crate::rating::{DeltaSource, RatingDeltaOutcome};

fn fmt_rating(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{}", v.round() as i64),
        _ => "n/a".to_string(),
    }
}

fn matchup_line(row: &MatchupRow) -> String {
    format!(
        "| {} | {} | {:.1}% | {} |",
        row.opponent,
        row.games,
        row.winrate_pct,
        fmt_rating(row.avg_opponent_mr)
    )
}

fn write_rating_section(output: &mut String, outcome: &RatingDeltaOutcome) {
    match outcome {
        RatingDeltaOutcome::Deltas { source, deltas, .. } => {
            if deltas.is_empty() {
                let _ = writeln!(output, "Only one week of rating history so far.");
                return;
            }
            let origin = match source {
                DeltaSource::Precomputed => "from report",
                DeltaSource::Derived => "derived from match history",
            };
            let _ = writeln!(output, "Weekly rating change ({origin}):");
            for delta in deltas {
                let _ = writeln!(output, "- week of {}: {:+.1}", delta.week_start, delta.delta);
            }
        }
        RatingDeltaOutcome::NoRatingHistory => {
            let _ = writeln!(output, "No rating history in this report.");
        }
        RatingDeltaOutcome::NoCharacterData { character } => {
            let _ = writeln!(output, "No rating data for {character}.");
        }
    }
}

fn write_matchup_table(output: &mut String, rows: &[MatchupRow]) {
    let _ = writeln!(output, "| Opponent | Games | Win rate | Avg opp MR |");
    let _ = writeln!(output, "| --- | --- | --- | --- |");
    for row in rows {
        let _ = writeln!(output, "{}", matchup_line(row));
    }
}

pub fn render_markdown(insights: &Insights, top_n: usize) -> String {
    let mut output = String::new();
    let player = insights.player.as_deref().unwrap_or("unknown player");

    let _ = writeln!(output, "# SF6 Report Insights");
    let _ = writeln!(output, "Generated for {player}");
    let _ = writeln!(output);
    let _ = writeln!(output, "## Activity");

    match &insights.activity {
        ActivityOutcome::Ready(grid) => {
            let _ = writeln!(output, "{}", grid.summary_line());
            let _ = writeln!(output);
            let _ = writeln!(output, "| Week ending | Sun | Mon | Tue | Wed | Thu | Fri | Sat |");
            let _ = writeln!(output, "| --- | --- | --- | --- | --- | --- | --- | --- |");
            for week in &grid.weeks {
                let cells: Vec<String> = week.days.iter().map(|d| d.matches.to_string()).collect();
                let _ = writeln!(output, "| {} | {} |", week.week_end, cells.join(" | "));
            }
            let _ = writeln!(output);
            let _ = writeln!(output, "Color scale capped at {}+ matches/day.", grid.cap);
        }
        ActivityOutcome::Insufficient { .. } => {
            let _ = writeln!(
                output,
                "Not enough day-by-day activity yet. Play a few more days and this will light up."
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Rating Trend");
    write_rating_section(&mut output, &insights.rating);

    if let Some(character) = &insights.character_rating {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Character Rating Trend");
        write_rating_section(&mut output, character);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Matchups");
    match &insights.matchups {
        MatchupRanking::Ranked { best, worst } => {
            let _ = writeln!(output, "### Best");
            write_matchup_table(&mut output, &best[..best.len().min(top_n)]);
            let _ = writeln!(output);
            let _ = writeln!(output, "### Worst");
            write_matchup_table(&mut output, &worst[..worst.len().min(top_n)]);
        }
        MatchupRanking::NoStableMatchups => {
            let _ = writeln!(
                output,
                "No stable matchups yet (need {}+ games against an opponent).",
                insights.min_stable_games
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Fix One Matchup");
    match &insights.fix_one {
        FixOneOutcome::Recommend(fix) => {
            let _ = writeln!(
                output,
                "Biggest fast win right now: {} ({} ranked games so far). You're at {:.1}% there. \
                 If you could reach a steady 50%, your overall win rate would go from {:.1}% to about {:.1}% (+{:.1} pts).",
                fix.opponent,
                fix.games,
                fix.current_winrate_pct,
                fix.overall_winrate_pct,
                fix.new_overall_winrate_pct,
                fix.lift_pct_points
            );
        }
        FixOneOutcome::NoActionable => {
            let _ = writeln!(
                output,
                "Every stable matchup is already at 50% or better. Nothing to fix first."
            );
        }
        FixOneOutcome::NoStableMatchups => {
            let _ = writeln!(output, "Not enough games per matchup for a recommendation yet.");
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FixOneResult, WeeklyRatingDelta};
    use chrono::NaiveDate;

    fn empty() -> Insights {
        Insights {
            player: Some("galaxybran".to_string()),
            activity: ActivityOutcome::Insufficient { active_days: 1 },
            rating: RatingDeltaOutcome::NoRatingHistory,
            character_rating: None,
            matchups: MatchupRanking::NoStableMatchups,
            fix_one: FixOneOutcome::NoStableMatchups,
            min_stable_games: 10,
        }
    }

    #[test]
    fn placeholders_render_for_every_empty_panel() {
        let output = render_markdown(&empty(), 3);
        assert!(output.contains("Generated for galaxybran"));
        assert!(output.contains("Not enough day-by-day activity yet."));
        assert!(output.contains("No rating history in this report."));
        assert!(output.contains("No stable matchups yet (need 10+ games"));
        assert!(output.contains("Not enough games per matchup"));
        assert!(!output.contains("Character Rating Trend"));
    }

    #[test]
    fn populated_panels_render_rows() {
        let row = |opponent: &str, wr: f64| MatchupRow {
            opponent: opponent.to_string(),
            games: 20,
            wins: None,
            winrate_pct: wr,
            avg_opponent_mr: Some(1512.4),
        };
        let mut insights = empty();
        insights.rating = RatingDeltaOutcome::Deltas {
            source: DeltaSource::Derived,
            deltas: vec![WeeklyRatingDelta {
                week_start: NaiveDate::from_ymd_opt(2026, 2, 9).unwrap(),
                delta: -40.0,
            }],
            trend: Vec::new(),
        };
        insights.character_rating = Some(RatingDeltaOutcome::NoCharacterData {
            character: "Ken".to_string(),
        });
        insights.matchups = MatchupRanking::Ranked {
            best: vec![row("Cammy", 70.0), row("Ken", 50.0)],
            worst: vec![row("Ken", 50.0), row("Cammy", 70.0)],
        };
        insights.fix_one = FixOneOutcome::Recommend(FixOneResult {
            opponent: "Guile".to_string(),
            games: 20,
            current_winrate_pct: 30.0,
            simulated_winrate_pct: 50.0,
            overall_winrate_pct: 45.0,
            new_overall_winrate_pct: 47.0,
            lift_pct_points: 2.0,
        });

        let output = render_markdown(&insights, 1);
        assert!(output.contains("- week of 2026-02-09: -40.0"));
        assert!(output.contains("No rating data for Ken."));
        assert!(output.contains("| Cammy | 20 | 70.0% | 1512 |"));
        assert_eq!(output.matches("| Ken |").count(), 1);
        assert!(output.contains("from 45.0% to about 47.0% (+2.0 pts)"));
    }
}
