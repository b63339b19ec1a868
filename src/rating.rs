use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::models::{RatingPoint, RatingTrendPoint, WeeklyRatingDelta};
use crate::week::WeekAligner;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaSource {
    Precomputed,
    Derived,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RatingDeltaOutcome {
    Deltas {
        source: DeltaSource,
        deltas: Vec<WeeklyRatingDelta>,
        /// Continuous weekly axis; empty when only precomputed rows exist.
        trend: Vec<RatingTrendPoint>,
    },
    NoRatingHistory,
    NoCharacterData { character: String },
}

/// Weekly rating deltas, preferring rows the report already carries and
/// otherwise deriving them from the raw series.
pub fn weekly_deltas(
    precomputed: Option<&[WeeklyRatingDelta]>,
    points: Option<&[RatingPoint]>,
    aligner: &WeekAligner,
) -> RatingDeltaOutcome {
    let axis = points.map(|p| trend(p, aligner)).unwrap_or_default();

    if let Some(rows) = precomputed.filter(|rows| !rows.is_empty()) {
        return RatingDeltaOutcome::Deltas {
            source: DeltaSource::Precomputed,
            deltas: rows.to_vec(),
            trend: axis,
        };
    }

    if axis.is_empty() {
        return RatingDeltaOutcome::NoRatingHistory;
    }

    RatingDeltaOutcome::Deltas {
        source: DeltaSource::Derived,
        deltas: deltas_from_trend(&axis),
        trend: axis,
    }
}

/// One entry per week from the first to the last week with data. Each real
/// week is represented by its latest rating; weeks without matches repeat the
/// previous value and are flagged as carried.
pub fn trend(points: &[RatingPoint], aligner: &WeekAligner) -> Vec<RatingTrendPoint> {
    let mut ordered: Vec<&RatingPoint> = points.iter().filter(|p| p.rating.is_finite()).collect();
    ordered.sort_by_key(|p| p.ts);

    let mut latest: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for point in ordered {
        latest.insert(aligner.week_start(point.ts), point.rating);
    }

    let (Some(&first), Some(&last)) = (latest.keys().next(), latest.keys().next_back()) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    let mut previous: Option<f64> = None;
    let mut week = first;
    while week <= last {
        match latest.get(&week) {
            Some(&value) => {
                out.push(RatingTrendPoint {
                    week_start: week,
                    value,
                    carried: false,
                    delta: previous.map(|prev| value - prev),
                });
                previous = Some(value);
            }
            None => {
                if let Some(value) = previous {
                    out.push(RatingTrendPoint {
                        week_start: week,
                        value,
                        carried: true,
                        delta: None,
                    });
                }
            }
        }
        week += Duration::days(7);
    }

    out
}

fn deltas_from_trend(trend: &[RatingTrendPoint]) -> Vec<WeeklyRatingDelta> {
    trend
        .iter()
        .filter_map(|p| {
            p.delta.map(|delta| WeeklyRatingDelta {
                week_start: p.week_start,
                delta,
            })
        })
        .collect()
}

pub fn series_by_character(points: &[RatingPoint]) -> BTreeMap<String, Vec<RatingPoint>> {
    let mut series: BTreeMap<String, Vec<RatingPoint>> = BTreeMap::new();
    for point in points {
        let Some(character) = point.character.as_deref().map(str::trim) else {
            continue;
        };
        if character.is_empty() {
            continue;
        }
        series
            .entry(character.to_string())
            .or_default()
            .push(point.clone());
    }
    series
}

/// Exact key first, then a case-insensitive match. An exact key holding no
/// points does not stop the case-insensitive search.
pub fn find_character<'a>(
    series: &'a BTreeMap<String, Vec<RatingPoint>>,
    requested: &str,
) -> Option<&'a [RatingPoint]> {
    let requested = requested.trim();
    if let Some(points) = series.get(requested).filter(|p| !p.is_empty()) {
        return Some(points);
    }
    let wanted = requested.to_lowercase();
    series
        .iter()
        .find(|(name, points)| !points.is_empty() && name.to_lowercase() == wanted)
        .map(|(_, points)| points.as_slice())
}

pub fn character_deltas(
    series: &BTreeMap<String, Vec<RatingPoint>>,
    requested: &str,
    aligner: &WeekAligner,
) -> RatingDeltaOutcome {
    let no_data = || RatingDeltaOutcome::NoCharacterData {
        character: requested.trim().to_string(),
    };

    match find_character(series, requested) {
        Some(points) if !points.is_empty() => match weekly_deltas(None, Some(points), aligner) {
            RatingDeltaOutcome::NoRatingHistory => no_data(),
            outcome => outcome,
        },
        _ => no_data(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::week::WeekStart;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(month: u32, day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, month, day, hour, 0, 0).unwrap()
    }

    fn point(at: DateTime<Utc>, rating: f64, character: Option<&str>) -> RatingPoint {
        RatingPoint {
            ts: at,
            rating,
            win: true,
            opponent: None,
            character: character.map(str::to_string),
        }
    }

    fn aligner() -> WeekAligner {
        WeekAligner::utc(WeekStart::Monday)
    }

    fn derived(outcome: RatingDeltaOutcome) -> (Vec<WeeklyRatingDelta>, Vec<RatingTrendPoint>) {
        match outcome {
            RatingDeltaOutcome::Deltas {
                source: DeltaSource::Derived,
                deltas,
                trend,
            } => (deltas, trend),
            other => panic!("expected derived deltas, got {other:?}"),
        }
    }

    #[test]
    fn last_rating_of_each_week_drives_the_delta() {
        // Mon 2 Feb and Wed 4 Feb share a week, Tue 10 Feb is the next one.
        let points = vec![
            point(ts(2, 2, 10), 1500.0, None),
            point(ts(2, 4, 10), 1520.0, None),
            point(ts(2, 10, 10), 1480.0, None),
        ];
        let (deltas, _) = derived(weekly_deltas(None, Some(points.as_slice()), &aligner()));
        assert_eq!(
            deltas,
            vec![WeeklyRatingDelta {
                week_start: NaiveDate::from_ymd_opt(2026, 2, 9).unwrap(),
                delta: -40.0,
            }]
        );
    }

    #[test]
    fn precomputed_rows_win_over_raw_points() {
        let rows = vec![WeeklyRatingDelta {
            week_start: NaiveDate::from_ymd_opt(2026, 2, 2).unwrap(),
            delta: 12.5,
        }];
        let points = vec![point(ts(2, 2, 10), 1500.0, None)];
        match weekly_deltas(Some(rows.as_slice()), Some(points.as_slice()), &aligner()) {
            RatingDeltaOutcome::Deltas { source, deltas, .. } => {
                assert_eq!(source, DeltaSource::Precomputed);
                assert_eq!(deltas, rows);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn empty_precomputed_rows_fall_back_to_points() {
        let points = vec![
            point(ts(2, 2, 10), 1500.0, None),
            point(ts(2, 9, 10), 1510.0, None),
        ];
        let outcome = weekly_deltas(Some(&[][..]), Some(points.as_slice()), &aligner());
        let (deltas, _) = derived(outcome);
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].delta, 10.0);
    }

    #[test]
    fn nothing_at_all_is_no_history() {
        assert_eq!(
            weekly_deltas(None, None, &aligner()),
            RatingDeltaOutcome::NoRatingHistory
        );
        assert_eq!(
            weekly_deltas(None, Some(&[][..]), &aligner()),
            RatingDeltaOutcome::NoRatingHistory
        );
    }

    #[test]
    fn idle_weeks_are_carried_but_never_emit_deltas() {
        let points = vec![
            point(ts(2, 2, 10), 1500.0, None),
            point(ts(2, 17, 10), 1500.0, None),
            point(ts(2, 24, 10), 1530.0, None),
        ];
        let (deltas, trend) = derived(weekly_deltas(None, Some(points.as_slice()), &aligner()));

        assert_eq!(trend.len(), 4);
        assert!(trend[1].carried);
        assert_eq!(trend[1].value, 1500.0);
        assert_eq!(trend[1].delta, None);

        // A real week with an unchanged rating reports a true zero.
        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0].delta, 0.0);
        assert_eq!(deltas[1].delta, 30.0);
    }

    #[test]
    fn delta_count_is_one_less_than_active_weeks() {
        let weeks = [(1, 1500.0), (2, 1510.0), (3, 1490.0), (5, 1500.0), (8, 1550.0)];
        let points: Vec<RatingPoint> = weeks
            .iter()
            .map(|&(week, rating)| point(ts(1, 5, 12) + Duration::weeks(week), rating, None))
            .collect();
        let (deltas, _) = derived(weekly_deltas(None, Some(points.as_slice()), &aligner()));
        assert_eq!(deltas.len(), points.len() - 1);
    }

    #[test]
    fn out_of_order_points_are_sorted_first() {
        let points = vec![
            point(ts(2, 10, 10), 1480.0, None),
            point(ts(2, 4, 10), 1520.0, None),
            point(ts(2, 2, 10), 1500.0, None),
        ];
        let (deltas, _) = derived(weekly_deltas(None, Some(points.as_slice()), &aligner()));
        assert_eq!(deltas[0].delta, -40.0);
    }

    #[test]
    fn character_lookup_retries_case_insensitively() {
        let points = vec![
            point(ts(2, 2, 10), 1500.0, Some("Ryu")),
            point(ts(2, 9, 10), 1525.0, Some("Ryu")),
            point(ts(2, 9, 11), 1400.0, Some("Juri")),
        ];
        let series = series_by_character(&points);
        assert_eq!(series.len(), 2);

        let (deltas, _) = derived(character_deltas(&series, "ryu", &aligner()));
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].delta, 25.0);

        assert_eq!(
            character_deltas(&series, "Ken", &aligner()),
            RatingDeltaOutcome::NoCharacterData {
                character: "Ken".to_string()
            }
        );
    }

    #[test]
    fn single_week_character_has_no_deltas_but_a_trend() {
        let points = vec![point(ts(2, 9, 11), 1400.0, Some("Juri"))];
        let series = series_by_character(&points);
        let (deltas, trend) = derived(character_deltas(&series, "JURI", &aligner()));
        assert!(deltas.is_empty());
        assert_eq!(trend.len(), 1);
    }

    #[test]
    fn empty_exact_key_falls_through_to_other_casing() {
        let mut series = series_by_character(&[
            point(ts(2, 2, 10), 1500.0, Some("Ryu")),
            point(ts(2, 9, 10), 1540.0, Some("Ryu")),
        ]);
        series.insert("ryu".to_string(), Vec::new());

        let found = find_character(&series, "ryu").expect("case-insensitive match");
        assert_eq!(found.len(), 2);
        let (deltas, _) = derived(character_deltas(&series, "ryu", &aligner()));
        assert_eq!(deltas[0].delta, 40.0);
    }

    #[test]
    fn character_gaps_are_carried_like_the_aggregate() {
        let points = vec![
            point(ts(2, 2, 10), 1500.0, Some("Ken")),
            point(ts(2, 23, 10), 1460.0, Some("Ken")),
            point(ts(2, 9, 10), 1700.0, Some("Juri")),
        ];
        let series = series_by_character(&points);
        let (deltas, trend) = derived(character_deltas(&series, "Ken", &aligner()));

        let carried: Vec<&RatingTrendPoint> = trend.iter().filter(|p| p.carried).collect();
        assert_eq!(trend.len(), 4);
        assert_eq!(carried.len(), 2);
        assert!(carried.iter().all(|p| p.delta.is_none() && p.value == 1500.0));
        assert_eq!(
            deltas,
            vec![WeeklyRatingDelta {
                week_start: NaiveDate::from_ymd_opt(2026, 2, 23).unwrap(),
                delta: -40.0,
            }]
        );

        let ken_only: Vec<RatingPoint> = points[..2].to_vec();
        let aggregate = weekly_deltas(None, Some(ken_only.as_slice()), &aligner());
        assert_eq!(character_deltas(&series, "Ken", &aligner()), aggregate);
    }

    #[test]
    fn repeated_runs_give_identical_output() {
        let points = vec![
            point(ts(2, 10, 10), 1480.0, Some("Ryu")),
            point(ts(2, 2, 10), 1500.0, Some("Ryu")),
            point(ts(2, 24, 10), 1520.0, Some("Ryu")),
        ];
        let first = weekly_deltas(None, Some(points.as_slice()), &aligner());
        let second = weekly_deltas(None, Some(points.as_slice()), &aligner());
        assert_eq!(first, second);

        let series = series_by_character(&points);
        assert_eq!(
            character_deltas(&series, "Ryu", &aligner()),
            character_deltas(&series, "Ryu", &aligner())
        );
    }
}
