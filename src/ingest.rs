//! Reads a published player report into the inputs the aggregators need.
//!
//! Every field is parsed on its own. A field with the wrong shape is logged
//! and treated as absent, so it only blanks the panel that depends on it.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::InsightsError;
use crate::models::{DailyCount, MatchupRow, RatingPoint, WeekBucket, WeeklyRatingDelta};
use crate::week::parse_timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivitySource {
    AllModes,
    RankedOnly,
}

impl ActivitySource {
    pub fn label(&self) -> &'static str {
        match self {
            ActivitySource::AllModes => "across all modes",
            ActivitySource::RankedOnly => "(ranked only)",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReportInputs {
    pub player: Option<String>,
    pub activity_weeks: Option<Vec<WeekBucket>>,
    pub activity_source: Option<ActivitySource>,
    pub precomputed_deltas: Option<Vec<WeeklyRatingDelta>>,
    pub rating_points: Option<Vec<RatingPoint>>,
    pub character_series: Option<BTreeMap<String, Vec<RatingPoint>>>,
    pub matchup_table: Option<Vec<MatchupRow>>,
    pub overall_winrate_pct: Option<f64>,
    pub total_games: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawDay {
    #[serde(default)]
    date: Option<NaiveDate>,
    #[serde(default)]
    matches: Option<f64>,
    #[serde(default)]
    wins: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawWeek {
    #[serde(default)]
    week_start: Option<NaiveDate>,
    #[serde(default)]
    week_end: Option<NaiveDate>,
    #[serde(default)]
    days: Vec<RawDay>,
}

#[derive(Debug, Deserialize)]
struct RawRatingPoint {
    #[serde(default)]
    ts: Option<String>,
    #[serde(default, alias = "rating")]
    mr: Option<f64>,
    #[serde(default)]
    win: Option<Value>,
    #[serde(default)]
    opponent: Option<String>,
    #[serde(default)]
    character: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDelta {
    week_start: NaiveDate,
    #[serde(default, alias = "delta")]
    mr_delta: Option<f64>,
}

fn count(raw: Option<f64>) -> u32 {
    match raw {
        Some(v) if v.is_finite() && v > 0.0 => v.round() as u32,
        _ => 0,
    }
}

impl RawWeek {
    /// Pads to seven slots; missing dates are filled from the week end.
    fn into_bucket(self) -> Option<WeekBucket> {
        let week_end = self
            .week_end
            .or_else(|| self.week_start.map(|s| s + Duration::days(6)))?;
        let mut raw_days = self.days.into_iter();
        let days = std::array::from_fn(|i| {
            let fallback = week_end - Duration::days(6 - i as i64);
            match raw_days.next() {
                Some(day) => DailyCount {
                    date: day.date.unwrap_or(fallback),
                    matches: count(day.matches),
                    wins: count(day.wins),
                },
                None => DailyCount {
                    date: fallback,
                    matches: 0,
                    wins: 0,
                },
            }
        });
        Some(WeekBucket { week_end, days })
    }
}

impl RawRatingPoint {
    fn into_point(self) -> Option<RatingPoint> {
        let ts = parse_timestamp(self.ts.as_deref()?)?;
        let rating = self.mr.filter(|r| r.is_finite())?;
        let win = match self.win {
            Some(Value::Bool(b)) => b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
            _ => false,
        };
        Some(RatingPoint {
            ts,
            rating,
            win,
            opponent: self.opponent.filter(|o| !o.trim().is_empty()),
            character: self.character.filter(|c| !c.trim().is_empty()),
        })
    }
}

fn parse_list<T: DeserializeOwned>(value: Option<&Value>, field: &str) -> Option<Vec<T>> {
    let items = match value? {
        Value::Array(items) => items,
        _ => {
            warn!(field, "expected an array, panel will be empty");
            return None;
        }
    };

    Some(
        items
            .iter()
            .filter_map(|item| match T::deserialize(item) {
                Ok(parsed) => Some(parsed),
                Err(err) => {
                    warn!(field, %err, "skipping malformed entry");
                    None
                }
            })
            .collect(),
    )
}

fn parse_points(value: Option<&Value>, field: &str) -> Option<Vec<RatingPoint>> {
    parse_list::<RawRatingPoint>(value, field)
        .map(|raw| raw.into_iter().filter_map(RawRatingPoint::into_point).collect())
}

fn non_empty_object(value: Option<&Value>) -> Option<&Map<String, Value>> {
    value.and_then(Value::as_object).filter(|m| !m.is_empty())
}

/// Looks in `summary.ranked` first, then at the summary root, which is where
/// older reports kept the ranked fields.
struct Sections<'a> {
    ranked: Option<&'a Map<String, Value>>,
    summary: Option<&'a Map<String, Value>>,
}

impl<'a> Sections<'a> {
    fn field(&self, name: &str) -> Option<&'a Value> {
        let lookup = |map: Option<&'a Map<String, Value>>| {
            map.and_then(|m| m.get(name)).filter(|v| !v.is_null())
        };
        lookup(self.ranked).or_else(|| lookup(self.summary))
    }
}

impl ReportInputs {
    pub fn from_json_str(raw: &str) -> Result<Self, InsightsError> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self, InsightsError> {
        let root = value
            .as_object()
            .ok_or_else(|| InsightsError::MalformedReport("report root is not an object".into()))?;

        let summary = match root.get("summary") {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => Some(map),
            Some(_) => {
                return Err(InsightsError::MalformedReport(
                    "summary is not an object".into(),
                ))
            }
        };

        let sections = Sections {
            ranked: non_empty_object(summary.and_then(|s| s.get("ranked"))),
            summary,
        };

        let all_modes = summary
            .and_then(|s| s.get("activity_by_week_modes"))
            .and_then(|m| m.get("all"))
            .filter(|all| all.is_array());
        let (activity_value, activity_source) = match all_modes {
            Some(all) => (Some(all), ActivitySource::AllModes),
            None => (sections.field("activity_by_week"), ActivitySource::RankedOnly),
        };
        let activity_weeks = parse_list::<RawWeek>(activity_value, "activity_by_week")
            .map(|raw| raw.into_iter().filter_map(RawWeek::into_bucket).collect());

        let delta_rows =
            parse_list::<RawDelta>(sections.field("mr_weekly_delta"), "mr_weekly_delta");
        let precomputed_deltas = delta_rows.map(|rows| {
            rows.into_iter()
                .filter_map(|r| {
                    r.mr_delta.filter(|d| d.is_finite()).map(|delta| WeeklyRatingDelta {
                        week_start: r.week_start,
                        delta,
                    })
                })
                .collect()
        });

        let character_series = sections
            .field("mr_timeseries_by_character")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(name, series)| {
                        parse_points(Some(series), "mr_timeseries_by_character")
                            .map(|points| (name.clone(), points))
                    })
                    .collect()
            });

        let overall_winrate_pct = sections
            .field("overall_winrate_pct")
            .and_then(Value::as_f64)
            .or_else(|| {
                sections
                    .field("overall_winrate")
                    .and_then(Value::as_f64)
                    .map(|rate| rate * 100.0)
            });

        Ok(Self {
            player: root
                .get("player_cfn")
                .and_then(Value::as_str)
                .map(str::to_string),
            activity_source: activity_weeks.as_ref().map(|_| activity_source),
            activity_weeks,
            precomputed_deltas,
            rating_points: parse_points(sections.field("mr_timeseries"), "mr_timeseries"),
            character_series,
            matchup_table: parse_list(sections.field("matchup_table"), "matchup_table"),
            overall_winrate_pct,
            total_games: sections
                .field("matches_analyzed")
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ranked_fields_shadow_root_fields() {
        let report = json!({
            "player_cfn": "braventooth",
            "summary": {
                "overall_winrate_pct": 10.0,
                "ranked": {
                    "overall_winrate_pct": 52.5,
                    "matches_analyzed": 240
                }
            }
        });
        let inputs = ReportInputs::from_value(&report).unwrap();
        assert_eq!(inputs.player.as_deref(), Some("braventooth"));
        assert_eq!(inputs.overall_winrate_pct, Some(52.5));
        assert_eq!(inputs.total_games, Some(240));
    }

    #[test]
    fn legacy_reports_keep_ranked_fields_at_summary_root() {
        let report = json!({
            "summary": {
                "ranked": {},
                "overall_winrate": 0.48,
                "matchup_table": [
                    {
                        "opponent": "Ken", "games": 12, "wins": 6,
                        "winrate_pct": 50.0, "avg_opponent_mr": 1500.0
                    }
                ]
            }
        });
        let inputs = ReportInputs::from_value(&report).unwrap();
        assert_eq!(inputs.overall_winrate_pct, Some(48.0));
        assert_eq!(inputs.matchup_table.unwrap()[0].opponent, "Ken");
    }

    #[test]
    fn all_modes_activity_is_preferred() {
        let report = json!({
            "summary": {
                "activity_by_week_modes": {
                    "all": [{
                        "week_end": "2026-02-07",
                        "days": [{"date": "2026-02-01", "matches": 3}]
                    }]
                },
                "ranked": {
                    "activity_by_week": [{"week_end": "2026-01-31", "days": []}]
                }
            }
        });
        let inputs = ReportInputs::from_value(&report).unwrap();
        assert_eq!(inputs.activity_source, Some(ActivitySource::AllModes));
        let weeks = inputs.activity_weeks.unwrap();
        assert_eq!(weeks.len(), 1);
        assert_eq!(weeks[0].days[0].matches, 3);
        assert_eq!(weeks[0].days[6].date, NaiveDate::from_ymd_opt(2026, 2, 7).unwrap());
        assert_eq!(weeks[0].days[6].matches, 0);
    }

    #[test]
    fn ranked_activity_is_the_fallback() {
        let report = json!({
            "summary": {
                "ranked": {
                    "activity_by_week": [{"week_start": "2026-01-25", "days": []}]
                }
            }
        });
        let inputs = ReportInputs::from_value(&report).unwrap();
        assert_eq!(inputs.activity_source, Some(ActivitySource::RankedOnly));
        assert_eq!(
            inputs.activity_weeks.unwrap()[0].week_end,
            NaiveDate::from_ymd_opt(2026, 1, 31).unwrap()
        );
    }

    #[test]
    fn malformed_field_only_blanks_that_field() {
        let report = json!({
            "summary": {
                "ranked": {
                    "matchup_table": "oops",
                    "mr_timeseries": [
                        {"ts": "2026-02-02T10:00:00", "mr": 1500, "win": 1},
                        {"ts": "garbage", "mr": 1510, "win": 0},
                        {"ts": "2026-02-09T10:00:00", "mr": null, "win": 0},
                        {
                            "ts": "2026-02-10T10:00:00+00:00", "mr": 1480.5,
                            "win": true, "opponent": "Ken"
                        }
                    ],
                    "overall_winrate_pct": 50.0
                }
            }
        });
        let inputs = ReportInputs::from_value(&report).unwrap();
        assert!(inputs.matchup_table.is_none());
        let points = inputs.rating_points.unwrap();
        assert_eq!(points.len(), 2);
        assert!(points[0].win);
        assert_eq!(points[1].opponent.as_deref(), Some("Ken"));
        assert_eq!(inputs.overall_winrate_pct, Some(50.0));
    }

    #[test]
    fn precomputed_rows_without_delta_are_dropped() {
        let report = json!({
            "summary": {
                "ranked": {
                    "mr_weekly_delta": [
                        {"week_start": "2026-02-02", "mr_delta": 12.0},
                        {"week_start": "2026-02-09", "mr_delta": null}
                    ]
                }
            }
        });
        let rows = ReportInputs::from_value(&report).unwrap().precomputed_deltas.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].delta, 12.0);
    }

    #[test]
    fn character_series_map_is_read() {
        let report = json!({
            "summary": {
                "ranked": {
                    "mr_timeseries_by_character": {
                        "Ryu": [{"ts": "2026-02-02T10:00:00Z", "mr": 1500}],
                        "Juri": "not a list"
                    }
                }
            }
        });
        let series = ReportInputs::from_value(&report).unwrap().character_series.unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series["Ryu"].len(), 1);
    }

    #[test]
    fn structural_corruption_is_an_error() {
        assert!(matches!(
            ReportInputs::from_value(&json!([1, 2, 3])),
            Err(InsightsError::MalformedReport(_))
        ));
        assert!(matches!(
            ReportInputs::from_value(&json!({"summary": 4})),
            Err(InsightsError::MalformedReport(_))
        ));
        assert!(matches!(
            ReportInputs::from_json_str("{not json"),
            Err(InsightsError::Json(_))
        ));
    }

    #[test]
    fn missing_summary_is_all_empty() {
        let inputs = ReportInputs::from_value(&json!({"player_cfn": "kaylen"})).unwrap();
        assert!(inputs.activity_weeks.is_none());
        assert!(inputs.rating_points.is_none());
        assert!(inputs.overall_winrate_pct.is_none());
    }
}
