use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::InsightsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    Sunday,
    Monday,
}

/// Maps timestamps onto calendar days and weeks of one reference zone, so the
/// same match lands in the same bucket wherever the report is viewed.
#[derive(Debug, Clone, Copy)]
pub struct WeekAligner {
    tz: Tz,
    start: WeekStart,
}

impl WeekAligner {
    pub fn new(tz: Tz, start: WeekStart) -> Self {
        Self { tz, start }
    }

    /// Aligner for an IANA zone name such as `America/New_York`.
    pub fn named(zone: &str, start: WeekStart) -> Result<Self, InsightsError> {
        let tz = zone
            .trim()
            .parse::<Tz>()
            .map_err(|_| InsightsError::InvalidTimezone(zone.to_string()))?;
        Ok(Self::new(tz, start))
    }

    pub fn utc(start: WeekStart) -> Self {
        Self::new(Tz::UTC, start)
    }

    /// Same zone, different first day of week.
    pub fn with_start(self, start: WeekStart) -> Self {
        Self { start, ..self }
    }

    /// Wall-clock time of `ts` in the reference zone.
    pub fn local(&self, ts: DateTime<Utc>) -> NaiveDateTime {
        ts.with_timezone(&self.tz).naive_local()
    }

    /// Calendar date of `ts` in the reference zone.
    pub fn local_date(&self, ts: DateTime<Utc>) -> NaiveDate {
        ts.with_timezone(&self.tz).date_naive()
    }

    pub fn week_start(&self, ts: DateTime<Utc>) -> NaiveDate {
        self.week_start_of(self.local_date(ts))
    }

    pub fn week_end(&self, ts: DateTime<Utc>) -> NaiveDate {
        self.week_start(ts) + Duration::days(6)
    }

    pub fn week_start_of(&self, date: NaiveDate) -> NaiveDate {
        let back = match self.start {
            WeekStart::Sunday => date.weekday().num_days_from_sunday(),
            WeekStart::Monday => date.weekday().num_days_from_monday(),
        };
        date - Duration::days(back as i64)
    }

    /// The seven dates of the week containing `date`, first day first.
    pub fn week_days(&self, date: NaiveDate) -> [NaiveDate; 7] {
        let start = self.week_start_of(date);
        std::array::from_fn(|i| start + Duration::days(i as i64))
    }
}

/// Parses RFC 3339 timestamps, or naive ones which are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn sunday_weeks_end_on_saturday() {
        let aligner = WeekAligner::utc(WeekStart::Sunday);
        // 2026-02-04 is a Wednesday
        let ts = at(2026, 2, 4, 12);
        assert_eq!(aligner.week_start(ts), date(2026, 2, 1));
        assert_eq!(aligner.week_end(ts), date(2026, 2, 7));
    }

    #[test]
    fn monday_weeks_start_on_monday() {
        let aligner = WeekAligner::utc(WeekStart::Monday);
        assert_eq!(aligner.week_start(at(2026, 2, 1, 9)), date(2026, 1, 26));
        assert_eq!(aligner.week_start(at(2026, 2, 2, 0)), date(2026, 2, 2));
    }

    #[test]
    fn eastern_winter_moves_late_utc_matches_to_previous_day() {
        let eastern = WeekAligner::named("America/New_York", WeekStart::Sunday).unwrap();
        // 03:00 UTC on Sunday is still Saturday evening under EST.
        let ts = at(2026, 2, 8, 3);
        assert_eq!(eastern.local_date(ts), date(2026, 2, 7));
        assert_eq!(eastern.week_end(ts), date(2026, 2, 7));

        let utc = WeekAligner::utc(WeekStart::Sunday);
        assert_eq!(utc.week_end(ts), date(2026, 2, 14));
    }

    #[test]
    fn eastern_summer_follows_daylight_time() {
        let eastern = WeekAligner::named("America/New_York", WeekStart::Sunday).unwrap();
        // 04:30 UTC is 00:30 Sunday under EDT, five hours west would say Saturday.
        let ts = Utc.with_ymd_and_hms(2026, 7, 5, 4, 30, 0).unwrap();
        assert_eq!(eastern.local_date(ts), date(2026, 7, 5));
        assert_eq!(eastern.week_end(ts), date(2026, 7, 11));
        assert_eq!(eastern.local(ts).time().to_string(), "00:30:00");

        // The same wall-clock hour in winter is still Saturday night.
        let winter = Utc.with_ymd_and_hms(2026, 1, 4, 4, 30, 0).unwrap();
        assert_eq!(eastern.local_date(winter), date(2026, 1, 3));
    }

    #[test]
    fn with_start_keeps_the_zone() {
        let eastern = WeekAligner::named("America/New_York", WeekStart::Sunday).unwrap();
        let monday = eastern.with_start(WeekStart::Monday);
        let ts = at(2026, 2, 9, 3);
        // Sunday evening locally, so the Monday week started the week before.
        assert_eq!(monday.week_start(ts), date(2026, 2, 2));
    }

    #[test]
    fn same_instant_written_in_different_zones_shares_a_key() {
        let aligner = WeekAligner::utc(WeekStart::Monday);
        let a = parse_timestamp("2026-03-10T23:30:00+02:00").unwrap();
        let b = parse_timestamp("2026-03-10T21:30:00Z").unwrap();
        assert_eq!(aligner.week_start(a), aligner.week_start(b));
    }

    #[test]
    fn week_days_cover_seven_consecutive_dates() {
        let aligner = WeekAligner::utc(WeekStart::Sunday);
        let days = aligner.week_days(date(2026, 2, 4));
        assert_eq!(days[0], date(2026, 2, 1));
        assert_eq!(days[6], date(2026, 2, 7));
    }

    #[test]
    fn parses_naive_and_offset_timestamps() {
        assert_eq!(parse_timestamp("2026-01-05T10:00:00"), Some(at(2026, 1, 5, 10)));
        assert_eq!(parse_timestamp("2026-01-05 10:00:00"), Some(at(2026, 1, 5, 10)));
        assert_eq!(
            parse_timestamp("2026-01-05 10:00:00+00:00"),
            Some(at(2026, 1, 5, 10))
        );
        assert_eq!(parse_timestamp("not a time"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn rejects_unknown_zone_names() {
        assert!(WeekAligner::named("Mars/Olympus_Mons", WeekStart::Monday).is_err());
        assert!(WeekAligner::named(" UTC ", WeekStart::Monday).is_ok());
    }
}
