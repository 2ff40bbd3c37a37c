//! Time range based filtering

use flexible_time::timestamp::StartTimestamp;
use std::{str::FromStr, time::SystemTime};
use time::OffsetDateTime;

/// An inclusive range of timestamps, parsed from a user-provided filter
/// expression.
///
/// Three syntaxes are accepted:
///
/// * A duration (like `2y`, `30d`, `12h`): accepts everything between
///   "now minus the duration" and now. The day (`d`), month (`M`, 30 days)
///   and year (`y`, 365 days) suffixes only take whole numbers.
/// * A timestamp prefix (like `2020` or `2020-06-01T12:00`): accepts
///   everything from that point (missing fields start at their lowest
///   value) up to now.
/// * Two timestamp prefixes separated by a comma: accepts everything
///   between the two points.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimeRange {
    from: OffsetDateTime,
    to: OffsetDateTime,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unable to parse time range {0:?}: expected a duration, a timestamp, or 'from,to'")]
    Syntax(String),
}

impl TimeRange {
    pub fn new(from: OffsetDateTime, to: OffsetDateTime) -> Self {
        Self { from, to }
    }

    /// Check if a timestamp falls into the range. Both boundaries are
    /// inclusive.
    pub fn contains(&self, timestamp: OffsetDateTime) -> bool {
        self.from <= timestamp && timestamp <= self.to
    }
}

impl FromStr for TimeRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let now = OffsetDateTime::now_utc();

        if let Some((from, to)) = s.split_once(',') {
            let from = parse_point(from.trim()).ok_or_else(|| Error::Syntax(s.into()))?;
            let to = parse_point(to.trim()).ok_or_else(|| Error::Syntax(s.into()))?;
            return Ok(Self { from, to });
        }

        if let Some(duration) = parse_duration(s) {
            return Ok(Self {
                from: now - duration,
                to: now,
            });
        }

        let from = parse_point(s).ok_or_else(|| Error::Syntax(s.into()))?;
        Ok(Self { from, to: now })
    }
}

const DAY: u64 = 24 * 60 * 60;

/// Parse a duration, extending the usual grammar with whole-number day,
/// month and year suffixes.
fn parse_duration(s: &str) -> Option<std::time::Duration> {
    for (suffix, seconds) in [("d", DAY), ("M", 30 * DAY), ("y", 365 * DAY)] {
        if let Some(value) = s.strip_suffix(suffix) {
            if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                return value
                    .parse::<u64>()
                    .ok()
                    .map(|n| std::time::Duration::from_secs(n.saturating_mul(seconds)));
            }
        }
    }

    humantime::parse_duration(s).ok()
}

fn parse_point(s: &str) -> Option<OffsetDateTime> {
    let timestamp = StartTimestamp::from_str(s).ok()?;
    Some(SystemTime::from(timestamp).into())
}

#[cfg(test)]
mod test {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn durations() {
        assert_eq!(
            parse_duration("3d"),
            Some(std::time::Duration::from_secs(3 * DAY))
        );
        assert_eq!(
            parse_duration("2M"),
            Some(std::time::Duration::from_secs(2 * 30 * DAY))
        );
        assert_eq!(
            parse_duration("1y"),
            Some(std::time::Duration::from_secs(365 * DAY))
        );
        assert_eq!(
            parse_duration("90m"),
            Some(std::time::Duration::from_secs(90 * 60))
        );
        assert_eq!(parse_duration("1.5y"), None);
        assert_eq!(parse_duration("nonsense"), None);
    }

    #[test]
    fn relative() {
        let range = TimeRange::from_str("2y").unwrap();

        let one_year_ago = OffsetDateTime::now_utc() - time::Duration::days(365);
        let three_years_ago = OffsetDateTime::now_utc() - time::Duration::days(3 * 365);

        assert!(range.contains(one_year_ago));
        assert!(!range.contains(three_years_ago));
    }

    #[test]
    fn absolute_prefix() {
        let range = TimeRange::from_str("2020").unwrap();

        assert!(range.contains(datetime!(2020-01-01 00:00:00 UTC)));
        assert!(range.contains(datetime!(2021-06-01 12:00:00 UTC)));
        assert!(!range.contains(datetime!(2019-12-31 23:59:59 UTC)));
    }

    #[test]
    fn interval_boundaries_are_inclusive() {
        let range = TimeRange::from_str("2020-01-01,2020-06-01").unwrap();

        assert!(range.contains(datetime!(2020-01-01 00:00:00 UTC)));
        assert!(range.contains(datetime!(2020-06-01 00:00:00 UTC)));
        assert!(range.contains(datetime!(2020-03-15 10:00:00 UTC)));
        assert!(!range.contains(datetime!(2020-06-01 00:00:01 UTC)));
        assert!(!range.contains(datetime!(2019-12-31 23:59:59 UTC)));
    }

    #[test]
    fn invalid_input() {
        assert!(TimeRange::from_str("not a range").is_err());
        assert!(TimeRange::from_str("2020-01-01,").is_err());
    }
}
