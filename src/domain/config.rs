//! Bar intervals understood by the price data adapters.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    OneHour,
    FourHours,
    OneDay,
}

impl Interval {
    pub const ALL: [Interval; 6] = [
        Interval::OneMinute,
        Interval::FiveMinutes,
        Interval::FifteenMinutes,
        Interval::OneHour,
        Interval::FourHours,
        Interval::OneDay,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::OneMinute => "1m",
            Interval::FiveMinutes => "5m",
            Interval::FifteenMinutes => "15m",
            Interval::OneHour => "1h",
            Interval::FourHours => "4h",
            Interval::OneDay => "1d",
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        match self {
            Interval::OneMinute => chrono::Duration::minutes(1),
            Interval::FiveMinutes => chrono::Duration::minutes(5),
            Interval::FifteenMinutes => chrono::Duration::minutes(15),
            Interval::OneHour => chrono::Duration::hours(1),
            Interval::FourHours => chrono::Duration::hours(4),
            Interval::OneDay => chrono::Duration::days(1),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown interval '{0}', expected one of 1m, 5m, 15m, 1h, 4h, 1d")]
pub struct ParseIntervalError(pub String);

impl FromStr for Interval {
    type Err = ParseIntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Interval::ALL
            .into_iter()
            .find(|i| i.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseIntervalError(s.to_string()))
    }
}
