//! Sentiment supplier port.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

pub const DEFAULT_WINDOW_HOURS: u32 = 24;

/// Time range a sentiment score is aggregated over, ending at `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentimentWindow {
    pub end: DateTime<Utc>,
    pub hours: u32,
}

impl SentimentWindow {
    pub fn ending_at(end: DateTime<Utc>, hours: u32) -> Self {
        SentimentWindow { end, hours }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.end - Duration::hours(i64::from(self.hours))
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start() && timestamp <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SentimentError {
    #[error("sentiment unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("sentiment request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("sentiment score {score} outside [-1, 1]")]
    OutOfRange { score: f64 },
}

/// Async sentiment supplier. A successful score lies in `[-1, 1]`; failure is
/// always an `Err`, never a zero score.
#[async_trait]
pub trait SentimentPort: Send + Sync {
    async fn get_sentiment(
        &self,
        asset: &str,
        window: SentimentWindow,
    ) -> Result<f64, SentimentError>;
}

/// Base asset of a USDT-quoted pair (`BTCUSDT` -> `BTC`).
pub fn base_asset(symbol: &str) -> &str {
    match symbol.strip_suffix("USDT") {
        Some(base) if !base.is_empty() => base,
        _ => symbol,
    }
}

/// Checks that a supplied score is a usable sentiment value.
pub fn check_score(score: f64) -> Result<f64, SentimentError> {
    if score.is_finite() && (-1.0..=1.0).contains(&score) {
        Ok(score)
    } else {
        Err(SentimentError::OutOfRange { score })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn base_asset_strips_usdt() {
        assert_eq!(base_asset("BTCUSDT"), "BTC");
        assert_eq!(base_asset("ETHUSDT"), "ETH");
        assert_eq!(base_asset("ETHBTC"), "ETHBTC");
        assert_eq!(base_asset("USDT"), "USDT");
    }

    #[test]
    fn window_bounds() {
        let end = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let window = SentimentWindow::ending_at(end, DEFAULT_WINDOW_HOURS);
        assert_eq!(window.start(), Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert!(window.contains(end));
        assert!(window.contains(window.start()));
        assert!(!window.contains(end + Duration::seconds(1)));
    }

    #[test]
    fn check_score_bounds() {
        assert_eq!(check_score(1.0), Ok(1.0));
        assert_eq!(check_score(-1.0), Ok(-1.0));
        assert!(matches!(check_score(1.5), Err(SentimentError::OutOfRange { .. })));
        assert!(check_score(f64::NAN).is_err());
    }

    #[test]
    fn timeout_message() {
        let err = SentimentError::Timeout { timeout_ms: 250 };
        assert_eq!(err.to_string(), "sentiment request timed out after 250 ms");
    }
}
