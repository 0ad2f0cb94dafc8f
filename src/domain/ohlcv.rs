//! OHLCV bar and price series representation.

use chrono::{DateTime, Utc};
use std::ops::Deref;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    fn is_well_formed(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SeriesError {
    #[error("bar {index} has a negative or non-finite price or volume")]
    InvalidBar { index: usize },

    #[error("bar {index} timestamp {timestamp} is not after the previous bar")]
    NonIncreasingTimestamp {
        index: usize,
        timestamp: DateTime<Utc>,
    },
}

/// Bars ordered by strictly increasing timestamp. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn new(bars: Vec<PriceBar>) -> Result<Self, SeriesError> {
        for (index, bar) in bars.iter().enumerate() {
            if !bar.is_well_formed() {
                return Err(SeriesError::InvalidBar { index });
            }
            if index > 0 && bar.timestamp <= bars[index - 1].timestamp {
                return Err(SeriesError::NonIncreasingTimestamp {
                    index,
                    timestamp: bar.timestamp,
                });
            }
        }
        Ok(Self { bars })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    /// Bars up to and including `index`.
    pub fn prefix(&self, index: usize) -> &[PriceBar] {
        let end = (index + 1).min(self.bars.len());
        &self.bars[..end]
    }

    /// Sub-series with `start <= timestamp <= end`.
    pub fn window(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> PriceSeries {
        PriceSeries {
            bars: self
                .bars
                .iter()
                .filter(|b| b.timestamp >= start && b.timestamp <= end)
                .cloned()
                .collect(),
        }
    }
}

impl Deref for PriceSeries {
    type Target = [PriceBar];

    fn deref(&self) -> &Self::Target {
        &self.bars
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn bar_at(hour: i64, close: f64) -> PriceBar {
        PriceBar {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(hour),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 10.0,
        }
    }

    #[test]
    fn accepts_increasing_series() {
        let series = PriceSeries::new(vec![bar_at(0, 100.0), bar_at(1, 101.0)]).unwrap();
        assert_eq!(series.len(), 2);
        assert!((series[1].close - 101.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_duplicate_timestamp() {
        let err = PriceSeries::new(vec![bar_at(0, 100.0), bar_at(0, 101.0)]).unwrap_err();
        assert!(matches!(
            err,
            SeriesError::NonIncreasingTimestamp { index: 1, .. }
        ));
    }

    #[test]
    fn rejects_negative_price() {
        let mut bad = bar_at(1, 100.0);
        bad.low = -1.0;
        let err = PriceSeries::new(vec![bar_at(0, 100.0), bad]).unwrap_err();
        assert_eq!(err, SeriesError::InvalidBar { index: 1 });
    }

    #[test]
    fn rejects_nan_volume() {
        let mut bad = bar_at(0, 100.0);
        bad.volume = f64::NAN;
        assert!(PriceSeries::new(vec![bad]).is_err());
    }

    #[test]
    fn prefix_is_inclusive() {
        let series =
            PriceSeries::new(vec![bar_at(0, 1.0), bar_at(1, 2.0), bar_at(2, 3.0)]).unwrap();
        assert_eq!(series.prefix(1).len(), 2);
        assert_eq!(series.prefix(10).len(), 3);
    }

    #[test]
    fn window_filters_inclusive_bounds() {
        let series =
            PriceSeries::new(vec![bar_at(0, 1.0), bar_at(1, 2.0), bar_at(2, 3.0)]).unwrap();
        let windowed = series.window(bar_at(1, 0.0).timestamp, bar_at(2, 0.0).timestamp);
        assert_eq!(windowed.len(), 2);
        assert!((windowed[0].close - 2.0).abs() < f64::EPSILON);
    }
}
