//! Price data port trait.

use crate::domain::config::Interval;
use crate::domain::error::SentitraderError;
use crate::domain::ohlcv::PriceSeries;
use chrono::{DateTime, Utc};

pub trait PriceDataPort: Send + Sync {
    /// Bars of `symbol` with `start <= timestamp <= end`.
    ///
    /// An empty series or `SentitraderError::NoData` both mean the window has
    /// no data. Any other error is fatal to the caller.
    fn get_series(
        &self,
        symbol: &str,
        interval: Interval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<PriceSeries, SentitraderError>;
}
