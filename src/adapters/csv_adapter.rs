//! CSV file price data adapter.
//!
//! One file per symbol and interval, `{SYMBOL}_{interval}.csv`, with a header
//! row and columns `timestamp,open,high,low,close,volume`.

use crate::domain::config::Interval;
use crate::domain::error::SentitraderError;
use crate::domain::ohlcv::{PriceBar, PriceSeries};
use crate::ports::data_port::PriceDataPort;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn csv_path(&self, symbol: &str, interval: Interval) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", symbol, interval))
    }
}

/// Accepts RFC 3339, epoch milliseconds, or a bare `YYYY-MM-DD` date (midnight UTC).
pub(crate) fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(millis) = value.parse::<i64>() {
        return Utc.timestamp_millis_opt(millis).single();
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
}

fn parse_field(record: &csv::StringRecord, index: usize, name: &str) -> Result<f64, SentitraderError> {
    record
        .get(index)
        .ok_or_else(|| SentitraderError::DataSource {
            reason: format!("missing {} column", name),
        })?
        .trim()
        .parse()
        .map_err(|e| SentitraderError::DataSource {
            reason: format!("invalid {} value: {}", name, e),
        })
}

/// Parses a price CSV, keeping rows whose timestamp passes `keep`.
pub fn parse_price_csv(
    content: &str,
    keep: impl Fn(DateTime<Utc>) -> bool,
) -> Result<PriceSeries, SentitraderError> {
    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let mut bars = Vec::new();

    for result in rdr.records() {
        let record = result.map_err(|e| SentitraderError::DataSource {
            reason: format!("CSV parse error: {}", e),
        })?;

        let ts_str = record.get(0).ok_or_else(|| SentitraderError::DataSource {
            reason: "missing timestamp column".into(),
        })?;
        let timestamp = parse_timestamp(ts_str).ok_or_else(|| SentitraderError::DataSource {
            reason: format!("invalid timestamp: {}", ts_str),
        })?;

        if !keep(timestamp) {
            continue;
        }

        bars.push(PriceBar {
            timestamp,
            open: parse_field(&record, 1, "open")?,
            high: parse_field(&record, 2, "high")?,
            low: parse_field(&record, 3, "low")?,
            close: parse_field(&record, 4, "close")?,
            volume: parse_field(&record, 5, "volume")?,
        });
    }

    bars.sort_by_key(|b| b.timestamp);
    Ok(PriceSeries::new(bars)?)
}

/// Every bar of a single price file.
pub fn read_price_file(path: &Path) -> Result<PriceSeries, SentitraderError> {
    let content = fs::read_to_string(path).map_err(|e| SentitraderError::DataSource {
        reason: format!("failed to read {}: {}", path.display(), e),
    })?;
    parse_price_csv(&content, |_| true)
}

impl PriceDataPort for CsvAdapter {
    fn get_series(
        &self,
        symbol: &str,
        interval: Interval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<PriceSeries, SentitraderError> {
        let path = self.csv_path(symbol, interval);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "price file not found");
                return Err(SentitraderError::NoData {
                    symbol: symbol.to_string(),
                    interval: interval.to_string(),
                });
            }
            Err(e) => {
                return Err(SentitraderError::DataSource {
                    reason: format!("failed to read {}: {}", path.display(), e),
                });
            }
        };

        let series = parse_price_csv(&content, |ts| ts >= start && ts <= end)?;
        debug!(symbol, %interval, bars = series.len(), "loaded price bars");
        Ok(series)
    }
}
