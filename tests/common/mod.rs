#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use sentitrader::domain::config::Interval;
use sentitrader::domain::error::SentitraderError;
pub use sentitrader::domain::ohlcv::{PriceBar, PriceSeries};
use sentitrader::ports::data_port::PriceDataPort;
use sentitrader::ports::sentiment_port::{SentimentError, SentimentPort, SentimentWindow};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

pub struct MockDataPort {
    pub data: HashMap<String, PriceSeries>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_closes(mut self, symbol: &str, closes: &[f64]) -> Self {
        self.data.insert(symbol.to_string(), series_from_closes(closes));
        self
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<PriceBar>) -> Self {
        self.data
            .insert(symbol.to_string(), PriceSeries::new(bars).unwrap());
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl PriceDataPort for MockDataPort {
    fn get_series(
        &self,
        symbol: &str,
        interval: Interval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<PriceSeries, SentitraderError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(SentitraderError::DataSource {
                reason: reason.clone(),
            });
        }
        match self.data.get(symbol) {
            Some(series) => Ok(series.window(start, end)),
            None => Err(SentitraderError::NoData {
                symbol: symbol.to_string(),
                interval: interval.to_string(),
            }),
        }
    }
}

pub enum SentimentBehaviour {
    Score(f64),
    Fail,
    /// Sleeps past any reasonable timeout before answering.
    Hang,
    /// Fails on the listed call numbers (0-based), scores otherwise.
    FailOn(Vec<usize>, f64),
}

/// Scripted sentiment supplier that records every request.
pub struct MockSentiment {
    behaviour: SentimentBehaviour,
    calls: AtomicUsize,
    assets: Mutex<Vec<String>>,
    windows: Mutex<Vec<SentimentWindow>>,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl MockSentiment {
    pub fn new(behaviour: SentimentBehaviour) -> Self {
        Self {
            behaviour,
            calls: AtomicUsize::new(0),
            assets: Mutex::new(Vec::new()),
            windows: Mutex::new(Vec::new()),
            cancel_after: None,
        }
    }

    pub fn score(score: f64) -> Self {
        Self::new(SentimentBehaviour::Score(score))
    }

    /// Cancels `token` once `calls` requests have been answered.
    pub fn cancelling_after(mut self, calls: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((calls, token));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn assets(&self) -> Vec<String> {
        self.assets.lock().unwrap().clone()
    }

    pub fn windows(&self) -> Vec<SentimentWindow> {
        self.windows.lock().unwrap().clone()
    }
}

#[async_trait]
impl SentimentPort for MockSentiment {
    async fn get_sentiment(
        &self,
        asset: &str,
        window: SentimentWindow,
    ) -> Result<f64, SentimentError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.assets.lock().unwrap().push(asset.to_string());
        self.windows.lock().unwrap().push(window);
        if let Some((after, token)) = &self.cancel_after {
            if call + 1 >= *after {
                token.cancel();
            }
        }

        match &self.behaviour {
            SentimentBehaviour::Score(s) => Ok(*s),
            SentimentBehaviour::Fail => Err(SentimentError::Unavailable {
                reason: "feed down".into(),
            }),
            SentimentBehaviour::Hang => {
                tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                Ok(0.0)
            }
            SentimentBehaviour::FailOn(failing, s) => {
                if failing.contains(&call) {
                    Err(SentimentError::Unavailable {
                        reason: format!("call {} failed", call),
                    })
                } else {
                    Ok(*s)
                }
            }
        }
    }
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// One hourly bar per close, starting at [`t0`].
pub fn bars_from_closes(closes: &[f64]) -> Vec<PriceBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| PriceBar {
            timestamp: t0() + Duration::hours(i as i64),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000.0,
        })
        .collect()
}

/// One-minute bars split over two UTC days: the first `first_day` closes
/// start at [`t0`], the rest at the following midnight.
pub fn two_day_bars(closes: &[f64], first_day: usize) -> Vec<PriceBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let timestamp = if i < first_day {
                t0() + Duration::minutes(i as i64)
            } else {
                t0() + Duration::days(1) + Duration::minutes((i - first_day) as i64)
            };
            PriceBar {
                timestamp,
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

pub fn series_from_closes(closes: &[f64]) -> PriceSeries {
    PriceSeries::new(bars_from_closes(closes)).unwrap()
}

/// Long slide followed by a longer rally, enough to trigger both votes.
pub fn v_shape() -> Vec<f64> {
    let mut prices: Vec<f64> = (0..260).map(|i| 400.0 - i as f64).collect();
    prices.extend((0..300).map(|i| 141.0 + 2.0 * i as f64));
    prices
}

/// Oscillating series with a slow drift, producing repeated signal flips.
pub fn waves(count: usize) -> Vec<f64> {
    (0..count)
        .map(|i| {
            let x = i as f64;
            200.0 + 40.0 * (x / 15.0).sin() + 15.0 * (x / 4.0).sin() + x * 0.05
        })
        .collect()
}

/// Whole backtest window that covers every generated bar.
pub fn full_window() -> (DateTime<Utc>, DateTime<Utc>) {
    (t0(), t0() + Duration::days(365))
}
