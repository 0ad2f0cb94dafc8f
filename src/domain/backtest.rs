//! Bar-by-bar backtest driver.
//!
//! For every bar the indicator engine runs over the series prefix, the
//! aggregate vote is fused with the sentiment score for that bar, and a trade
//! is placed only when the fused decision agrees with the technical vote.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::Interval;
use super::error::SentitraderError;
use super::fusion::fuse;
use super::ledger::{Ledger, TradeRecord};
use super::metrics::PerformanceMetrics;
use super::ohlcv::PriceBar;
use super::position::TradeSide;
use super::risk::{RiskConfig, RiskMetrics, RiskPolicy};
use super::signal::{Vote, generate_signals};
use crate::ports::data_port::PriceDataPort;
use crate::ports::sentiment_port::{
    DEFAULT_WINDOW_HOURS, SentimentError, SentimentPort, SentimentWindow, base_asset, check_score,
};

pub const DEFAULT_POSITION_SIZE_FRACTION: f64 = 0.1;
pub const DEFAULT_SENTIMENT_TIMEOUT: Duration = Duration::from_secs(5);

/// What happens to a bar whose sentiment lookup fails or times out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SentimentFailurePolicy {
    /// Use a neutral score (0.0) for the bar and carry on.
    #[default]
    FallbackNeutral,
    /// Abort the run with `SentitraderError::Sentiment`.
    FailFast,
}

impl fmt::Display for SentimentFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SentimentFailurePolicy::FallbackNeutral => write!(f, "fallback_neutral"),
            SentimentFailurePolicy::FailFast => write!(f, "fail_fast"),
        }
    }
}

impl FromStr for SentimentFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fallback_neutral" => Ok(SentimentFailurePolicy::FallbackNeutral),
            "fail_fast" => Ok(SentimentFailurePolicy::FailFast),
            other => Err(format!(
                "unknown sentiment failure policy '{}', expected fallback_neutral or fail_fast",
                other
            )),
        }
    }
}

/// Run-independent knobs of the backtester.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestSettings {
    pub position_size_fraction: f64,
    pub sentiment_timeout: Duration,
    pub sentiment_window_hours: u32,
    pub sentiment_failure: SentimentFailurePolicy,
    pub risk: RiskConfig,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        BacktestSettings {
            position_size_fraction: DEFAULT_POSITION_SIZE_FRACTION,
            sentiment_timeout: DEFAULT_SENTIMENT_TIMEOUT,
            sentiment_window_hours: DEFAULT_WINDOW_HOURS,
            sentiment_failure: SentimentFailurePolicy::default(),
            risk: RiskConfig::default(),
        }
    }
}

impl BacktestSettings {
    /// Rejects a buy size above the risk policy's position cap, which every
    /// buy would fail.
    pub fn validate(&self) -> Result<(), SentitraderError> {
        if self.position_size_fraction > self.risk.max_position_fraction {
            return Err(SentitraderError::ConfigInvalid {
                section: "backtest".to_string(),
                key: "position_size_fraction".to_string(),
                reason: format!(
                    "position_size_fraction {} exceeds [risk] max_position_fraction {}",
                    self.position_size_fraction, self.risk.max_position_fraction
                ),
            });
        }
        Ok(())
    }
}

/// A fully validated backtest request, as read from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub symbol: String,
    pub interval: Interval,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub settings: BacktestSettings,
}

impl BacktestConfig {
    /// Start of `start_date` through the last millisecond of `end_date`, UTC.
    pub fn window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.start_date.and_time(NaiveTime::MIN).and_utc();
        let end = self.end_date.and_time(NaiveTime::MIN).and_utc() + chrono::Duration::days(1)
            - chrono::Duration::milliseconds(1);
        (start, end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BacktestState {
    Idle,
    Running { cursor: usize },
    Completed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestReport {
    pub symbol: String,
    pub interval: Interval,
    pub initial_capital: f64,
    pub bars_processed: usize,
    /// Bars whose sentiment lookup failed and fell back to neutral.
    pub sentiment_fallbacks: usize,
    pub trades: Vec<TradeRecord>,
    pub metrics: PerformanceMetrics,
    pub risk: RiskMetrics,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BacktestOutcome {
    Completed(BacktestReport),
    NoData,
}

pub struct Backtester<'a> {
    data: &'a dyn PriceDataPort,
    sentiment: &'a dyn SentimentPort,
    settings: BacktestSettings,
    state: BacktestState,
    ledger: Ledger,
}

impl<'a> Backtester<'a> {
    pub fn new(
        data: &'a dyn PriceDataPort,
        sentiment: &'a dyn SentimentPort,
        settings: BacktestSettings,
    ) -> Self {
        Backtester {
            data,
            sentiment,
            settings,
            state: BacktestState::Idle,
            ledger: Ledger::new(0.0),
        }
    }

    pub fn settings(&self) -> &BacktestSettings {
        &self.settings
    }

    pub fn state(&self) -> BacktestState {
        self.state
    }

    /// Ledger as of the last processed bar. After a cancelled run this holds
    /// the partial trade log.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub async fn run_backtest(
        &mut self,
        symbol: &str,
        interval: Interval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        initial_capital: f64,
    ) -> Result<BacktestOutcome, SentitraderError> {
        let never = CancellationToken::new();
        self.run_backtest_until_cancelled(symbol, interval, start, end, initial_capital, &never)
            .await
    }

    /// Like [`Backtester::run_backtest`], checking `cancel` between bars.
    pub async fn run_backtest_until_cancelled(
        &mut self,
        symbol: &str,
        interval: Interval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        initial_capital: f64,
        cancel: &CancellationToken,
    ) -> Result<BacktestOutcome, SentitraderError> {
        self.state = BacktestState::Idle;
        self.ledger = Ledger::new(initial_capital);
        self.settings.validate()?;

        let series = match self.data.get_series(symbol, interval, start, end) {
            Ok(series) => series,
            Err(SentitraderError::NoData { .. }) => {
                warn!(symbol, %interval, "no price data for backtest window");
                return Ok(BacktestOutcome::NoData);
            }
            Err(e) => return Err(e),
        };
        if series.is_empty() {
            warn!(symbol, %interval, "no price data for backtest window");
            return Ok(BacktestOutcome::NoData);
        }

        info!(
            symbol,
            %interval,
            bars = series.len(),
            initial_capital,
            "backtest started"
        );

        let mut risk = RiskPolicy::new(
            initial_capital,
            self.settings.risk,
            series[0].timestamp.date_naive(),
        );
        let asset = base_asset(symbol);
        let mut sentiment_fallbacks = 0usize;

        for (cursor, bar) in series.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(symbol, bars_processed = cursor, "backtest cancelled");
                self.state = BacktestState::Idle;
                return Err(SentitraderError::Cancelled {
                    bars_processed: cursor,
                });
            }
            self.state = BacktestState::Running { cursor };
            risk.reset_daily_counters_if_new_day(bar.timestamp);

            let aggregate = generate_signals(series.prefix(cursor)).aggregate;
            let sentiment = match self.fetch_sentiment(asset, bar.timestamp).await {
                Ok(score) => score,
                Err(source) => match self.settings.sentiment_failure {
                    SentimentFailurePolicy::FallbackNeutral => {
                        warn!(symbol, bar = cursor, error = %source, "sentiment unavailable, using neutral");
                        sentiment_fallbacks += 1;
                        0.0
                    }
                    SentimentFailurePolicy::FailFast => {
                        self.state = BacktestState::Idle;
                        return Err(SentitraderError::Sentiment {
                            symbol: symbol.to_string(),
                            bar: cursor,
                            source,
                        });
                    }
                },
            };

            let decision = fuse(&aggregate, sentiment);
            if decision.vote != aggregate.vote {
                continue;
            }
            match decision.vote {
                Vote::Buy if !self.ledger.has_position(symbol) => {
                    self.open_long(&mut risk, symbol, bar)?;
                }
                Vote::Sell if self.ledger.has_position(symbol) => {
                    self.close_long(&mut risk, symbol, bar)?;
                }
                _ => {}
            }
        }

        self.state = BacktestState::Completed;
        let metrics = PerformanceMetrics::compute(
            self.ledger.trades(),
            initial_capital,
            self.ledger.capital(),
        );
        info!(
            symbol,
            trades = self.ledger.trades().len(),
            final_capital = metrics.final_capital,
            return_pct = metrics.return_pct,
            "backtest completed"
        );

        Ok(BacktestOutcome::Completed(BacktestReport {
            symbol: symbol.to_string(),
            interval,
            initial_capital,
            bars_processed: series.len(),
            sentiment_fallbacks,
            trades: self.ledger.trades().to_vec(),
            metrics,
            risk: risk.metrics(),
        }))
    }

    async fn fetch_sentiment(
        &self,
        asset: &str,
        at: DateTime<Utc>,
    ) -> Result<f64, SentimentError> {
        let window = SentimentWindow::ending_at(at, self.settings.sentiment_window_hours);
        let timeout = self.settings.sentiment_timeout;
        match tokio::time::timeout(timeout, self.sentiment.get_sentiment(asset, window)).await {
            Ok(result) => check_score(result?),
            Err(_) => Err(SentimentError::Timeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    fn open_long(
        &mut self,
        risk: &mut RiskPolicy,
        symbol: &str,
        bar: &PriceBar,
    ) -> Result<(), SentitraderError> {
        let price = bar.close;
        if !(price > 0.0) {
            debug!(symbol, price, "skipping buy at non-positive price");
            return Ok(());
        }
        if risk.daily_budget_exhausted() {
            debug!(symbol, "skipping buy, daily loss budget exhausted");
            return Ok(());
        }

        let size = self.ledger.capital() * self.settings.position_size_fraction / price;
        if price * size > self.ledger.capital() {
            debug!(symbol, price, size, "skipping buy, insufficient capital");
            return Ok(());
        }
        if risk
            .validate_trade(symbol, TradeSide::Buy, price, size, None)
            .is_err()
        {
            return Ok(());
        }

        risk.apply_open(symbol, price, size, bar.timestamp, None)?;
        let record = self.ledger.open(symbol, price, size, bar.timestamp)?;
        debug!(
            symbol,
            price,
            size,
            capital_after = record.capital_after,
            "opened long"
        );
        Ok(())
    }

    fn close_long(
        &mut self,
        risk: &mut RiskPolicy,
        symbol: &str,
        bar: &PriceBar,
    ) -> Result<(), SentitraderError> {
        let price = bar.close;
        let record = self.ledger.close(symbol, price, bar.timestamp)?;
        let profit = record.realized_profit;
        debug!(
            symbol,
            price,
            profit = profit.unwrap_or(0.0),
            capital_after = record.capital_after,
            "closed long"
        );
        risk.apply_close(symbol, price, profit)?;
        Ok(())
    }
}
