//! Configuration validation.
//!
//! Every value is checked before a run and turned into typed
//! [`RiskConfig`] / [`BacktestConfig`] values. Missing optional keys fall back
//! to the documented defaults; present but malformed keys are errors.

use crate::domain::backtest::{
    BacktestConfig, BacktestSettings, DEFAULT_POSITION_SIZE_FRACTION, DEFAULT_SENTIMENT_TIMEOUT,
    SentimentFailurePolicy,
};
use crate::domain::config::Interval;
use crate::domain::error::SentitraderError;
use crate::domain::risk::RiskConfig;
use crate::ports::config_port::ConfigPort;
use crate::ports::sentiment_port::DEFAULT_WINDOW_HOURS;
use chrono::NaiveDate;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_INITIAL_CAPITAL: f64 = 10_000.0;
pub const DEFAULT_INTERVAL: Interval = Interval::OneHour;

const KNOWN_KEYS: &[(&str, &[&str])] = &[
    (
        "risk",
        &["daily_loss_fraction", "max_position_fraction", "risk_percentage"],
    ),
    (
        "backtest",
        &[
            "end_date",
            "initial_capital",
            "interval",
            "position_size_fraction",
            "sentiment_failure",
            "sentiment_timeout_ms",
            "sentiment_window_hours",
            "start_date",
            "symbol",
        ],
    ),
    ("data", &["csv_dir"]),
    ("sentiment", &["constant", "csv_path"]),
];

/// Values that may replace their config-file counterparts, e.g. from CLI flags.
#[derive(Debug, Clone, Default)]
pub struct BacktestOverrides {
    pub symbol: Option<String>,
    pub interval: Option<String>,
}

pub fn build_risk_config(config: &dyn ConfigPort) -> Result<RiskConfig, SentitraderError> {
    let defaults = RiskConfig::default();

    let risk_percentage = read_double(config, "risk", "risk_percentage", defaults.risk_percentage)?;
    if !(risk_percentage > 0.0 && risk_percentage <= 100.0) {
        return Err(invalid(
            "risk",
            "risk_percentage",
            "risk_percentage must be in (0, 100]",
        ));
    }

    let max_position_fraction = read_double(
        config,
        "risk",
        "max_position_fraction",
        defaults.max_position_fraction,
    )?;
    if !(max_position_fraction > 0.0 && max_position_fraction <= 1.0) {
        return Err(invalid(
            "risk",
            "max_position_fraction",
            "max_position_fraction must be in (0, 1]",
        ));
    }

    let daily_loss_fraction = read_double(
        config,
        "risk",
        "daily_loss_fraction",
        defaults.daily_loss_fraction,
    )?;
    if !(daily_loss_fraction > 0.0 && daily_loss_fraction <= 1.0) {
        return Err(invalid(
            "risk",
            "daily_loss_fraction",
            "daily_loss_fraction must be in (0, 1]",
        ));
    }

    Ok(RiskConfig {
        risk_percentage,
        max_position_fraction,
        daily_loss_fraction,
    })
}

pub fn build_backtest_settings(
    config: &dyn ConfigPort,
) -> Result<BacktestSettings, SentitraderError> {
    let risk = build_risk_config(config)?;

    let position_size_fraction = read_double(
        config,
        "backtest",
        "position_size_fraction",
        DEFAULT_POSITION_SIZE_FRACTION,
    )?;
    if !(position_size_fraction > 0.0 && position_size_fraction <= 1.0) {
        return Err(invalid(
            "backtest",
            "position_size_fraction",
            "position_size_fraction must be in (0, 1]",
        ));
    }

    let default_timeout_ms = i64::try_from(DEFAULT_SENTIMENT_TIMEOUT.as_millis()).unwrap_or(i64::MAX);
    let timeout_ms = read_int(config, "backtest", "sentiment_timeout_ms", default_timeout_ms)?;
    let timeout_ms = u64::try_from(timeout_ms)
        .ok()
        .filter(|ms| *ms > 0)
        .ok_or_else(|| {
            invalid(
                "backtest",
                "sentiment_timeout_ms",
                "sentiment_timeout_ms must be positive",
            )
        })?;

    let window_hours = read_int(
        config,
        "backtest",
        "sentiment_window_hours",
        i64::from(DEFAULT_WINDOW_HOURS),
    )?;
    let sentiment_window_hours = u32::try_from(window_hours)
        .ok()
        .filter(|h| *h > 0)
        .ok_or_else(|| {
            invalid(
                "backtest",
                "sentiment_window_hours",
                "sentiment_window_hours must be a positive number of hours",
            )
        })?;

    let sentiment_failure = match config.get_string("backtest", "sentiment_failure") {
        None => SentimentFailurePolicy::default(),
        Some(s) => s
            .parse::<SentimentFailurePolicy>()
            .map_err(|reason| invalid("backtest", "sentiment_failure", &reason))?,
    };

    let settings = BacktestSettings {
        position_size_fraction,
        sentiment_timeout: Duration::from_millis(timeout_ms),
        sentiment_window_hours,
        sentiment_failure,
        risk,
    };
    settings.validate()?;
    Ok(settings)
}

/// Keys in the known sections that nothing reads, as `[section] key`.
/// Usually a typo that would otherwise silently fall back to a default.
pub fn unknown_keys(config: &dyn ConfigPort) -> Vec<String> {
    KNOWN_KEYS
        .iter()
        .flat_map(|(section, known)| {
            config
                .keys(section)
                .into_iter()
                .filter(move |key| !known.contains(&key.as_str()))
                .map(move |key| format!("[{}] {}", section, key))
        })
        .collect()
}

pub fn build_backtest_config(
    config: &dyn ConfigPort,
    overrides: &BacktestOverrides,
) -> Result<BacktestConfig, SentitraderError> {
    for key in unknown_keys(config) {
        warn!(key = %key, "ignoring unknown config key");
    }

    let symbol = match overrides.symbol.clone() {
        Some(symbol) => symbol,
        None => required_string(config, "backtest", "symbol")?,
    };
    let symbol = symbol.trim().to_ascii_uppercase();
    if symbol.is_empty() || !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(invalid(
            "backtest",
            "symbol",
            "symbol must be a non-empty alphanumeric pair such as BTCUSDT",
        ));
    }

    let interval = match overrides
        .interval
        .clone()
        .or_else(|| config.get_string("backtest", "interval"))
    {
        None => DEFAULT_INTERVAL,
        Some(s) => s
            .parse::<Interval>()
            .map_err(|e| invalid("backtest", "interval", &e.to_string()))?,
    };

    let start_date = parse_date(config.get_string("backtest", "start_date").as_deref(), "start_date")?;
    let end_date = parse_date(config.get_string("backtest", "end_date").as_deref(), "end_date")?;
    if start_date > end_date {
        return Err(invalid(
            "backtest",
            "start_date",
            "start_date must not be after end_date",
        ));
    }

    let initial_capital = read_double(config, "backtest", "initial_capital", DEFAULT_INITIAL_CAPITAL)?;
    if !(initial_capital > 0.0) {
        return Err(invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }

    Ok(BacktestConfig {
        symbol,
        interval,
        start_date,
        end_date,
        initial_capital,
        settings: build_backtest_settings(config)?,
    })
}

/// `[data] csv_dir` must be present for a backtest.
pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), SentitraderError> {
    required_string(config, "data", "csv_dir").map(|_| ())
}

/// `[sentiment]` needs either `csv_path` or a `constant` score in [-1, 1].
/// An absent section means a constant neutral score.
pub fn validate_sentiment_config(config: &dyn ConfigPort) -> Result<(), SentitraderError> {
    if non_empty(config.get_string("sentiment", "csv_path")).is_some() {
        return Ok(());
    }
    let constant = read_double(config, "sentiment", "constant", 0.0)?;
    if !(-1.0..=1.0).contains(&constant) {
        return Err(invalid(
            "sentiment",
            "constant",
            "constant sentiment must be in [-1, 1]",
        ));
    }
    Ok(())
}

/// Full check of a backtest configuration file.
pub fn validate_config(config: &dyn ConfigPort) -> Result<BacktestConfig, SentitraderError> {
    let backtest = build_backtest_config(config, &BacktestOverrides::default())?;
    validate_data_config(config)?;
    validate_sentiment_config(config)?;
    Ok(backtest)
}

fn parse_date(value: Option<&str>, field: &str) -> Result<NaiveDate, SentitraderError> {
    match non_empty(value.map(str::to_string)) {
        None => Err(SentitraderError::ConfigMissing {
            section: "backtest".to_string(),
            key: field.to_string(),
        }),
        Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|_| {
            invalid(
                "backtest",
                field,
                &format!("invalid {} format, expected YYYY-MM-DD", field),
            )
        }),
    }
}

fn required_string(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<String, SentitraderError> {
    non_empty(config.get_string(section, key)).ok_or_else(|| SentitraderError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn read_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, SentitraderError> {
    match non_empty(config.get_string(section, key)) {
        None => Ok(default),
        Some(s) => s
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| invalid(section, key, &format!("'{}' is not a number", s))),
    }
}

fn read_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, SentitraderError> {
    match non_empty(config.get_string(section, key)) {
        None => Ok(default),
        Some(s) => s
            .parse::<i64>()
            .map_err(|_| invalid(section, key, &format!("'{}' is not an integer", s))),
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> SentitraderError {
    SentitraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
