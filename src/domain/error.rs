//! Domain error types.

/// Top-level error type for sentitrader.
#[derive(Debug, thiserror::Error)]
pub enum SentitraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("price data source error: {reason}")]
    DataSource { reason: String },

    #[error("no price data for {symbol} ({interval})")]
    NoData { symbol: String, interval: String },

    #[error(transparent)]
    InvalidSeries(#[from] crate::domain::ohlcv::SeriesError),

    #[error("sentiment unavailable for {symbol} at bar {bar}: {source}")]
    Sentiment {
        symbol: String,
        bar: usize,
        #[source]
        source: crate::ports::sentiment_port::SentimentError,
    },

    #[error(transparent)]
    Position(#[from] crate::domain::position::PositionError),

    #[error("backtest cancelled after {bars_processed} bars")]
    Cancelled { bars_processed: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&SentitraderError> for std::process::ExitCode {
    fn from(err: &SentitraderError) -> Self {
        let code: u8 = match err {
            SentitraderError::Io(_) => 1,
            SentitraderError::ConfigParse { .. }
            | SentitraderError::ConfigMissing { .. }
            | SentitraderError::ConfigInvalid { .. } => 2,
            SentitraderError::DataSource { .. } | SentitraderError::InvalidSeries(_) => 3,
            SentitraderError::Position(_) => 4,
            SentitraderError::NoData { .. } => 5,
            SentitraderError::Sentiment { .. } => 6,
            SentitraderError::Cancelled { .. } => 7,
        };
        std::process::ExitCode::from(code)
    }
}
