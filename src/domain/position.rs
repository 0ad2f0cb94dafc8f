//! Open position tracking.

use chrono::{DateTime, Utc};
use std::fmt;

/// Direction of a requested trade. `Buy` opens a long, `Sell` opens a short or
/// closes a long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "buy"),
            TradeSide::Sell => write!(f, "sell"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub entry_price: f64,
    pub size: f64,
    pub entry_timestamp: DateTime<Utc>,
    pub stop_loss: Option<f64>,
}

impl Position {
    /// Capital committed at entry.
    pub fn notional(&self) -> f64 {
        self.size * self.entry_price
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.size * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.size
    }

    /// A stop placed above entry protects a short; below entry, a long.
    pub fn should_stop_loss(&self, price: f64) -> bool {
        match self.stop_loss {
            Some(stop) if self.entry_price > stop => price <= stop,
            Some(stop) if self.entry_price < stop => price >= stop,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PositionError {
    #[error("position already open for {symbol}")]
    AlreadyOpen { symbol: String },

    #[error("no open position for {symbol}")]
    NotOpen { symbol: String },

    #[error("insufficient capital: need {required:.2}, have {available:.2}")]
    InsufficientCapital { required: f64, available: f64 },
}
