//! Capital, open positions and the append-only trade log of one run.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;

use super::position::{Position, PositionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeKind {
    BuyOpen,
    SellClose,
}

impl fmt::Display for TradeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeKind::BuyOpen => write!(f, "BUY"),
            TradeKind::SellClose => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub symbol: String,
    pub kind: TradeKind,
    pub price: f64,
    pub size: f64,
    pub timestamp: DateTime<Utc>,
    /// Present only on `SellClose`.
    pub realized_profit: Option<f64>,
    pub capital_after: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    capital: f64,
    positions: HashMap<String, Position>,
    trades: Vec<TradeRecord>,
}

impl Ledger {
    pub fn new(initial_capital: f64) -> Self {
        Ledger {
            capital: initial_capital,
            positions: HashMap::new(),
            trades: Vec::new(),
        }
    }

    pub fn capital(&self) -> f64 {
        self.capital
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    pub fn open(
        &mut self,
        symbol: &str,
        price: f64,
        size: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<&TradeRecord, PositionError> {
        if self.has_position(symbol) {
            return Err(PositionError::AlreadyOpen {
                symbol: symbol.to_string(),
            });
        }

        let cost = price * size;
        if cost > self.capital {
            return Err(PositionError::InsufficientCapital {
                required: cost,
                available: self.capital,
            });
        }

        self.capital -= cost;
        self.positions.insert(
            symbol.to_string(),
            Position {
                symbol: symbol.to_string(),
                entry_price: price,
                size,
                entry_timestamp: timestamp,
                stop_loss: None,
            },
        );
        Ok(self.append(TradeRecord {
            symbol: symbol.to_string(),
            kind: TradeKind::BuyOpen,
            price,
            size,
            timestamp,
            realized_profit: None,
            capital_after: self.capital,
        }))
    }

    /// Closes the whole position at `price`; profit is proceeds minus entry notional.
    pub fn close(
        &mut self,
        symbol: &str,
        price: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<&TradeRecord, PositionError> {
        let position = self
            .positions
            .remove(symbol)
            .ok_or_else(|| PositionError::NotOpen {
                symbol: symbol.to_string(),
            })?;

        let proceeds = position.size * price;
        let profit = proceeds - position.notional();
        self.capital += proceeds;

        Ok(self.append(TradeRecord {
            symbol: symbol.to_string(),
            kind: TradeKind::SellClose,
            price,
            size: position.size,
            timestamp,
            realized_profit: Some(profit),
            capital_after: self.capital,
        }))
    }

    fn append(&mut self, record: TradeRecord) -> &TradeRecord {
        self.trades.push(record);
        &self.trades[self.trades.len() - 1]
    }
}
