//! Risk policy: position sizing, trade validation and daily loss tracking.
//!
//! The policy is single-owner state. Day boundaries and timestamps are
//! supplied by the caller; nothing here reads the wall clock.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use tracing::{debug, warn};

use super::position::{Position, PositionError, TradeSide};

/// Relative slack on the max-position-value cap so a size computed as
/// `cap / price` is not rejected by rounding.
const VALUE_CAP_TOLERANCE: f64 = 1e-9;

const SCALE_UP_GAIN: f64 = 0.05;
const SCALE_DOWN_LOSS: f64 = -0.02;
const SCALE_UP_FACTOR: f64 = 1.2;
const SCALE_DOWN_FACTOR: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskConfig {
    /// Capital risked per trade, in percent (1.0 = 1%).
    pub risk_percentage: f64,
    /// Cap on a single position's value as a fraction of current capital.
    pub max_position_fraction: f64,
    /// Daily loss limit as a fraction of initial capital.
    pub daily_loss_fraction: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        RiskConfig {
            risk_percentage: 1.0,
            max_position_fraction: 0.10,
            daily_loss_fraction: 0.02,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TradeRejection {
    #[error("Invalid price or size")]
    InvalidPriceOrSize,

    #[error("Position already exists")]
    PositionExists,

    #[error("Trade value exceeds maximum position size")]
    ExceedsMaxPositionValue,

    #[error("Stop loss must be below entry price for long positions")]
    StopLossAboveLongEntry,

    #[error("Stop loss must be above entry price for short positions")]
    StopLossBelowShortEntry,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskMetrics {
    pub current_capital: f64,
    pub max_capital_seen: f64,
    pub open_notional: f64,
    pub capital_utilization: f64,
    pub daily_losses: f64,
    pub daily_budget_remaining: f64,
    pub drawdown_pct: f64,
    pub open_positions: usize,
}

#[derive(Debug, Clone)]
pub struct RiskPolicy {
    config: RiskConfig,
    initial_capital: f64,
    current_capital: f64,
    max_capital_seen: f64,
    daily_loss_limit: f64,
    daily_losses: f64,
    last_reset_date: NaiveDate,
    positions: HashMap<String, Position>,
}

impl RiskPolicy {
    pub fn new(initial_capital: f64, config: RiskConfig, start_date: NaiveDate) -> Self {
        RiskPolicy {
            config,
            initial_capital,
            current_capital: initial_capital,
            max_capital_seen: initial_capital,
            daily_loss_limit: initial_capital * config.daily_loss_fraction,
            daily_losses: 0.0,
            last_reset_date: start_date,
            positions: HashMap::new(),
        }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    pub fn current_capital(&self) -> f64 {
        self.current_capital
    }

    pub fn daily_losses(&self) -> f64 {
        self.daily_losses
    }

    pub fn last_reset_date(&self) -> NaiveDate {
        self.last_reset_date
    }

    pub fn daily_budget_remaining(&self) -> f64 {
        (self.daily_loss_limit - self.daily_losses).max(0.0)
    }

    pub fn daily_budget_exhausted(&self) -> bool {
        self.daily_losses >= self.daily_loss_limit
    }

    /// Zeroes the daily loss counter when `now` falls on a different UTC date
    /// than the last reset, earlier dates included.
    pub fn reset_daily_counters_if_new_day(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if today != self.last_reset_date {
            if self.daily_losses > 0.0 {
                debug!(date = %today, previous = self.daily_losses, "daily loss counter reset");
            }
            self.daily_losses = 0.0;
            self.last_reset_date = today;
        }
    }

    /// Units to buy so that hitting `stop_loss` loses at most the per-trade
    /// risk amount. Zero without a stop loss or once the daily budget is spent.
    pub fn size_position(&self, entry_price: f64, stop_loss: Option<f64>) -> f64 {
        if self.daily_budget_exhausted() {
            warn!(
                daily_losses = self.daily_losses,
                limit = self.daily_loss_limit,
                "daily loss limit reached, no new positions allowed"
            );
            return 0.0;
        }

        let risk_amount = (self.current_capital * self.config.risk_percentage / 100.0)
            .min(self.daily_budget_remaining());

        let Some(stop) = stop_loss else {
            return 0.0;
        };
        let risk_per_unit = (entry_price - stop).abs();
        if !(risk_per_unit > 0.0) || !(entry_price > 0.0) {
            return 0.0;
        }

        let size = risk_amount / risk_per_unit;
        size.min(self.max_position_value() / entry_price).max(0.0)
    }

    pub fn validate_trade(
        &self,
        symbol: &str,
        side: TradeSide,
        price: f64,
        size: f64,
        stop_loss: Option<f64>,
    ) -> Result<(), TradeRejection> {
        let rejection = self.rejection_for(symbol, side, price, size, stop_loss);
        match rejection {
            Some(reason) => {
                warn!(symbol, %side, price, size, %reason, "trade rejected");
                Err(reason)
            }
            None => Ok(()),
        }
    }

    fn rejection_for(
        &self,
        symbol: &str,
        side: TradeSide,
        price: f64,
        size: f64,
        stop_loss: Option<f64>,
    ) -> Option<TradeRejection> {
        if !(price.is_finite() && price > 0.0 && size.is_finite() && size > 0.0) {
            return Some(TradeRejection::InvalidPriceOrSize);
        }
        if side == TradeSide::Buy && self.positions.contains_key(symbol) {
            return Some(TradeRejection::PositionExists);
        }

        let cap = self.max_position_value();
        if price * size > cap * (1.0 + VALUE_CAP_TOLERANCE) {
            return Some(TradeRejection::ExceedsMaxPositionValue);
        }

        match (side, stop_loss) {
            (TradeSide::Buy, Some(stop)) if stop >= price => {
                Some(TradeRejection::StopLossAboveLongEntry)
            }
            (TradeSide::Sell, Some(stop)) if stop <= price => {
                Some(TradeRejection::StopLossBelowShortEntry)
            }
            _ => None,
        }
    }

    pub fn apply_open(
        &mut self,
        symbol: &str,
        price: f64,
        size: f64,
        timestamp: DateTime<Utc>,
        stop_loss: Option<f64>,
    ) -> Result<(), PositionError> {
        if self.positions.contains_key(symbol) {
            return Err(PositionError::AlreadyOpen {
                symbol: symbol.to_string(),
            });
        }
        let cost = price * size;
        if cost > self.current_capital {
            return Err(PositionError::InsufficientCapital {
                required: cost,
                available: self.current_capital,
            });
        }

        self.current_capital -= cost;
        self.positions.insert(
            symbol.to_string(),
            Position {
                symbol: symbol.to_string(),
                entry_price: price,
                size,
                entry_timestamp: timestamp,
                stop_loss,
            },
        );
        Ok(())
    }

    /// Closes the position, crediting its entry notional plus `realized_pnl`.
    /// When no pnl is given it is taken from `price`.
    pub fn apply_close(
        &mut self,
        symbol: &str,
        price: f64,
        realized_pnl: Option<f64>,
    ) -> Result<f64, PositionError> {
        let position = self
            .positions
            .remove(symbol)
            .ok_or_else(|| PositionError::NotOpen {
                symbol: symbol.to_string(),
            })?;

        let pnl = realized_pnl.unwrap_or_else(|| position.unrealized_pnl(price));
        self.current_capital += position.notional() + pnl;
        if pnl < 0.0 {
            self.daily_losses += pnl.abs();
            if self.daily_budget_exhausted() {
                warn!(
                    symbol,
                    daily_losses = self.daily_losses,
                    limit = self.daily_loss_limit,
                    "daily loss limit reached"
                );
            }
        }
        if self.current_capital > self.max_capital_seen {
            self.max_capital_seen = self.current_capital;
        }
        Ok(pnl)
    }

    pub fn metrics(&self) -> RiskMetrics {
        let open_notional: f64 = self.positions.values().map(Position::notional).sum();
        let capital_utilization = if self.current_capital > 0.0 {
            open_notional / self.current_capital
        } else {
            0.0
        };
        let drawdown_pct = if self.max_capital_seen > 0.0 {
            (self.max_capital_seen - self.current_capital) / self.max_capital_seen * 100.0
        } else {
            0.0
        };

        RiskMetrics {
            current_capital: self.current_capital,
            max_capital_seen: self.max_capital_seen,
            open_notional,
            capital_utilization,
            daily_losses: self.daily_losses,
            daily_budget_remaining: self.daily_budget_remaining(),
            drawdown_pct,
            open_positions: self.positions.len(),
        }
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// P&L of closing `symbol` at `exit_price`, if a position is open.
    pub fn position_pnl(&self, symbol: &str, exit_price: f64) -> Option<f64> {
        self.positions
            .get(symbol)
            .map(|p| p.unrealized_pnl(exit_price))
    }

    /// Loss realised at the stop level when `price` has breached it.
    pub fn check_stop_loss(&self, symbol: &str, price: f64) -> Option<f64> {
        let position = self.positions.get(symbol)?;
        if !position.should_stop_loss(price) {
            return None;
        }
        let stop = position.stop_loss?;
        Some(position.unrealized_pnl(stop))
    }

    /// Suggested new size for an open position: scale up after a 5% gain,
    /// down after a 2% loss.
    pub fn adjust_position_size(&self, symbol: &str, price: f64) -> Option<f64> {
        let position = self.positions.get(symbol)?;
        let notional = position.notional();
        if !(notional > 0.0) {
            return None;
        }

        let pnl_fraction = position.unrealized_pnl(price) / notional;
        if pnl_fraction > SCALE_UP_GAIN {
            Some(
                (position.size * SCALE_UP_FACTOR)
                    .min(self.size_position(price, position.stop_loss)),
            )
        } else if pnl_fraction < SCALE_DOWN_LOSS {
            Some(position.size * SCALE_DOWN_FACTOR)
        } else {
            None
        }
    }

    fn max_position_value(&self) -> f64 {
        self.current_capital * self.config.max_position_fraction
    }
}
