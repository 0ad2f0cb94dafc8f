//! Performance metrics over a finished trade log.

use super::ledger::{TradeKind, TradeRecord};

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceMetrics {
    /// Number of closed trades.
    pub total_trades: usize,
    pub winning_trades: usize,
    /// Closes with profit ≤ 0, so break-even counts as a loss.
    pub losing_trades: usize,
    pub win_rate: f64,
    pub total_profit: f64,
    pub max_drawdown_pct: f64,
    pub profit_factor: f64,
    pub final_capital: f64,
    pub return_pct: f64,
}

impl PerformanceMetrics {
    /// Metrics of a run with no trades.
    pub fn empty(initial_capital: f64) -> Self {
        PerformanceMetrics {
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate: 0.0,
            total_profit: 0.0,
            max_drawdown_pct: 0.0,
            profit_factor: 0.0,
            final_capital: initial_capital,
            return_pct: 0.0,
        }
    }

    pub fn compute(trades: &[TradeRecord], initial_capital: f64, final_capital: f64) -> Self {
        if trades.is_empty() {
            return Self::empty(initial_capital);
        }

        let mut total_trades = 0usize;
        let mut winning_trades = 0usize;
        let mut gross_profit = 0.0_f64;
        let mut gross_loss = 0.0_f64;

        for profit in trades
            .iter()
            .filter(|t| t.kind == TradeKind::SellClose)
            .filter_map(|t| t.realized_profit)
        {
            total_trades += 1;
            if profit > 0.0 {
                winning_trades += 1;
                gross_profit += profit;
            } else {
                gross_loss += profit.abs();
            }
        }

        let win_rate = if total_trades > 0 {
            winning_trades as f64 / total_trades as f64
        } else {
            0.0
        };

        let profit_factor = if total_trades > 0 {
            gross_profit / gross_loss.max(1.0)
        } else {
            0.0
        };

        let return_pct = if initial_capital > 0.0 {
            (final_capital - initial_capital) / initial_capital * 100.0
        } else {
            0.0
        };

        PerformanceMetrics {
            total_trades,
            winning_trades,
            losing_trades: total_trades - winning_trades,
            win_rate,
            total_profit: gross_profit - gross_loss,
            max_drawdown_pct: compute_drawdown_pct(trades, initial_capital),
            profit_factor,
            final_capital,
            return_pct,
        }
    }
}

/// Largest peak-to-trough decline of `capital_after`, in percent. The peak
/// starts at the initial capital.
fn compute_drawdown_pct(trades: &[TradeRecord], initial_capital: f64) -> f64 {
    let mut peak = initial_capital;
    let mut max_dd = 0.0_f64;

    for trade in trades {
        let capital = trade.capital_after;
        if capital > peak {
            peak = capital;
        }
        if peak > 0.0 {
            let dd = (peak - capital) / peak * 100.0;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }

    max_dd
}
