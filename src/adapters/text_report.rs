//! Plain-text backtest report.

use crate::domain::backtest::BacktestReport;
use crate::domain::ledger::TradeRecord;
use crate::domain::metrics::PerformanceMetrics;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Clone, Copy, Default)]
pub struct TextReportAdapter;

impl ReportPort for TextReportAdapter {
    fn render(&self, report: &BacktestReport) -> String {
        let mut out = String::new();
        out.push_str(&format_summary(report.initial_capital, &report.metrics));
        out.push('\n');
        out.push_str(&format!(
            "Symbol: {} ({}), {} bars, {} sentiment fallbacks\n",
            report.symbol, report.interval, report.bars_processed, report.sentiment_fallbacks
        ));
        if report.risk.open_positions > 0 {
            out.push_str(&format!(
                "Open position value: {}\n",
                format_money(report.risk.open_notional)
            ));
        }
        out.push('\n');
        out.push_str(&format_trade_history(&report.trades));
        out
    }
}

pub fn format_summary(initial_capital: f64, metrics: &PerformanceMetrics) -> String {
    let mut out = String::from("=== Backtest Results ===\n");
    out.push_str(&format!("Initial Capital: {}\n", format_money(initial_capital)));
    out.push_str(&format!(
        "Final Capital: {}\n",
        format_money(metrics.final_capital)
    ));
    out.push_str(&format!("Total Return: {:.2}%\n", metrics.return_pct));
    out.push_str(&format!("Total Trades: {}\n", metrics.total_trades));
    out.push_str(&format!("Win Rate: {:.2}%\n", metrics.win_rate * 100.0));
    out.push_str(&format!("Profit Factor: {:.2}\n", metrics.profit_factor));
    out.push_str(&format!(
        "Maximum Drawdown: {:.2}%\n",
        metrics.max_drawdown_pct
    ));
    out
}

pub fn format_trade_history(trades: &[TradeRecord]) -> String {
    let mut out = String::from("=== Trade History ===\n");
    if trades.is_empty() {
        out.push_str("No trades executed.\n");
        return out;
    }

    for trade in trades {
        out.push_str(&format!(
            "{}: {} {:.4} @ {}",
            trade.timestamp.to_rfc3339(),
            trade.kind,
            trade.size,
            format_money(trade.price)
        ));
        if let Some(profit) = trade.realized_profit {
            out.push_str(&format!(" (Profit: {})", format_money(profit)));
        }
        out.push('\n');
    }
    out
}

/// `$1,234.56` style, with a leading minus for negatives.
pub fn format_money(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (int_part, frac_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if value < 0.0 && formatted != "0.00" { "-" } else { "" };
    format!("{}${}.{}", sign, grouped, frac_part)
}
