//! Exponential Moving Average over closing prices.
//!
//! k = 2/(n+1), seed with first SMA, then EMA[i] = EMA[i-1] + k*(C[i] - EMA[i-1]).
//! The incremental form keeps a constant series exactly constant.
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::PriceBar;

pub fn calculate_ema(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    if period == 0 || bars.is_empty() {
        return IndicatorSeries {
            indicator_type: IndicatorType::Ema(period),
            values: Vec::new(),
        };
    }

    let mut values = Vec::with_capacity(bars.len());
    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = 0.0;
    let mut sum = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        if i < period - 1 {
            sum += bar.close;
            values.push(IndicatorPoint {
                timestamp: bar.timestamp,
                valid: false,
                value: IndicatorValue::Simple(0.0),
            });
            continue;
        }

        ema = if i == period - 1 {
            (sum + bar.close) / period as f64
        } else {
            ema + k * (bar.close - ema)
        };
        values.push(IndicatorPoint {
            timestamp: bar.timestamp,
            valid: true,
            value: IndicatorValue::Simple(ema),
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Ema(period),
        values,
    }
}

/// Raw EMA values with `None` for warmup bars.
pub(crate) fn ema_values(bars: &[PriceBar], period: usize) -> Vec<Option<f64>> {
    calculate_ema(bars, period)
        .values
        .iter()
        .map(|p| match p.value {
            IndicatorValue::Simple(v) if p.valid => Some(v),
            _ => None,
        })
        .collect()
}
