//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//! Histogram = MACD Line - Signal Line
//!
//! Default parameters: fast=12, slow=26, signal=9
//! Warmup: max(fast, slow) - 1 + signal - 1 bars (33 for defaults)

use crate::domain::indicator::ema::ema_values;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::PriceBar;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

pub fn calculate_macd(
    bars: &[PriceBar],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Macd {
        fast,
        slow,
        signal: signal_period,
    };

    if bars.is_empty() || fast == 0 || slow == 0 || signal_period == 0 {
        return IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        };
    }

    let ema_fast = ema_values(bars, fast);
    let ema_slow = ema_values(bars, slow);

    let macd_line: Vec<Option<f64>> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();

    let macd_warmup = fast.max(slow) - 1;
    let signal_warmup = macd_warmup + signal_period - 1;
    let k = 2.0 / (signal_period as f64 + 1.0);

    let mut signal_line: Vec<Option<f64>> = vec![None; bars.len()];
    if bars.len() > signal_warmup {
        let seed: f64 = macd_line[macd_warmup..=signal_warmup]
            .iter()
            .map(|v| v.unwrap_or(0.0))
            .sum::<f64>()
            / signal_period as f64;
        let mut signal_ema = seed;
        signal_line[signal_warmup] = Some(seed);

        for i in (signal_warmup + 1)..bars.len() {
            signal_ema += k * (macd_line[i].unwrap_or(0.0) - signal_ema);
            signal_line[i] = Some(signal_ema);
        }
    }

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let line = macd_line[i].unwrap_or(0.0);
            let signal = signal_line[i].unwrap_or(0.0);
            IndicatorPoint {
                timestamp: bar.timestamp,
                valid: macd_line[i].is_some() && signal_line[i].is_some(),
                value: IndicatorValue::Macd {
                    line,
                    signal,
                    histogram: line - signal,
                },
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}

pub fn calculate_macd_default(bars: &[PriceBar]) -> IndicatorSeries {
    calculate_macd(bars, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn make_bars(prices: &[f64]) -> Vec<PriceBar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar {
                timestamp: start + Duration::hours(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    fn rising(count: usize) -> Vec<PriceBar> {
        let prices: Vec<f64> = (0..count).map(|i| 100.0 + i as f64).collect();
        make_bars(&prices)
    }

    #[test]
    fn macd_warmup_default() {
        let series = calculate_macd_default(&rising(40));

        let warmup = DEFAULT_SLOW - 1 + DEFAULT_SIGNAL - 1;
        for i in 0..warmup {
            assert!(!series.values[i].valid, "Index {} should not be valid", i);
        }
        assert!(series.values[warmup].valid, "Index {} should be valid", warmup);
    }

    #[test]
    fn macd_needs_34_bars_by_default() {
        assert!(calculate_macd_default(&rising(33)).latest().is_none());
        assert!(calculate_macd_default(&rising(34)).latest().is_some());
    }

    #[test]
    fn macd_histogram_equals_line_minus_signal() {
        let series = calculate_macd_default(&rising(40));

        for point in series.values.iter().filter(|p| p.valid) {
            if let IndicatorValue::Macd {
                line,
                signal,
                histogram,
            } = point.value
            {
                assert!((histogram - (line - signal)).abs() < f64::EPSILON);
            }
        }
    }

    #[test]
    fn macd_rising_prices_line_above_signal() {
        let prices: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64).powf(1.5)).collect();
        let series = calculate_macd_default(&make_bars(&prices));

        match series.latest() {
            Some(IndicatorValue::Macd { line, signal, .. }) => assert!(line > signal),
            other => panic!("Expected MACD value, got {:?}", other),
        }
    }

    #[test]
    fn macd_empty_bars() {
        assert!(calculate_macd_default(&[]).values.is_empty());
    }

    #[test]
    fn macd_zero_period() {
        let bars = make_bars(&[100.0, 101.0, 102.0]);
        assert!(calculate_macd(&bars, 0, 26, 9).values.is_empty());
        assert!(calculate_macd(&bars, 12, 0, 9).values.is_empty());
        assert!(calculate_macd(&bars, 12, 26, 0).values.is_empty());
    }

    #[test]
    fn macd_line_is_ema_fast_minus_ema_slow() {
        let bars = make_bars(&[10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0]);
        let series = calculate_macd(&bars, 3, 5, 2);

        let ema_fast = ema_values(&bars, 3);
        let ema_slow = ema_values(&bars, 5);

        for (i, point) in series.values.iter().enumerate().filter(|(_, p)| p.valid) {
            if let IndicatorValue::Macd { line, .. } = point.value {
                let expected = ema_fast[i].unwrap() - ema_slow[i].unwrap();
                assert!((line - expected).abs() < f64::EPSILON, "mismatch at {}", i);
            }
        }
    }

    #[test]
    fn macd_custom_parameters() {
        let series = calculate_macd(&rising(20), 5, 10, 3);

        let warmup = 10 - 1 + 3 - 1;
        assert!(!series.values[warmup - 1].valid);
        assert!(series.values[warmup].valid);
    }

    #[test]
    fn macd_indicator_type() {
        let series = calculate_macd(&make_bars(&[100.0]), 5, 10, 3);
        assert_eq!(
            series.indicator_type,
            IndicatorType::Macd {
                fast: 5,
                slow: 10,
                signal: 3
            }
        );
    }
}
