//! Bollinger Bands volatility indicator.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! Where StdDev is population standard deviation (divides by N, not N-1).
//!
//! Default parameters: period=20, multiplier=2.0
//! Warmup: first (period-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::PriceBar;

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_STDDEV_MULT_X100: u32 = 200;

pub fn calculate_bollinger(
    bars: &[PriceBar],
    period: usize,
    stddev_mult_x100: u32,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Bollinger {
        period,
        stddev_mult_x100,
    };
    if period == 0 {
        return IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        };
    }

    let warmup = period - 1;
    let mult = stddev_mult_x100 as f64 / 100.0;

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if i < warmup {
                return IndicatorPoint {
                    timestamp: bar.timestamp,
                    valid: false,
                    value: IndicatorValue::Bollinger {
                        upper: 0.0,
                        middle: 0.0,
                        lower: 0.0,
                    },
                };
            }

            let window = &bars[i + 1 - period..=i];
            let middle: f64 = window.iter().map(|b| b.close).sum::<f64>() / period as f64;
            let variance: f64 = window
                .iter()
                .map(|b| {
                    let diff = b.close - middle;
                    diff * diff
                })
                .sum::<f64>()
                / period as f64;
            let stddev = variance.sqrt();

            IndicatorPoint {
                timestamp: bar.timestamp,
                valid: true,
                value: IndicatorValue::Bollinger {
                    upper: middle + mult * stddev,
                    middle,
                    lower: middle - mult * stddev,
                },
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}

pub fn calculate_bollinger_default(bars: &[PriceBar]) -> IndicatorSeries {
    calculate_bollinger(bars, DEFAULT_PERIOD, DEFAULT_STDDEV_MULT_X100)
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

    fn bands(point: &IndicatorPoint) -> (f64, f64, f64) {
        match point.value {
            IndicatorValue::Bollinger {
                upper,
                middle,
                lower,
            } => (upper, middle, lower),
            _ => panic!("Expected Bollinger value"),
        }
    }

    #[test]
    fn bollinger_warmup() {
        let series = calculate_bollinger(&make_bars(&[10.0, 20.0, 30.0, 40.0, 50.0]), 3, 200);

        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert!(series.values[2].valid);
        assert!(series.values[4].valid);
    }

    #[test]
    fn bollinger_constant_values_collapse() {
        let series = calculate_bollinger(&make_bars(&[100.0; 5]), 3, 200);
        let (upper, middle, lower) = bands(&series.values[2]);

        assert!((middle - 100.0).abs() < f64::EPSILON);
        assert!((upper - 100.0).abs() < f64::EPSILON);
        assert!((lower - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bollinger_known_values() {
        // window 2,4,4,4,5,5,7,9: mean 5, population stddev 2
        let series = calculate_bollinger(&make_bars(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), 8, 200);
        let (upper, middle, lower) = bands(&series.values[7]);

        assert!((middle - 5.0).abs() < 1e-9);
        assert!((upper - 9.0).abs() < 1e-9);
        assert!((lower - 1.0).abs() < 1e-9);
    }

    #[test]
    fn bollinger_symmetric_around_middle() {
        let prices: Vec<f64> = (0..30).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let series = calculate_bollinger_default(&make_bars(&prices));

        for point in series.values.iter().filter(|p| p.valid) {
            let (upper, middle, lower) = bands(point);
            assert!(((upper - middle) - (middle - lower)).abs() < 1e-9);
        }
    }

    #[test]
    fn bollinger_insufficient_bars() {
        let series = calculate_bollinger_default(&make_bars(&[100.0; 19]));
        assert!(series.latest().is_none());
    }

    #[test]
    fn bollinger_zero_period() {
        assert!(calculate_bollinger(&make_bars(&[1.0]), 0, 200).values.is_empty());
    }
}
