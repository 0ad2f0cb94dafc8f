//! RSI (Relative Strength Index) momentum oscillator.
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0 and avg_gain > 0: RSI = 100
//! If both averages are 0 the ratio is 0/0 and the point is invalid.
//!
//! Warmup: first n bars are invalid (need n price changes).

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::PriceBar;

pub const DEFAULT_PERIOD: usize = 14;

pub fn calculate_rsi(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    let invalid = |bar: &PriceBar| IndicatorPoint {
        timestamp: bar.timestamp,
        valid: false,
        value: IndicatorValue::Simple(0.0),
    };

    if period == 0 || bars.len() < 2 {
        return IndicatorSeries {
            indicator_type: IndicatorType::Rsi(period),
            values: bars.iter().map(invalid).collect(),
        };
    }

    let mut values = Vec::with_capacity(bars.len());
    values.push(invalid(&bars[0]));

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    let mut gain_sum = 0.0;
    let mut loss_sum = 0.0;

    for (i, bar) in bars.iter().enumerate().skip(1) {
        let change = bar.close - bars[i - 1].close;
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        let changes_seen = i;

        if changes_seen < period {
            gain_sum += gain;
            loss_sum += loss;
            values.push(invalid(bar));
            continue;
        }

        if changes_seen == period {
            avg_gain = (gain_sum + gain) / period as f64;
            avg_loss = (loss_sum + loss) / period as f64;
        } else {
            avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
            avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;
        }

        match rsi_from_averages(avg_gain, avg_loss) {
            Some(rsi) => values.push(IndicatorPoint {
                timestamp: bar.timestamp,
                valid: true,
                value: IndicatorValue::Simple(rsi),
            }),
            None => values.push(invalid(bar)),
        }
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Rsi(period),
        values,
    }
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            return None;
        }
        return Some(100.0);
    }
    Some(100.0 - (100.0 / (1.0 + avg_gain / avg_loss)))
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

    fn simple(point: &IndicatorPoint) -> f64 {
        match point.value {
            IndicatorValue::Simple(v) => v,
            _ => panic!("Expected Simple value"),
        }
    }

    #[test]
    fn rsi_empty_bars() {
        let series = calculate_rsi(&[], 14);
        assert!(series.values.is_empty());
    }

    #[test]
    fn rsi_single_bar() {
        let series = calculate_rsi(&make_bars(&[100.0]), 14);
        assert_eq!(series.values.len(), 1);
        assert!(!series.values[0].valid);
    }

    #[test]
    fn rsi_warmup_period() {
        let prices: Vec<f64> = (1..=15).map(|i| 100.0 + (i as f64 % 5.0) * 2.0).collect();
        let series = calculate_rsi(&make_bars(&prices), 14);

        assert_eq!(series.values.len(), 15);
        for i in 0..14 {
            assert!(!series.values[i].valid, "Bar {} should be invalid", i);
        }
        assert!(series.values[14].valid, "Bar 14 should be valid");
    }

    #[test]
    fn rsi_all_gains_no_losses() {
        let prices: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        let series = calculate_rsi(&make_bars(&prices), 14);
        assert!((simple(&series.values[14]) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_all_losses_no_gains() {
        let prices: Vec<f64> = (0..15).map(|i| 100.0 - i as f64).collect();
        let series = calculate_rsi(&make_bars(&prices), 14);
        assert!(simple(&series.values[14]).abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_flat_prices_are_undefined() {
        let series = calculate_rsi(&make_bars(&[100.0; 20]), 14);
        assert!(series.values.iter().all(|p| !p.valid));
    }

    #[test]
    fn rsi_in_range() {
        let prices: Vec<f64> = (1..=40)
            .map(|i| 100.0 + (i as f64 % 7.0 - 3.0) * 2.0)
            .collect();
        let series = calculate_rsi(&make_bars(&prices), 14);

        for point in series.values.iter().filter(|p| p.valid) {
            let rsi = simple(point);
            assert!((0.0..=100.0).contains(&rsi), "RSI {} out of range", rsi);
        }
    }

    #[test]
    fn rsi_zero_period() {
        let series = calculate_rsi(&make_bars(&[100.0, 101.0]), 0);
        assert_eq!(series.values.len(), 2);
        assert!(series.values.iter().all(|p| !p.valid));
    }

    #[test]
    fn rsi_known_calculation() {
        // 3 up moves of 2 and 1 down move of 1 repeated: avg_gain 1.5, avg_loss 0.25
        let bars = make_bars(&[10.0, 12.0, 14.0, 16.0, 15.0]);
        let series = calculate_rsi(&bars, 4);
        let expected = 100.0 - 100.0 / (1.0 + 1.5 / 0.25);
        assert!((simple(&series.values[4]) - expected).abs() < 1e-9);
    }

    #[test]
    fn rsi_wilder_smoothing_step() {
        let bars = make_bars(&[10.0, 12.0, 14.0, 16.0, 15.0, 13.0]);
        let series = calculate_rsi(&bars, 4);
        let avg_gain = (1.5 * 3.0 + 0.0) / 4.0;
        let avg_loss = (0.25 * 3.0 + 2.0) / 4.0;
        let expected = 100.0 - 100.0 / (1.0 + avg_gain / avg_loss);
        assert!((simple(&series.values[5]) - expected).abs() < 1e-9);
    }
}
