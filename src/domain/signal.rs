//! Indicator votes and their aggregation for the final bar of a series.
//!
//! Each indicator family casts at most one vote. A family without enough
//! history, or whose value is numerically undefined, casts a null vote and is
//! left out of the tally entirely.

use std::fmt;

use crate::domain::indicator::{
    bollinger, calculate_ema, calculate_macd, calculate_rsi, macd, rsi, IndicatorValue,
};
use crate::domain::ohlcv::PriceBar;

pub const RSI_OVERSOLD: f64 = 30.0;
pub const RSI_OVERBOUGHT: f64 = 70.0;
pub const EMA_FAST_PERIOD: usize = 50;
pub const EMA_SLOW_PERIOD: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vote {
    Buy,
    Sell,
    Neutral,
}

impl Vote {
    /// Buy → +1, Neutral → 0, Sell → -1.
    pub fn score(self) -> f64 {
        match self {
            Vote::Buy => 1.0,
            Vote::Neutral => 0.0,
            Vote::Sell => -1.0,
        }
    }
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vote::Buy => write!(f, "buy"),
            Vote::Sell => write!(f, "sell"),
            Vote::Neutral => write!(f, "neutral"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorFamily {
    Rsi,
    Macd,
    Bollinger,
    EmaTrend,
}

impl fmt::Display for IndicatorFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorFamily::Rsi => write!(f, "rsi"),
            IndicatorFamily::Macd => write!(f, "macd"),
            IndicatorFamily::Bollinger => write!(f, "bb"),
            IndicatorFamily::EmaTrend => write!(f, "ema"),
        }
    }
}

/// Numeric inputs behind a vote.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Rsi(f64),
    Macd { line: f64, signal: f64 },
    Bollinger { price: f64, upper: f64, lower: f64 },
    EmaTrend { fast: f64, slow: f64 },
}

impl Reading {
    pub fn family(&self) -> IndicatorFamily {
        match self {
            Reading::Rsi(_) => IndicatorFamily::Rsi,
            Reading::Macd { .. } => IndicatorFamily::Macd,
            Reading::Bollinger { .. } => IndicatorFamily::Bollinger,
            Reading::EmaTrend { .. } => IndicatorFamily::EmaTrend,
        }
    }

    pub fn vote(&self) -> Vote {
        match *self {
            Reading::Rsi(value) => rsi_vote(value),
            Reading::Macd { line, signal } => macd_vote(line, signal),
            Reading::Bollinger {
                price,
                upper,
                lower,
            } => bollinger_vote(price, upper, lower),
            Reading::EmaTrend { fast, slow } => ema_trend_vote(fast, slow),
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Rsi(value) => write!(f, "rsi {:.2}", value),
            Reading::Macd { line, signal } => write!(f, "line {:.4} signal {:.4}", line, signal),
            Reading::Bollinger {
                price,
                upper,
                lower,
            } => write!(f, "price {:.2} bands [{:.2}, {:.2}]", price, lower, upper),
            Reading::EmaTrend { fast, slow } => write!(
                f,
                "ema{} {:.2} ema{} {:.2}",
                EMA_FAST_PERIOD, fast, EMA_SLOW_PERIOD, slow
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorVote {
    pub family: IndicatorFamily,
    pub reading: Option<Reading>,
    pub vote: Option<Vote>,
}

impl IndicatorVote {
    pub fn null(family: IndicatorFamily) -> Self {
        Self {
            family,
            reading: None,
            vote: None,
        }
    }

    pub fn cast(reading: Reading) -> Self {
        Self {
            family: reading.family(),
            vote: Some(reading.vote()),
            reading: Some(reading),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateSignal {
    pub vote: Vote,
    pub strength: f64,
}

impl AggregateSignal {
    pub fn neutral() -> Self {
        Self {
            vote: Vote::Neutral,
            strength: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalReport {
    pub votes: Vec<IndicatorVote>,
    pub aggregate: AggregateSignal,
}

pub fn rsi_vote(value: f64) -> Vote {
    if value < RSI_OVERSOLD {
        Vote::Buy
    } else if value > RSI_OVERBOUGHT {
        Vote::Sell
    } else {
        Vote::Neutral
    }
}

pub fn macd_vote(line: f64, signal: f64) -> Vote {
    if line > signal { Vote::Buy } else { Vote::Sell }
}

pub fn bollinger_vote(price: f64, upper: f64, lower: f64) -> Vote {
    if price < lower {
        Vote::Buy
    } else if price > upper {
        Vote::Sell
    } else {
        Vote::Neutral
    }
}

pub fn ema_trend_vote(fast: f64, slow: f64) -> Vote {
    if fast > slow { Vote::Buy } else { Vote::Sell }
}

/// Runs every indicator family over `bars` and votes on the last bar.
pub fn generate_signals(bars: &[PriceBar]) -> SignalReport {
    let votes = vec![
        rsi_reading(bars).map_or(IndicatorVote::null(IndicatorFamily::Rsi), IndicatorVote::cast),
        macd_reading(bars).map_or(IndicatorVote::null(IndicatorFamily::Macd), IndicatorVote::cast),
        bollinger_reading(bars)
            .map_or(IndicatorVote::null(IndicatorFamily::Bollinger), IndicatorVote::cast),
        ema_trend_reading(bars)
            .map_or(IndicatorVote::null(IndicatorFamily::EmaTrend), IndicatorVote::cast),
    ];
    let aggregate = aggregate(&votes);
    SignalReport { votes, aggregate }
}

/// Majority vote over non-null votes; any tie resolves to Neutral.
pub fn aggregate(votes: &[IndicatorVote]) -> AggregateSignal {
    let (mut buy, mut sell, mut neutral) = (0usize, 0usize, 0usize);
    for vote in votes.iter().filter_map(|v| v.vote) {
        match vote {
            Vote::Buy => buy += 1,
            Vote::Sell => sell += 1,
            Vote::Neutral => neutral += 1,
        }
    }

    let total = buy + sell + neutral;
    if total == 0 {
        return AggregateSignal::neutral();
    }

    let vote = if buy > sell && buy > neutral {
        Vote::Buy
    } else if sell > buy && sell > neutral {
        Vote::Sell
    } else {
        Vote::Neutral
    };
    let strength = buy.max(sell).max(neutral) as f64 / total as f64;

    AggregateSignal { vote, strength }
}

fn rsi_reading(bars: &[PriceBar]) -> Option<Reading> {
    match calculate_rsi(bars, rsi::DEFAULT_PERIOD).latest()? {
        IndicatorValue::Simple(v) => Some(Reading::Rsi(*v)),
        _ => None,
    }
}

fn macd_reading(bars: &[PriceBar]) -> Option<Reading> {
    let series = calculate_macd(
        bars,
        macd::DEFAULT_FAST,
        macd::DEFAULT_SLOW,
        macd::DEFAULT_SIGNAL,
    );
    match series.latest()? {
        IndicatorValue::Macd { line, signal, .. } => Some(Reading::Macd {
            line: *line,
            signal: *signal,
        }),
        _ => None,
    }
}

fn bollinger_reading(bars: &[PriceBar]) -> Option<Reading> {
    let price = bars.last()?.close;
    match bollinger::calculate_bollinger_default(bars).latest()? {
        IndicatorValue::Bollinger { upper, lower, .. } => Some(Reading::Bollinger {
            price,
            upper: *upper,
            lower: *lower,
        }),
        _ => None,
    }
}

fn ema_trend_reading(bars: &[PriceBar]) -> Option<Reading> {
    let fast = match calculate_ema(bars, EMA_FAST_PERIOD).latest()? {
        IndicatorValue::Simple(v) => *v,
        _ => return None,
    };
    let slow = match calculate_ema(bars, EMA_SLOW_PERIOD).latest()? {
        IndicatorValue::Simple(v) => *v,
        _ => return None,
    };
    Some(Reading::EmaTrend { fast, slow })
}
