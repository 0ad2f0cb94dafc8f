//! Sentiment suppliers backed by a CSV score file or a fixed value.

use crate::adapters::csv_adapter::parse_timestamp;
use crate::domain::error::SentitraderError;
use crate::ports::sentiment_port::{SentimentError, SentimentPort, SentimentWindow, check_score};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::Path;

/// Scores read once from a `timestamp,score` CSV file.
///
/// A lookup returns the latest score inside the requested window. The file
/// holds a single asset's history, so the asset name is not consulted.
#[derive(Debug, Clone)]
pub struct CsvSentimentAdapter {
    scores: Vec<(DateTime<Utc>, f64)>,
}

impl CsvSentimentAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SentitraderError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| SentitraderError::DataSource {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        Self::from_csv(&content)
    }

    pub fn from_csv(content: &str) -> Result<Self, SentitraderError> {
        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut scores = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| SentitraderError::DataSource {
                reason: format!("sentiment CSV parse error: {}", e),
            })?;
            let ts_str = record.get(0).unwrap_or_default();
            let timestamp =
                parse_timestamp(ts_str).ok_or_else(|| SentitraderError::DataSource {
                    reason: format!("invalid sentiment timestamp: {}", ts_str),
                })?;
            let score_str = record.get(1).unwrap_or_default().trim();
            let score: f64 = score_str.parse().map_err(|_| SentitraderError::DataSource {
                reason: format!("invalid sentiment score: {}", score_str),
            })?;
            scores.push((timestamp, score));
        }

        scores.sort_by_key(|(ts, _)| *ts);
        Ok(Self { scores })
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    fn latest_in(&self, window: &SentimentWindow) -> Option<f64> {
        let upto = self.scores.partition_point(|(ts, _)| *ts <= window.end);
        let (ts, score) = self.scores[..upto].last()?;
        window.contains(*ts).then_some(*score)
    }
}

#[async_trait]
impl SentimentPort for CsvSentimentAdapter {
    async fn get_sentiment(
        &self,
        asset: &str,
        window: SentimentWindow,
    ) -> Result<f64, SentimentError> {
        let score = self
            .latest_in(&window)
            .ok_or_else(|| SentimentError::Unavailable {
                reason: format!(
                    "no {} score between {} and {}",
                    asset,
                    window.start(),
                    window.end
                ),
            })?;
        check_score(score)
    }
}

/// Returns the same score for every request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantSentiment(pub f64);

impl ConstantSentiment {
    pub fn neutral() -> Self {
        ConstantSentiment(0.0)
    }
}

#[async_trait]
impl SentimentPort for ConstantSentiment {
    async fn get_sentiment(
        &self,
        _asset: &str,
        _window: SentimentWindow,
    ) -> Result<f64, SentimentError> {
        check_score(self.0)
    }
}
