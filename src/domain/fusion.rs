//! Fusion of the technical aggregate vote with an external sentiment score.

use crate::domain::signal::{AggregateSignal, Vote};

pub const SENTIMENT_BUY_THRESHOLD: f64 = 0.2;
pub const SENTIMENT_SELL_THRESHOLD: f64 = -0.2;
pub const DECISION_THRESHOLD: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusedDecision {
    pub vote: Vote,
    pub confidence: f64,
}

/// Non-finite scores count as Neutral.
pub fn sentiment_vote(sentiment: f64) -> Vote {
    if sentiment > SENTIMENT_BUY_THRESHOLD {
        Vote::Buy
    } else if sentiment < SENTIMENT_SELL_THRESHOLD {
        Vote::Sell
    } else {
        Vote::Neutral
    }
}

/// Average of the sentiment vote and the technical vote, each mapped to {-1, 0, +1}.
pub fn combined_score(aggregate: &AggregateSignal, sentiment: f64) -> f64 {
    (sentiment_vote(sentiment).score() + aggregate.vote.score()) / 2.0
}

pub fn fuse(aggregate: &AggregateSignal, sentiment: f64) -> FusedDecision {
    let score = combined_score(aggregate, sentiment);
    let vote = if score > DECISION_THRESHOLD {
        Vote::Buy
    } else if score < -DECISION_THRESHOLD {
        Vote::Sell
    } else {
        Vote::Neutral
    };
    FusedDecision {
        vote,
        confidence: score.abs(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn agg(vote: Vote, strength: f64) -> AggregateSignal {
        AggregateSignal { vote, strength }
    }

    #[test]
    fn buy_with_positive_sentiment_is_full_confidence_buy() {
        let decision = fuse(&agg(Vote::Buy, 0.75), 0.5);
        assert_eq!(decision.vote, Vote::Buy);
        assert!((decision.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sell_with_neutral_sentiment_is_half_confidence_sell() {
        let decision = fuse(&agg(Vote::Sell, 0.5), 0.0);
        assert_eq!(decision.vote, Vote::Sell);
        assert!((decision.confidence - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn opposing_votes_cancel_out() {
        let decision = fuse(&agg(Vote::Buy, 1.0), -0.9);
        assert_eq!(decision.vote, Vote::Neutral);
        assert!(decision.confidence.abs() < f64::EPSILON);
    }

    #[test]
    fn sentiment_vote_carries_neutral_technicals() {
        let decision = fuse(&agg(Vote::Neutral, 0.5), 1.0);
        assert_eq!(decision.vote, Vote::Buy);
        assert!((decision.confidence - 0.5).abs() < f64::EPSILON);

        let decision = fuse(&agg(Vote::Neutral, 0.5), 0.1);
        assert_eq!(decision.vote, Vote::Neutral);
    }

    #[test]
    fn sentiment_thresholds_are_exclusive() {
        assert_eq!(sentiment_vote(0.2), Vote::Neutral);
        assert_eq!(sentiment_vote(0.2001), Vote::Buy);
        assert_eq!(sentiment_vote(-0.2), Vote::Neutral);
        assert_eq!(sentiment_vote(-0.2001), Vote::Sell);
    }

    #[test]
    fn nan_sentiment_is_neutral() {
        assert_eq!(sentiment_vote(f64::NAN), Vote::Neutral);
    }

    fn vote_strategy() -> impl Strategy<Value = Vote> {
        prop_oneof![Just(Vote::Buy), Just(Vote::Sell), Just(Vote::Neutral)]
    }

    proptest! {
        #[test]
        fn fuse_is_deterministic(
            vote in vote_strategy(),
            strength in 0.0f64..=1.0,
            sentiment in -1.0f64..=1.0,
        ) {
            let aggregate = agg(vote, strength);
            prop_assert_eq!(fuse(&aggregate, sentiment), fuse(&aggregate, sentiment));
        }

        #[test]
        fn confidence_is_abs_combined_score_in_unit_range(
            vote in vote_strategy(),
            strength in 0.0f64..=1.0,
            sentiment in -1.0f64..=1.0,
        ) {
            let aggregate = agg(vote, strength);
            let decision = fuse(&aggregate, sentiment);
            prop_assert!((0.0..=1.0).contains(&decision.confidence));
            prop_assert_eq!(decision.confidence, combined_score(&aggregate, sentiment).abs());
        }
    }
}
