use crate::models::{round_to, Sentiment, SentimentResult};

const BULLISH_STRONG: &[&str] = &[
    "surge", "soar", "rocket", "rally", "boom", "breakout", "record high", "all-time high",
    "fresh record", "new high", "strong gains", "sharp rise", "significant increase",
];

const BULLISH_MODERATE: &[&str] = &[
    "rise", "gain", "higher", "up", "climb", "advance", "increase", "bullish", "positive", "growth",
    "demand", "strength", "support", "upward", "momentum", "recovery", "rebound",
];

const BEARISH_STRONG: &[&str] = &[
    "crash", "plunge", "collapse", "tumble", "slump", "plummet", "sharp decline",
    "significant drop", "heavy losses", "sell-off", "selloff",
];

const BEARISH_MODERATE: &[&str] = &[
    "fall", "drop", "lower", "down", "decline", "decrease", "slip", "bearish", "negative", "weak",
    "weakness", "pressure", "concern", "downward", "retreat", "pullback", "correction",
];

const NEUTRAL_MARKERS: &[&str] = &[
    "steady", "stable", "flat", "unchanged", "consolidate", "sideways", "range-bound", "mixed",
    "await", "hold",
];

const UNCERTAINTY_MARKERS: &[&str] = &[
    "may", "might", "could", "uncertain", "unclear", "mixed signals", "volatility", "volatile",
    "fluctuate",
];

const NEGATIONS: &[&str] = &["not", "no", "never", "without", "lack"];

const STRONG_WEIGHT: f64 = 3.0;
const MODERATE_WEIGHT: f64 = 1.0;
const SCORE_SCALE: f64 = 10.0;
const NEUTRAL_BAND: f64 = 0.2;

/// Weighted keyword scorer for market news text.
///
/// Matching is case-insensitive substring matching; each keyword counts once no
/// matter how often it occurs. A negation word anywhere in the text flips the sign
/// of every contribution.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordSentimentScorer;

impl KeywordSentimentScorer {
    pub fn new() -> Self {
        KeywordSentimentScorer
    }

    pub fn analyze(&self, text: &str) -> SentimentResult {
        if text.trim().is_empty() {
            return SentimentResult {
                sentiment: Sentiment::Neutral,
                score: 0.0,
                confidence: 0.0,
                keywords: Vec::new(),
            };
        }

        let lower = text.to_lowercase();
        let negated = lower
            .split_whitespace()
            .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()))
            .any(|word| NEGATIONS.contains(&word));
        let sign = if negated { -1.0 } else { 1.0 };

        let mut raw_score = 0.0;
        let mut keywords = Vec::new();

        let groups: [(&[&str], f64, &str); 4] = [
            (BULLISH_STRONG, STRONG_WEIGHT, "+++"),
            (BULLISH_MODERATE, MODERATE_WEIGHT, "+"),
            (BEARISH_STRONG, -STRONG_WEIGHT, "---"),
            (BEARISH_MODERATE, -MODERATE_WEIGHT, "-"),
        ];
        for (words, weight, marker) in groups {
            for word in words.iter().filter(|w| lower.contains(**w)) {
                raw_score += weight * sign;
                keywords.push(format!("{} {}", marker, word));
            }
        }

        let neutral_count = count_matches(&lower, NEUTRAL_MARKERS);
        if neutral_count > 0 {
            keywords.push(format!("= neutral ({})", neutral_count));
        }
        let uncertainty_count = count_matches(&lower, UNCERTAINTY_MARKERS);

        let score = (raw_score / SCORE_SCALE).clamp(-1.0, 1.0);
        let keyword_strength = (keywords.len() as f64 / 5.0).min(1.0);
        let confidence = (keyword_strength - 0.1 * uncertainty_count as f64).clamp(0.0, 1.0);

        let sentiment = if score.abs() < NEUTRAL_BAND || neutral_count >= 2 {
            Sentiment::Neutral
        } else if score > 0.0 {
            Sentiment::Bullish
        } else {
            Sentiment::Bearish
        };

        SentimentResult {
            sentiment,
            score: round_to(score, 2),
            confidence: round_to(confidence, 2),
            keywords,
        }
    }
}

fn count_matches(text: &str, markers: &[&str]) -> usize {
    markers.iter().filter(|m| text.contains(**m)).count()
}

/// Descriptive label for a normalized score.
pub fn strength_label(score: f64) -> &'static str {
    if score >= 0.6 {
        "VERY BULLISH"
    } else if score >= 0.2 {
        "BULLISH"
    } else if score <= -0.6 {
        "VERY BEARISH"
    } else if score <= -0.2 {
        "BEARISH"
    } else {
        "NEUTRAL"
    }
}
