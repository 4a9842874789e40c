use async_trait::async_trait;
use llm_eval_core::{EvaluationContext, MetricResult, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;

use crate::metric::{finish, tokenize, Metric, MetricMeta};

const POSITIVE_WORDS: &[&str] = &[
    "good", "great", "excellent", "amazing", "wonderful", "fantastic", "positive", "happy",
    "love", "best", "perfect", "awesome", "brilliant", "delight", "success",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bad", "terrible", "awful", "horrible", "negative", "sad", "hate", "worst", "poor",
    "wrong", "fail", "broken", "disappointing", "useless", "angry",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SentimentConfig {
    pub expected_sentiment: Sentiment,
    pub threshold: f64,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            expected_sentiment: Sentiment::Positive,
            threshold: 0.7,
        }
    }
}

/// Lexicon-based sentiment check.
///
/// A word counts as a lexicon hit via substring containment, not exact token
/// match ("loved" hits "love"). With no sentiment words at all the raw score
/// defaults to the neutral 0.5.
#[derive(Debug, Clone)]
pub struct SentimentMetric {
    meta: MetricMeta,
    config: SentimentConfig,
}

impl SentimentMetric {
    pub fn new(meta: MetricMeta, config: SentimentConfig) -> Self {
        Self { meta, config }
    }

    pub fn from_value(meta: MetricMeta, config: serde_json::Value) -> Result<Self> {
        let config: SentimentConfig = serde_json::from_value(config)?;
        Ok(Self::new(meta, config))
    }
}

#[async_trait]
impl Metric for SentimentMetric {
    fn id(&self) -> &str {
        &self.meta.id
    }

    fn name(&self) -> &str {
        &self.meta.name
    }

    fn description(&self) -> &str {
        &self.meta.description
    }

    fn config(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or(serde_json::Value::Null)
    }

    async fn evaluate(&self, context: &EvaluationContext) -> Result<MetricResult> {
        let start = Instant::now();

        let words = tokenize(&context.output);
        let positive_count = words
            .iter()
            .filter(|word| POSITIVE_WORDS.iter().any(|entry| word.contains(entry)))
            .count();
        let negative_count = words
            .iter()
            .filter(|word| NEGATIVE_WORDS.iter().any(|entry| word.contains(entry)))
            .count();

        let sentiment_score = if positive_count + negative_count > 0 {
            positive_count as f64 / (positive_count + negative_count) as f64
        } else {
            0.5
        };

        let detected = if sentiment_score > 0.6 {
            Sentiment::Positive
        } else if sentiment_score < 0.4 {
            Sentiment::Negative
        } else {
            Sentiment::Neutral
        };

        let score = if detected == self.config.expected_sentiment {
            sentiment_score
        } else {
            1.0 - sentiment_score
        };
        let passed = score >= self.config.threshold;

        let details = json!({
            "sentimentScore": sentiment_score,
            "detectedSentiment": detected,
            "expectedSentiment": self.config.expected_sentiment,
            "positiveCount": positive_count,
            "negativeCount": negative_count,
            "threshold": self.config.threshold,
        });

        Ok(finish(MetricResult::new(score, passed, details), start))
    }
}
