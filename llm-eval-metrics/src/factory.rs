use llm_eval_core::{EvalError, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::metric::{Metric, MetricMeta};
use crate::metrics::{
    AggregatedMetric, ContainsMetric, CorpusBleuMetric, EqualsMetric, IsJsonMetric,
    LevenshteinMetric, RegexMetric, RougeMetric, SentenceBleuMetric, SentimentMetric,
};

/// Every tag the factory resolves. Alias tags exist for compatibility with
/// the external provider naming convention and must not be collapsed away;
/// each maps to the same implementation as its canonical tag.
const SUPPORTED_TYPES: &[&str] = &[
    "contains",
    "equals",
    "regex",
    "is_json",
    "levenshtein",
    "sentence_bleu",
    "corpus_bleu",
    "sentiment",
    "rouge",
    "aggregated",
    // provider-compatibility aliases
    "exactmatch",
    "regexmatch",
    "isjson",
    "levenshteinratio",
    "bleu",
];

fn canonical_tag(tag: &str) -> Option<&'static str> {
    match tag {
        "contains" => Some("contains"),
        "equals" | "exactmatch" => Some("equals"),
        "regex" | "regexmatch" => Some("regex"),
        "is_json" | "isjson" => Some("is_json"),
        "levenshtein" | "levenshteinratio" => Some("levenshtein"),
        "sentence_bleu" | "bleu" => Some("sentence_bleu"),
        "corpus_bleu" => Some("corpus_bleu"),
        "sentiment" => Some("sentiment"),
        "rouge" => Some("rouge"),
        "aggregated" => Some("aggregated"),
        _ => None,
    }
}

/// One configurable field of a metric type, for driving dynamic
/// configuration forms. Descriptive only; validation happens inside each
/// metric's `evaluate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFieldInfo {
    pub name: String,
    pub field_type: String,
    pub default: serde_json::Value,
    pub description: String,
}

impl ConfigFieldInfo {
    fn new(
        name: &str,
        field_type: &str,
        default: serde_json::Value,
        description: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            field_type: field_type.to_string(),
            default,
            description: description.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricTypeInfo {
    pub type_tag: String,
    pub name: String,
    pub description: String,
    pub config_schema: Vec<ConfigFieldInfo>,
}

/// Maps a lowercase type tag to a metric constructor.
#[derive(Debug, Clone, Default)]
pub struct MetricFactory;

impl MetricFactory {
    pub fn new() -> Self {
        Self
    }

    pub fn create_metric(
        &self,
        metric_type: &str,
        id: String,
        name: String,
        description: String,
        config: serde_json::Value,
    ) -> Result<Arc<dyn Metric>> {
        let tag = metric_type.to_lowercase();
        let canonical = canonical_tag(&tag)
            .ok_or_else(|| EvalError::UnknownMetricType(metric_type.to_string()))?;

        // An absent config is an empty one.
        let config = if config.is_null() { json!({}) } else { config };
        let meta = MetricMeta::new(id, name, description);

        let metric: Arc<dyn Metric> = match canonical {
            "contains" => Arc::new(ContainsMetric::from_value(meta, config)?),
            "equals" => Arc::new(EqualsMetric::from_value(meta, config)?),
            "regex" => Arc::new(RegexMetric::from_value(meta, config)?),
            "is_json" => Arc::new(IsJsonMetric::from_value(meta, config)?),
            "levenshtein" => Arc::new(LevenshteinMetric::from_value(meta, config)?),
            "sentence_bleu" => Arc::new(SentenceBleuMetric::from_value(meta, config)?),
            "corpus_bleu" => Arc::new(CorpusBleuMetric::from_value(meta, config)?),
            "sentiment" => Arc::new(SentimentMetric::from_value(meta, config)?),
            "rouge" => Arc::new(RougeMetric::from_value(meta, config)?),
            "aggregated" => Arc::new(AggregatedMetric::from_value(meta, config)?),
            _ => unreachable!("canonical_tag only returns registered tags"),
        };

        Ok(metric)
    }

    /// All registered tags, canonical and alias alike.
    pub fn supported_types(&self) -> Vec<&'static str> {
        SUPPORTED_TYPES.to_vec()
    }

    /// Descriptive metadata for every supported tag. Alias tags carry the
    /// schema of their canonical implementation.
    pub fn metric_type_info(&self) -> Vec<MetricTypeInfo> {
        SUPPORTED_TYPES
            .iter()
            .filter_map(|tag| {
                canonical_tag(tag).map(|canonical| {
                    let (name, description, schema) = type_description(canonical);
                    MetricTypeInfo {
                        type_tag: tag.to_string(),
                        name: name.to_string(),
                        description: description.to_string(),
                        config_schema: schema,
                    }
                })
            })
            .collect()
    }
}

fn type_description(canonical: &str) -> (&'static str, &'static str, Vec<ConfigFieldInfo>) {
    match canonical {
        "contains" => (
            "Contains",
            "Checks whether the output contains one or more expected substrings",
            vec![
                ConfigFieldInfo::new(
                    "expectedText",
                    "string[]",
                    json!([]),
                    "Substrings to look for (required, non-empty)",
                ),
                ConfigFieldInfo::new(
                    "caseSensitive",
                    "boolean",
                    json!(false),
                    "Match case-sensitively",
                ),
                ConfigFieldInfo::new(
                    "matchType",
                    "string",
                    json!("any"),
                    "'any' (binary) or 'all' (fractional score)",
                ),
            ],
        ),
        "equals" => (
            "Equals",
            "Exact equality against the expected output after normalization",
            vec![
                ConfigFieldInfo::new("caseSensitive", "boolean", json!(false), "Compare case-sensitively"),
                ConfigFieldInfo::new("trimWhitespace", "boolean", json!(true), "Trim both strings first"),
                ConfigFieldInfo::new(
                    "normalizeWhitespace",
                    "boolean",
                    json!(false),
                    "Collapse internal whitespace runs to single spaces",
                ),
            ],
        ),
        "regex" => (
            "Regex",
            "Matches the output against a regular expression",
            vec![
                ConfigFieldInfo::new("pattern", "string", json!(""), "Pattern to match (required)"),
                ConfigFieldInfo::new("flags", "string", json!("i"), "Flag string, ECMAScript convention"),
                ConfigFieldInfo::new(
                    "matchType",
                    "string",
                    json!("test"),
                    "'test', 'match' or 'matchAll'",
                ),
                ConfigFieldInfo::new(
                    "minMatches",
                    "number",
                    json!(1),
                    "Minimum matches required to pass",
                ),
            ],
        ),
        "is_json" => (
            "Is JSON",
            "Validates the output parses as JSON with an optional shallow schema",
            vec![
                ConfigFieldInfo::new(
                    "strict",
                    "boolean",
                    json!(true),
                    "Require a non-null, non-array JSON object",
                ),
                ConfigFieldInfo::new("allowEmpty", "boolean", json!(false), "Accept an empty output"),
                ConfigFieldInfo::new(
                    "expectedSchema",
                    "object",
                    serde_json::Value::Null,
                    "Map of field name to expected typeof result",
                ),
                ConfigFieldInfo::new("minKeys", "number", json!(0), "Minimum number of top-level keys"),
            ],
        ),
        "levenshtein" => (
            "Levenshtein",
            "Edit-distance similarity against the expected output",
            vec![
                ConfigFieldInfo::new("threshold", "number", json!(0.8), "Similarity required to pass"),
                ConfigFieldInfo::new(
                    "normalize",
                    "boolean",
                    json!(true),
                    "Score 1 - distance/maxLength instead of binary exact match",
                ),
                ConfigFieldInfo::new("caseSensitive", "boolean", json!(false), "Compare case-sensitively"),
                ConfigFieldInfo::new("trimWhitespace", "boolean", json!(true), "Trim both strings first"),
            ],
        ),
        "sentence_bleu" => (
            "Sentence BLEU",
            "Sentence-level BLEU score against the expected output",
            bleu_schema(),
        ),
        "corpus_bleu" => (
            "Corpus BLEU",
            "Corpus-level BLEU with n-gram counts pooled before precision",
            bleu_schema(),
        ),
        "sentiment" => (
            "Sentiment",
            "Lexicon-based sentiment check against an expected polarity",
            vec![
                ConfigFieldInfo::new(
                    "expectedSentiment",
                    "string",
                    json!("positive"),
                    "'positive', 'negative' or 'neutral'",
                ),
                ConfigFieldInfo::new("threshold", "number", json!(0.7), "Score required to pass"),
            ],
        ),
        "rouge" => (
            "ROUGE",
            "ROUGE-1/2/L overlap score against the expected output",
            vec![
                ConfigFieldInfo::new(
                    "rougeType",
                    "string",
                    json!("rouge-1"),
                    "'rouge-1', 'rouge-2' or 'rouge-l'",
                ),
                ConfigFieldInfo::new("beta", "number", json!(1.2), "Recall weight in the F-score"),
                ConfigFieldInfo::new("threshold", "number", json!(0.5), "F-score required to pass"),
            ],
        ),
        "aggregated" => (
            "Aggregated",
            "Combines the scores of several sub-metrics into one",
            vec![
                ConfigFieldInfo::new(
                    "metrics",
                    "object[]",
                    json!([]),
                    "Sub-metric specs: { type, name?, description?, config }",
                ),
                ConfigFieldInfo::new(
                    "aggregationMethod",
                    "string",
                    json!("mean"),
                    "'mean', 'weighted_mean', 'min' or 'max'",
                ),
                ConfigFieldInfo::new(
                    "weights",
                    "number[]",
                    serde_json::Value::Null,
                    "Weights for weighted_mean, one per sub-metric",
                ),
                ConfigFieldInfo::new("threshold", "number", json!(0.5), "Combined score required to pass"),
            ],
        ),
        _ => ("Unknown", "Unknown metric type", vec![]),
    }
}

fn bleu_schema() -> Vec<ConfigFieldInfo> {
    vec![
        ConfigFieldInfo::new(
            "smoothing",
            "boolean",
            json!(true),
            "Substitute an epsilon for zero n-gram precisions",
        ),
        ConfigFieldInfo::new(
            "weights",
            "number[]",
            json!([0.25, 0.25, 0.25, 0.25]),
            "Per-order weights; the length sets the maximum n-gram order",
        ),
        ConfigFieldInfo::new("threshold", "number", json!(0.5), "Score required to pass"),
    ]
}
