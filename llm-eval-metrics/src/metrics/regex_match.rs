use async_trait::async_trait;
use llm_eval_core::{EvalError, EvaluationContext, MetricResult, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;

use crate::metric::{finish, Metric, MetricMeta};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RegexMatchType {
    #[serde(rename = "test")]
    Test,
    #[serde(rename = "match")]
    Match,
    #[serde(rename = "matchAll")]
    MatchAll,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegexConfig {
    pub pattern: String,
    pub flags: String,
    pub match_type: RegexMatchType,
    pub min_matches: usize,
}

impl Default for RegexConfig {
    fn default() -> Self {
        Self {
            pattern: String::new(),
            flags: "i".to_string(),
            match_type: RegexMatchType::Test,
            min_matches: 1,
        }
    }
}

/// Pattern matching over the output.
///
/// Flags are accepted in the upstream (ECMAScript-style) convention and
/// translated to inline groups; `g`, `u` and `y` carry no meaning here since
/// `find_iter` already matches globally. A syntactically invalid pattern is a
/// configuration error, distinct from a pattern that simply does not match.
#[derive(Debug, Clone)]
pub struct RegexMetric {
    meta: MetricMeta,
    config: RegexConfig,
}

impl RegexMetric {
    pub fn new(meta: MetricMeta, config: RegexConfig) -> Self {
        Self { meta, config }
    }

    pub fn from_value(meta: MetricMeta, config: serde_json::Value) -> Result<Self> {
        let config: RegexConfig = serde_json::from_value(config)?;
        Ok(Self::new(meta, config))
    }

    fn compile(&self) -> Result<Regex> {
        let inline: String = self
            .config
            .flags
            .chars()
            .filter(|c| matches!(c, 'i' | 'm' | 's' | 'x'))
            .collect();

        let pattern = if inline.is_empty() {
            self.config.pattern.clone()
        } else {
            format!("(?{}){}", inline, self.config.pattern)
        };

        Regex::new(&pattern).map_err(|e| EvalError::InvalidRegex(e.to_string()))
    }
}

#[async_trait]
impl Metric for RegexMetric {
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

        if self.config.pattern.is_empty() {
            return Err(EvalError::Config(
                "regex metric requires a pattern".to_string(),
            ));
        }

        // Compile before any matching so broken patterns surface as errors
        // regardless of match type.
        let regex = self.compile()?;

        let (score, passed, match_count) = match self.config.match_type {
            RegexMatchType::Test => {
                let matched = regex.is_match(&context.output);
                (if matched { 1.0 } else { 0.0 }, matched, usize::from(matched))
            }
            RegexMatchType::Match => {
                let count = usize::from(regex.find(&context.output).is_some());
                let passed = count >= self.config.min_matches;
                (if passed { 1.0 } else { 0.0 }, passed, count)
            }
            RegexMatchType::MatchAll => {
                let count = regex.find_iter(&context.output).count();
                let passed = count >= self.config.min_matches;
                let score = if self.config.min_matches == 0 {
                    1.0
                } else {
                    (count as f64 / self.config.min_matches as f64).min(1.0)
                };
                (score, passed, count)
            }
        };

        let effective_flags = match self.config.match_type {
            RegexMatchType::MatchAll if !self.config.flags.contains('g') => {
                format!("{}g", self.config.flags)
            }
            _ => self.config.flags.clone(),
        };

        let details = json!({
            "pattern": self.config.pattern,
            "flags": effective_flags,
            "matchType": self.config.match_type,
            "matchCount": match_count,
            "minMatches": self.config.min_matches,
        });

        Ok(finish(MetricResult::new(score, passed, details), start))
    }
}
