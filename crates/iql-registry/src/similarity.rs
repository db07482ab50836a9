//! Approximate-match lookups for free-text argument values

use async_trait::async_trait;
use thiserror::Error;

/// Minimum Jaro-Winkler score for [`ChoiceIndex`] to accept a candidate
const DEFAULT_THRESHOLD: f64 = 0.85;

#[derive(Debug, Error)]
pub enum SimilarityError {
    #[error("Similarity index {index} unavailable: {message}")]
    Unavailable { index: String, message: String },
}

/// Store that maps a free-text literal to the closest known value.
///
/// Lookups are pure reads. Timeouts and cancellation belong to the
/// implementation; the parser never retries a failed lookup.
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    /// Name used in logs and error messages
    fn name(&self) -> &str;

    /// Closest known value for `text`, or `None` when nothing is close enough
    async fn similar(&self, text: &str) -> Result<Option<String>, SimilarityError>;
}

/// In-memory index over a fixed list of allowed values
#[derive(Debug, Clone)]
pub struct ChoiceIndex {
    name: String,
    choices: Vec<String>,
    threshold: f64,
}

impl ChoiceIndex {
    pub fn new(name: impl Into<String>, choices: Vec<String>) -> Self {
        Self {
            name: name.into(),
            choices,
            threshold: DEFAULT_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    fn best_match(&self, text: &str) -> Option<&str> {
        let needle = normalize(text);
        let mut best: Option<(&str, f64)> = None;
        for choice in &self.choices {
            let score = strsim::jaro_winkler(&needle, &normalize(choice));
            if score < self.threshold {
                continue;
            }
            // Ties keep the earlier choice
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((choice.as_str(), score));
            }
        }
        best.map(|(choice, _)| choice)
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[async_trait]
impl SimilarityIndex for ChoiceIndex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn similar(&self, text: &str) -> Result<Option<String>, SimilarityError> {
        Ok(self.best_match(text).map(str::to_string))
    }
}
