/// Per-keyword classification
///
/// One classifier per registered keyword. Each scoring pass consumes the
/// full embedding-history window flattened oldest-first and yields a
/// confidence in [0, 1]. Cooldown bookkeeping lives in the engine; the
/// classifier itself is a pure delegation to its model.

use tracing::trace;

use crate::embedding::EmbeddingHistory;
use crate::models::{InferenceError, InferenceModel};

pub struct KeywordClassifier {
    keyword: String,
    model: Box<dyn InferenceModel>,
}

impl KeywordClassifier {
    pub fn new(keyword: impl Into<String>, model: Box<dyn InferenceModel>) -> Self {
        Self {
            keyword: keyword.into(),
            model,
        }
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// Score the temporal context window. The caller guarantees the
    /// history is full.
    pub async fn classify(&mut self, history: &EmbeddingHistory) -> Result<f32, InferenceError> {
        debug_assert!(history.is_full(), "classification requires a full window");

        let window = history.flattened();
        let output = self.model.run(&window).await?;
        let score = output.first().copied().ok_or(InferenceError::EmptyOutput)?;

        let score = score.clamp(0.0, 1.0);
        trace!("keyword '{}' scored {:.3}", self.keyword, score);
        Ok(score)
    }
}
