/// Embedding extraction and temporal context window
///
/// Second pipeline stage: feature vector in, fixed-size embedding out.
/// Embeddings land in a bounded rolling history that gives the keyword
/// classifiers ~6 seconds of temporal context. The history is a fixed-
/// capacity arena with a logical start offset, so steady-state pushes do
/// not reallocate.

use tracing::trace;

use crate::models::{InferenceError, InferenceModel};
use crate::EMBEDDING_WINDOW;

pub struct EmbeddingExtractor {
    model: Box<dyn InferenceModel>,
}

impl EmbeddingExtractor {
    pub fn new(model: Box<dyn InferenceModel>) -> Self {
        Self { model }
    }

    /// Convert a spectral feature vector into an embedding
    pub async fn extract(&mut self, features: &[f32]) -> Result<Vec<f32>, InferenceError> {
        let embedding = self.model.run(features).await?;
        trace!("extracted embedding of dimension {}", embedding.len());
        Ok(embedding)
    }
}

/// Bounded FIFO of the most recent embeddings.
///
/// Invariant: `len() <= capacity`; the oldest entry is evicted once the
/// window is full. Slots are laid out in a fixed arena indexed through a
/// logical start offset.
pub struct EmbeddingHistory {
    slots: Vec<Vec<f32>>,
    capacity: usize,
    start: usize,
    len: usize,
}

impl EmbeddingHistory {
    pub fn new() -> Self {
        Self::with_capacity(EMBEDDING_WINDOW)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "history capacity must be non-zero");
        Self {
            slots: vec![Vec::new(); capacity],
            capacity,
            start: 0,
            len: 0,
        }
    }

    /// Append an embedding, evicting the oldest if the window is full
    pub fn push(&mut self, embedding: Vec<f32>) {
        if self.len < self.capacity {
            let idx = (self.start + self.len) % self.capacity;
            self.slots[idx] = embedding;
            self.len += 1;
        } else {
            self.slots[self.start] = embedding;
            self.start = (self.start + 1) % self.capacity;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True once the temporal context window is complete; keyword
    /// classification is gated on this.
    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    /// Entry by logical index, 0 = oldest
    pub fn get(&self, index: usize) -> Option<&[f32]> {
        if index >= self.len {
            return None;
        }
        let idx = (self.start + index) % self.capacity;
        Some(&self.slots[idx])
    }

    /// The whole window flattened oldest-first, the shape the keyword
    /// classifiers consume.
    pub fn flattened(&self) -> Vec<f32> {
        let per_entry = self.get(0).map_or(0, <[f32]>::len);
        let mut flat = Vec::with_capacity(self.len * per_entry);
        for i in 0..self.len {
            flat.extend_from_slice(self.get(i).unwrap_or(&[]));
        }
        flat
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.clear();
        }
        self.start = 0;
        self.len = 0;
    }
}

impl Default for EmbeddingHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct DoublingModel;

    #[async_trait]
    impl InferenceModel for DoublingModel {
        async fn run(&mut self, input: &[f32]) -> Result<Vec<f32>, InferenceError> {
            Ok(input.iter().map(|v| v * 2.0).collect())
        }
    }

    #[tokio::test]
    async fn test_extractor_delegates() {
        let mut extractor = EmbeddingExtractor::new(Box::new(DoublingModel));
        let embedding = extractor.extract(&[1.0, 2.0, 3.0]).await.unwrap();
        assert_eq!(embedding, vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_history_grows_to_capacity() {
        let mut history = EmbeddingHistory::with_capacity(3);
        assert!(history.is_empty());
        assert!(!history.is_full());

        history.push(vec![1.0]);
        history.push(vec![2.0]);
        assert_eq!(history.len(), 2);
        assert!(!history.is_full());

        history.push(vec![3.0]);
        assert!(history.is_full());
    }

    #[test]
    fn test_history_fifo_eviction() {
        let mut history = EmbeddingHistory::with_capacity(3);
        for v in 1..=3 {
            history.push(vec![v as f32]);
        }

        // Fourth push evicts the first entry
        history.push(vec![4.0]);
        assert_eq!(history.len(), 3);
        assert_eq!(history.get(0), Some(&[2.0][..]));
        assert_eq!(history.get(2), Some(&[4.0][..]));
    }

    #[test]
    fn test_history_never_exceeds_window() {
        let mut history = EmbeddingHistory::new();
        for v in 0..(EMBEDDING_WINDOW + 20) {
            history.push(vec![v as f32]);
        }

        assert_eq!(history.len(), EMBEDDING_WINDOW);
        // Entry 0 was evicted after the 76th push
        assert_eq!(history.get(0), Some(&[20.0][..]));
    }

    #[test]
    fn test_flattened_is_oldest_first() {
        let mut history = EmbeddingHistory::with_capacity(2);
        history.push(vec![1.0, 1.5]);
        history.push(vec![2.0, 2.5]);
        history.push(vec![3.0, 3.5]); // evicts [1.0, 1.5]

        assert_eq!(history.flattened(), vec![2.0, 2.5, 3.0, 3.5]);
    }

    #[test]
    fn test_clear_resets_window() {
        let mut history = EmbeddingHistory::with_capacity(2);
        history.push(vec![1.0]);
        history.push(vec![2.0]);
        history.clear();

        assert!(history.is_empty());
        assert_eq!(history.get(0), None);

        history.push(vec![9.0]);
        assert_eq!(history.get(0), Some(&[9.0][..]));
    }
}
