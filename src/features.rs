/// Melspectrogram feature extraction
///
/// First pipeline stage: one complete audio frame in, one spectral feature
/// vector out. Pure delegation to the loaded scoring model; a failure is
/// fatal to that frame's processing cycle only.

use tracing::trace;

use crate::audio::AudioFrame;
use crate::models::{InferenceError, InferenceModel};

pub struct FeatureExtractor {
    model: Box<dyn InferenceModel>,
}

impl FeatureExtractor {
    pub fn new(model: Box<dyn InferenceModel>) -> Self {
        Self { model }
    }

    /// Convert a raw audio frame into a spectral feature vector
    pub async fn extract(&mut self, frame: &AudioFrame) -> Result<Vec<f32>, InferenceError> {
        let features = self.model.run(frame.samples()).await?;
        trace!("extracted {} spectral coefficients", features.len());
        Ok(features)
    }
}
