/// Engine configuration
///
/// Immutable snapshot supplied at construction. Mirrors the knobs the
/// pipeline exposes: model directory, keyword list, detection threshold,
/// cooldown, VAD settings, and audio format.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{FRAME_SIZE, SAMPLE_RATE};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no keywords configured")]
    NoKeywords,

    #[error("detection threshold {0} outside [0.0, 1.0]")]
    InvalidThreshold(f32),

    #[error("VAD threshold {0} outside [0.0, 1.0]")]
    InvalidVadThreshold(f32),

    #[error("sample rate must be greater than 0")]
    InvalidSampleRate,

    #[error("frame size must be greater than 0")]
    InvalidFrameSize,
}

/// Configuration for the wake-word engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding the model artifacts (.onnx files)
    pub models_path: PathBuf,

    /// Keyword identifiers to detect, e.g. "hey_jarvis".
    /// Order matters: it breaks score ties between keywords.
    pub keywords: Vec<String>,

    /// Detection confidence threshold (0.0 - 1.0)
    pub detection_threshold: f32,

    /// Minimum interval between two accepted detections of the same keyword
    pub cooldown_ms: u64,

    /// Enable voice-activity detection alongside keyword scoring
    pub enable_vad: bool,

    /// VAD speech-probability threshold (0.0 - 1.0)
    pub vad_threshold: f32,

    /// Capture sample rate in Hz
    pub sample_rate: u32,

    /// Frame size in samples (the atomic unit of inference)
    pub frame_size: usize,

    /// Log every lifecycle transition and detection
    pub debug: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            models_path: PathBuf::from("models"),
            keywords: vec!["hey_jarvis".to_string()],
            detection_threshold: 0.5,
            cooldown_ms: 2000,
            enable_vad: true,
            vad_threshold: 0.5,
            sample_rate: SAMPLE_RATE,
            frame_size: FRAME_SIZE,
            debug: false,
        }
    }
}

impl EngineConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.keywords.is_empty() {
            return Err(ConfigError::NoKeywords);
        }

        if !(0.0..=1.0).contains(&self.detection_threshold) {
            return Err(ConfigError::InvalidThreshold(self.detection_threshold));
        }

        if !(0.0..=1.0).contains(&self.vad_threshold) {
            return Err(ConfigError::InvalidVadThreshold(self.vad_threshold));
        }

        if self.sample_rate == 0 {
            return Err(ConfigError::InvalidSampleRate);
        }

        if self.frame_size == 0 {
            return Err(ConfigError::InvalidFrameSize);
        }

        Ok(())
    }
}
