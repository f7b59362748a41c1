/// Wake-word engine library
///
/// Streaming audio-to-inference pipeline: raw samples are accumulated into
/// fixed 80ms frames, turned into melspectrogram features and embeddings,
/// and scored by per-keyword classifiers over a rolling temporal context
/// window, with optional voice-activity detection on the same frames.

pub mod audio;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod events;
pub mod features;
pub mod keyword;
pub mod models;
pub mod vad;

// Re-export main types
pub use audio::{pcm_to_f32, AudioFrame, FrameAccumulator};
pub use config::{ConfigError, EngineConfig};
pub use embedding::{EmbeddingExtractor, EmbeddingHistory};
pub use engine::{EngineError, EngineStatus, Lifecycle, WakeWordEngine};
pub use events::{DetectionResult, EngineEvent, EventDispatcher, ListenerId};
pub use features::FeatureExtractor;
pub use keyword::KeywordClassifier;
pub use models::{InferenceError, InferenceModel, ModelError, ModelLoader, ModelRegistry};
pub use vad::{VadSnapshot, VadTransition, VoiceActivityDetector};

/// Default capture sample rate (Hz)
pub const SAMPLE_RATE: u32 = 16_000;

/// Default frame size: 80ms at 16kHz
pub const FRAME_SIZE: usize = 1_280;

/// Temporal context window: number of embeddings the keyword classifiers
/// consume per scoring pass (~6 seconds of audio at 80ms per frame)
pub const EMBEDDING_WINDOW: usize = 75;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
