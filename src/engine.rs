/// Wake-word engine orchestrator
///
/// Owns every pipeline component and the model handles, exposes the
/// per-chunk processing entry point, and walks the lifecycle
/// uninitialized -> initializing -> ready -> listening <-> stopped ->
/// disposed. Frames are processed strictly in arrival order; callers
/// serialize `process_audio` externally (there is no internal locking).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::audio::{pcm_to_f32, AudioFrame, AudioSample, FrameAccumulator};
use crate::config::{ConfigError, EngineConfig};
use crate::embedding::{EmbeddingExtractor, EmbeddingHistory};
use crate::events::{
    current_timestamp_micros, DetectionResult, EngineEvent, EventDispatcher, ListenerId,
};
use crate::features::FeatureExtractor;
use crate::keyword::KeywordClassifier;
use crate::models::{default_loader, ModelError, ModelLoader, ModelRegistry};
use crate::vad::{VadSnapshot, VadTransition, VoiceActivityDetector};
use crate::EMBEDDING_WINDOW;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("engine not initialized (or already disposed)")]
    NotInitialized,

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Engine lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Initializing,
    Ready,
    Listening,
    Stopped,
    Disposed,
}

/// Diagnostic snapshot returned by `status()`; reading it never mutates
/// engine state.
#[derive(Debug, Clone)]
pub struct EngineStatus {
    pub initialized: bool,
    pub listening: bool,
    pub models: std::collections::BTreeMap<String, bool>,
    pub vad: VadSnapshot,
    pub frames_processed: u64,
    pub detections: u64,
}

pub struct WakeWordEngine {
    config: EngineConfig,
    loader: Box<dyn ModelLoader>,
    registry: ModelRegistry,
    lifecycle: Lifecycle,
    accumulator: FrameAccumulator,
    features: Option<FeatureExtractor>,
    embedding: Option<EmbeddingExtractor>,
    history: EmbeddingHistory,
    vad: Option<VoiceActivityDetector>,
    classifiers: Vec<KeywordClassifier>,
    cooldowns: HashMap<String, Instant>,
    dispatcher: EventDispatcher,
    frames_processed: u64,
    detections: u64,
}

impl WakeWordEngine {
    /// Create an engine with the default model loader (ONNX when the
    /// `onnx` feature is enabled).
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        Self::with_loader(config, default_loader())
    }

    /// Create an engine with an explicit model loader (tests inject mocks
    /// through this).
    pub fn with_loader(
        config: EngineConfig,
        loader: Box<dyn ModelLoader>,
    ) -> Result<Self, EngineError> {
        config.validate()?;

        debug!(
            "creating engine: keywords={:?}, threshold={}, vad={}",
            config.keywords, config.detection_threshold, config.enable_vad
        );

        let registry = ModelRegistry::new(config.models_path.clone());
        let accumulator = FrameAccumulator::new(config.frame_size);

        Ok(Self {
            config,
            loader,
            registry,
            lifecycle: Lifecycle::Uninitialized,
            accumulator,
            features: None,
            embedding: None,
            history: EmbeddingHistory::with_capacity(EMBEDDING_WINDOW),
            vad: None,
            classifiers: Vec::new(),
            cooldowns: HashMap::new(),
            dispatcher: EventDispatcher::new(),
            frames_processed: 0,
            detections: 0,
        })
    }

    /// Resolve and load every model. Required models (melspectrogram,
    /// embedding, each keyword) fail hard; a missing or rejected VAD model
    /// only disables VAD with a warning. Idempotent once initialized.
    pub async fn initialize(&mut self) -> Result<(), EngineError> {
        match self.lifecycle {
            Lifecycle::Ready | Lifecycle::Listening | Lifecycle::Stopped => {
                debug!("initialize() called on an initialized engine, no-op");
                return Ok(());
            }
            Lifecycle::Uninitialized | Lifecycle::Disposed => {}
            Lifecycle::Initializing => return Ok(()),
        }

        self.lifecycle = Lifecycle::Initializing;
        self.log_transition("initializing");

        match self.load_models() {
            Ok(()) => {}
            Err(e) => {
                // No partial-ready state: back to square one
                self.lifecycle = Lifecycle::Uninitialized;
                self.features = None;
                self.embedding = None;
                self.vad = None;
                self.classifiers.clear();
                self.registry.clear();
                return Err(e);
            }
        }

        self.lifecycle = Lifecycle::Ready;
        self.log_transition("ready");
        self.dispatcher.emit(&EngineEvent::Ready);
        Ok(())
    }

    fn load_models(&mut self) -> Result<(), EngineError> {
        let mel_path = self.registry.resolve_melspectrogram()?;
        let mel = self.loader.load("melspectrogram", &mel_path)?;
        self.features = Some(FeatureExtractor::new(mel));
        self.registry.mark("melspectrogram", true);

        let embed_path = self.registry.resolve_embedding()?;
        let embed = self.loader.load("embedding", &embed_path)?;
        self.embedding = Some(EmbeddingExtractor::new(embed));
        self.registry.mark("embedding", true);

        self.classifiers.clear();
        let keywords = self.config.keywords.clone();
        for keyword in &keywords {
            let path = self.registry.resolve_keyword(keyword)?;
            let model = self.loader.load(keyword, &path)?;
            self.classifiers
                .push(KeywordClassifier::new(keyword.clone(), model));
            self.registry.mark(keyword, true);
        }

        if self.config.enable_vad {
            let loaded = self
                .registry
                .resolve_vad()
                .and_then(|path| self.loader.load("vad", &path));
            match loaded {
                Ok(model) => {
                    self.vad = Some(VoiceActivityDetector::new(
                        model,
                        self.config.vad_threshold,
                    ));
                    self.registry.mark("vad", true);
                }
                Err(e) => {
                    warn!("VAD model unavailable, continuing without VAD: {e}");
                    self.vad = None;
                    self.registry.mark("vad", false);
                }
            }
        }

        Ok(())
    }

    /// Begin accepting frames
    pub fn start(&mut self) -> Result<(), EngineError> {
        match self.lifecycle {
            Lifecycle::Ready | Lifecycle::Stopped => {
                self.lifecycle = Lifecycle::Listening;
                self.log_transition("listening");
                Ok(())
            }
            Lifecycle::Listening => Ok(()),
            _ => Err(EngineError::NotInitialized),
        }
    }

    /// Stop accepting frames; models stay loaded
    pub fn stop(&mut self) -> Result<(), EngineError> {
        match self.lifecycle {
            Lifecycle::Listening | Lifecycle::Ready => {
                self.lifecycle = Lifecycle::Stopped;
                self.log_transition("stopped");
                Ok(())
            }
            Lifecycle::Stopped => Ok(()),
            _ => Err(EngineError::NotInitialized),
        }
    }

    /// Single per-chunk entry point for 16-bit PCM input
    pub async fn process_audio_pcm(
        &mut self,
        samples: &[AudioSample],
    ) -> Result<Option<DetectionResult>, EngineError> {
        let converted = pcm_to_f32(samples);
        self.process_audio(&converted).await
    }

    /// Single per-chunk entry point: accumulate samples and run the full
    /// pipeline on every completed frame. Returns the best qualifying
    /// detection of the call (also emitted to listeners). Per-frame
    /// inference failures never surface here; they appear only as `Error`
    /// events.
    pub async fn process_audio(
        &mut self,
        samples: &[f32],
    ) -> Result<Option<DetectionResult>, EngineError> {
        match self.lifecycle {
            Lifecycle::Uninitialized | Lifecycle::Initializing | Lifecycle::Disposed => {
                return Err(EngineError::NotInitialized);
            }
            Lifecycle::Ready | Lifecycle::Stopped => {
                // Not listening: frames are not accepted
                return Ok(None);
            }
            Lifecycle::Listening => {}
        }

        let frames = self.accumulator.push(samples);
        let mut best: Option<DetectionResult> = None;

        for frame in frames {
            let detection = self.process_frame(&frame).await;
            self.frames_processed += 1;

            if self.frames_processed % 1000 == 0 {
                debug!(
                    "processed {} frames, {} detection(s) so far",
                    self.frames_processed, self.detections
                );
            }

            if let Some(d) = detection {
                let better = best.as_ref().map_or(true, |b| d.score > b.score);
                if better {
                    best = Some(d);
                }
            }
        }

        Ok(best)
    }

    /// One full pipeline pass over a complete frame. The embedding branch
    /// and the VAD branch read the same frame independently; a failure in
    /// one never blocks the other.
    async fn process_frame(&mut self, frame: &AudioFrame) -> Option<DetectionResult> {
        // Feature -> embedding -> history (strict dependency chain)
        match self.extract_embedding(frame).await {
            Ok(Some(embedding)) => self.history.push(embedding),
            Ok(None) => {}
            Err((component, message)) => {
                warn!("{component} failed for this frame: {message}");
                self.dispatcher
                    .emit(&EngineEvent::Error { component, message });
            }
        }

        // VAD branch: best-effort, same raw frame
        if let Some(vad) = &mut self.vad {
            match vad.update(frame).await {
                Ok((snapshot, VadTransition::SpeechStart)) => {
                    self.dispatcher.emit(&EngineEvent::SpeechStart(snapshot));
                }
                Ok((snapshot, VadTransition::SpeechEnd)) => {
                    self.dispatcher.emit(&EngineEvent::SpeechEnd(snapshot));
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("VAD scoring failed for this frame: {e}");
                    self.dispatcher.emit(&EngineEvent::Error {
                        component: "vad",
                        message: e.to_string(),
                    });
                }
            }
        }

        // Classification is gated until the temporal context window is full
        if !self.history.is_full() {
            return None;
        }

        self.classify_frame().await
    }

    async fn extract_embedding(
        &mut self,
        frame: &AudioFrame,
    ) -> Result<Option<Vec<f32>>, (&'static str, String)> {
        let features = match &mut self.features {
            Some(f) => f
                .extract(frame)
                .await
                .map_err(|e| ("features", e.to_string()))?,
            None => return Ok(None),
        };

        let embedding = match &mut self.embedding {
            Some(e) => e
                .extract(&features)
                .await
                .map_err(|e| ("embedding", e.to_string()))?,
            None => return Ok(None),
        };

        Ok(Some(embedding))
    }

    /// Run every off-cooldown keyword classifier over the current window
    /// and emit at most one detection: the highest qualifying score, ties
    /// broken by registration order.
    async fn classify_frame(&mut self) -> Option<DetectionResult> {
        let now = Instant::now();
        let cooldown = Duration::from_millis(self.config.cooldown_ms);
        let threshold = self.config.detection_threshold;

        let mut best: Option<(usize, f32)> = None;

        for (idx, classifier) in self.classifiers.iter_mut().enumerate() {
            let keyword = classifier.keyword().to_string();

            if let Some(last) = self.cooldowns.get(&keyword) {
                if now.duration_since(*last) < cooldown {
                    continue;
                }
            }

            let score = match classifier.classify(&self.history).await {
                Ok(score) => score,
                Err(e) => {
                    warn!("keyword '{keyword}' scoring failed: {e}");
                    self.dispatcher.emit(&EngineEvent::Error {
                        component: "keyword",
                        message: format!("{keyword}: {e}"),
                    });
                    continue;
                }
            };

            if score < threshold {
                continue;
            }

            // Every qualifying keyword enters cooldown, not just the
            // winner: a losing keyword must not fire one frame later on
            // the same utterance.
            self.cooldowns.insert(keyword, now);

            // Strict greater-than keeps the first-registered keyword on ties
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((idx, score));
            }
        }

        let (idx, score) = best?;
        let keyword = self.classifiers[idx].keyword().to_string();

        self.detections += 1;

        let result = DetectionResult {
            keyword,
            score,
            timestamp_micros: current_timestamp_micros(),
            frame_index: self.frames_processed,
        };

        if self.config.debug {
            info!(
                "detected '{}' (score {:.3}, frame {})",
                result.keyword, result.score, result.frame_index
            );
        } else {
            debug!("detected '{}' (score {:.3})", result.keyword, result.score);
        }

        self.dispatcher.emit(&EngineEvent::Detection(result.clone()));
        Some(result)
    }

    /// Register an event listener
    pub fn on<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(&EngineEvent) + Send + 'static,
    {
        self.dispatcher.on(listener)
    }

    /// Unregister an event listener
    pub fn off(&mut self, id: ListenerId) -> bool {
        self.dispatcher.off(id)
    }

    /// Clear all rolling state (accumulator remainder, embedding history,
    /// cooldowns, VAD segment, counters) without unloading models.
    pub fn reset(&mut self) {
        self.accumulator.clear();
        self.history.clear();
        self.cooldowns.clear();
        if let Some(vad) = &mut self.vad {
            vad.reset();
        }
        self.frames_processed = 0;
        self.detections = 0;
        debug!("engine state reset");
    }

    /// Release all model handles and rolling state. Callers must ensure no
    /// frame is mid-processing. Any further processing call fails with
    /// `NotInitialized`; `initialize()` may be called again to reload.
    pub fn dispose(&mut self) {
        self.features = None;
        self.embedding = None;
        self.vad = None;
        self.classifiers.clear();
        self.history.clear();
        self.accumulator.clear();
        self.cooldowns.clear();
        self.registry.clear();
        self.lifecycle = Lifecycle::Disposed;
        self.log_transition("disposed");
    }

    /// Diagnostic snapshot; never mutates engine state
    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            initialized: matches!(
                self.lifecycle,
                Lifecycle::Ready | Lifecycle::Listening | Lifecycle::Stopped
            ),
            listening: self.lifecycle == Lifecycle::Listening,
            models: self.registry.status(),
            vad: self
                .vad
                .as_ref()
                .map(VoiceActivityDetector::snapshot)
                .unwrap_or_default(),
            frames_processed: self.frames_processed,
            detections: self.detections,
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn log_transition(&self, phase: &str) {
        if self.config.debug {
            info!("engine -> {phase}");
        } else {
            debug!("engine -> {phase}");
        }
    }
}
