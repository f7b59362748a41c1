/// Voice Activity Detection
///
/// Independent pipeline branch: the same raw frames score against a
/// dedicated speech model, and per-frame probabilities drive a two-state
/// machine (silent / speaking) with start and end transitions plus
/// duration tracking. Best-effort: a VAD failure never blocks keyword
/// detection.

use std::time::Instant;

use tracing::{debug, trace};

use crate::audio::AudioFrame;
use crate::models::{InferenceError, InferenceModel};

/// Snapshot of the detector state after a frame update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VadSnapshot {
    pub is_speaking: bool,

    /// Speech probability from the most recent frame
    pub confidence: f32,

    /// Milliseconds since the current speech segment began; 0 while silent
    pub duration_ms: u64,
}

impl Default for VadSnapshot {
    fn default() -> Self {
        Self {
            is_speaking: false,
            confidence: 0.0,
            duration_ms: 0,
        }
    }
}

/// State-machine edge produced by a frame update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadTransition {
    None,
    SpeechStart,
    SpeechEnd,
}

pub struct VoiceActivityDetector {
    model: Box<dyn InferenceModel>,
    threshold: f32,
    speaking: bool,
    confidence: f32,
    speech_started_at: Option<Instant>,
}

impl VoiceActivityDetector {
    pub fn new(model: Box<dyn InferenceModel>, threshold: f32) -> Self {
        Self {
            model,
            threshold,
            speaking: false,
            confidence: 0.0,
            speech_started_at: None,
        }
    }

    /// Score one frame and advance the state machine.
    ///
    /// `silent -> speaking` when probability >= threshold (SpeechStart,
    /// start instant recorded); `speaking -> silent` when it falls below
    /// (SpeechEnd, duration reset). While speaking the duration is
    /// recomputed every frame from the start instant.
    pub async fn update(
        &mut self,
        frame: &AudioFrame,
    ) -> Result<(VadSnapshot, VadTransition), InferenceError> {
        let output = self.model.run(frame.samples()).await?;
        let probability = output.first().copied().ok_or(InferenceError::EmptyOutput)?;

        self.confidence = probability;
        trace!("vad probability {:.3} (speaking={})", probability, self.speaking);

        let transition = match (self.speaking, probability >= self.threshold) {
            (false, true) => {
                self.speaking = true;
                self.speech_started_at = Some(Instant::now());
                debug!("speech started (probability {:.3})", probability);
                VadTransition::SpeechStart
            }
            (true, false) => {
                self.speaking = false;
                self.speech_started_at = None;
                debug!("speech ended (probability {:.3})", probability);
                VadTransition::SpeechEnd
            }
            _ => VadTransition::None,
        };

        Ok((self.snapshot(), transition))
    }

    /// Current state without scoring a new frame; never mutates
    pub fn snapshot(&self) -> VadSnapshot {
        VadSnapshot {
            is_speaking: self.speaking,
            confidence: self.confidence,
            duration_ms: self
                .speech_started_at
                .map(|t| t.elapsed().as_millis() as u64)
                .unwrap_or(0),
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    /// Back to silent with no segment in progress
    pub fn reset(&mut self) {
        self.speaking = false;
        self.confidence = 0.0;
        self.speech_started_at = None;
    }
}
