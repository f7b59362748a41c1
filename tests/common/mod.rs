//! Shared test doubles: scripted inference models, a mock model loader,
//! and model-directory fixtures.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use wakeword_engine::{
    EngineEvent, InferenceError, InferenceModel, ModelError, ModelLoader,
};

/// Always returns the same output vector
pub struct ConstantModel {
    output: Vec<f32>,
}

impl ConstantModel {
    pub fn new(value: f32) -> Self {
        Self {
            output: vec![value; 8],
        }
    }
}

#[async_trait]
impl InferenceModel for ConstantModel {
    async fn run(&mut self, _input: &[f32]) -> Result<Vec<f32>, InferenceError> {
        Ok(self.output.clone())
    }
}

/// Replays a score sequence, one value per call; repeats the last value
/// once exhausted
pub struct ScriptedModel {
    scores: VecDeque<f32>,
    last: f32,
}

impl ScriptedModel {
    pub fn new(scores: &[f32]) -> Self {
        Self {
            scores: scores.iter().copied().collect(),
            last: scores.last().copied().unwrap_or(0.0),
        }
    }
}

#[async_trait]
impl InferenceModel for ScriptedModel {
    async fn run(&mut self, _input: &[f32]) -> Result<Vec<f32>, InferenceError> {
        let score = self.scores.pop_front().unwrap_or(self.last);
        Ok(vec![score])
    }
}

/// Fails every scoring call
pub struct FailingModel;

#[async_trait]
impl InferenceModel for FailingModel {
    async fn run(&mut self, _input: &[f32]) -> Result<Vec<f32>, InferenceError> {
        Err(InferenceError::Failed("mock inference failure".into()))
    }
}

/// Loader handing out mocks by model name.
///
/// Unnamed models get a zero-output `ConstantModel`, which is enough for
/// the melspectrogram and embedding stages (the pipeline only moves their
/// vectors along).
#[derive(Default)]
pub struct MockLoader {
    constants: HashMap<String, f32>,
    scripts: HashMap<String, Vec<f32>>,
    fail_load: Vec<String>,
    fail_inference: Vec<String>,
}

impl MockLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Model `name` always scores `value`
    pub fn constant(mut self, name: &str, value: f32) -> Self {
        self.constants.insert(name.to_string(), value);
        self
    }

    /// Model `name` replays `scores`, one per frame
    pub fn scripted(mut self, name: &str, scores: &[f32]) -> Self {
        self.scripts.insert(name.to_string(), scores.to_vec());
        self
    }

    /// Loading model `name` fails (corrupt-file simulation)
    pub fn fail_load(mut self, name: &str) -> Self {
        self.fail_load.push(name.to_string());
        self
    }

    /// Model `name` loads but every scoring call fails
    pub fn fail_inference(mut self, name: &str) -> Self {
        self.fail_inference.push(name.to_string());
        self
    }
}

impl ModelLoader for MockLoader {
    fn load(&self, name: &str, _path: &Path) -> Result<Box<dyn InferenceModel>, ModelError> {
        if self.fail_load.iter().any(|n| n == name) {
            return Err(ModelError::Load {
                name: name.to_string(),
                reason: "mock load failure".to_string(),
            });
        }
        if self.fail_inference.iter().any(|n| n == name) {
            return Ok(Box::new(FailingModel));
        }
        if let Some(scores) = self.scripts.get(name) {
            return Ok(Box::new(ScriptedModel::new(scores)));
        }
        let value = self.constants.get(name).copied().unwrap_or(0.0);
        Ok(Box::new(ConstantModel::new(value)))
    }
}

/// Create model files for the pipeline plus the given keywords
pub fn model_dir(keywords: &[&str], with_vad: bool) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    File::create(dir.path().join("melspectrogram.onnx")).unwrap();
    File::create(dir.path().join("embedding_model.onnx")).unwrap();
    if with_vad {
        File::create(dir.path().join("silero_vad.onnx")).unwrap();
    }
    for keyword in keywords {
        File::create(dir.path().join(format!("{keyword}.onnx"))).unwrap();
    }
    dir
}

/// An event sink usable as an engine listener
pub type EventLog = Arc<Mutex<Vec<EngineEvent>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn detections(log: &EventLog) -> Vec<wakeword_engine::DetectionResult> {
    log.lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            EngineEvent::Detection(d) => Some(d.clone()),
            _ => None,
        })
        .collect()
}

/// One 80ms frame of silence at the default frame size
pub fn silent_frame() -> Vec<f32> {
    vec![0.0f32; wakeword_engine::FRAME_SIZE]
}
