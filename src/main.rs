/// Wake-word detection service binary
///
/// Streams a WAV file through the engine and reports detection and speech
/// events. Live microphone capture is deliberately out of scope; any audio
/// source can drive the same `process_audio_pcm` contract.

use anyhow::{bail, Context, Result};
use tracing::{error, info, warn};
use wakeword_engine::{EngineConfig, EngineEvent, WakeWordEngine};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("wakeword_engine=debug".parse().unwrap()),
        )
        .init();

    info!("Starting wake-word detection service v{}", wakeword_engine::VERSION);

    if let Err(e) = run().await {
        error!("Service failed: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = load_config()?;
    let wav_path = std::env::args()
        .nth(1)
        .context("usage: wakeword-service <audio.wav>")?;

    let mut engine = WakeWordEngine::new(config).context("Failed to create engine")?;

    engine.on(|event| match event {
        EngineEvent::Ready => info!("Engine ready"),
        EngineEvent::Detection(d) => {
            info!("Wake word '{}' detected (score {:.3})", d.keyword, d.score)
        }
        EngineEvent::SpeechStart(v) => info!("Speech started (p={:.2})", v.confidence),
        EngineEvent::SpeechEnd(_) => info!("Speech ended"),
        EngineEvent::Error { component, message } => {
            warn!("Pipeline error in {component}: {message}")
        }
    });

    engine.initialize().await.context("Failed to initialize engine")?;
    engine.start()?;

    let keywords = engine.config().keywords.clone();
    info!("Listening for: {keywords:?}");

    stream_wav(&mut engine, &wav_path).await?;

    let status = engine.status();
    info!(
        "Done: {} frames processed, {} detection(s)",
        status.frames_processed, status.detections
    );

    engine.stop()?;
    engine.dispose();
    Ok(())
}

/// Feed the WAV file through the engine in small chunks, the way a capture
/// driver would.
async fn stream_wav(engine: &mut WakeWordEngine, path: &str) -> Result<()> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("Failed to open {path}"))?;
    let spec = reader.spec();

    if spec.channels != 1 {
        bail!("expected mono audio, got {} channels", spec.channels);
    }
    if spec.sample_rate != engine.config().sample_rate {
        bail!(
            "expected {} Hz audio, got {} Hz",
            engine.config().sample_rate,
            spec.sample_rate
        );
    }

    let samples: Vec<i16> = reader
        .samples::<i16>()
        .collect::<std::result::Result<_, _>>()
        .context("Failed to read samples")?;

    info!(
        "Streaming {:.1}s of audio",
        samples.len() as f32 / spec.sample_rate as f32
    );

    for chunk in samples.chunks(512) {
        if let Some(detection) = engine.process_audio_pcm(chunk).await? {
            info!(
                "process_audio returned '{}' at frame {}",
                detection.keyword, detection.frame_index
            );
        }
    }

    Ok(())
}

/// Configuration from a JSON file (`WAKEWORD_CONFIG`) or individual
/// environment variables, falling back to defaults.
fn load_config() -> Result<EngineConfig> {
    if let Ok(path) = std::env::var("WAKEWORD_CONFIG") {
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {path}"))?;
        let config: EngineConfig =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        return Ok(config);
    }

    let mut config = EngineConfig::default();

    if let Ok(path) = std::env::var("WAKEWORD_MODELS_PATH") {
        config.models_path = path.into();
    }
    if let Ok(keywords) = std::env::var("WAKEWORD_KEYWORDS") {
        config.keywords = keywords.split(',').map(|k| k.trim().to_string()).collect();
    }
    if let Ok(threshold) = std::env::var("WAKEWORD_THRESHOLD") {
        config.detection_threshold = threshold.parse().context("Invalid WAKEWORD_THRESHOLD")?;
    }
    if let Ok(vad) = std::env::var("WAKEWORD_ENABLE_VAD") {
        config.enable_vad = vad.parse().context("Invalid WAKEWORD_ENABLE_VAD")?;
    }

    Ok(config)
}
