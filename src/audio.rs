/// Audio frame accumulation
///
/// Collects arbitrary-length sample pushes into fixed-size frames (80ms at
/// 16kHz = 1280 samples). Chunks arrive in whatever sizes the capture path
/// produces; only complete frames ever reach the feature extractor.

use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::HeapRb;
use tracing::trace;

/// Raw capture sample format (16-bit PCM)
pub type AudioSample = i16;

/// Convert fixed-point 16-bit samples to normalized floats in [-1.0, 1.0].
///
/// i16::MIN maps to exactly -1.0; i16::MAX to 32767/32768.
pub fn pcm_to_f32(samples: &[AudioSample]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / 32768.0).collect()
}

/// A complete fixed-length frame of normalized audio samples.
///
/// Immutable once emitted by the accumulator; consumed by exactly one
/// pipeline pass.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    samples: Vec<f32>,
}

impl AudioFrame {
    fn new(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

type RingBuffer = HeapRb<f32>;
type RingProducer = <RingBuffer as Split>::Prod;
type RingConsumer = <RingBuffer as Split>::Cons;

/// Accumulates sample pushes into complete frames.
///
/// Pushes are concatenated losslessly across calls; a frame is emitted each
/// time `frame_size` samples are available and the remainder carries into
/// the next push. Owned by a single processing chain, so the ring halves
/// are unshared.
pub struct FrameAccumulator {
    producer: RingProducer,
    consumer: RingConsumer,
    frame_size: usize,
}

impl FrameAccumulator {
    pub fn new(frame_size: usize) -> Self {
        assert!(frame_size > 0, "frame size must be non-zero");

        let rb = HeapRb::<f32>::new(frame_size * 2);
        let (producer, consumer) = rb.split();

        Self {
            producer,
            consumer,
            frame_size,
        }
    }

    /// Append samples, returning every frame completed by this push in
    /// arrival order.
    pub fn push(&mut self, samples: &[f32]) -> Vec<AudioFrame> {
        let mut frames = Vec::new();
        let mut offset = 0;

        while offset < samples.len() {
            let written = self.producer.push_slice(&samples[offset..]);
            offset += written;

            while self.consumer.occupied_len() >= self.frame_size {
                let mut frame = vec![0.0f32; self.frame_size];
                let read = self.consumer.pop_slice(&mut frame);
                debug_assert_eq!(read, self.frame_size);
                frames.push(AudioFrame::new(frame));
            }

            if written == 0 {
                // Capacity is 2x frame size, so draining above always frees
                // room; this guards against a zero-length input slice.
                break;
            }
        }

        if !frames.is_empty() {
            trace!("accumulator emitted {} complete frame(s)", frames.len());
        }

        frames
    }

    /// Number of samples carried over, waiting for the next push
    pub fn pending(&self) -> usize {
        self.consumer.occupied_len()
    }

    /// Drop any carried-over partial frame
    pub fn clear(&mut self) {
        let pending = self.consumer.occupied_len();
        self.consumer.skip(pending);
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }
}
