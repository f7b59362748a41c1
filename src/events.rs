/// Engine event surface
///
/// Tagged events delivered to registered listeners: engine readiness,
/// keyword detections, VAD speech boundaries, and per-frame errors. The
/// listener list is owned by the engine instance, and a misbehaving
/// listener is isolated: its panic is caught and logged without affecting
/// the others or the processing loop.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{trace, warn};

use crate::vad::VadSnapshot;

/// A qualifying keyword detection
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    /// Keyword identifier, e.g. "hey_jarvis"
    pub keyword: String,

    /// Confidence score (0.0 - 1.0)
    pub score: f32,

    /// Microseconds since epoch at detection time
    pub timestamp_micros: i64,

    /// Index of the frame that produced the detection
    pub frame_index: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Initialization finished, models loaded
    Ready,

    /// A keyword fired
    Detection(DetectionResult),

    /// VAD transitioned silent -> speaking
    SpeechStart(VadSnapshot),

    /// VAD transitioned speaking -> silent
    SpeechEnd(VadSnapshot),

    /// A per-frame component failure (non-fatal)
    Error {
        component: &'static str,
        message: String,
    },
}

/// Handle returned by `on`, used to unregister
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn Fn(&EngineEvent) + Send>;

/// Observer list with per-listener panic isolation
#[derive(Default)]
pub struct EventDispatcher {
    listeners: Vec<(ListenerId, Listener)>,
    next_id: u64,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; every subsequent event is delivered to it
    pub fn on<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(&EngineEvent) + Send + 'static,
    {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Unregister a listener; returns false if the id is unknown
    pub fn off(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Deliver an event to every registered listener. A panicking listener
    /// is logged and skipped; the rest still receive the event.
    pub fn emit(&self, event: &EngineEvent) {
        trace!("emitting {:?} to {} listener(s)", event, self.listeners.len());

        for (id, listener) in &self.listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                warn!("event listener {:?} panicked, continuing with the rest", id);
            }
        }
    }
}

/// Microseconds since epoch, for detection timestamps
pub fn current_timestamp_micros() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_on_emit_off() {
        let mut dispatcher = EventDispatcher::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c = count.clone();
        let id = dispatcher.on(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        dispatcher.emit(&EngineEvent::Ready);
        dispatcher.emit(&EngineEvent::Ready);
        assert_eq!(count.load(Ordering::SeqCst), 2);

        assert!(dispatcher.off(id));
        assert!(!dispatcher.off(id));

        dispatcher.emit(&EngineEvent::Ready);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_listener_panic_is_isolated() {
        let mut dispatcher = EventDispatcher::new();
        let count = Arc::new(AtomicUsize::new(0));

        dispatcher.on(|_| panic!("bad listener"));
        let c = count.clone();
        dispatcher.on(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        dispatcher.emit(&EngineEvent::Ready);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.listener_count(), 2);
    }

    #[test]
    fn test_event_payload_delivery() {
        let mut dispatcher = EventDispatcher::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let s = seen.clone();
        dispatcher.on(move |event| {
            if let EngineEvent::Detection(result) = event {
                assert_eq!(result.keyword, "alexa");
                s.fetch_add(1, Ordering::SeqCst);
            }
        });

        dispatcher.emit(&EngineEvent::Detection(DetectionResult {
            keyword: "alexa".to_string(),
            score: 0.9,
            timestamp_micros: current_timestamp_micros(),
            frame_index: 7,
        }));

        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
