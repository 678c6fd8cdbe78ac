//! A notifier that records events for assertions.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::port::outbound::notifier::{Event, Notifier};

/// Records every event it receives. Clones share the same log.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<Event>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn validations(&self) -> usize {
        self.count(|e| matches!(e, Event::ValidationComplete(_)))
    }

    pub fn insights(&self) -> usize {
        self.count(|e| matches!(e, Event::InsightReady(_)))
    }

    pub fn degraded(&self) -> usize {
        self.count(|e| matches!(e, Event::Degraded { .. }))
    }

    fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: Event) {
        self.events.lock().push(event);
    }
}
