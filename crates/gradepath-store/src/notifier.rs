//! Recording notification sink for tests.

use std::sync::{Mutex, PoisonError};

use gradepath_core::traits::{GradingEvent, NotificationSink};

/// Collects every event it is told about.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<GradingEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event received so far, in order.
    pub fn events(&self) -> Vec<GradingEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self, matches: impl Fn(&GradingEvent) -> bool) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| matches(e))
            .count()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, event: &GradingEvent) {
        tracing::debug!("recorded {event:?}");
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
