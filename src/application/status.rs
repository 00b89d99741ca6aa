//! Status channel boundary: success/failure notes for the alert area.

use std::sync::Mutex;

use tracing::{info, warn};

/// A dismissible notification derived from a reconciliation outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusNote {
    pub success: bool,
    pub message: String,
}

impl StatusNote {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Receives status notes, fire-and-forget. The cache core never consumes a
/// return value from the sink.
pub trait StatusSink: Send + Sync {
    fn notify(&self, note: StatusNote);
}

/// Sink that forwards notes to the tracing pipeline.
#[derive(Debug, Default)]
pub struct TracingStatusSink;

impl StatusSink for TracingStatusSink {
    fn notify(&self, note: StatusNote) {
        if note.success {
            info!(message = %note.message, "Status note");
        } else {
            warn!(message = %note.message, "Status note");
        }
    }
}

/// Sink that retains every note, for tests and for UIs that render a
/// notification history.
#[derive(Debug, Default)]
pub struct RecordingStatusSink {
    notes: Mutex<Vec<StatusNote>>,
}

impl RecordingStatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notes(&self) -> Vec<StatusNote> {
        self.notes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl StatusSink for RecordingStatusSink {
    fn notify(&self, note: StatusNote) {
        self.notes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(note);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_retains_notes_in_order() {
        let sink = RecordingStatusSink::new();
        sink.notify(StatusNote::success("record E010 updated"));
        sink.notify(StatusNote::failure("delete record E011 failed"));

        let notes = sink.notes();
        assert_eq!(notes.len(), 2);
        assert!(notes[0].success);
        assert!(!notes[1].success);
        assert_eq!(notes[1].message, "delete record E011 failed");
    }
}
