//! The pipeline-to-dispatcher event channel.
//!
//! Each pipeline owns one sender and emits a one-way stream of events; the
//! dispatcher is the single consumer. Events from one pipeline arrive in
//! emission order; events from different pipelines may interleave.

use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;

/// An event emitted by a running pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Informational message for the host log.
    Info(String),
    /// Error message for the host log; the pipeline is about to terminate
    /// unless the message is advisory (cleanup failures).
    Error(String),
    /// Integer progress in `[0, 100]`, emitted only when the value changes.
    Progress(u8),
    /// Terminal event, emitted exactly once per pipeline.
    Finished { cancelled: bool, failed: bool },
}

/// Sending half of a pipeline's event channel.
///
/// The sender delivers into whatever sink the host wired up: a plain
/// channel, or one shared by many pipelines with a job tag attached.
/// Sends never fail from the pipeline's point of view: when the consumer
/// has gone away the events are silently dropped, which only happens
/// during teardown.
#[derive(Clone)]
pub struct EventSender {
    sink: Arc<dyn Fn(Event) + Send + Sync>,
}

impl EventSender {
    /// Wrap an arbitrary delivery sink.
    pub fn new(sink: impl Fn(Event) + Send + Sync + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
        }
    }

    /// Emit an informational message.
    pub fn info(&self, message: impl Into<String>) {
        (self.sink)(Event::Info(message.into()));
    }

    /// Emit an error message.
    pub fn error(&self, message: impl Into<String>) {
        (self.sink)(Event::Error(message.into()));
    }

    /// Emit a progress value.
    pub fn progress(&self, value: u8) {
        (self.sink)(Event::Progress(value.min(100)));
    }

    /// Emit the terminal event.
    pub fn finished(&self, cancelled: bool, failed: bool) {
        (self.sink)(Event::Finished { cancelled, failed });
    }
}

/// Receiving half of a pipeline's event channel.
pub type EventReceiver = Receiver<Event>;

/// Create a connected event channel.
pub fn event_channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel();
    let sender = EventSender::new(move |event| {
        let _ = tx.send(event);
    });
    (sender, rx)
}
