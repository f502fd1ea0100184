//! Per-run progress channels.
//!
//! Each request id owns a bounded buffer of narration events and at most
//! one live subscriber. Events are buffered whether or not anyone is
//! listening, so an observer may attach before, during, or never.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

/// Maximum number of events retained per channel.
pub const MAX_BUFFERED_EVENTS: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// What a subscriber receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressMessage {
    Event(ProgressEvent),
    /// Sent once after the buffered replay.
    Ready,
    /// Sent when the run finishes. Nothing follows it.
    Done,
}

pub type ProgressReceiver = mpsc::UnboundedReceiver<ProgressMessage>;

#[derive(Default)]
struct Channel {
    buffer: VecDeque<ProgressEvent>,
    subscriber: Option<mpsc::UnboundedSender<ProgressMessage>>,
}

impl Channel {
    fn push(&mut self, event: ProgressEvent) {
        if self.buffer.len() == MAX_BUFFERED_EVENTS {
            self.buffer.pop_front();
        }
        self.buffer.push_back(event.clone());

        if let Some(subscriber) = &self.subscriber {
            if subscriber.send(ProgressMessage::Event(event)).is_err() {
                // Consumer went away; keep buffering only
                self.subscriber = None;
            }
        }
    }
}

/// Registry of progress channels keyed by request id.
#[derive(Default)]
pub struct ProgressRegistry {
    channels: Mutex<HashMap<String, Channel>>,
}

impl ProgressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn send(&self, id: &str, message: impl Into<String>) {
        let event = ProgressEvent {
            timestamp: Utc::now(),
            message: message.into(),
        };
        let mut channels = self.channels.lock().await;
        channels.entry(id.to_string()).or_default().push(event);
    }

    /// Attach a subscriber, replacing any previous one.
    ///
    /// The returned receiver yields the buffered events in order, then
    /// `Ready`, then live events until `Done`.
    pub async fn subscribe(&self, id: &str) -> ProgressReceiver {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut channels = self.channels.lock().await;
        let channel = channels.entry(id.to_string()).or_default();

        for event in &channel.buffer {
            // The receiver is still in hand, so this cannot fail
            let _ = sender.send(ProgressMessage::Event(event.clone()));
        }
        let _ = sender.send(ProgressMessage::Ready);

        if channel.subscriber.replace(sender).is_some() {
            debug!("Replaced progress subscriber for {}", id);
        }
        info!(
            "Progress subscriber attached to {} ({} buffered events)",
            id,
            channel.buffer.len()
        );

        receiver
    }

    /// Signal `Done` to the live subscriber and drop the channel.
    pub async fn complete(&self, id: &str) {
        let mut channels = self.channels.lock().await;
        if let Some(channel) = channels.remove(id) {
            if let Some(subscriber) = channel.subscriber {
                let _ = subscriber.send(ProgressMessage::Done);
            }
        }
    }

    /// Forget an observer that went away.
    ///
    /// A channel no run has written to is removed. Otherwise only the
    /// closed subscriber is dropped and the run keeps buffering.
    pub async fn detach(&self, id: &str) {
        let mut channels = self.channels.lock().await;
        let Some(channel) = channels.get_mut(id) else {
            return;
        };
        if channel.subscriber.as_ref().is_some_and(|s| !s.is_closed()) {
            return;
        }
        channel.subscriber = None;
        if channel.buffer.is_empty() {
            channels.remove(id);
            debug!("Removed unused progress channel {}", id);
        }
    }

    /// Snapshot of the buffered events for `id`.
    pub async fn buffered(&self, id: &str) -> Vec<ProgressEvent> {
        let channels = self.channels.lock().await;
        channels
            .get(id)
            .map(|c| c.buffer.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.channels.lock().await.contains_key(id)
    }
}

/// A run's handle on its progress channel.
///
/// Runs without a request id still narrate to the log.
#[derive(Clone)]
pub struct ProgressReporter {
    registry: Arc<ProgressRegistry>,
    request_id: Option<String>,
}

impl ProgressReporter {
    pub fn new(registry: Arc<ProgressRegistry>, request_id: Option<String>) -> Self {
        Self {
            registry,
            request_id: request_id.filter(|id| !id.trim().is_empty()),
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub async fn emit(&self, message: impl Into<String>) {
        let message = message.into();
        info!(request_id = self.request_id.as_deref().unwrap_or("-"), "{}", message);
        if let Some(id) = &self.request_id {
            self.registry.send(id, message).await;
        }
    }

    pub async fn complete(&self) {
        if let Some(id) = &self.request_id {
            self.registry.complete(id).await;
        }
    }
}
