//! Board change notifications.
//!
//! Sinks are passed explicitly to whoever applies commands; there is no global
//! subscriber registry.

use crate::domain::{BoardId, ExternalHash};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::info;

/// What changed, addressed by external hashes only
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    CardCreated {
        card_hash: ExternalHash,
        column_hash: Option<ExternalHash>,
    },
    CardUpdated {
        card_hash: ExternalHash,
    },
    CardMoved {
        card_hash: ExternalHash,
        column_hash: Option<ExternalHash>,
    },
    CardDeleted {
        card_hash: ExternalHash,
    },
    ColumnCreated {
        column_hash: ExternalHash,
    },
    ColumnDeleted {
        column_hash: ExternalHash,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardEvent {
    pub board_id: BoardId,
    #[serde(flatten)]
    pub kind: EventKind,
    pub at: DateTime<Utc>,
}

impl BoardEvent {
    pub fn new(board_id: BoardId, kind: EventKind) -> Self {
        Self {
            board_id,
            kind,
            at: Utc::now(),
        }
    }
}

/// Receives events after a change has been persisted
pub trait EventSink: Send + Sync {
    fn publish(&self, event: BoardEvent);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn publish(&self, _event: BoardEvent) {}
}

/// Logs every event
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn publish(&self, event: BoardEvent) {
        info!(board = %event.board_id, event = ?event.kind, "board event");
    }
}

/// Forwards events to a channel, e.g. for a webhook dispatcher task
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<BoardEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BoardEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelSink {
    fn publish(&self, event: BoardEvent) {
        // A dropped receiver just means nobody is listening any more
        if self.sender.send(event).is_err() {
            tracing::debug!("event receiver dropped");
        }
    }
}
