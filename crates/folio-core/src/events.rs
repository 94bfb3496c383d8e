//! Document events and the broadcast bus used for view invalidation.
//!
//! Every committed mutation emits one [`DocumentEvent`]. Downstream consumers
//! (page caches, the search indexer) subscribe independently and invalidate
//! whatever they keep for the event's workspace and owner. Emission is
//! fire-and-forget: it never blocks and succeeds without subscribers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::defaults;
use crate::uuid_utils::new_v7;

/// Domain event describing a committed change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum DocumentEvent {
    DocumentCreated {
        workspace_id: Uuid,
        owner_id: Option<Uuid>,
        document_id: Uuid,
        version_id: Uuid,
    },
    VersionCreated {
        workspace_id: Uuid,
        document_id: Uuid,
        version_id: Uuid,
        version_number: i32,
    },
    DocumentDeleted {
        workspace_id: Uuid,
        document_id: Uuid,
        /// Objectives whose reference was cleared.
        owner_ids: Vec<Uuid>,
    },
    DocumentRenamed {
        workspace_id: Uuid,
        document_id: Uuid,
    },
    OwnerUnlinked {
        workspace_id: Uuid,
        owner_id: Uuid,
        document_id: Uuid,
    },
    ChatBound {
        workspace_id: Uuid,
        owner_id: Uuid,
        chat_id: Uuid,
        version_id: Uuid,
    },
    PublicationChanged {
        workspace_id: Uuid,
        document_id: Uuid,
        draft_version_id: Option<Uuid>,
        published_version_id: Option<Uuid>,
        searchable: bool,
    },
}

impl DocumentEvent {
    /// Dot-namespaced event name (e.g., `"version.created"`).
    pub fn event_type(&self) -> &'static str {
        match self {
            DocumentEvent::DocumentCreated { .. } => "document.created",
            DocumentEvent::VersionCreated { .. } => "version.created",
            DocumentEvent::DocumentDeleted { .. } => "document.deleted",
            DocumentEvent::DocumentRenamed { .. } => "document.renamed",
            DocumentEvent::OwnerUnlinked { .. } => "owner.unlinked",
            DocumentEvent::ChatBound { .. } => "chat.bound",
            DocumentEvent::PublicationChanged { .. } => "publication.changed",
        }
    }

    /// Workspace whose cached views are stale after this event.
    pub fn workspace_id(&self) -> Uuid {
        match self {
            DocumentEvent::DocumentCreated { workspace_id, .. }
            | DocumentEvent::VersionCreated { workspace_id, .. }
            | DocumentEvent::DocumentDeleted { workspace_id, .. }
            | DocumentEvent::DocumentRenamed { workspace_id, .. }
            | DocumentEvent::OwnerUnlinked { workspace_id, .. }
            | DocumentEvent::ChatBound { workspace_id, .. }
            | DocumentEvent::PublicationChanged { workspace_id, .. } => *workspace_id,
        }
    }

    /// Owner entities whose cached views are stale, where known.
    pub fn owner_ids(&self) -> Vec<Uuid> {
        match self {
            DocumentEvent::DocumentCreated { owner_id, .. } => owner_id.iter().copied().collect(),
            DocumentEvent::DocumentDeleted { owner_ids, .. } => owner_ids.clone(),
            DocumentEvent::OwnerUnlinked { owner_id, .. }
            | DocumentEvent::ChatBound { owner_id, .. } => vec![*owner_id],
            _ => Vec::new(),
        }
    }
}

/// Event plus delivery metadata.
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    /// UUIDv7 so envelopes sort in emission order.
    pub event_id: Uuid,
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    pub payload: DocumentEvent,
}

impl EventEnvelope {
    pub fn new(event: DocumentEvent) -> Self {
        Self {
            event_id: new_v7(),
            event_type: event.event_type().to_string(),
            occurred_at: Utc::now(),
            payload: event,
        }
    }
}

/// Broadcast-based event bus.
///
/// Slow receivers that fall behind get a `Lagged` error and miss events;
/// invalidation consumers treat a lag as "invalidate everything".
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all subscribers. Dropped silently without subscribers.
    pub fn emit(&self, event: DocumentEvent) {
        let envelope = EventEnvelope::new(event);
        tracing::debug!(
            event_type = %envelope.event_type,
            event_id = %envelope.event_id,
            workspace_id = %envelope.payload.workspace_id(),
            subscriber_count = self.tx.receiver_count(),
            "EventBus emit"
        );
        let _ = self.tx.send(envelope);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(defaults::EVENT_BUS_CAPACITY)
    }
}
