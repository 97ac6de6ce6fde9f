//! Server events pushed to connections.

use beacon_core::Channel;
use serde::{Deserialize, Serialize};

/// What happened to the entity an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Entity was created
    Created,
    /// Entity was updated
    Updated,
    /// Entity was moved to the recycle bin
    Trashed,
    /// Entity was permanently deleted
    Deleted,
}

/// A change notification delivered on a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEvent {
    /// Channel the event belongs to
    pub source: Channel,
    /// Kind of change
    pub kind: EventKind,
    /// Key of the changed entity
    pub key: u128,
}

impl ServerEvent {
    /// Create an event.
    pub fn new(source: Channel, kind: EventKind, key: u128) -> Self {
        Self { source, kind, key }
    }
}
