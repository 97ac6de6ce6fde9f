//! Connection registry for user-to-connection tracking.
//!
//! Maps each user to the set of that user's live connections so a permission
//! change can reach every open tab and device. A user with no connections has
//! no entry at all, which makes "is this user online" a single lookup.
//!
//! Backed by a sharded map: connect and disconnect traffic for different users
//! only contends when the users hash to the same shard, and each operation
//! holds its shard lock only for the in-memory update.

use std::collections::HashSet;

use beacon_core::{ConnectionId, UserKey};
use dashmap::DashMap;

/// Registry of live connections per user.
///
/// # Invariants
///
/// - No user maps to an empty set
/// - A connection appears at most once under its user
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    /// User key → live connection IDs
    users: DashMap<UserKey, HashSet<ConnectionId>>,
}

impl ConnectionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection under its user.
    ///
    /// Returns `false` if the pair was already registered.
    pub fn add_connection(&self, user: UserKey, connection: ConnectionId) -> bool {
        self.users.entry(user).or_default().insert(connection)
    }

    /// Remove a connection, dropping the user entry once it is empty.
    ///
    /// Returns `true` if the connection was registered. Removing an unknown
    /// pair is a no-op.
    pub fn remove_connection(&self, user: UserKey, connection: &ConnectionId) -> bool {
        let mut removed = false;
        self.users.remove_if_mut(&user, |_, connections| {
            removed = connections.remove(connection);
            connections.is_empty()
        });
        removed
    }

    /// Snapshot of a user's live connections. Empty for unknown users.
    pub fn connections(&self, user: UserKey) -> HashSet<ConnectionId> {
        self.users.get(&user).map(|entry| entry.value().clone()).unwrap_or_default()
    }

    /// Whether the user has at least one live connection.
    pub fn has_connections(&self, user: UserKey) -> bool {
        self.users.contains_key(&user)
    }

    /// Whether this exact connection is registered under the user.
    pub fn contains(&self, user: UserKey, connection: &ConnectionId) -> bool {
        self.users.get(&user).is_some_and(|entry| entry.contains(connection))
    }

    /// Snapshot of every user with live connections. Order is not guaranteed.
    pub fn users(&self) -> Vec<UserKey> {
        self.users.iter().map(|entry| *entry.key()).collect()
    }

    /// Number of users with live connections.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Total number of live connections.
    pub fn connection_count(&self) -> usize {
        self.users.iter().map(|entry| entry.value().len()).sum()
    }
}
