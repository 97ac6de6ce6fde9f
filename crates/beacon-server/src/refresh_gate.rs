//! Per-user single-flight gate for membership work.
//!
//! At most one refresh or revocation runs per user. Work requested while one
//! is running is parked in the gate; the running pass picks up the newest
//! parked work and reruns before releasing. Intermediate work is superseded,
//! so the last writer always wins.

use std::sync::Arc;

use beacon_core::{Principal, UserKey};
use dashmap::{DashMap, mapref::entry::Entry};

/// Membership work for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Pending {
    /// Reconcile every connection against this principal.
    Refresh(Principal),
    /// Leave every indexed channel on every connection.
    Revoke,
}

/// Tracks users with membership work in flight.
#[derive(Debug, Default)]
pub(crate) struct RefreshGate {
    /// User → work parked by a concurrent request
    running: DashMap<UserKey, Option<Pending>>,
}

impl RefreshGate {
    /// Claim the gate for `user`.
    ///
    /// Returns `None` if work is already running; `work` is then parked for
    /// that pass to apply.
    pub(crate) fn enter(self: &Arc<Self>, user: UserKey, work: &Pending) -> Option<RefreshTicket> {
        match self.running.entry(user) {
            Entry::Occupied(mut entry) => {
                *entry.get_mut() = Some(work.clone());
                None
            },
            Entry::Vacant(entry) => {
                entry.insert(None);
                Some(RefreshTicket { gate: Arc::clone(self), user, armed: true })
            },
        }
    }

    #[cfg(test)]
    pub(crate) fn is_running(&self, user: UserKey) -> bool {
        self.running.contains_key(&user)
    }
}

/// Ownership of a user's slot.
///
/// Releases the slot on drop. Work parked at that point is discarded; owners
/// that must not lose it call [`RefreshTicket::abandon`] first.
#[derive(Debug)]
pub(crate) struct RefreshTicket {
    gate: Arc<RefreshGate>,
    user: UserKey,
    armed: bool,
}

impl RefreshTicket {
    /// User owning the slot.
    pub(crate) fn user(&self) -> UserKey {
        self.user
    }

    /// Take the parked work, or release the slot if nothing is parked.
    ///
    /// Returns `Some` when the caller must run again. The check and the
    /// release are atomic with respect to [`RefreshGate::enter`], so parked
    /// work is never dropped.
    pub(crate) fn next(&mut self) -> Option<Pending> {
        if !self.armed {
            return None;
        }
        loop {
            let taken = match self.gate.running.get_mut(&self.user) {
                Some(mut pending) => pending.value_mut().take(),
                None => {
                    self.armed = false;
                    return None;
                },
            };
            if taken.is_some() {
                return taken;
            }
            if self.gate.running.remove_if(&self.user, |_, pending| pending.is_none()).is_some() {
                self.armed = false;
                return None;
            }
        }
    }

    /// Release the slot without running again, handing back any parked work.
    pub(crate) fn abandon(&mut self) -> Option<Pending> {
        if !self.armed {
            return None;
        }
        self.armed = false;
        self.gate.running.remove(&self.user).and_then(|(_, pending)| pending)
    }
}

impl Drop for RefreshTicket {
    fn drop(&mut self) {
        if self.armed {
            let discarded = self.abandon();
            tracing::debug!(
                user = %self.user,
                discarded = discarded.is_some(),
                "ticket dropped, releasing gate"
            );
        }
    }
}
