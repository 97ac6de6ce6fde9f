//! Chaotic gateway wrapper for fault injection testing
//!
//! Gateway wrapper that randomly fails operations to verify that membership
//! coordination keeps going when individual joins and leaves fail.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use beacon_core::{Channel, ConnectionId};

use super::{BroadcastGroupGateway, GatewayError};
use crate::ServerEvent;

/// LCG constants from Numerical Recipes
const A: u64 = 1_664_525;
const C: u64 = 1_013_904_223;
const M: u64 = 1u64 << 32;

/// Chaotic gateway wrapper that randomly injects transport failures.
///
/// Delegates to an underlying gateway but fails operations based on a
/// configured failure rate. The RNG is a seeded LCG so chaos runs are
/// reproducible.
#[derive(Debug)]
pub struct ChaoticGateway<G> {
    inner: G,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    /// LCG state
    state: AtomicU64,
    /// Number of failures injected so far
    injected: AtomicUsize,
}

impl<G: BroadcastGroupGateway> ChaoticGateway<G> {
    /// Create a new chaotic gateway wrapper
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: G, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x1234_5678_9ABC_DEF0)
    }

    /// Create with explicit seed for reproducible chaos
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn with_seed(inner: G, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            failure_rate,
            state: AtomicU64::new(seed),
            injected: AtomicUsize::new(0),
        }
    }

    /// Underlying gateway (for checking state after chaos).
    pub fn inner(&self) -> &G {
        &self.inner
    }

    /// Number of failures injected so far.
    pub fn injected_failures(&self) -> usize {
        self.injected.load(Ordering::Relaxed)
    }

    /// Check if this operation should fail
    fn should_fail(&self) -> bool {
        let step = |state: u64| A.wrapping_mul(state).wrapping_add(C) % M;
        let previous = self
            .state
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |state| Some(step(state)))
            .unwrap_or_else(|state| state);

        let fail = (step(previous) as f64) / (M as f64) < self.failure_rate;
        if fail {
            self.injected.fetch_add(1, Ordering::Relaxed);
        }
        fail
    }

    fn injected_error(operation: &str) -> GatewayError {
        GatewayError::Transport(format!("injected {operation} failure"))
    }
}

#[async_trait]
impl<G: BroadcastGroupGateway> BroadcastGroupGateway for ChaoticGateway<G> {
    async fn join(&self, connection: &ConnectionId, channel: &Channel) -> Result<(), GatewayError> {
        if self.should_fail() {
            return Err(Self::injected_error("join"));
        }
        self.inner.join(connection, channel).await
    }

    async fn leave(
        &self,
        connection: &ConnectionId,
        channel: &Channel,
    ) -> Result<(), GatewayError> {
        if self.should_fail() {
            return Err(Self::injected_error("leave"));
        }
        self.inner.leave(connection, channel).await
    }

    async fn publish(&self, channel: &Channel, event: &ServerEvent) -> Result<(), GatewayError> {
        if self.should_fail() {
            return Err(Self::injected_error("publish"));
        }
        self.inner.publish(channel, event).await
    }

    async fn send(
        &self,
        connection: &ConnectionId,
        event: &ServerEvent,
    ) -> Result<(), GatewayError> {
        if self.should_fail() {
            return Err(Self::injected_error("send"));
        }
        self.inner.send(connection, event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryGateway;

    #[tokio::test]
    async fn zero_rate_never_fails() {
        let gateway = ChaoticGateway::new(MemoryGateway::new(), 0.0);
        let conn = ConnectionId::new("c1");
        let channel = Channel::from_static("content");

        for _ in 0..100 {
            gateway.join(&conn, &channel).await.unwrap();
        }
        assert_eq!(gateway.injected_failures(), 0);
        assert!(gateway.inner().is_member(&conn, "content"));
    }

    #[tokio::test]
    async fn full_rate_always_fails_without_touching_inner() {
        let gateway = ChaoticGateway::new(MemoryGateway::new(), 1.0);
        let conn = ConnectionId::new("c1");
        let channel = Channel::from_static("content");

        for _ in 0..10 {
            assert!(gateway.join(&conn, &channel).await.is_err());
        }
        assert_eq!(gateway.injected_failures(), 10);
        assert!(gateway.inner().calls().is_empty());
    }

    #[tokio::test]
    async fn same_seed_same_failures() {
        let a = ChaoticGateway::with_seed(MemoryGateway::new(), 0.5, 99);
        let b = ChaoticGateway::with_seed(MemoryGateway::new(), 0.5, 99);
        let conn = ConnectionId::new("c1");
        let channel = Channel::from_static("content");

        for _ in 0..50 {
            let left = a.join(&conn, &channel).await.is_err();
            let right = b.join(&conn, &channel).await.is_err();
            assert_eq!(left, right);
        }
    }
}
