//! Channel authorizers.
//!
//! An authorizer declares the channels it governs and answers whether a
//! principal may receive events on one of them. Authorizers are stateless with
//! respect to connections; they may consult an external policy store, which
//! is why [`ChannelAuthorizer::authorize`] is async.

use std::{fmt, sync::Arc};

use async_trait::async_trait;

use crate::{AuthorizerError, Channel, PolicyEvaluator, Principal};

/// Capability deciding whether a principal may receive a channel's events.
///
/// # Invariants
///
/// - `channels()` is fixed for the lifetime of the authorizer. The index reads
///   it once.
/// - `authorize` is only called for channels listed in `channels()`.
/// - `Ok(true)` is the only grant. `Ok(false)` and `Err(_)` both deny.
#[async_trait]
pub trait ChannelAuthorizer: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Channels governed by this authorizer.
    fn channels(&self) -> &[Channel];

    /// Decide whether `principal` may receive events on `channel`.
    async fn authorize(
        &self,
        principal: &Principal,
        channel: &Channel,
    ) -> Result<bool, AuthorizerError>;
}

/// Authorizer that grants its channels to principals satisfying one policy.
///
/// Policy evaluation is delegated to a [`PolicyEvaluator`] and treated as
/// opaque.
pub struct PolicyAuthorizer {
    name: String,
    policy: String,
    channels: Vec<Channel>,
    evaluator: Arc<dyn PolicyEvaluator>,
}

impl PolicyAuthorizer {
    /// Create an authorizer granting `channels` when `policy` is satisfied.
    pub fn new(
        policy: impl Into<String>,
        channels: impl IntoIterator<Item = Channel>,
        evaluator: Arc<dyn PolicyEvaluator>,
    ) -> Self {
        let policy = policy.into();
        Self {
            name: format!("policy:{policy}"),
            policy,
            channels: channels.into_iter().collect(),
            evaluator,
        }
    }

    /// Policy this authorizer checks.
    pub fn policy(&self) -> &str {
        &self.policy
    }
}

impl fmt::Debug for PolicyAuthorizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyAuthorizer")
            .field("policy", &self.policy)
            .field("channels", &self.channels)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ChannelAuthorizer for PolicyAuthorizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn channels(&self) -> &[Channel] {
        &self.channels
    }

    async fn authorize(
        &self,
        principal: &Principal,
        _channel: &Channel,
    ) -> Result<bool, AuthorizerError> {
        self.evaluator.evaluate(principal, &self.policy).await
    }
}

/// Authorizer granting its channels to any principal with a resolvable user
/// key. Used for channels carrying a user's own events.
#[derive(Debug, Clone)]
pub struct SelfAuthorizer {
    channels: Vec<Channel>,
}

impl SelfAuthorizer {
    /// Create an authorizer for `channels`.
    pub fn new(channels: impl IntoIterator<Item = Channel>) -> Self {
        Self { channels: channels.into_iter().collect() }
    }
}

#[async_trait]
impl ChannelAuthorizer for SelfAuthorizer {
    fn name(&self) -> &str {
        "self"
    }

    fn channels(&self) -> &[Channel] {
        &self.channels
    }

    async fn authorize(
        &self,
        principal: &Principal,
        _channel: &Channel,
    ) -> Result<bool, AuthorizerError> {
        Ok(principal.user_key().is_some())
    }
}
