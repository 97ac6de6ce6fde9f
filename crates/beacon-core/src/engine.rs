//! Authorization engine.
//!
//! Evaluates one principal against every channel in the [`AuthorizerIndex`].
//! Within a channel authorizers run in registration order and the first
//! denial short-circuits. Channels are independent and evaluated concurrently.

use std::{collections::BTreeSet, sync::Arc};

use futures::future::join_all;

use crate::{AuthorizerIndex, Channel, ChannelAuthorizer, EngineError, Principal};

/// Partition of every known channel for one principal.
///
/// # Invariants
///
/// - `authorized` and `unauthorized` are disjoint
/// - their union is exactly the index's channel set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationResult {
    authorized: BTreeSet<Channel>,
    unauthorized: BTreeSet<Channel>,
}

impl AuthorizationResult {
    /// Channels the principal may receive.
    pub fn authorized(&self) -> &BTreeSet<Channel> {
        &self.authorized
    }

    /// Channels the principal must not receive.
    pub fn unauthorized(&self) -> &BTreeSet<Channel> {
        &self.unauthorized
    }

    /// Whether `channel` is authorized. Unknown channels are not.
    pub fn is_authorized(&self, channel: &str) -> bool {
        self.authorized.contains(channel)
    }

    /// All channels covered by this result.
    pub fn channels(&self) -> impl Iterator<Item = &Channel> + '_ {
        self.authorized.iter().chain(self.unauthorized.iter())
    }

    /// Result denying every channel of `index`.
    pub fn deny_all(index: &AuthorizerIndex) -> Self {
        Self { authorized: BTreeSet::new(), unauthorized: index.channels().cloned().collect() }
    }

    fn record(&mut self, channel: Channel, granted: bool) {
        if granted {
            self.authorized.insert(channel);
        } else {
            self.unauthorized.insert(channel);
        }
    }
}

/// Evaluates principals against an [`AuthorizerIndex`].
///
/// Holds no mutable state. Safe to share and to call concurrently.
#[derive(Debug, Clone)]
pub struct AuthorizationEngine {
    index: Arc<AuthorizerIndex>,
}

impl AuthorizationEngine {
    /// Create an engine over `index`.
    pub fn new(index: Arc<AuthorizerIndex>) -> Self {
        Self { index }
    }

    /// The index this engine evaluates against.
    pub fn index(&self) -> &Arc<AuthorizerIndex> {
        &self.index
    }

    /// Partition every known channel for `principal`.
    ///
    /// Authorizer failures deny the affected channel and are logged; they do
    /// not fail the call.
    ///
    /// # Errors
    ///
    /// `EngineError::NoAuthorizers` if a channel is indexed with an empty
    /// authorizer list. No authorizer is invoked in that case.
    pub async fn authorize(
        &self,
        principal: &Principal,
    ) -> Result<AuthorizationResult, EngineError> {
        let mut evaluations = Vec::with_capacity(self.index.len());

        for channel in self.index.channels() {
            let authorizers = self.index.authorizers_for(channel.as_str());
            if authorizers.is_empty() {
                tracing::error!(%channel, "channel indexed without authorizers");
                return Err(EngineError::NoAuthorizers(channel.clone()));
            }

            evaluations.push(async move {
                let granted = evaluate_channel(principal, channel, authorizers).await;
                (channel, granted)
            });
        }

        let mut result = AuthorizationResult::default();
        for (channel, granted) in join_all(evaluations).await {
            result.record(channel.clone(), granted);
        }

        tracing::trace!(
            user = ?principal.user_key(),
            authorized = result.authorized.len(),
            unauthorized = result.unauthorized.len(),
            "principal authorized"
        );

        Ok(result)
    }
}

/// AND over `authorizers`, stopping at the first denial.
async fn evaluate_channel(
    principal: &Principal,
    channel: &Channel,
    authorizers: &[Arc<dyn ChannelAuthorizer>],
) -> bool {
    for authorizer in authorizers {
        match authorizer.authorize(principal, channel).await {
            Ok(true) => {},
            Ok(false) => return false,
            Err(err) => {
                tracing::warn!(
                    authorizer = authorizer.name(),
                    %channel,
                    user = ?principal.user_key(),
                    error = %err,
                    "authorizer failed, denying channel"
                );
                return false;
            },
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use futures::executor::block_on;

    use super::*;
    use crate::{SelfAuthorizer, UserKey};

    #[test]
    fn empty_authorizer_list_fails_loudly() {
        let mut snapshot = BTreeMap::new();
        snapshot.insert(Channel::from_static("orphan"), Vec::new());
        let engine = AuthorizationEngine::new(Arc::new(AuthorizerIndex::from_snapshot(snapshot)));

        let result = block_on(engine.authorize(&Principal::new(UserKey(1))));
        assert_eq!(result, Err(EngineError::NoAuthorizers(Channel::from_static("orphan"))));
    }

    #[test]
    fn empty_index_yields_empty_partition() {
        let engine = AuthorizationEngine::new(Arc::new(AuthorizerIndex::builder().build()));

        let result = block_on(engine.authorize(&Principal::new(UserKey(1)))).unwrap();
        assert!(result.authorized().is_empty());
        assert!(result.unauthorized().is_empty());
    }

    #[test]
    fn deny_all_covers_every_channel() {
        let index = AuthorizerIndex::builder()
            .register(SelfAuthorizer::new([Channel::from_static("a"), Channel::from_static("b")]))
            .build();

        let result = AuthorizationResult::deny_all(&index);
        assert!(result.authorized().is_empty());
        assert_eq!(result.unauthorized().len(), 2);
        assert_eq!(result.channels().count(), 2);
    }
}
