//! Property-based tests for AuthorizationEngine
//!
//! These tests verify invariants that must hold for every authorizer set and
//! every principal: the result partitions the known channels, and a channel
//! is granted exactly when all of its authorizers grant it.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use async_trait::async_trait;
use beacon_core::{
    AuthorizationEngine, AuthorizerError, AuthorizerIndex, Channel, ChannelAuthorizer, Principal,
    UserKey,
};
use futures::executor::block_on;
use proptest::prelude::*;

/// Authorizer denying a fixed set of `(user, channel)` pairs and granting
/// everything else it governs.
struct Table {
    channels: Vec<Channel>,
    denied: BTreeSet<(u128, String)>,
}

#[async_trait]
impl ChannelAuthorizer for Table {
    fn name(&self) -> &str {
        "table"
    }

    fn channels(&self) -> &[Channel] {
        &self.channels
    }

    async fn authorize(
        &self,
        principal: &Principal,
        channel: &Channel,
    ) -> Result<bool, AuthorizerError> {
        let user = principal.user_key().map_or(0, |key| key.0);
        Ok(!self.denied.contains(&(user, channel.as_str().to_string())))
    }
}

/// One authorizer: channels it governs and the (user, channel) pairs it denies.
fn authorizer_strategy() -> impl Strategy<Value = (Vec<u8>, Vec<(u8, u8)>)> {
    (prop::collection::vec(0u8..8, 1..5), prop::collection::vec((0u8..4, 0u8..8), 0..10))
}

fn channel_name(id: u8) -> String {
    format!("channel-{id}")
}

fn build(tables: &[(Vec<u8>, Vec<(u8, u8)>)]) -> AuthorizerIndex {
    let mut builder = AuthorizerIndex::builder();
    for (channels, denied) in tables {
        builder = builder.register(Table {
            channels: channels.iter().map(|&c| Channel::new(channel_name(c))).collect(),
            denied: denied.iter().map(|&(u, c)| (u128::from(u), channel_name(c))).collect(),
        });
    }
    builder.build()
}

/// Expected grant per channel: AND over every authorizer declaring it.
fn expected(tables: &[(Vec<u8>, Vec<(u8, u8)>)], user: u8) -> BTreeMap<String, bool> {
    let mut grants: BTreeMap<String, bool> = BTreeMap::new();
    for (channels, denied) in tables {
        for &channel in channels {
            let denies = denied.contains(&(user, channel));
            let entry = grants.entry(channel_name(channel)).or_insert(true);
            *entry = *entry && !denies;
        }
    }
    grants
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: authorized and unauthorized partition the known channel set
    #[test]
    fn prop_result_partitions_known_channels(
        tables in prop::collection::vec(authorizer_strategy(), 0..6),
        user in 0u8..4
    ) {
        let index = Arc::new(build(&tables));
        let known: BTreeSet<Channel> = index.channels().cloned().collect();
        let engine = AuthorizationEngine::new(Arc::clone(&index));

        let result = block_on(engine.authorize(&Principal::new(UserKey(u128::from(user)))))?;

        prop_assert!(result.authorized().is_disjoint(result.unauthorized()));
        let union: BTreeSet<Channel> =
            result.authorized().union(result.unauthorized()).cloned().collect();
        prop_assert_eq!(union, known);
    }

    /// Property: a channel is authorized iff every governing authorizer grants it
    #[test]
    fn prop_channel_granted_iff_all_authorizers_grant(
        tables in prop::collection::vec(authorizer_strategy(), 1..6),
        user in 0u8..4
    ) {
        let engine = AuthorizationEngine::new(Arc::new(build(&tables)));
        let result = block_on(engine.authorize(&Principal::new(UserKey(u128::from(user)))))?;

        for (channel, granted) in expected(&tables, user) {
            prop_assert_eq!(result.is_authorized(&channel), granted, "channel {}", channel);
        }
    }

    /// Property: reversing registration order never changes the outcome
    #[test]
    fn prop_registration_order_does_not_change_outcome(
        tables in prop::collection::vec(authorizer_strategy(), 1..6),
        user in 0u8..4
    ) {
        let mut reversed = tables.clone();
        reversed.reverse();
        let principal = Principal::new(UserKey(u128::from(user)));

        let forward = AuthorizationEngine::new(Arc::new(build(&tables)));
        let backward = AuthorizationEngine::new(Arc::new(build(&reversed)));

        prop_assert_eq!(
            block_on(forward.authorize(&principal))?,
            block_on(backward.authorize(&principal))?
        );
    }
}
