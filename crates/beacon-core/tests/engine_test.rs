//! Authorization engine behavior tests
//!
//! Covers AND semantics across authorizers, short-circuit evaluation and
//! fail-closed handling of authorizer errors.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use beacon_core::{
    AuthorizationEngine, AuthorizerError, AuthorizerIndex, Channel, ChannelAuthorizer, Principal,
    UserKey,
};

/// Authorizer with a fixed answer that counts its invocations.
struct Fixed {
    name: &'static str,
    channels: Vec<Channel>,
    answer: Result<bool, AuthorizerError>,
    calls: Arc<AtomicUsize>,
}

impl Fixed {
    fn new(name: &'static str, channels: &[&'static str], answer: bool) -> Self {
        Self::answering(name, channels, Ok(answer))
    }

    fn answering(
        name: &'static str,
        channels: &[&'static str],
        answer: Result<bool, AuthorizerError>,
    ) -> Self {
        Self {
            name,
            channels: channels.iter().copied().map(Channel::from_static).collect(),
            answer,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl ChannelAuthorizer for Fixed {
    fn name(&self) -> &str {
        self.name
    }

    fn channels(&self) -> &[Channel] {
        &self.channels
    }

    async fn authorize(
        &self,
        _principal: &Principal,
        _channel: &Channel,
    ) -> Result<bool, AuthorizerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }
}

fn engine(index: AuthorizerIndex) -> AuthorizationEngine {
    AuthorizationEngine::new(Arc::new(index))
}

fn principal() -> Principal {
    Principal::new(UserKey(0x42)).with_role("editor")
}

/// A single granting authorizer authorizes its channel.
#[tokio::test]
async fn single_grant_authorizes_channel() {
    let index = AuthorizerIndex::builder().register(Fixed::new("x", &["content"], true)).build();
    let engine = engine(index);

    let result = engine.authorize(&principal()).await.unwrap();
    assert!(result.is_authorized("content"));
    assert!(result.unauthorized().is_empty());
}

/// Mixed authorizers on one channel deny it, whichever registers first.
#[tokio::test]
async fn mixed_authorizers_deny_regardless_of_order() {
    let allow_first = AuthorizerIndex::builder()
        .register(Fixed::new("allow", &["admin-feed"], true))
        .register(Fixed::new("deny", &["admin-feed"], false))
        .build();
    let deny_first = AuthorizerIndex::builder()
        .register(Fixed::new("deny", &["admin-feed"], false))
        .register(Fixed::new("allow", &["admin-feed"], true))
        .build();

    for index in [allow_first, deny_first] {
        let result = engine(index).authorize(&principal()).await.unwrap();
        assert!(result.unauthorized().contains("admin-feed"));
        assert!(!result.is_authorized("admin-feed"));
    }
}

/// The first denial stops evaluation of the channel.
#[tokio::test]
async fn denial_short_circuits_remaining_authorizers() {
    let deny = Fixed::new("deny", &["admin-feed"], false);
    let after = Fixed::new("after", &["admin-feed"], true);
    let after_calls = after.calls();

    let engine = engine(AuthorizerIndex::builder().register(deny).register(after).build());
    let result = engine.authorize(&principal()).await.unwrap();

    assert!(!result.is_authorized("admin-feed"));
    assert_eq!(after_calls.load(Ordering::SeqCst), 0);
}

/// One authorizer governing several channels is asked once per channel.
#[tokio::test]
async fn shared_authorizer_evaluated_per_channel() {
    let shared = Fixed::new("shared", &["content", "media", "members"], true);
    let calls = shared.calls();

    let engine = engine(AuthorizerIndex::builder().register(shared).build());
    let result = engine.authorize(&principal()).await.unwrap();

    assert_eq!(result.authorized().len(), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

/// An authorizer error denies only the channel it was evaluating.
#[tokio::test]
async fn authorizer_error_fails_closed_and_continues() {
    let broken = Fixed::answering(
        "broken",
        &["members"],
        Err(AuthorizerError::Unavailable("policy store timeout".to_string())),
    );
    let healthy = Fixed::new("healthy", &["content"], true);

    let engine = engine(AuthorizerIndex::builder().register(broken).register(healthy).build());
    let result = engine.authorize(&principal()).await.unwrap();

    assert!(result.unauthorized().contains("members"));
    assert!(result.is_authorized("content"));
}

/// Unknown channels are never reported as authorized.
#[tokio::test]
async fn unknown_channel_is_not_authorized() {
    let index = AuthorizerIndex::builder().register(Fixed::new("x", &["content"], true)).build();
    let engine = engine(index);

    let result = engine.authorize(&principal()).await.unwrap();
    assert!(!result.is_authorized("webhooks"));
    assert!(!result.unauthorized().contains("webhooks"));
}

/// Concurrent evaluations for different principals are independent.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_authorizations_agree() {
    let engine = Arc::new(engine(
        AuthorizerIndex::builder()
            .register(Fixed::new("a", &["content", "media"], true))
            .register(Fixed::new("b", &["media"], false))
            .build(),
    ));

    let mut handles = Vec::new();
    for user in 0..32u128 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine.authorize(&Principal::new(UserKey(user))).await
        }));
    }

    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        assert!(result.is_authorized("content"));
        assert!(!result.is_authorized("media"));
    }
}
