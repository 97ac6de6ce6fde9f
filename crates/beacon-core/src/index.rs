//! Authorizer index.
//!
//! Maps every known channel to the ordered list of authorizers governing it.
//! Authorizers are composed explicitly at startup through
//! [`AuthorizerIndex::builder`]; the map itself is built on first use and
//! published once as an immutable snapshot. Reconfiguring authorizers means
//! building a new index.

use std::{
    collections::{BTreeMap, HashSet},
    fmt,
    sync::{Arc, OnceLock},
};

use crate::{Channel, ChannelAuthorizer};

type Authorizers = Vec<Arc<dyn ChannelAuthorizer>>;

/// Lazily built `channel -> authorizers` map.
///
/// # Invariants
///
/// - Authorizers for a channel keep registration order
/// - An authorizer appears at most once per channel
/// - The snapshot is built at most once and never mutated afterwards
pub struct AuthorizerIndex {
    /// Registered authorizers, in registration order
    authorizers: Authorizers,
    /// Built on first read
    snapshot: OnceLock<BTreeMap<Channel, Authorizers>>,
}

impl AuthorizerIndex {
    /// Start composing an index.
    pub fn builder() -> AuthorizerIndexBuilder {
        AuthorizerIndexBuilder::default()
    }

    /// All known channels, in name order.
    pub fn channels(&self) -> impl Iterator<Item = &Channel> + '_ {
        self.snapshot().keys()
    }

    /// Authorizers governing `channel`, in registration order.
    ///
    /// Empty for channels no authorizer declares.
    pub fn authorizers_for(&self, channel: &str) -> &[Arc<dyn ChannelAuthorizer>] {
        self.snapshot().get(channel).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether some authorizer governs `channel`.
    pub fn contains(&self, channel: &str) -> bool {
        self.snapshot().contains_key(channel)
    }

    /// Number of known channels.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Whether no channel is known.
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Index with a prebuilt snapshot, bypassing the build pass.
    ///
    /// Lets tests construct entries the build pass can never produce.
    #[cfg(test)]
    pub(crate) fn from_snapshot(snapshot: BTreeMap<Channel, Authorizers>) -> Self {
        Self { authorizers: Vec::new(), snapshot: OnceLock::from(snapshot) }
    }

    fn snapshot(&self) -> &BTreeMap<Channel, Authorizers> {
        self.snapshot.get_or_init(|| build(&self.authorizers))
    }
}

fn build(authorizers: &[Arc<dyn ChannelAuthorizer>]) -> BTreeMap<Channel, Authorizers> {
    let mut entries: BTreeMap<Channel, Authorizers> = BTreeMap::new();

    for authorizer in authorizers {
        let mut seen = HashSet::new();
        for channel in authorizer.channels() {
            if seen.insert(channel) {
                entries.entry(channel.clone()).or_default().push(Arc::clone(authorizer));
            }
        }
    }

    tracing::debug!(
        channels = entries.len(),
        authorizers = authorizers.len(),
        "authorizer index built"
    );

    entries
}

impl fmt::Debug for AuthorizerIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizerIndex")
            .field("authorizer_count", &self.authorizers.len())
            .field("built", &self.snapshot.get().is_some())
            .finish()
    }
}

/// Explicit, ordered composition of authorizers.
#[derive(Default)]
pub struct AuthorizerIndexBuilder {
    authorizers: Authorizers,
}

impl AuthorizerIndexBuilder {
    /// Register an authorizer after all previously registered ones.
    #[must_use]
    pub fn register(self, authorizer: impl ChannelAuthorizer + 'static) -> Self {
        self.register_shared(Arc::new(authorizer))
    }

    /// Register an already shared authorizer.
    #[must_use]
    pub fn register_shared(mut self, authorizer: Arc<dyn ChannelAuthorizer>) -> Self {
        self.authorizers.push(authorizer);
        self
    }

    /// Register several shared authorizers, in iteration order.
    #[must_use]
    pub fn register_all(
        mut self,
        authorizers: impl IntoIterator<Item = Arc<dyn ChannelAuthorizer>>,
    ) -> Self {
        self.authorizers.extend(authorizers);
        self
    }

    /// Finish composition. The channel map is built on first use.
    pub fn build(self) -> AuthorizerIndex {
        AuthorizerIndex { authorizers: self.authorizers, snapshot: OnceLock::new() }
    }
}

impl fmt::Debug for AuthorizerIndexBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizerIndexBuilder")
            .field("authorizer_count", &self.authorizers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::{AuthorizerError, Principal};

    struct Named {
        name: &'static str,
        channels: Vec<Channel>,
    }

    impl Named {
        fn new(name: &'static str, channels: &[&'static str]) -> Self {
            Self { name, channels: channels.iter().copied().map(Channel::from_static).collect() }
        }
    }

    #[async_trait]
    impl ChannelAuthorizer for Named {
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
            Ok(true)
        }
    }

    fn names(authorizers: &[Arc<dyn ChannelAuthorizer>]) -> Vec<&str> {
        authorizers.iter().map(|a| a.name()).collect()
    }

    #[test]
    fn channels_are_union_of_declarations() {
        let index = AuthorizerIndex::builder()
            .register(Named::new("a", &["content", "media"]))
            .register(Named::new("b", &["media", "members"]))
            .build();

        let channels: Vec<&str> = index.channels().map(Channel::as_str).collect();
        assert_eq!(channels, vec!["content", "media", "members"]);
        assert_eq!(index.len(), 3);
        assert!(index.contains("members"));
        assert!(!index.contains("webhooks"));
    }

    #[test]
    fn registration_order_is_preserved() {
        let index = AuthorizerIndex::builder()
            .register(Named::new("second", &["admin-feed"]))
            .register(Named::new("first", &["admin-feed"]))
            .register(Named::new("third", &["admin-feed"]))
            .build();

        assert_eq!(names(index.authorizers_for("admin-feed")), vec!["second", "first", "third"]);
    }

    #[test]
    fn duplicate_declaration_is_indexed_once() {
        let index =
            AuthorizerIndex::builder().register(Named::new("a", &["content", "content"])).build();

        assert_eq!(index.authorizers_for("content").len(), 1);
    }

    #[test]
    fn unknown_channel_has_no_authorizers() {
        let index = AuthorizerIndex::builder().register(Named::new("a", &["content"])).build();
        assert!(index.authorizers_for("media").is_empty());
    }

    #[test]
    fn snapshot_is_built_once() {
        let index = AuthorizerIndex::builder().register(Named::new("a", &["content"])).build();
        assert!(!format!("{index:?}").contains("built: true"));

        let first = index.authorizers_for("content").as_ptr();
        let second = index.authorizers_for("content").as_ptr();
        assert_eq!(first, second);
        assert!(format!("{index:?}").contains("built: true"));
    }

    #[test]
    fn empty_builder_yields_empty_index() {
        let index = AuthorizerIndex::builder().build();
        assert!(index.is_empty());
        assert_eq!(index.channels().count(), 0);
    }
}
