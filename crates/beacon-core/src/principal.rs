//! Identity types: users, principals, connections and channels.

use std::{
    borrow::{Borrow, Cow},
    fmt,
};

use serde::{Deserialize, Serialize};

/// Claim type used for role membership.
pub const ROLE_CLAIM: &str = "role";

/// Stable identifier of a back-office user.
///
/// UUID-sized and opaque to this crate. Displayed as 32 lowercase hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserKey(pub u128);

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl From<u128> for UserKey {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

/// Identifier of one live transport session.
///
/// Assigned by the transport. Owned by exactly one user and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Wrap a transport-assigned identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ConnectionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Name of a broadcast channel (event source).
///
/// Catalogue channels are `'static`; channels declared at runtime own their
/// name. Both compare and hash as the plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Channel(Cow<'static, str>);

impl Channel {
    /// Channel with a static name, usable in `const` items.
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Channel with an owned name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// The channel name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Channel {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for Channel {
    fn from(value: &'static str) -> Self {
        Self::from_static(value)
    }
}

/// A single `(type, value)` claim carried by a principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Claim {
    /// Claim type, e.g. [`ROLE_CLAIM`]
    pub kind: String,
    /// Claim value
    pub value: String,
}

impl Claim {
    /// Create a claim.
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self { kind: kind.into(), value: value.into() }
    }

    /// Create a role claim.
    pub fn role(role: impl Into<String>) -> Self {
        Self::new(ROLE_CLAIM, role)
    }
}

/// An authenticated identity presented for channel authorization.
///
/// Built per authorization call and never persisted here. The user key is
/// optional so an unresolvable principal can be represented and rejected by
/// callers that require one.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Principal {
    user_key: Option<UserKey>,
    claims: Vec<Claim>,
}

impl Principal {
    /// Principal for a known user, without claims.
    pub fn new(user_key: UserKey) -> Self {
        Self { user_key: Some(user_key), claims: Vec::new() }
    }

    /// Principal without a resolvable user key.
    pub fn unresolved() -> Self {
        Self::default()
    }

    /// Add a claim.
    #[must_use]
    pub fn with_claim(mut self, claim: Claim) -> Self {
        if !self.claims.contains(&claim) {
            self.claims.push(claim);
        }
        self
    }

    /// Add a role claim.
    #[must_use]
    pub fn with_role(self, role: impl Into<String>) -> Self {
        self.with_claim(Claim::role(role))
    }

    /// The user key, if resolvable.
    pub fn user_key(&self) -> Option<UserKey> {
        self.user_key
    }

    /// All claims in insertion order.
    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    /// Whether the principal carries the exact claim.
    pub fn has_claim(&self, kind: &str, value: &str) -> bool {
        self.claims.iter().any(|c| c.kind == kind && c.value == value)
    }

    /// Whether the principal carries the role.
    pub fn has_role(&self, role: &str) -> bool {
        self.has_claim(ROLE_CLAIM, role)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn user_key_displays_as_fixed_width_hex() {
        assert_eq!(UserKey(0xab).to_string(), "000000000000000000000000000000ab");
    }

    #[test]
    fn static_and_owned_channels_are_equal() {
        let fixed = Channel::from_static("backoffice:document");
        let owned = Channel::new(String::from("backoffice:document"));
        assert_eq!(fixed, owned);

        let mut map = HashMap::new();
        map.insert(owned, 1);
        assert_eq!(map.get("backoffice:document"), Some(&1));
    }

    #[test]
    fn duplicate_claims_are_ignored() {
        let principal = Principal::new(UserKey(1)).with_role("editor").with_role("editor");
        assert_eq!(principal.claims().len(), 1);
        assert!(principal.has_role("editor"));
        assert!(!principal.has_role("admin"));
    }

    #[test]
    fn unresolved_principal_has_no_user_key() {
        assert!(Principal::unresolved().user_key().is_none());
    }
}
