//! Authorization error types.

use crate::Channel;

/// Failure while an authorizer evaluates a principal.
///
/// Never treated as a grant. The engine denies the channel and moves on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthorizerError {
    /// Policy evaluation failed or the policy is unknown.
    #[error("policy {policy} could not be evaluated: {reason}")]
    Policy {
        /// Policy name
        policy: String,
        /// Error message
        reason: String,
    },

    /// The external policy store could not be reached.
    #[error("authorizer unavailable: {0}")]
    Unavailable(String),
}

/// Errors from the authorization engine.
///
/// These indicate wiring defects, not user-facing denials.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// A channel is indexed without any authorizer governing it.
    ///
    /// Fatal - report as issue. Authorizer registration is broken.
    #[error("channel {0} is indexed without any authorizer")]
    NoAuthorizers(Channel),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = EngineError::NoAuthorizers(Channel::from_static("admin-feed"));
        assert_eq!(err.to_string(), "channel admin-feed is indexed without any authorizer");

        let err = AuthorizerError::Policy {
            policy: "section.content".to_string(),
            reason: "unknown policy".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "policy section.content could not be evaluated: unknown policy"
        );
    }
}
