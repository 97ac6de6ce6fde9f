//! Policy evaluation seam.
//!
//! How a policy is decided (roles, claims, resource ownership) lives outside
//! this crate. [`ClaimPolicyEvaluator`] is a fixed claims table for tests and
//! small deployments.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::{AuthorizerError, Claim, Principal};

/// Evaluates a named access policy for a principal.
#[async_trait]
pub trait PolicyEvaluator: Send + Sync {
    /// Whether `principal` satisfies `policy`.
    ///
    /// Unknown policies must be reported as errors, never as grants.
    async fn evaluate(&self, principal: &Principal, policy: &str) -> Result<bool, AuthorizerError>;
}

/// Policy evaluator backed by a table of accepted claims.
///
/// A policy is satisfied when the principal carries any one of the claims
/// registered for it.
#[derive(Debug, Clone, Default)]
pub struct ClaimPolicyEvaluator {
    policies: HashMap<String, Vec<Claim>>,
}

impl ClaimPolicyEvaluator {
    /// Create an evaluator with no policies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `claim` as satisfying `policy`.
    #[must_use]
    pub fn require_claim(mut self, policy: impl Into<String>, claim: Claim) -> Self {
        self.policies.entry(policy.into()).or_default().push(claim);
        self
    }

    /// Accept `role` as satisfying `policy`.
    #[must_use]
    pub fn require_role(self, policy: impl Into<String>, role: impl Into<String>) -> Self {
        self.require_claim(policy, Claim::role(role))
    }
}

#[async_trait]
impl PolicyEvaluator for ClaimPolicyEvaluator {
    async fn evaluate(&self, principal: &Principal, policy: &str) -> Result<bool, AuthorizerError> {
        let accepted = self.policies.get(policy).ok_or_else(|| AuthorizerError::Policy {
            policy: policy.to_string(),
            reason: "unknown policy".to_string(),
        })?;

        Ok(accepted.iter().any(|claim| principal.has_claim(&claim.kind, &claim.value)))
    }
}
