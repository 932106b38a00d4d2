use std::sync::Arc;

use async_trait::async_trait;

use super::identity::IdentityState;
use super::policy::PolicyRequirement;
use crate::errors::AppResult;
use crate::models::access_control_list::CapabilitySet;
use crate::models::user::User;

/// Outcome of a policy or field check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Succeed,
    Fail,
}

impl Decision {
    pub fn from_bool(allowed: bool) -> Self {
        if allowed {
            Decision::Succeed
        } else {
            Decision::Fail
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Succeed)
    }
}

/// Read access to users and their capability sets.
#[async_trait]
pub trait CurrentUserProvider: Send + Sync {
    async fn find_user(&self, user_id: i64) -> AppResult<Option<User>>;

    async fn capabilities(&self, user_id: i64) -> AppResult<Option<CapabilitySet>>;
}

/// Policy evaluator trait for pluggable authorization logic
#[async_trait]
pub trait PolicyEvaluator: Send + Sync {
    async fn evaluate(&self, identity: &IdentityState, requirement: &PolicyRequirement) -> Decision;
}

/// Default evaluator: the requirement's capability flag must be set on the
/// acting user's capability set.
///
/// Anonymous identities, users without a set and failed lookups all fail.
#[derive(Clone)]
pub struct DefaultPolicyEvaluator {
    users: Arc<dyn CurrentUserProvider>,
}

impl DefaultPolicyEvaluator {
    pub fn new(users: Arc<dyn CurrentUserProvider>) -> Self {
        Self { users }
    }

    /// Loads the capability set of the acting user, `None` when there is
    /// nothing to evaluate against.
    pub async fn capability_set(&self, identity: &IdentityState) -> Option<CapabilitySet> {
        let snapshot = identity.snapshot()?;

        match self.users.capabilities(snapshot.user_id).await {
            Ok(set) => set,
            Err(err) => {
                tracing::warn!(
                    user_id = snapshot.user_id,
                    error = %err,
                    "capability lookup failed"
                );
                None
            }
        }
    }

    pub fn evaluate_set(capabilities: &CapabilitySet, requirement: &PolicyRequirement) -> Decision {
        Decision::from_bool(capabilities.get(requirement.capability))
    }
}

#[async_trait]
impl PolicyEvaluator for DefaultPolicyEvaluator {
    async fn evaluate(&self, identity: &IdentityState, requirement: &PolicyRequirement) -> Decision {
        let Some(capabilities) = self.capability_set(identity).await else {
            tracing::debug!(policy = %requirement.name, "no capability set, denying");
            return Decision::Fail;
        };

        let decision = Self::evaluate_set(&capabilities, requirement);
        tracing::debug!(
            user_id = capabilities.user_id,
            policy = %requirement.name,
            allowed = decision.is_allowed(),
            "policy evaluated"
        );
        decision
    }
}
