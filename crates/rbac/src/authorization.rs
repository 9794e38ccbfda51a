//! AuthorizationEngine - Decides whether a request may run a command

use crate::policy_store::{PolicyState, PolicyStore};
use shared::{AccessRequirements, RequestContext};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Why a request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenyReason {
    NotAdmin,
    FeatureDisabled,
    ChannelNotAllowed,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::NotAdmin => "NotAdmin",
            DenyReason::FeatureDisabled => "FeatureDisabled",
            DenyReason::ChannelNotAllowed => "ChannelNotAllowed",
        }
    }

    /// Message safe to show in chat
    pub fn user_message(&self) -> &'static str {
        match self {
            DenyReason::NotAdmin => "❌ This command is restricted to admins.",
            DenyReason::FeatureDisabled => "❌ This feature is currently disabled.",
            DenyReason::ChannelNotAllowed => "❌ This command is not allowed in this channel.",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an authorization check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Decision::Deny(_))
    }
}

/// Decide against a fixed policy state
///
/// Checks run in order and the first failure wins: identity, then feature
/// flag, then channel allow-list.
pub fn decide(state: &PolicyState, ctx: &RequestContext, req: &AccessRequirements) -> Decision {
    if req.requires_admin && !state.is_admin(&ctx.user_id) {
        return Decision::Deny(DenyReason::NotAdmin);
    }

    if let Some(feature) = &req.restricted_feature {
        if !state.is_feature_enabled(feature) {
            return Decision::Deny(DenyReason::FeatureDisabled);
        }
        if !state.is_channel_allowed(&ctx.channel_id, feature) {
            return Decision::Deny(DenyReason::ChannelNotAllowed);
        }
    }

    Decision::Allow
}

/// Authorization engine bound to the shared policy store
#[derive(Debug, Clone)]
pub struct AuthorizationEngine {
    policy: Arc<PolicyStore>,
}

impl AuthorizationEngine {
    pub fn new(policy: Arc<PolicyStore>) -> Self {
        Self { policy }
    }

    /// Decide against one consistent snapshot of the policy
    pub fn decide(&self, ctx: &RequestContext, req: &AccessRequirements) -> Decision {
        let decision = self.policy.read(|state| decide(state, ctx, req));
        debug!(
            user_id = %ctx.user_id,
            channel_id = %ctx.channel_id,
            ?decision,
            "Authorization decision"
        );
        decision
    }

    pub fn policy(&self) -> &Arc<PolicyStore> {
        &self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(user: &str, channel: &str) -> RequestContext {
        RequestContext::new(user, "someone", channel, "some-channel")
    }

    fn state_with_admin(admin: &str) -> PolicyState {
        let mut state = PolicyState::default();
        state.admins.insert(admin.to_string());
        state
    }

    fn raw_query() -> AccessRequirements {
        AccessRequirements::admin().with_feature("spl_query")
    }

    // ============== Ordering Tests ==============

    #[test]
    fn test_open_command_allowed_for_anyone() {
        let state = state_with_admin("U1");
        for channel in ["C1", "C2"] {
            assert_eq!(decide(&state, &ctx("U9", channel), &AccessRequirements::open()), Decision::Allow);
        }
    }

    #[test]
    fn test_non_admin_denied_regardless_of_feature_and_channel() {
        let mut state = state_with_admin("U1");
        state.allowed_channels.insert("C1".to_string());

        for enabled in [true, false] {
            state.features.insert("spl_query".to_string(), enabled);
            for channel in ["C1", "C2"] {
                assert_eq!(
                    decide(&state, &ctx("U9", channel), &raw_query()),
                    Decision::Deny(DenyReason::NotAdmin)
                );
            }
        }
    }

    #[test]
    fn test_feature_disabled_checked_before_channel() {
        let mut state = state_with_admin("U1");
        state.allowed_channels.insert("C1".to_string());
        state.features.insert("spl_query".to_string(), false);

        // Allowed channel and disallowed channel both report the feature
        assert_eq!(decide(&state, &ctx("U1", "C1"), &raw_query()), Decision::Deny(DenyReason::FeatureDisabled));
        assert_eq!(decide(&state, &ctx("U1", "C2"), &raw_query()), Decision::Deny(DenyReason::FeatureDisabled));
    }

    #[test]
    fn test_feature_disabled_for_non_admin_only_feature() {
        let mut state = PolicyState::default();
        state.features.insert("spl_query".to_string(), false);
        let req = AccessRequirements::open().with_feature("spl_query");

        assert_eq!(decide(&state, &ctx("U9", "C1"), &req), Decision::Deny(DenyReason::FeatureDisabled));
    }

    #[test]
    fn test_channel_not_allowed() {
        let mut state = state_with_admin("U1");
        state.allowed_channels.insert("C1".to_string());

        assert_eq!(decide(&state, &ctx("U1", "C2"), &raw_query()), Decision::Deny(DenyReason::ChannelNotAllowed));
        assert_eq!(decide(&state, &ctx("U1", "C1"), &raw_query()), Decision::Allow);
    }

    #[test]
    fn test_empty_allow_list_allows_admin_everywhere() {
        let state = state_with_admin("U1");
        assert_eq!(decide(&state, &ctx("U1", "C42"), &raw_query()), Decision::Allow);
    }

    // ============== Engine Tests ==============

    #[test]
    fn test_engine_reads_live_policy() {
        let store = Arc::new(PolicyStore::new());
        let engine = AuthorizationEngine::new(Arc::clone(&store));
        let request = ctx("U1", "C1");

        assert!(engine.decide(&request, &AccessRequirements::admin()).is_denied());
        store.bootstrap("U1").unwrap();
        assert!(engine.decide(&request, &AccessRequirements::admin()).is_allowed());
    }

    #[test]
    fn test_deny_reason_display() {
        assert_eq!(DenyReason::NotAdmin.to_string(), "NotAdmin");
        assert_eq!(DenyReason::ChannelNotAllowed.as_str(), "ChannelNotAllowed");
        assert!(DenyReason::FeatureDisabled.user_message().contains("disabled"));
    }
}
