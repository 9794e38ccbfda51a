//! Command handlers and their outcomes

use async_trait::async_trait;
use audit::AuditResult;
use shared::{AuditError, BackendError, PolicyError, RequestContext};
use std::collections::BTreeMap;
use thiserror::Error;

/// What a successful handler reports back to the router
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandlerOutcome {
    /// Text returned to the chat surface
    pub reply: String,

    /// Audit action description
    pub action: String,

    /// State deltas recorded with the audit entry
    pub changes: BTreeMap<String, serde_json::Value>,
}

impl HandlerOutcome {
    pub fn new(action: impl Into<String>, reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            action: action.into(),
            changes: BTreeMap::new(),
        }
    }

    /// Builder: record one state delta
    pub fn with_change(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.changes.insert(key.into(), value.into());
        self
    }
}

/// Handler failures
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("usage: {0}")]
    Usage(String),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// Audit result for this failure
    ///
    /// `DENIED` belongs to the authorization decision alone. Anything a
    /// handler returns, policy refusals included, is an `ERROR`.
    pub fn audit_result(&self) -> AuditResult {
        AuditResult::Error
    }

    /// Reply text for the chat surface. Never carries internal detail.
    pub fn user_message(&self) -> String {
        match self {
            HandlerError::Policy(e) => match e {
                PolicyError::NotAuthorized => "❌ Only admins can do that.".to_string(),
                PolicyError::AlreadyExists(id) => format!("ℹ️ <@{}> is already an admin.", id),
                PolicyError::NotFound(id) => format!("❌ <@{}> is not an admin.", id),
                PolicyError::LastAdmin => "❌ Cannot remove the last admin.".to_string(),
                PolicyError::AlreadyBootstrapped => {
                    "❌ Setup has already been completed. Ask an existing admin for access.".to_string()
                }
                PolicyError::Storage(_) => GENERIC_FAILURE.to_string(),
            },
            HandlerError::Backend(e) => match e {
                BackendError::Unreachable(_) => "❌ The search backend is unreachable.".to_string(),
                BackendError::Timeout(_) => "⏱️ The search backend did not respond in time.".to_string(),
                BackendError::BadResponse(_) => "❌ The search failed.".to_string(),
            },
            HandlerError::Usage(usage) => format!("Usage: `{}`", usage),
            HandlerError::Audit(_) | HandlerError::Internal(_) => GENERIC_FAILURE.to_string(),
        }
    }
}

pub(crate) const GENERIC_FAILURE: &str = "❌ Something went wrong while running that command.";

/// A command implementation bound to a descriptor
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Run the command. `ctx.args` holds the argument text.
    async fn handle(&self, ctx: &RequestContext) -> Result<HandlerOutcome, HandlerError>;
}
