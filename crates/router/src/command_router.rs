//! CommandRouter - Resolve, authorize, run and audit one chat command
//!
//! Every message that resolves to a registered command produces exactly one
//! audit entry, written before the reply is handed back to the transport:
//!
//! ```text
//! raw text ─► resolve ─► decide ─┬─ DENY ──► record DENIED ──► denial reply
//!                                └─ ALLOW ─► handler ─► record SUCCESS/ERROR ─► reply
//! ```
//!
//! Text that matches nothing is answered without an audit entry.

use crate::handler::CommandHandler;
use crate::pattern::CommandPattern;
use audit::{AuditEntry, AuditLog, AuditResult};
use rbac::{AuthorizationEngine, Decision};
use shared::{AccessRequirements, AuditError, RequestContext};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Default bound on a single handler run
pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(60);

/// The only failure `dispatch` reports: the audit trail could not be written
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("audit log unavailable: {0}")]
    Audit(#[from] AuditError),
}

/// Static registration record for one command
#[derive(Clone)]
pub struct CommandDescriptor {
    pub name: String,
    pub pattern: CommandPattern,
    pub access: AccessRequirements,
    pub handler: Arc<dyn CommandHandler>,
    /// Argument synopsis shown on bad arity, without the prefix
    pub usage: String,
    pub summary: String,
}

impl CommandDescriptor {
    pub fn new(pattern: CommandPattern, access: AccessRequirements, handler: Arc<dyn CommandHandler>) -> Self {
        let name = pattern.keyword().to_string();
        Self {
            usage: name.clone(),
            name,
            pattern,
            access,
            handler,
            summary: String::new(),
        }
    }

    /// Builder: argument synopsis, e.g. `admin-add <user>`
    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = usage.into();
        self
    }

    /// Builder: one-line description for help listings
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }
}

impl fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("name", &self.name)
            .field("pattern", &self.pattern)
            .field("access", &self.access)
            .finish_non_exhaustive()
    }
}

/// Text handed back to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,

    /// Audit result recorded for this message; `None` when nothing matched
    pub result: Option<AuditResult>,
}

impl Reply {
    fn audited(text: impl Into<String>, result: AuditResult) -> Self {
        Self {
            text: text.into(),
            result: Some(result),
        }
    }

    fn unaudited(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            result: None,
        }
    }

    pub fn is_recognized(&self) -> bool {
        self.result.is_some()
    }
}

/// Records an ERROR entry if the dispatch future is dropped mid-handler
struct PendingAudit<'a> {
    audit: &'a AuditLog,
    cancelled: Option<AuditEntry>,
}

impl<'a> PendingAudit<'a> {
    fn new(audit: &'a AuditLog, ctx: &RequestContext, command: &str) -> Self {
        Self {
            audit,
            cancelled: Some(AuditEntry::new(ctx, command, "cancelled", AuditResult::Error)),
        }
    }

    fn disarm(mut self) {
        self.cancelled = None;
    }
}

impl Drop for PendingAudit<'_> {
    fn drop(&mut self) {
        let Some(entry) = self.cancelled.take() else {
            return;
        };
        warn!(command = %entry.command, user_id = %entry.user_id, "Dispatch cancelled after authorization");
        if let Err(e) = self.audit.record(entry) {
            error!(error = %e, "Failed to audit cancelled dispatch");
        }
    }
}

/// Ordered command table plus the services every dispatch needs
#[derive(Debug)]
pub struct CommandRouter {
    prefix: String,
    descriptors: Vec<CommandDescriptor>,
    authz: AuthorizationEngine,
    audit: Arc<AuditLog>,
    handler_timeout: Duration,
}

impl CommandRouter {
    pub fn new(authz: AuthorizationEngine, audit: Arc<AuditLog>) -> Self {
        Self {
            prefix: "!".to_string(),
            descriptors: Vec::new(),
            authz,
            audit,
            handler_timeout: DEFAULT_HANDLER_TIMEOUT,
        }
    }

    /// Builder: command prefix (default `!`)
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Builder: bound on a single handler run
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = timeout;
        self
    }

    /// Builder: append a command. Earlier registrations win on overlap.
    pub fn register(mut self, descriptor: CommandDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn descriptors(&self) -> &[CommandDescriptor] {
        &self.descriptors
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    fn resolve(&self, text: &str) -> Option<(&CommandDescriptor, String)> {
        self.descriptors
            .iter()
            .find_map(|d| d.pattern.match_text(text).map(|args| (d, args)))
    }

    fn unrecognized(&self) -> Reply {
        Reply::unaudited(format!(
            "❓ Command not recognized. Type `{}help` for the list of commands.",
            self.prefix
        ))
    }

    /// Handle one inbound message
    ///
    /// Fails only when the audit entry for a matched command cannot be
    /// written; the caller must not report success in that case.
    pub async fn dispatch(&self, raw: &str, ctx: RequestContext) -> Result<Reply, RouterError> {
        let Some(text) = raw.trim().strip_prefix(self.prefix.as_str()) else {
            return Ok(self.unrecognized());
        };

        let Some((descriptor, args)) = self.resolve(text) else {
            let usage = self.descriptors.iter().find(|d| d.pattern.matches_keyword(text));
            return Ok(match usage {
                Some(d) => Reply::unaudited(format!("Usage: `{}{}`", self.prefix, d.usage)),
                None => self.unrecognized(),
            });
        };

        let ctx = ctx.with_args(args);
        let command = format!("{}{}", self.prefix, descriptor.name);
        debug!(command = %command, user_id = %ctx.user_id, channel_id = %ctx.channel_id, "Dispatching command");

        if let Decision::Deny(reason) = self.authz.decide(&ctx, &descriptor.access) {
            let entry = AuditEntry::new(&ctx, &command, format!("Denied: {}", reason), AuditResult::Denied);
            self.audit.record(entry)?;
            return Ok(Reply::audited(reason.user_message(), AuditResult::Denied));
        }

        let pending = PendingAudit::new(&self.audit, &ctx, &command);
        let outcome = tokio::time::timeout(self.handler_timeout, descriptor.handler.handle(&ctx)).await;
        pending.disarm();

        let (entry, reply) = match outcome {
            Ok(Ok(outcome)) => (
                AuditEntry::new(&ctx, &command, outcome.action, AuditResult::Success).with_changes(outcome.changes),
                Reply::audited(outcome.reply, AuditResult::Success),
            ),
            Ok(Err(err)) => {
                let result = err.audit_result();
                warn!(command = %command, user_id = %ctx.user_id, error = %err, "Command failed");
                (
                    AuditEntry::new(&ctx, &command, err.to_string(), result),
                    Reply::audited(err.user_message(), result),
                )
            }
            Err(_) => {
                warn!(
                    command = %command,
                    timeout_secs = self.handler_timeout.as_secs_f64(),
                    "Command handler timed out"
                );
                (
                    AuditEntry::new(&ctx, &command, "timeout", AuditResult::Error),
                    Reply::audited("⏱️ The command took too long and was stopped.", AuditResult::Error),
                )
            }
        };

        self.audit.record(entry)?;
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{HandlerError, HandlerOutcome, GENERIC_FAILURE};
    use async_trait::async_trait;
    use audit::MemoryStore;
    use rbac::PolicyStore;
    use shared::{BackendError, PolicyError};

    struct Echo;

    #[async_trait]
    impl CommandHandler for Echo {
        async fn handle(&self, ctx: &RequestContext) -> Result<HandlerOutcome, HandlerError> {
            Ok(HandlerOutcome::new("Echoed", format!("echo: {}", ctx.args)).with_change("args", ctx.args.clone()))
        }
    }

    struct Fails(fn() -> HandlerError);

    #[async_trait]
    impl CommandHandler for Fails {
        async fn handle(&self, _: &RequestContext) -> Result<HandlerOutcome, HandlerError> {
            Err((self.0)())
        }
    }

    struct Sleeps(Duration);

    #[async_trait]
    impl CommandHandler for Sleeps {
        async fn handle(&self, _: &RequestContext) -> Result<HandlerOutcome, HandlerError> {
            tokio::time::sleep(self.0).await;
            Ok(HandlerOutcome::new("Slept", "done"))
        }
    }

    fn ctx(user: &str) -> RequestContext {
        RequestContext::new(user, user.to_lowercase(), "C1", "ops")
    }

    fn router_with(policy: Arc<PolicyStore>, audit: Arc<AuditLog>) -> CommandRouter {
        CommandRouter::new(AuthorizationEngine::new(policy), audit)
            .register(CommandDescriptor::new(
                CommandPattern::optional_args("echo"),
                AccessRequirements::open(),
                Arc::new(Echo),
            ))
            .register(CommandDescriptor::new(
                CommandPattern::required_args("secret"),
                AccessRequirements::admin(),
                Arc::new(Echo),
            ).with_usage("secret <text>"))
            .register(CommandDescriptor::new(
                CommandPattern::optional_args("query"),
                AccessRequirements::admin().with_feature("spl_query"),
                Arc::new(Echo),
            ))
    }

    fn setup() -> (CommandRouter, Arc<PolicyStore>, Arc<AuditLog>) {
        let policy = Arc::new(PolicyStore::new());
        policy.bootstrap("U1").unwrap();
        let audit = Arc::new(AuditLog::in_memory());
        (router_with(policy.clone(), audit.clone()), policy, audit)
    }

    // ============== Resolution Tests ==============

    mod resolution {
        use super::*;

        #[tokio::test]
        async fn test_unrecognized_is_not_audited() {
            let (router, _, audit) = setup();
            let reply = router.dispatch("!nope", ctx("U2")).await.unwrap();
            assert!(!reply.is_recognized());
            assert!(reply.text.contains("!help"));

            let reply = router.dispatch("hello there", ctx("U2")).await.unwrap();
            assert!(!reply.is_recognized());
            assert!(audit.is_empty());
        }

        #[tokio::test]
        async fn test_bad_arity_shows_usage() {
            let (router, _, audit) = setup();
            let reply = router.dispatch("!secret", ctx("U1")).await.unwrap();
            assert_eq!(reply.text, "Usage: `!secret <text>`");
            assert!(audit.is_empty());
        }

        #[tokio::test]
        async fn test_first_registration_wins() {
            let policy = Arc::new(PolicyStore::new());
            let audit = Arc::new(AuditLog::in_memory());
            let router = router_with(policy, audit.clone()).register(CommandDescriptor::new(
                CommandPattern::optional_args("echo"),
                AccessRequirements::open(),
                Arc::new(Fails(|| HandlerError::Internal("shadowed".into()))),
            ));

            let reply = router.dispatch("!echo hi", ctx("U2")).await.unwrap();
            assert_eq!(reply.text, "echo: hi");
        }

        #[tokio::test]
        async fn test_custom_prefix() {
            let (router, _, _) = setup();
            let router = router.with_prefix("/");
            assert!(router.dispatch("/echo", ctx("U2")).await.unwrap().is_recognized());
            assert!(!router.dispatch("!echo", ctx("U2")).await.unwrap().is_recognized());
        }
    }

    // ============== Decision Tests ==============

    mod decisions {
        use super::*;

        #[tokio::test]
        async fn test_open_command_by_non_admin_succeeds() {
            let (router, _, audit) = setup();
            let reply = router.dispatch("!echo a b", ctx("U9")).await.unwrap();

            assert_eq!(reply.result, Some(AuditResult::Success));
            let entries = audit.all();
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].command, "!echo");
            assert_eq!(entries[0].user_id, "U9");
            assert_eq!(entries[0].action, "Echoed");
            assert_eq!(entries[0].changes["args"], serde_json::json!("a b"));
        }

        #[tokio::test]
        async fn test_admin_command_denied_for_non_admin() {
            let (router, _, audit) = setup();
            let reply = router.dispatch("!secret x", ctx("U9")).await.unwrap();

            assert_eq!(reply.result, Some(AuditResult::Denied));
            assert!(reply.text.contains("restricted to admins"));
            assert_eq!(audit.all()[0].result, AuditResult::Denied);
            assert_eq!(audit.all()[0].action, "Denied: NotAdmin");
        }

        #[tokio::test]
        async fn test_feature_disabled_denies_admin() {
            let (router, policy, audit) = setup();
            policy.toggle_feature("spl_query", false).unwrap();

            let reply = router.dispatch("!query index=main", ctx("U1")).await.unwrap();
            assert_eq!(reply.result, Some(AuditResult::Denied));
            assert_eq!(audit.all()[0].action, "Denied: FeatureDisabled");
        }

        #[tokio::test]
        async fn test_channel_not_allowed() {
            let (router, policy, audit) = setup();
            policy.set_channel_allowed("C7", true).unwrap();

            let reply = router.dispatch("!query x", ctx("U1")).await.unwrap();
            assert_eq!(reply.result, Some(AuditResult::Denied));
            assert_eq!(audit.all()[0].action, "Denied: ChannelNotAllowed");
        }
    }

    // ============== Failure Tests ==============

    mod failures {
        use super::*;

        fn failing(err: fn() -> HandlerError) -> (CommandRouter, Arc<AuditLog>) {
            let audit = Arc::new(AuditLog::in_memory());
            let router = CommandRouter::new(AuthorizationEngine::new(Arc::new(PolicyStore::new())), audit.clone())
                .register(CommandDescriptor::new(
                    CommandPattern::optional_args("run"),
                    AccessRequirements::open(),
                    Arc::new(Fails(err)),
                ));
            (router, audit)
        }

        #[tokio::test]
        async fn test_backend_error_audited_as_error() {
            let (router, audit) = failing(|| BackendError::BadResponse("HTTP 502 from 10.0.0.7".into()).into());
            let reply = router.dispatch("!run", ctx("U1")).await.unwrap();

            assert_eq!(reply.result, Some(AuditResult::Error));
            assert!(!reply.text.contains("10.0.0.7"));
            let entry = &audit.all()[0];
            assert_eq!(entry.result, AuditResult::Error);
            assert!(entry.action.contains("10.0.0.7"));
        }

        #[tokio::test]
        async fn test_policy_error_audited_as_error() {
            let (router, audit) = failing(|| PolicyError::LastAdmin.into());
            let reply = router.dispatch("!run", ctx("U1")).await.unwrap();

            assert_eq!(reply.result, Some(AuditResult::Error));
            let entry = &audit.all()[0];
            assert_eq!(entry.result, AuditResult::Error);
            assert_eq!(entry.action, PolicyError::LastAdmin.to_string());
            assert_eq!(audit.stats().denial_count, 0);
        }

        #[tokio::test]
        async fn test_internal_error_reply_is_generic() {
            let (router, _) = failing(|| HandlerError::Internal("stack trace".into()));
            let reply = router.dispatch("!run", ctx("U1")).await.unwrap();
            assert_eq!(reply.text, GENERIC_FAILURE);
        }

        #[tokio::test]
        async fn test_handler_timeout() {
            let audit = Arc::new(AuditLog::in_memory());
            let router = CommandRouter::new(AuthorizationEngine::new(Arc::new(PolicyStore::new())), audit.clone())
                .with_handler_timeout(Duration::from_millis(20))
                .register(CommandDescriptor::new(
                    CommandPattern::no_args("slow"),
                    AccessRequirements::open(),
                    Arc::new(Sleeps(Duration::from_secs(10))),
                ));

            let reply = router.dispatch("!slow", ctx("U1")).await.unwrap();
            assert_eq!(reply.result, Some(AuditResult::Error));
            assert_eq!(audit.all()[0].action, "timeout");
        }

        #[tokio::test]
        async fn test_cancelled_dispatch_still_audited() {
            let audit = Arc::new(AuditLog::in_memory());
            let router = CommandRouter::new(AuthorizationEngine::new(Arc::new(PolicyStore::new())), audit.clone())
                .register(CommandDescriptor::new(
                    CommandPattern::no_args("slow"),
                    AccessRequirements::open(),
                    Arc::new(Sleeps(Duration::from_secs(10))),
                ));

            let result = tokio::time::timeout(Duration::from_millis(20), router.dispatch("!slow", ctx("U1"))).await;
            assert!(result.is_err());

            let entries = audit.all();
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].action, "cancelled");
            assert_eq!(entries[0].result, AuditResult::Error);
        }

        #[tokio::test]
        async fn test_audit_failure_is_fatal() {
            let audit = Arc::new(AuditLog::with_store(Box::new(MemoryStore::failing())).unwrap());
            let router = router_with(Arc::new(PolicyStore::new()), audit);

            let result = router.dispatch("!echo hi", ctx("U1")).await;
            assert!(matches!(result, Err(RouterError::Audit(AuditError::WriteFailure(_)))));

            let result = router.dispatch("!secret x", ctx("U1")).await;
            assert!(result.is_err());
        }
    }
}
