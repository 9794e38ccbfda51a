//! App - Wires configuration, policy, audit, backend and router together

use anyhow::Context;
use audit::{AuditEntry, AuditLog, AuditResult};
use gateway::{QueryBackend, StaticBackend, TimeoutBackend};
use rbac::{PolicyState, PolicyStore};
use router::{builtin_router, CommandRouter, ConsoleServices, HandlerError, Reply};
use shared::{ConsoleConfig, RequestContext};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// One fully assembled console
pub struct App {
    pub config: ConsoleConfig,
    pub policy: Arc<PolicyStore>,
    pub audit: Arc<AuditLog>,
    pub router: CommandRouter,
}

impl App {
    /// Load configuration from `path` (or defaults), then apply environment overrides
    pub fn load_config(path: Option<&Path>) -> anyhow::Result<ConsoleConfig> {
        let mut config = match path {
            Some(path) => ConsoleConfig::from_file(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => ConsoleConfig::default(),
        };
        config.apply_env().context("invalid environment override")?;
        Ok(config)
    }

    /// Open persistent policy and audit stores described by `config`
    pub fn open(config: ConsoleConfig) -> anyhow::Result<Self> {
        let policy = PolicyStore::from_config(&config.policy).context("failed to open policy store")?;
        let audit = AuditLog::from_config(&config.audit)
            .with_context(|| format!("failed to open audit log {}", config.audit.path.display()))?;

        info!(
            audit_path = %config.audit.path.display(),
            policy_path = ?config.policy.state_path,
            admins = policy.list_admins().len(),
            "Console opened"
        );
        Ok(Self::assemble(config, policy, audit))
    }

    /// Volatile console seeded from `config`; nothing touches the disk
    pub fn in_memory(config: ConsoleConfig) -> Self {
        let policy = PolicyStore::with_state(PolicyState::from_config(&config.policy));
        Self::assemble(config, policy, AuditLog::in_memory())
    }

    fn assemble(config: ConsoleConfig, policy: PolicyStore, audit: AuditLog) -> Self {
        let policy = Arc::new(policy);
        let audit = Arc::new(audit);
        let backend: Arc<dyn QueryBackend> = Arc::new(TimeoutBackend::new(
            StaticBackend::from_config(&config.backend),
            Duration::from_secs(config.backend.timeout_secs),
        ));

        let services = Arc::new(
            ConsoleServices::new(policy.clone(), audit.clone(), backend).with_config(&config),
        );
        let router = builtin_router(services, Duration::from_secs(config.handler_timeout_secs));

        Self {
            config,
            policy,
            audit,
            router,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.config.command_prefix
    }

    /// Dispatch one chat line
    pub async fn send(&self, text: &str, ctx: RequestContext) -> anyhow::Result<Reply> {
        Ok(self.router.dispatch(text, ctx).await?)
    }

    /// Replace the whole policy with a backup, audited like a chat command
    pub fn restore(&self, ctx: &RequestContext, state: PolicyState) -> anyhow::Result<AuditResult> {
        let admins = state.admins.len();
        let channels = state.allowed_channels.len();

        let (entry, failure) = match self.policy.restore(&ctx.user_id, state) {
            Ok(()) => (
                AuditEntry::new(ctx, "restore-config", "Restored configuration backup", AuditResult::Success)
                    .with_change("admins", admins)
                    .with_change("allowed_channels", channels),
                None,
            ),
            Err(e) => {
                let err = HandlerError::from(e);
                (
                    AuditEntry::new(ctx, "restore-config", err.to_string(), err.audit_result()),
                    Some(err),
                )
            }
        };

        let result = entry.result;
        self.audit.record(entry)?;
        match failure {
            Some(err) => Err(anyhow::anyhow!(err.user_message())),
            None => Ok(result),
        }
    }
}
