//! Built-in chat commands
//!
//! [`Builtin::ALL`] is the registration order used by [`builtin_router`], so
//! it is also the tie-break order when patterns overlap.

use crate::command_router::{CommandDescriptor, CommandRouter};
use crate::handler::{CommandHandler, HandlerError, HandlerOutcome};
use crate::pattern::{ArgGrammar, CommandPattern};
use async_trait::async_trait;
use audit::{export, AuditEntry, AuditLog, ExportFormat};
use gateway::{parse_search_args, QueryBackend, ResultSet};
use rbac::{decide, AuthorizationEngine, PolicyStore};
use shared::{
    normalize_id, parse_channel_ref, parse_user_ref, AccessRequirements, ConsoleConfig, RequestContext,
    FEATURE_APPROVAL, FEATURE_SPL_QUERY,
};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

/// Default row limit for `search-list`
const SEARCH_LIST_LIMIT: usize = 20;

/// Shared services handed to every built-in handler
pub struct ConsoleServices {
    pub policy: Arc<PolicyStore>,
    pub audit: Arc<AuditLog>,
    pub backend: Arc<dyn QueryBackend>,
    pub prefix: String,
    pub result_limit: usize,
    pub max_page_size: usize,
}

impl ConsoleServices {
    pub fn new(policy: Arc<PolicyStore>, audit: Arc<AuditLog>, backend: Arc<dyn QueryBackend>) -> Self {
        Self {
            policy,
            audit,
            backend,
            prefix: "!".to_string(),
            result_limit: 5,
            max_page_size: 50,
        }
    }

    /// Builder: take prefix and limits from configuration
    pub fn with_config(mut self, config: &ConsoleConfig) -> Self {
        self.prefix = config.command_prefix.clone();
        self.result_limit = config.backend.result_limit;
        self.max_page_size = config.audit.max_page_size;
        self
    }

    fn cmd(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }
}

/// The built-in command set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Help,
    Whoami,
    Setup,
    AdminList,
    AdminAdd,
    AdminRemove,
    ChannelAdd,
    ChannelRemove,
    FeatureToggle,
    ConfigShow,
    ConfigBackup,
    AuditLogs,
    ExportLogs,
    SearchHistory,
    SearchAlert,
    SearchList,
    BackendStatus,
    RawQuery,
}

impl Builtin {
    pub const ALL: [Builtin; 18] = [
        Builtin::Help,
        Builtin::Whoami,
        Builtin::Setup,
        Builtin::AdminList,
        Builtin::AdminAdd,
        Builtin::AdminRemove,
        Builtin::ChannelAdd,
        Builtin::ChannelRemove,
        Builtin::FeatureToggle,
        Builtin::ConfigShow,
        Builtin::ConfigBackup,
        Builtin::AuditLogs,
        Builtin::ExportLogs,
        Builtin::SearchHistory,
        Builtin::SearchAlert,
        Builtin::SearchList,
        Builtin::BackendStatus,
        Builtin::RawQuery,
    ];

    pub fn keyword(&self) -> &'static str {
        match self {
            Builtin::Help => "help",
            Builtin::Whoami => "whoami",
            Builtin::Setup => "setup",
            Builtin::AdminList => "admin-list",
            Builtin::AdminAdd => "admin-add",
            Builtin::AdminRemove => "admin-remove",
            Builtin::ChannelAdd => "admin-channel-add",
            Builtin::ChannelRemove => "admin-channel-remove",
            Builtin::FeatureToggle => "feature-toggle",
            Builtin::ConfigShow => "config-show",
            Builtin::ConfigBackup => "config-backup",
            Builtin::AuditLogs => "audit-logs",
            Builtin::ExportLogs => "export-logs",
            Builtin::SearchHistory => "search-history",
            Builtin::SearchAlert => "search-alert",
            Builtin::SearchList => "search-list",
            Builtin::BackendStatus => "splunk-status",
            Builtin::RawQuery => "splunk-query",
        }
    }

    fn grammar(&self) -> ArgGrammar {
        match self {
            Builtin::Help
            | Builtin::Whoami
            | Builtin::Setup
            | Builtin::AdminList
            | Builtin::ConfigShow
            | Builtin::ConfigBackup
            | Builtin::BackendStatus => ArgGrammar::NoArgs,
            Builtin::AuditLogs | Builtin::ExportLogs | Builtin::SearchHistory | Builtin::SearchList => {
                ArgGrammar::OptionalArgs
            }
            Builtin::AdminAdd
            | Builtin::AdminRemove
            | Builtin::ChannelAdd
            | Builtin::ChannelRemove
            | Builtin::FeatureToggle
            | Builtin::SearchAlert
            | Builtin::RawQuery => ArgGrammar::RequiredArgs,
        }
    }

    pub fn access(&self) -> AccessRequirements {
        match self {
            Builtin::Help
            | Builtin::Whoami
            | Builtin::Setup
            | Builtin::AdminList
            | Builtin::SearchAlert
            | Builtin::SearchList
            | Builtin::BackendStatus => AccessRequirements::open(),
            Builtin::RawQuery => AccessRequirements::admin().with_feature(FEATURE_SPL_QUERY),
            _ => AccessRequirements::admin(),
        }
    }

    pub fn usage(&self) -> &'static str {
        match self {
            Builtin::AdminAdd => "admin-add @user",
            Builtin::AdminRemove => "admin-remove @user",
            Builtin::ChannelAdd => "admin-channel-add #channel",
            Builtin::ChannelRemove => "admin-channel-remove #channel",
            Builtin::FeatureToggle => "feature-toggle <spl_query|approval> [on|off]",
            Builtin::AuditLogs => "audit-logs [count]",
            Builtin::ExportLogs => "export-logs [json|csv|txt]",
            Builtin::SearchHistory => "search-history [count]",
            Builtin::SearchAlert => "search-alert <name> [earliest=-24h] [latest=now] [limit=n]",
            Builtin::SearchList => "search-list [keyword] [limit=n]",
            Builtin::RawQuery => "splunk-query \"<query>\"",
            other => other.keyword(),
        }
    }

    pub fn summary(&self) -> &'static str {
        match self {
            Builtin::Help => "Show this message",
            Builtin::Whoami => "Show your identity and permissions",
            Builtin::Setup => "Become the first admin (only while no admin exists)",
            Builtin::AdminList => "List admins",
            Builtin::AdminAdd => "Grant admin rights",
            Builtin::AdminRemove => "Revoke admin rights",
            Builtin::ChannelAdd => "Allow raw queries in a channel",
            Builtin::ChannelRemove => "Stop allowing raw queries in a channel",
            Builtin::FeatureToggle => "Enable or disable a feature",
            Builtin::ConfigShow => "Show the current policy",
            Builtin::ConfigBackup => "Dump the policy as JSON",
            Builtin::AuditLogs => "Show recent audit entries",
            Builtin::ExportLogs => "Export the audit log",
            Builtin::SearchHistory => "Show recent raw queries",
            Builtin::SearchAlert => "Run a saved search",
            Builtin::SearchList => "List saved searches",
            Builtin::BackendStatus => "Check the search backend",
            Builtin::RawQuery => "Run a raw query",
        }
    }

    /// Registration record bound to `services`
    pub fn descriptor(self, services: Arc<ConsoleServices>) -> CommandDescriptor {
        CommandDescriptor::new(
            CommandPattern::new(self.keyword(), self.grammar()),
            self.access(),
            Arc::new(BuiltinHandler { command: self, services }),
        )
        .with_usage(self.usage())
        .with_summary(self.summary())
    }
}

/// Router with every built-in command registered in table order
pub fn builtin_router(services: Arc<ConsoleServices>, handler_timeout: Duration) -> CommandRouter {
    let router = CommandRouter::new(AuthorizationEngine::new(services.policy.clone()), services.audit.clone())
        .with_prefix(services.prefix.clone())
        .with_handler_timeout(handler_timeout);

    Builtin::ALL
        .iter()
        .fold(router, |router, cmd| router.register(cmd.descriptor(services.clone())))
}

struct BuiltinHandler {
    command: Builtin,
    services: Arc<ConsoleServices>,
}

#[async_trait]
impl CommandHandler for BuiltinHandler {
    async fn handle(&self, ctx: &RequestContext) -> Result<HandlerOutcome, HandlerError> {
        let s = self.services.as_ref();
        match self.command {
            Builtin::Help => Ok(help(s, ctx)),
            Builtin::Whoami => Ok(whoami(s, ctx)),
            Builtin::Setup => setup(s, ctx),
            Builtin::AdminList => Ok(admin_list(s)),
            Builtin::AdminAdd => admin_add(s, ctx),
            Builtin::AdminRemove => admin_remove(s, ctx),
            Builtin::ChannelAdd => channel_allow(s, ctx, true),
            Builtin::ChannelRemove => channel_allow(s, ctx, false),
            Builtin::FeatureToggle => feature_toggle(s, ctx),
            Builtin::ConfigShow => Ok(config_show(s)),
            Builtin::ConfigBackup => config_backup(s),
            Builtin::AuditLogs => audit_logs(s, ctx),
            Builtin::ExportLogs => export_logs(s, ctx),
            Builtin::SearchHistory => search_history(s, ctx),
            Builtin::SearchAlert => search_alert(s, ctx).await,
            Builtin::SearchList => search_list(s, ctx).await,
            Builtin::BackendStatus => backend_status(s).await,
            Builtin::RawQuery => raw_query(s, ctx).await,
        }
    }
}

fn usage(s: &ConsoleServices, cmd: Builtin) -> HandlerError {
    HandlerError::Usage(s.cmd(cmd.usage()))
}

fn help(s: &ConsoleServices, ctx: &RequestContext) -> HandlerOutcome {
    let is_admin = s.policy.is_admin(&ctx.user_id);
    let mut text = String::from("📖 Available commands:\n");
    for cmd in Builtin::ALL {
        let marker = if cmd.access().requires_admin { " *(admin only)*" } else { "" };
        let _ = writeln!(text, "• `{}` – {}{}", s.cmd(cmd.usage()), cmd.summary(), marker);
    }
    if !is_admin && s.policy.list_admins().is_empty() {
        let _ = write!(text, "\nNo admin is configured yet. Run `{}` to claim the role.", s.cmd("setup"));
    }
    HandlerOutcome::new("Viewed help", text.trim_end())
}

fn whoami(s: &ConsoleServices, ctx: &RequestContext) -> HandlerOutcome {
    let (is_admin, can_query) = s.policy.read(|state| {
        let query_access = Builtin::RawQuery.access();
        (state.is_admin(&ctx.user_id), decide(state, ctx, &query_access).is_allowed())
    });

    let text = format!(
        "👤 User: {} ({})\nChannel: {} ({})\nAdmin: {}\nRaw queries here: {}",
        ctx.user_name,
        ctx.user_id,
        ctx.channel_name,
        ctx.channel_id,
        if is_admin { "🟢 Yes" } else { "🔴 No" },
        if can_query { "🟢 Allowed" } else { "🔴 Not allowed" },
    );
    HandlerOutcome::new("Checked identity", text)
}

fn setup(s: &ConsoleServices, ctx: &RequestContext) -> Result<HandlerOutcome, HandlerError> {
    s.policy.bootstrap(&ctx.user_id)?;
    Ok(HandlerOutcome::new(
        "Bootstrapped first admin",
        format!("✅ Setup complete. <@{}> is now the first admin.", ctx.user_id),
    )
    .with_change("new_admin", ctx.user_id.clone()))
}

fn admin_list(s: &ConsoleServices) -> HandlerOutcome {
    let admins = s.policy.list_admins();
    let text = if admins.is_empty() {
        format!("👥 No admins configured. Run `{}` to become the first admin.", s.cmd("setup"))
    } else {
        let mut text = format!("👥 Admins ({}):", admins.len());
        for id in &admins {
            let _ = write!(text, "\n• <@{}>", id);
        }
        text
    };
    HandlerOutcome::new("Listed admins", text)
}

fn admin_add(s: &ConsoleServices, ctx: &RequestContext) -> Result<HandlerOutcome, HandlerError> {
    let target = parse_user_ref(&ctx.args).ok_or_else(|| usage(s, Builtin::AdminAdd))?;
    s.policy.add_admin(&ctx.user_id, &target)?;
    Ok(
        HandlerOutcome::new("Added new admin user", format!("✅ <@{}> is now an admin.", target))
            .with_change("new_admin", target),
    )
}

fn admin_remove(s: &ConsoleServices, ctx: &RequestContext) -> Result<HandlerOutcome, HandlerError> {
    let target = parse_user_ref(&ctx.args).ok_or_else(|| usage(s, Builtin::AdminRemove))?;
    s.policy.remove_admin(&ctx.user_id, &target)?;
    Ok(
        HandlerOutcome::new("Removed admin user", format!("✅ <@{}> is no longer an admin.", target))
            .with_change("removed_admin", target),
    )
}

fn channel_allow(s: &ConsoleServices, ctx: &RequestContext, allowed: bool) -> Result<HandlerOutcome, HandlerError> {
    let cmd = if allowed { Builtin::ChannelAdd } else { Builtin::ChannelRemove };
    let channel = parse_channel_ref(&ctx.args).ok_or_else(|| usage(s, cmd))?;
    let changed = s.policy.set_channel_allowed(&channel, allowed)?;

    let (action, reply, key) = match (allowed, changed) {
        (true, true) => ("Allowed channel", format!("✅ <#{}> added to the allowed channels.", channel), "channel_added"),
        (true, false) => ("Allowed channel", format!("ℹ️ <#{}> is already allowed.", channel), ""),
        (false, true) => (
            "Removed allowed channel",
            format!("✅ <#{}> removed from the allowed channels.", channel),
            "channel_removed",
        ),
        (false, false) => ("Removed allowed channel", format!("ℹ️ <#{}> was not in the list.", channel), ""),
    };

    let outcome = HandlerOutcome::new(action, reply);
    Ok(if key.is_empty() { outcome } else { outcome.with_change(key, channel) })
}

/// Canonical feature name, resolving chat aliases
fn feature_name(raw: &str) -> Option<&'static str> {
    match raw.to_ascii_lowercase().as_str() {
        "spl" | "spl_query" => Some(FEATURE_SPL_QUERY),
        "approval" | "require_approval" => Some(FEATURE_APPROVAL),
        _ => None,
    }
}

fn parse_switch(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "on" | "true" | "enable" | "enabled" => Some(true),
        "off" | "false" | "disable" | "disabled" => Some(false),
        _ => None,
    }
}

fn feature_toggle(s: &ConsoleServices, ctx: &RequestContext) -> Result<HandlerOutcome, HandlerError> {
    let mut parts = ctx.args.split_whitespace();
    let feature = parts
        .next()
        .and_then(feature_name)
        .ok_or_else(|| usage(s, Builtin::FeatureToggle))?;
    let enabled = match parts.next() {
        Some(raw) => parse_switch(raw).ok_or_else(|| usage(s, Builtin::FeatureToggle))?,
        None => !s.policy.is_feature_enabled(feature),
    };

    s.policy.toggle_feature(feature, enabled)?;
    Ok(HandlerOutcome::new(
        "Toggled feature",
        format!("✅ {}: {}", feature, if enabled { "🟢 Enabled" } else { "🔴 Disabled" }),
    )
    .with_change("feature", feature)
    .with_change("enabled", enabled))
}

fn config_show(s: &ConsoleServices) -> HandlerOutcome {
    let state = s.policy.snapshot();
    let mut text = String::from("⚙️ Current configuration\n\n*Admins:*");
    if state.admins.is_empty() {
        text.push_str("\n• (none)");
    }
    for id in &state.admins {
        let _ = write!(text, "\n• <@{}>", id);
    }

    text.push_str("\n\n*Allowed channels:*");
    if state.allowed_channels.is_empty() {
        text.push_str("\n• all channels");
    }
    for id in &state.allowed_channels {
        let _ = write!(text, "\n• <#{}>", id);
    }

    text.push_str("\n\n*Features:*");
    for feature in [FEATURE_SPL_QUERY, FEATURE_APPROVAL] {
        let on = state.is_feature_enabled(feature);
        let _ = write!(text, "\n• {}: {}", feature, if on { "🟢 Enabled" } else { "🔴 Disabled" });
    }
    for (name, on) in state.features.iter().filter(|(n, _)| feature_name(n).is_none()) {
        let _ = write!(text, "\n• {}: {}", name, if *on { "🟢 Enabled" } else { "🔴 Disabled" });
    }

    let _ = write!(text, "\n\n*Settings:*\n• Result limit: {}", s.result_limit);
    HandlerOutcome::new("Viewed configuration", text)
}

fn config_backup(s: &ConsoleServices) -> Result<HandlerOutcome, HandlerError> {
    let json = s
        .policy
        .snapshot()
        .to_json_pretty()
        .map_err(|e| HandlerError::Internal(e.to_string()))?;
    Ok(HandlerOutcome::new("Exported configuration backup", json))
}

/// Entry count from optional argument text; `None` when absent
fn parse_count(s: &ConsoleServices, cmd: Builtin, args: &str) -> Result<Option<usize>, HandlerError> {
    let args = args.trim();
    if args.is_empty() {
        return Ok(None);
    }
    args.parse::<usize>().map(Some).map_err(|_| usage(s, cmd))
}

fn audit_logs(s: &ConsoleServices, ctx: &RequestContext) -> Result<HandlerOutcome, HandlerError> {
    let n = parse_count(s, Builtin::AuditLogs, &ctx.args)?
        .unwrap_or(0)
        .min(s.max_page_size);
    let entries = s.audit.tail(n);

    let text = if entries.is_empty() {
        "📋 No audit entries yet.".to_string()
    } else {
        let mut text = format!("📋 Last {} audit entries:", entries.len());
        for entry in &entries {
            text.push('\n');
            text.push_str(&export::txt_line(entry));
        }
        text
    };
    Ok(HandlerOutcome::new("Viewed audit logs", text).with_change("count", entries.len()))
}

fn export_logs(s: &ConsoleServices, ctx: &RequestContext) -> Result<HandlerOutcome, HandlerError> {
    let format = match ctx.args.trim() {
        "" => ExportFormat::Json,
        raw => raw.parse::<ExportFormat>().map_err(|_| usage(s, Builtin::ExportLogs))?,
    };
    let bytes = s.audit.export(format)?;
    let body = String::from_utf8_lossy(&bytes);

    Ok(HandlerOutcome::new(
        "Exported audit logs",
        format!("📦 Audit export ({}, {} entries):\n{}", format, s.audit.len(), body.trim_end()),
    )
    .with_change("format", format.extension()))
}

fn search_history(s: &ConsoleServices, ctx: &RequestContext) -> Result<HandlerOutcome, HandlerError> {
    let n = parse_count(s, Builtin::SearchHistory, &ctx.args)?
        .filter(|n| *n > 0)
        .unwrap_or(s.audit.default_page_size())
        .min(s.max_page_size);

    let history = s.audit.by_command(&s.cmd(Builtin::RawQuery.keyword()));
    let recent = &history[history.len().saturating_sub(n)..];

    let text = if recent.is_empty() {
        "🔍 No raw queries have been run yet.".to_string()
    } else {
        let mut text = format!("🔍 Last {} raw queries:", recent.len());
        for entry in recent {
            text.push('\n');
            text.push_str(&history_line(entry));
        }
        text
    };
    Ok(HandlerOutcome::new("Viewed search history", text).with_change("count", recent.len()))
}

fn history_line(entry: &AuditEntry) -> String {
    let query = entry
        .changes
        .get("query")
        .and_then(|q| q.as_str())
        .unwrap_or("(not run)");
    format!(
        "[{}] {} in {}: {} `{}`",
        entry.timestamp_string(),
        entry.user_name,
        entry.channel_name,
        entry.result,
        query
    )
}

fn format_results(title: &str, result: &ResultSet) -> String {
    if result.rows.is_empty() {
        return format!("{}\nNo results found.", title);
    }

    let mut text = format!("{} ({} rows, sid {})", title, result.rows.len(), result.sid);
    for (i, row) in result.rows.iter().enumerate() {
        let fields: Vec<String> = row
            .iter()
            .map(|(k, v)| match v.as_str() {
                Some(s) => format!("{}={}", k, s),
                None => format!("{}={}", k, v),
            })
            .collect();
        let _ = write!(text, "\n{}. {}", i + 1, fields.join(", "));
    }
    text
}

async fn search_alert(s: &ConsoleServices, ctx: &RequestContext) -> Result<HandlerOutcome, HandlerError> {
    let (name, params) = parse_search_args(&ctx.args, s.result_limit);
    let name = name.ok_or_else(|| usage(s, Builtin::SearchAlert))?;

    let result = s.backend.run_search(&name, &params).await?;
    Ok(HandlerOutcome::new(
        "Ran saved search",
        format_results(&format!("🔎 Results for *{}*", name), &result),
    )
    .with_change("search", name)
    .with_change("earliest", params.earliest)
    .with_change("latest", params.latest)
    .with_change("rows", result.rows.len()))
}

async fn search_list(s: &ConsoleServices, ctx: &RequestContext) -> Result<HandlerOutcome, HandlerError> {
    let (keyword, params) = parse_search_args(&ctx.args, SEARCH_LIST_LIMIT);
    let searches = s.backend.list_searches(keyword.as_deref()).await?;

    let text = if searches.is_empty() {
        "📑 No saved searches found.".to_string()
    } else {
        let mut text = format!("📑 Saved searches ({}):", searches.len());
        for meta in searches.iter().take(params.limit) {
            let _ = write!(text, "\n• `{}`", meta.name);
            if !meta.description.is_empty() {
                let _ = write!(text, " – {}", meta.description);
            }
        }
        if searches.len() > params.limit {
            let _ = write!(text, "\n…and {} more", searches.len() - params.limit);
        }
        text
    };
    Ok(HandlerOutcome::new("Listed saved searches", text))
}

async fn backend_status(s: &ConsoleServices) -> Result<HandlerOutcome, HandlerError> {
    let status = s.backend.health().await?;
    let roles = if status.server_roles.is_empty() {
        "none".to_string()
    } else {
        status.server_roles.join(", ")
    };
    Ok(HandlerOutcome::new(
        "Checked backend status",
        format!(
            "✅ Search backend is up\n• Version: {}\n• Build: {}\n• Roles: {}",
            status.version, status.build, roles
        ),
    ))
}

async fn raw_query(s: &ConsoleServices, ctx: &RequestContext) -> Result<HandlerOutcome, HandlerError> {
    let query = normalize_id(&ctx.args);
    if query.is_empty() {
        return Err(usage(s, Builtin::RawQuery));
    }

    let params = gateway::SearchParams::with_limit(s.result_limit);
    let result = s.backend.run_query(&query, &params).await?;
    Ok(
        HandlerOutcome::new("Executed raw query", format_results("🔎 Query results", &result))
            .with_change("query", query)
            .with_change("rows", result.rows.len()),
    )
}
