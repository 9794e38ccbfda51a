//! Admin subcommands, each sent through the router as a chat line

use crate::app::App;
use crate::output;
use clap::Subcommand;
use shared::RequestContext;

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum ChatCommand {
    /// Become the first admin (only while no admin exists)
    Bootstrap,
    /// Grant admin rights to a user
    AddAdmin {
        /// User id or mention
        user: String,
    },
    /// Revoke admin rights from a user
    RemoveAdmin {
        /// User id or mention
        user: String,
    },
    /// List admins
    ListAdmins,
    /// Allow restricted features in a channel
    AllowChannel {
        /// Channel id or mention
        channel: String,
    },
    /// Remove a channel from the allow-list
    DenyChannel {
        /// Channel id or mention
        channel: String,
    },
    /// Enable, disable or flip a feature
    ToggleFeature {
        /// Feature name (spl_query, approval)
        name: String,
        #[arg(long, conflicts_with = "off")]
        on: bool,
        #[arg(long)]
        off: bool,
    },
    /// Show the current policy
    ShowConfig,
    /// Print the policy as JSON
    BackupConfig,
    /// Show recent audit entries
    TailAudit {
        /// Number of entries (default page size when omitted)
        count: Option<usize>,
    },
    /// Send one raw chat line
    Send {
        #[arg(trailing_var_arg = true, required = true)]
        text: Vec<String>,
    },
}

impl ChatCommand {
    /// The chat line this subcommand stands for
    pub fn chat_line(&self, prefix: &str) -> String {
        let body = match self {
            ChatCommand::Bootstrap => "setup".to_string(),
            ChatCommand::AddAdmin { user } => format!("admin-add {}", user),
            ChatCommand::RemoveAdmin { user } => format!("admin-remove {}", user),
            ChatCommand::ListAdmins => "admin-list".to_string(),
            ChatCommand::AllowChannel { channel } => format!("admin-channel-add {}", channel),
            ChatCommand::DenyChannel { channel } => format!("admin-channel-remove {}", channel),
            ChatCommand::ToggleFeature { name, on, off } => match (on, off) {
                (true, _) => format!("feature-toggle {} on", name),
                (_, true) => format!("feature-toggle {} off", name),
                _ => format!("feature-toggle {}", name),
            },
            ChatCommand::ShowConfig => "config-show".to_string(),
            ChatCommand::BackupConfig => "config-backup".to_string(),
            ChatCommand::TailAudit { count } => match count {
                Some(n) => format!("audit-logs {}", n),
                None => "audit-logs".to_string(),
            },
            ChatCommand::Send { text } => return text.join(" "),
        };
        format!("{}{}", prefix, body)
    }

    pub async fn run(&self, app: &App, ctx: RequestContext) -> anyhow::Result<()> {
        let line = self.chat_line(app.prefix());
        let reply = app.send(&line, ctx).await?;
        output::finish(&reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audit::AuditResult;
    use shared::ConsoleConfig;

    #[test]
    fn test_chat_lines() {
        assert_eq!(ChatCommand::Bootstrap.chat_line("!"), "!setup");
        assert_eq!(
            ChatCommand::AddAdmin { user: "U2".into() }.chat_line("!"),
            "!admin-add U2"
        );
        assert_eq!(
            ChatCommand::ToggleFeature {
                name: "spl".into(),
                on: false,
                off: true
            }
            .chat_line("/"),
            "/feature-toggle spl off"
        );
        assert_eq!(ChatCommand::TailAudit { count: None }.chat_line("!"), "!audit-logs");
        assert_eq!(
            ChatCommand::Send {
                text: vec!["!search-list".into(), "login".into()]
            }
            .chat_line("!"),
            "!search-list login"
        );
    }

    #[tokio::test]
    async fn test_run_dispatches_through_router() {
        let app = App::in_memory(ConsoleConfig::default());
        let ctx = RequestContext::new("U1", "alice", "CLOCAL", "cli");

        ChatCommand::Bootstrap.run(&app, ctx.clone()).await.unwrap();
        ChatCommand::AllowChannel { channel: "C7".into() }
            .run(&app, ctx.clone())
            .await
            .unwrap();

        let listed = ChatCommand::ListAdmins.run(&app, ctx.clone()).await;
        assert!(listed.is_ok());

        let outsider = RequestContext::new("U9", "eve", "CLOCAL", "cli");
        assert!(ChatCommand::ShowConfig.run(&app, outsider).await.is_err());

        let results: Vec<AuditResult> = app.audit.all().iter().map(|e| e.result).collect();
        assert_eq!(
            results,
            vec![
                AuditResult::Success,
                AuditResult::Success,
                AuditResult::Success,
                AuditResult::Denied
            ]
        );
    }
}
