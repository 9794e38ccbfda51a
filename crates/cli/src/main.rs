//! chatops - Chat command console
//!
//! Usage:
//!   chatops                          - Start the interactive console
//!   chatops bootstrap                - Become the first admin
//!   chatops add-admin <user>         - Grant admin rights
//!   chatops toggle-feature spl --off - Disable raw queries
//!   chatops export-audit csv -o a.csv
//!   chatops send '!search-list login'

use clap::{Parser, Subcommand};
use cli::commands::{ChatCommand, ExportCommand, RestoreCommand};
use cli::{App, Identity, InteractiveConsole};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chatops")]
#[command(about = "ChatOps - Authorized, audited chat command console")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file (YAML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Acting user id
    #[arg(short, long, global = true, default_value = "ULOCAL")]
    user: String,

    /// Acting user display name
    #[arg(long, global = true, default_value = "operator")]
    user_name: String,

    /// Channel id the command is issued in
    #[arg(long, global = true, default_value = "CLOCAL")]
    channel: String,

    /// Channel display name
    #[arg(long, global = true, default_value = "cli")]
    channel_name: String,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Chat(ChatCommand),
    /// Export the audit log
    ExportAudit(ExportCommand),
    /// Restore the policy from a backup-config file
    RestoreConfig(RestoreCommand),
    /// Interactive console (default)
    Console,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = App::load_config(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .with_writer(std::io::stderr)
        .init();

    let app = App::open(config)?;
    let identity = Identity {
        user_id: cli.user,
        user_name: cli.user_name,
        channel_id: cli.channel,
        channel_name: cli.channel_name,
    };

    match cli.command {
        Some(Commands::Chat(cmd)) => cmd.run(&app, identity.context()).await,
        Some(Commands::ExportAudit(cmd)) => cmd.run(&app, identity.context()).await,
        Some(Commands::RestoreConfig(cmd)) => cmd.run(&app, identity.context()),
        Some(Commands::Console) | None => InteractiveConsole::new(&app, identity).run().await,
    }
}
