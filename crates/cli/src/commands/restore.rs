//! chatops restore-config command

use crate::app::App;
use anyhow::Context;
use clap::Args;
use console::style;
use dialoguer::Confirm;
use rbac::PolicyState;
use shared::RequestContext;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Args)]
pub struct RestoreCommand {
    /// Backup file produced by backup-config
    pub file: PathBuf,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Parse a `backup-config` payload
pub fn read_backup(path: &Path) -> anyhow::Result<PolicyState> {
    let content = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("{} is not a policy backup", path.display()))
}

impl RestoreCommand {
    pub fn run(&self, app: &App, ctx: RequestContext) -> anyhow::Result<()> {
        let state = read_backup(&self.file)?;

        println!("Backup {}:", self.file.display());
        println!("  Admins:           {}", state.admins.iter().cloned().collect::<Vec<_>>().join(", "));
        println!("  Allowed channels: {}", state.allowed_channels.len());
        println!("  Feature toggles:  {}", state.features.len());

        if !self.yes {
            let confirmed = Confirm::new()
                .with_prompt("Replace the current policy with this backup?")
                .default(false)
                .interact()?;
            if !confirmed {
                println!("Restore cancelled");
                return Ok(());
            }
        }

        app.restore(&ctx, state)?;
        println!("{}", style("✓ Policy restored").green());
        Ok(())
    }
}
