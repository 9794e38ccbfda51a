//! chatops export-audit command

use crate::app::App;
use crate::output;
use audit::{AuditResult, ExportFormat};
use clap::Args;
use shared::RequestContext;
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug, Clone, Args)]
pub struct ExportCommand {
    /// Export format: json, csv or txt
    pub format: ExportFormat,

    /// Write the export to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl ExportCommand {
    /// Authorize and audit through the router, then write the raw export
    pub async fn run(&self, app: &App, ctx: RequestContext) -> anyhow::Result<()> {
        let line = format!("{}export-logs {}", app.prefix(), self.format);
        let reply = app.send(&line, ctx).await?;
        if reply.result != Some(AuditResult::Success) {
            return output::finish(&reply);
        }

        let bytes = app.audit.export(self.format)?;
        match &self.output {
            Some(path) => {
                std::fs::write(path, &bytes)?;
                eprintln!("✓ Exported {} audit entries to {}", app.audit.len(), path.display());
            }
            None => std::io::stdout().write_all(&bytes)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::ConsoleConfig;

    #[tokio::test]
    async fn test_export_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.csv");
        let app = App::in_memory(ConsoleConfig::default());
        let ctx = RequestContext::new("U1", "alice", "CLOCAL", "cli");
        app.send("!setup", ctx.clone()).await.unwrap();

        let cmd = ExportCommand {
            format: ExportFormat::Csv,
            output: Some(path.clone()),
        };
        cmd.run(&app, ctx).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some(audit::export::CSV_HEADER));
        assert_eq!(lines.count(), 2);
    }

    #[tokio::test]
    async fn test_export_denied_for_non_admin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.json");
        let app = App::in_memory(ConsoleConfig::default());

        let cmd = ExportCommand {
            format: ExportFormat::Json,
            output: Some(path.clone()),
        };
        let ctx = RequestContext::new("U9", "eve", "CLOCAL", "cli");
        assert!(cmd.run(&app, ctx).await.is_err());
        assert!(!path.exists());
        assert_eq!(app.audit.all()[0].result, AuditResult::Denied);
    }
}
