//! Interactive console: a local chat transport
//!
//! Each input line is a chat message from the current identity. Lines
//! starting with `/` are console controls and never reach the router. When
//! the chat prefix itself starts with `/`, controls take `//` instead.

use crate::app::App;
use crate::output;
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use shared::{normalize_id, RequestContext};
use std::io::{self, BufRead, Write};
use std::time::Duration;

/// Who is typing, and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub user_name: String,
    pub channel_id: String,
    pub channel_name: String,
}

impl Identity {
    pub fn context(&self) -> RequestContext {
        RequestContext::new(&self.user_id, &self.user_name, &self.channel_id, &self.channel_name)
    }
}

/// Interactive console bound to one app
pub struct InteractiveConsole<'a> {
    app: &'a App,
    identity: Identity,
    spinner: bool,
}

impl<'a> InteractiveConsole<'a> {
    pub fn new(app: &'a App, identity: Identity) -> Self {
        Self {
            app,
            identity,
            spinner: Term::stdout().is_term(),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Run against the process stdin/stdout
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let stdin = io::stdin();
        self.run_with(stdin.lock(), io::stdout()).await
    }

    /// Run the loop over arbitrary input and output
    pub async fn run_with<R: BufRead, W: Write>(&mut self, mut input: R, mut out: W) -> anyhow::Result<()> {
        writeln!(out, "{}", style("ChatOps console").bold())?;
        let sigil = self.control_sigil();
        writeln!(
            out,
            "Type {}help for commands, {}help for console controls, {}quit to exit",
            self.app.prefix(),
            sigil,
            sigil
        )?;
        writeln!(out)?;

        loop {
            write!(out, "{} ", self.prompt())?;
            out.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                break;
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if line.starts_with(self.control_sigil()) {
                match self.handle_control(line, &mut out) {
                    Ok(true) => break,
                    Ok(false) => continue,
                    Err(e) => {
                        writeln!(out, "Error: {}", e)?;
                        continue;
                    }
                }
            }

            let reply = self.dispatch(line).await?;
            writeln!(out, "{}", output::styled(&reply))?;
        }

        Ok(())
    }

    /// Leading marker of console controls
    fn control_sigil(&self) -> &'static str {
        if self.app.prefix().starts_with('/') {
            "//"
        } else {
            "/"
        }
    }

    fn prompt(&self) -> String {
        format!(
            "[{}@#{}] >",
            style(&self.identity.user_name).cyan(),
            style(&self.identity.channel_name).magenta()
        )
    }

    async fn dispatch(&self, line: &str) -> anyhow::Result<router::Reply> {
        let spinner = self.spinner.then(|| {
            let pb = ProgressBar::new_spinner();
            pb.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()));
            pb.set_message("working...");
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        });

        let reply = self.app.send(line, self.identity.context()).await;
        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }
        reply
    }

    /// Handle a console control; `Ok(true)` ends the session
    fn handle_control<W: Write>(&mut self, input: &str, out: &mut W) -> anyhow::Result<bool> {
        let sigil = self.control_sigil();
        let parts: Vec<&str> = input.split_whitespace().collect();
        let cmd = parts.first().copied().unwrap_or("");

        match cmd.strip_prefix(sigil).unwrap_or("") {
            "quit" | "exit" | "q" => {
                writeln!(out, "Goodbye!")?;
                return Ok(true);
            }
            "help" | "h" => {
                writeln!(out, "Console controls:")?;
                writeln!(out, "  {}as <user-id> [name]       - Speak as another user", sigil)?;
                writeln!(out, "  {}in <channel-id> [name]    - Move to another channel", sigil)?;
                writeln!(out, "  {}status                    - Show the current identity", sigil)?;
                writeln!(out, "  {}quit                      - Exit", sigil)?;
            }
            "as" => match parts.get(1) {
                Some(id) => {
                    self.identity.user_id = normalize_id(id);
                    self.identity.user_name = parts.get(2).map(|s| s.to_string()).unwrap_or_else(|| self.identity.user_id.clone());
                    writeln!(out, "Now speaking as {} ({})", self.identity.user_name, self.identity.user_id)?;
                }
                None => writeln!(out, "Usage: {}as <user-id> [name]", sigil)?,
            },
            "in" => match parts.get(1) {
                Some(id) => {
                    self.identity.channel_id = normalize_id(id);
                    self.identity.channel_name =
                        parts.get(2).map(|s| s.to_string()).unwrap_or_else(|| self.identity.channel_id.clone());
                    writeln!(out, "Now in #{} ({})", self.identity.channel_name, self.identity.channel_id)?;
                }
                None => writeln!(out, "Usage: {}in <channel-id> [name]", sigil)?,
            },
            "status" => {
                writeln!(out, "Status:")?;
                writeln!(out, "  User: {} ({})", self.identity.user_name, self.identity.user_id)?;
                writeln!(out, "  Channel: #{} ({})", self.identity.channel_name, self.identity.channel_id)?;
                writeln!(out, "  Admin: {}", self.app.policy.is_admin(&self.identity.user_id))?;
            }
            _ => {
                writeln!(out, "Unknown control: {}", cmd)?;
            }
        }

        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audit::AuditResult;
    use shared::ConsoleConfig;

    fn identity() -> Identity {
        Identity {
            user_id: "U1".to_string(),
            user_name: "alice".to_string(),
            channel_id: "C1".to_string(),
            channel_name: "ops".to_string(),
        }
    }

    fn console(app: &App) -> InteractiveConsole<'_> {
        let mut console = InteractiveConsole::new(app, identity());
        console.spinner = false;
        console
    }

    async fn session(app: &App, script: &str) -> String {
        let mut out = Vec::new();
        console(app).run_with(script.as_bytes(), &mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    // ============== Control Tests ==============

    #[test]
    fn test_quit_controls() {
        let app = App::in_memory(ConsoleConfig::default());
        let mut console = console(&app);
        let mut out = Vec::new();
        for cmd in ["/quit", "/exit", "/q"] {
            assert!(console.handle_control(cmd, &mut out).unwrap());
        }
    }

    #[test]
    fn test_as_and_in_switch_identity() {
        let app = App::in_memory(ConsoleConfig::default());
        let mut console = console(&app);
        let mut out = Vec::new();

        assert!(!console.handle_control("/as 'U2' bob", &mut out).unwrap());
        assert!(!console.handle_control("/in C9", &mut out).unwrap());

        assert_eq!(console.identity().user_id, "U2");
        assert_eq!(console.identity().user_name, "bob");
        assert_eq!(console.identity().channel_id, "C9");
        assert_eq!(console.identity().channel_name, "C9");
    }

    #[test]
    fn test_unknown_and_help_controls() {
        let app = App::in_memory(ConsoleConfig::default());
        let mut console = console(&app);
        let mut out = Vec::new();

        assert!(!console.handle_control("/help", &mut out).unwrap());
        assert!(!console.handle_control("/bogus", &mut out).unwrap());
        assert!(!console.handle_control("/as", &mut out).unwrap());
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Unknown control: /bogus"));
        assert!(text.contains("Usage: /as"));
    }

    // ============== Session Tests ==============

    #[tokio::test]
    async fn test_session_dispatches_lines() {
        let app = App::in_memory(ConsoleConfig::default());
        let text = session(&app, "!setup\n\n!admin-list\n/as U2 bob\n!config-show\n/quit\n!whoami\n").await;

        assert!(text.contains("Setup complete"));
        assert!(text.contains("restricted to admins"));
        assert!(text.contains("Goodbye!"));

        let results: Vec<AuditResult> = app.audit.all().iter().map(|e| e.result).collect();
        assert_eq!(results, vec![AuditResult::Success, AuditResult::Success, AuditResult::Denied]);
        assert_eq!(app.audit.all()[2].user_id, "U2");
    }

    #[tokio::test]
    async fn test_slash_prefix_reaches_router() {
        let mut config = ConsoleConfig::default();
        config.command_prefix = "/".to_string();
        let app = App::in_memory(config);
        let text = session(&app, "/setup\n/help\n//status\n//quit\n/whoami\n").await;

        assert!(text.contains("Setup complete"));
        assert!(text.contains("/admin-add"));
        assert!(text.contains("Admin: true"));
        assert!(text.contains("Goodbye!"));
        assert!(text.contains("//help for console controls"));

        let commands: Vec<String> = app.audit.all().into_iter().map(|e| e.command).collect();
        assert_eq!(commands, vec!["/setup", "/help"]);
    }

    #[tokio::test]
    async fn test_session_ends_at_eof() {
        let app = App::in_memory(ConsoleConfig::default());
        let text = session(&app, "hello\n").await;
        assert!(text.contains("Command not recognized"));
        assert!(app.audit.is_empty());
    }
}
