//! Reply rendering for the terminal

use audit::AuditResult;
use console::style;
use router::Reply;

/// Reply text colored by its audit result
pub fn styled(reply: &Reply) -> String {
    match reply.result {
        Some(AuditResult::Success) => style(&reply.text).green().to_string(),
        Some(AuditResult::Denied) => style(&reply.text).yellow().to_string(),
        Some(AuditResult::Error) => style(&reply.text).red().to_string(),
        None => style(&reply.text).dim().to_string(),
    }
}

/// Print a reply and fail unless the command succeeded
pub fn finish(reply: &Reply) -> anyhow::Result<()> {
    println!("{}", styled(reply));
    match reply.result {
        Some(AuditResult::Success) => Ok(()),
        Some(result) => anyhow::bail!("command finished with {}", result),
        None => anyhow::bail!("command not recognized"),
    }
}
