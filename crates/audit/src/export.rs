//! Audit export formats

use crate::entry::AuditEntry;
use std::fmt;
use std::str::FromStr;

/// CSV header, fixed for downstream tooling
pub const CSV_HEADER: &str = "timestamp,user_id,user_name,command,channel_id,channel_name,action,result";

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Json,
    Csv,
    Txt,
}

impl ExportFormat {
    /// File extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Txt => "txt",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "txt" | "text" => Ok(ExportFormat::Txt),
            other => Err(format!("unknown export format '{}'", other)),
        }
    }
}

/// One JSON array of entry objects
pub fn to_json(entries: &[AuditEntry]) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec_pretty(entries)
}

/// Parse a JSON export back into entries
pub fn from_json(bytes: &[u8]) -> serde_json::Result<Vec<AuditEntry>> {
    serde_json::from_slice(bytes)
}

/// CSV with [`CSV_HEADER`]; `changes` has no column
pub fn to_csv(entries: &[AuditEntry]) -> String {
    let mut out = String::with_capacity(CSV_HEADER.len() + 1 + entries.len() * 96);
    out.push_str(CSV_HEADER);
    out.push('\n');

    for e in entries {
        let fields = [
            e.timestamp_string(),
            csv_escape(&e.user_id),
            csv_escape(&e.user_name),
            csv_escape(&e.command),
            csv_escape(&e.channel_id),
            csv_escape(&e.channel_name),
            csv_escape(&e.action),
            e.result.to_string(),
        ];
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

/// One human-readable line per entry
pub fn to_txt(entries: &[AuditEntry]) -> String {
    let mut out = String::new();
    for e in entries {
        out.push_str(&txt_line(e));
        out.push('\n');
    }
    out
}

/// `[<timestamp>] <user_name> (<user_id>) ran <command> in <channel_name>: <result> — <action>`
pub fn txt_line(e: &AuditEntry) -> String {
    let mut line = format!(
        "[{}] {} ({}) ran {} in {}: {} — {}",
        e.timestamp_string(),
        e.user_name,
        e.user_id,
        e.command,
        e.channel_name,
        e.result,
        e.action,
    );
    if !e.changes.is_empty() {
        let changes = serde_json::to_string(&e.changes).unwrap_or_default();
        line.push_str(" changes=");
        line.push_str(&changes);
    }
    line
}

/// Quote a field if it contains commas, quotes, or line breaks
fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::AuditResult;
    use chrono::{TimeZone, Utc};
    use shared::RequestContext;

    fn sample() -> AuditEntry {
        let ctx = RequestContext::new("U1", "alice", "C1", "ops")
            .at(Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap());
        AuditEntry::new(&ctx, "!admin-add", "Added new admin user", AuditResult::Success)
            .with_change("new_admin", "U2")
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("JSON".parse::<ExportFormat>(), Ok(ExportFormat::Json));
        assert_eq!("csv".parse::<ExportFormat>(), Ok(ExportFormat::Csv));
        assert_eq!(" txt ".parse::<ExportFormat>(), Ok(ExportFormat::Txt));
        assert!("xml".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_csv_header_and_row() {
        let csv = to_csv(&[sample()]);
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some(CSV_HEADER));
        assert_eq!(
            lines.next(),
            Some("2026-03-01T12:30:00.000000Z,U1,alice,!admin-add,C1,ops,Added new admin user,SUCCESS")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_csv_omits_changes() {
        let csv = to_csv(&[sample()]);
        assert!(!csv.contains("new_admin"));
    }

    #[test]
    fn test_csv_empty_log_has_header_only() {
        assert_eq!(to_csv(&[]), format!("{}\n", CSV_HEADER));
    }

    #[test]
    fn test_csv_escaping() {
        let mut entry = sample();
        entry.action = "said \"hi\", then left".to_string();
        let csv = to_csv(&[entry]);
        assert!(csv.contains("\"said \"\"hi\"\", then left\""));
    }

    #[test]
    fn test_txt_line_format() {
        let mut entry = sample();
        entry.changes.clear();
        assert_eq!(
            txt_line(&entry),
            "[2026-03-01T12:30:00.000000Z] alice (U1) ran !admin-add in ops: SUCCESS — Added new admin user"
        );
    }

    #[test]
    fn test_txt_includes_changes() {
        let line = txt_line(&sample());
        assert!(line.ends_with(" changes={\"new_admin\":\"U2\"}"));
    }

    #[test]
    fn test_json_is_array() {
        let bytes = to_json(&[sample(), sample()]).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value.as_array().map(|a| a.len()), Some(2));
        assert_eq!(value[0]["changes"]["new_admin"], serde_json::json!("U2"));
    }
}
