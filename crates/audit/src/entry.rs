//! AuditEntry - One recorded authorization decision and its outcome

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use shared::RequestContext;
use std::collections::BTreeMap;
use std::fmt;

/// Outcome recorded for a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditResult {
    Success,
    Denied,
    Error,
}

impl AuditResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditResult::Success => "SUCCESS",
            AuditResult::Denied => "DENIED",
            AuditResult::Error => "ERROR",
        }
    }
}

impl fmt::Display for AuditResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable audit record
///
/// `seq` and `timestamp` are assigned by [`crate::AuditLog::record`]; values
/// set before recording are overwritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub user_name: String,
    pub command: String,
    pub channel_id: String,
    pub channel_name: String,
    pub action: String,
    pub result: AuditResult,
    #[serde(default)]
    pub changes: BTreeMap<String, serde_json::Value>,
    /// Position in the log, strictly increasing
    #[serde(default)]
    pub seq: u64,
}

impl AuditEntry {
    /// Start an entry for a command issued in `ctx`
    pub fn new(
        ctx: &RequestContext,
        command: impl Into<String>,
        action: impl Into<String>,
        result: AuditResult,
    ) -> Self {
        Self {
            timestamp: ctx.timestamp,
            user_id: ctx.user_id.clone(),
            user_name: ctx.user_name.clone(),
            command: command.into(),
            channel_id: ctx.channel_id.clone(),
            channel_name: ctx.channel_name.clone(),
            action: action.into(),
            result,
            changes: BTreeMap::new(),
            seq: 0,
        }
    }

    /// Builder: attach state deltas
    pub fn with_changes(mut self, changes: BTreeMap<String, serde_json::Value>) -> Self {
        self.changes = changes;
        self
    }

    /// Builder: attach one state delta
    pub fn with_change(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.changes.insert(key.into(), value.into());
        self
    }

    /// RFC 3339 timestamp used by the text exports
    pub fn timestamp_string(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}
