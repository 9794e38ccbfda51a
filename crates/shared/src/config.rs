//! Configuration types for the ChatOps console

use crate::error::ConfigError;
use crate::ids::parse_id_list;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Feature gating raw query execution
pub const FEATURE_SPL_QUERY: &str = "spl_query";

/// Feature requiring approval for raw queries
pub const FEATURE_APPROVAL: &str = "approval";

/// Top-level console configuration (config.yaml / config.json)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConsoleConfig {
    /// Prefix that marks a chat line as a command
    pub command_prefix: String,

    /// Policy seeding and persistence
    pub policy: PolicyConfig,

    /// Audit log storage
    pub audit: AuditConfig,

    /// Query backend settings
    pub backend: BackendConfig,

    /// Upper bound on a single handler run
    pub handler_timeout_secs: u64,

    /// Default tracing filter
    pub log_level: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            command_prefix: "!".to_string(),
            policy: PolicyConfig::default(),
            audit: AuditConfig::default(),
            backend: BackendConfig::default(),
            handler_timeout_secs: 60,
            log_level: "info".to_string(),
        }
    }
}

/// Policy seed values and snapshot location
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicyConfig {
    /// Where the policy snapshot is persisted (in-memory only when unset)
    pub state_path: Option<PathBuf>,

    /// Initial admins, used only when no snapshot exists
    pub admins: Vec<String>,

    /// Initial channel allow-list
    pub allowed_channels: Vec<String>,

    /// Initial feature flags
    pub features: BTreeMap<String, bool>,
}

/// Audit log settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuditConfig {
    /// NDJSON file backing the audit log
    pub path: PathBuf,

    /// Entries returned by a tail request without an explicit count
    pub default_page_size: usize,

    /// Largest tail a chat request may ask for
    pub max_page_size: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("audit.ndjson"),
            default_page_size: 10,
            max_page_size: 50,
        }
    }
}

/// Query backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendConfig {
    /// Per-call timeout
    pub timeout_secs: u64,

    /// Default number of result rows returned to chat
    pub result_limit: usize,

    /// Saved searches served by the in-memory backend
    pub searches: Vec<SavedSearchConfig>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 35,
            result_limit: 5,
            searches: Vec::new(),
        }
    }
}

/// Fixture for one saved search
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SavedSearchConfig {
    pub name: String,
    pub description: String,
    pub query: String,
    pub rows: Vec<BTreeMap<String, serde_json::Value>>,
}

impl ConsoleConfig {
    /// Load configuration from a YAML or JSON file (chosen by extension)
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let config = if is_json {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    ///
    /// Recognized keys: `ADMIN_USER_IDS`, `ADMIN_CHANNEL_IDS`,
    /// `ENABLE_SPL_QUERY`, `REQUIRE_SPL_APPROVAL`, `RESULT_LIMIT`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("ADMIN_USER_IDS") {
            self.policy.admins = parse_id_list(&raw);
        }
        if let Some(raw) = lookup("ADMIN_CHANNEL_IDS") {
            self.policy.allowed_channels = parse_id_list(&raw);
        }
        if let Some(raw) = lookup("ENABLE_SPL_QUERY") {
            let enabled = parse_bool("ENABLE_SPL_QUERY", &raw)?;
            self.policy.features.insert(FEATURE_SPL_QUERY.to_string(), enabled);
        }
        if let Some(raw) = lookup("REQUIRE_SPL_APPROVAL") {
            let enabled = parse_bool("REQUIRE_SPL_APPROVAL", &raw)?;
            self.policy.features.insert(FEATURE_APPROVAL.to_string(), enabled);
        }
        if let Some(raw) = lookup("RESULT_LIMIT") {
            self.backend.result_limit = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "RESULT_LIMIT".to_string(),
                value: raw.clone(),
            })?;
        }
        Ok(())
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key: key.to_string(),
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ConsoleConfig::default();
        assert_eq!(config.command_prefix, "!");
        assert_eq!(config.audit.default_page_size, 10);
        assert_eq!(config.audit.max_page_size, 50);
        assert_eq!(config.backend.timeout_secs, 35);
        assert_eq!(config.backend.result_limit, 5);
        assert!(config.policy.state_path.is_none());
    }

    #[test]
    fn test_config_parse_yaml() {
        let yaml = r#"
commandPrefix: "?"
policy:
  admins: [U1]
  features:
    spl_query: false
backend:
  resultLimit: 7
  searches:
    - name: failed_logins
      description: Failed logins
      rows:
        - user: bob
"#;
        let config: ConsoleConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.command_prefix, "?");
        assert_eq!(config.policy.admins, vec!["U1"]);
        assert_eq!(config.policy.features.get("spl_query"), Some(&false));
        assert_eq!(config.backend.result_limit, 7);
        assert_eq!(config.backend.searches[0].rows.len(), 1);
        // Untouched sections keep their defaults
        assert_eq!(config.audit.max_page_size, 50);
    }

    #[test]
    fn test_from_file_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"handlerTimeoutSecs": 5}"#).unwrap();

        let config = ConsoleConfig::from_file(&path).unwrap();
        assert_eq!(config.handler_timeout_secs, 5);
    }

    #[test]
    fn test_from_file_missing() {
        let result = ConsoleConfig::from_file(Path::new("/nonexistent/config.yaml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("ADMIN_USER_IDS", "'U1', \"U2\""),
            ("ADMIN_CHANNEL_IDS", "C1"),
            ("ENABLE_SPL_QUERY", "FALSE"),
            ("REQUIRE_SPL_APPROVAL", "true"),
            ("RESULT_LIMIT", "12"),
        ]
        .into_iter()
        .collect();

        let mut config = ConsoleConfig::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.policy.admins, vec!["U1", "U2"]);
        assert_eq!(config.policy.allowed_channels, vec!["C1"]);
        assert_eq!(config.policy.features.get(FEATURE_SPL_QUERY), Some(&false));
        assert_eq!(config.policy.features.get(FEATURE_APPROVAL), Some(&true));
        assert_eq!(config.backend.result_limit, 12);
    }

    #[test]
    fn test_env_override_invalid_limit() {
        let mut config = ConsoleConfig::default();
        let result = config.apply_overrides(|k| (k == "RESULT_LIMIT").then(|| "many".to_string()));
        assert!(matches!(result, Err(ConfigError::Invalid { ref key, .. }) if key == "RESULT_LIMIT"));
    }

    #[test]
    fn test_env_override_invalid_bool() {
        let mut config = ConsoleConfig::default();
        let result = config.apply_overrides(|k| (k == "ENABLE_SPL_QUERY").then(|| "maybe".to_string()));
        assert!(result.is_err());
    }
}
