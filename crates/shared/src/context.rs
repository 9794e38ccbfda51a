//! Per-request context and command access requirements

use crate::ids::normalize_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who sent a command, where, and when
///
/// Created by the transport for every inbound message and discarded after
/// the message has been handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    /// Sender user id (normalized)
    pub user_id: String,

    /// Sender display name
    pub user_name: String,

    /// Channel id (normalized)
    pub channel_id: String,

    /// Channel display name
    pub channel_name: String,

    /// Raw argument text following the command keyword
    #[serde(default)]
    pub args: String,

    /// When the message was received
    pub timestamp: DateTime<Utc>,
}

impl RequestContext {
    /// Create a context stamped with the current time
    pub fn new(
        user_id: impl AsRef<str>,
        user_name: impl Into<String>,
        channel_id: impl AsRef<str>,
        channel_name: impl Into<String>,
    ) -> Self {
        Self {
            user_id: normalize_id(user_id.as_ref()),
            user_name: user_name.into(),
            channel_id: normalize_id(channel_id.as_ref()),
            channel_name: channel_name.into(),
            args: String::new(),
            timestamp: Utc::now(),
        }
    }

    /// Builder: set the raw argument text
    pub fn with_args(mut self, args: impl Into<String>) -> Self {
        self.args = args.into();
        self
    }

    /// Builder: override the receive timestamp
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// What a command demands of the caller before it may run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessRequirements {
    /// Caller must be in the admin set
    pub requires_admin: bool,

    /// Feature flag (and channel allow-list) gating this command
    pub restricted_feature: Option<String>,
}

impl AccessRequirements {
    /// Open to everyone
    pub fn open() -> Self {
        Self::default()
    }

    /// Admins only
    pub fn admin() -> Self {
        Self {
            requires_admin: true,
            restricted_feature: None,
        }
    }

    /// Builder: gate on a restricted feature
    pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
        self.restricted_feature = Some(feature.into());
        self
    }
}
