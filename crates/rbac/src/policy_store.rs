//! PolicyStore - Admin set, channel allow-list and feature flags

use serde::{Deserialize, Serialize};
use shared::{normalize_id, PolicyConfig, PolicyError};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// Persisted policy state
///
/// Serializes to the `config-backup` contract:
/// `{"admins": [...], "allowedChannels": [...], "features": {...}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyState {
    /// Users with administrative privilege
    #[serde(default)]
    pub admins: BTreeSet<String>,

    /// Channels where restricted features may run (empty = everywhere)
    #[serde(default)]
    pub allowed_channels: BTreeSet<String>,

    /// Explicit feature toggles
    #[serde(default)]
    pub features: BTreeMap<String, bool>,
}

impl PolicyState {
    /// Build a state from configuration seed values
    pub fn from_config(config: &PolicyConfig) -> Self {
        Self {
            admins: normalize_ids(&config.admins),
            allowed_channels: normalize_ids(&config.allowed_channels),
            features: config.features.clone(),
        }
    }

    /// Same state with every id normalized and blank ids dropped
    pub fn normalized(self) -> Self {
        Self {
            admins: normalize_ids(&self.admins),
            allowed_channels: normalize_ids(&self.allowed_channels),
            features: self.features,
        }
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admins.contains(&normalize_id(user_id))
    }

    /// Unknown features are enabled unless explicitly switched off
    pub fn is_feature_enabled(&self, name: &str) -> bool {
        self.features.get(name).copied().unwrap_or(true)
    }

    /// Whether `feature` may run in `channel_id`
    ///
    /// A disabled feature is allowed nowhere. Otherwise an empty allow-list
    /// admits every channel.
    pub fn is_channel_allowed(&self, channel_id: &str, feature: &str) -> bool {
        if !self.is_feature_enabled(feature) {
            return false;
        }
        self.allowed_channels.is_empty() || self.allowed_channels.contains(&normalize_id(channel_id))
    }

    /// Render as pretty JSON
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Lock-guarded owner of the policy state
///
/// Every mutation runs against a copy of the current state and is committed
/// only after the snapshot (if any) has been written, so readers never see a
/// half-applied change.
#[derive(Debug, Default)]
pub struct PolicyStore {
    state: RwLock<PolicyState>,
    state_path: Option<PathBuf>,
}

impl PolicyStore {
    /// Create an empty, in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an in-memory store with initial state
    pub fn with_state(state: PolicyState) -> Self {
        Self {
            state: RwLock::new(state),
            state_path: None,
        }
    }

    /// Open a persisted store
    ///
    /// Loads the snapshot at `path` when it exists; otherwise starts from
    /// `seed` and writes it out.
    pub fn open(path: impl Into<PathBuf>, seed: PolicyState) -> Result<Self, PolicyError> {
        let path = path.into();
        let state = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| PolicyError::Storage(e.to_string()))?;
            let state: PolicyState =
                serde_json::from_str(&content).map_err(|e| PolicyError::Storage(e.to_string()))?;
            info!(path = %path.display(), admins = state.admins.len(), "Loaded policy snapshot");
            state
        } else {
            write_snapshot(&path, &seed)?;
            info!(path = %path.display(), "Created policy snapshot from seed");
            seed
        };

        Ok(Self {
            state: RwLock::new(state),
            state_path: Some(path),
        })
    }

    /// Build a store from configuration
    pub fn from_config(config: &PolicyConfig) -> Result<Self, PolicyError> {
        let seed = PolicyState::from_config(config);
        match &config.state_path {
            Some(path) => Self::open(path.clone(), seed),
            None => Ok(Self::with_state(seed)),
        }
    }

    // Writers replace the state wholesale, so a poisoned lock still guards a
    // consistent value.
    fn read_guard(&self) -> RwLockReadGuard<'_, PolicyState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, PolicyState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Evaluate `f` against one consistent view of the state
    pub fn read<T>(&self, f: impl FnOnce(&PolicyState) -> T) -> T {
        f(&self.read_guard())
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut PolicyState) -> Result<T, PolicyError>) -> Result<T, PolicyError> {
        let mut guard = self.write_guard();
        let mut next = guard.clone();
        let out = f(&mut next)?;
        if let Some(path) = &self.state_path {
            write_snapshot(path, &next)?;
        }
        *guard = next;
        Ok(out)
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.read(|s| s.is_admin(user_id))
    }

    /// Sorted admin ids
    pub fn list_admins(&self) -> Vec<String> {
        self.read(|s| s.admins.iter().cloned().collect())
    }

    /// Seed the first admin. Only succeeds while the admin set is empty.
    pub fn bootstrap(&self, user_id: &str) -> Result<(), PolicyError> {
        let user_id = normalize_id(user_id);
        self.mutate(|state| {
            if !state.admins.is_empty() {
                return Err(PolicyError::AlreadyBootstrapped);
            }
            state.admins.insert(user_id.clone());
            Ok(())
        })?;
        info!(user_id = %user_id, "Bootstrapped first admin");
        Ok(())
    }

    /// Add `target_id` to the admin set on behalf of `actor_id`
    pub fn add_admin(&self, actor_id: &str, target_id: &str) -> Result<(), PolicyError> {
        let target_id = normalize_id(target_id);
        self.mutate(|state| {
            if !state.is_admin(actor_id) {
                return Err(PolicyError::NotAuthorized);
            }
            if !state.admins.insert(target_id.clone()) {
                return Err(PolicyError::AlreadyExists(target_id.clone()));
            }
            Ok(())
        })?;
        info!(actor = %normalize_id(actor_id), target = %target_id, "Added admin");
        Ok(())
    }

    /// Remove `target_id` from the admin set on behalf of `actor_id`
    pub fn remove_admin(&self, actor_id: &str, target_id: &str) -> Result<(), PolicyError> {
        let target_id = normalize_id(target_id);
        self.mutate(|state| {
            if !state.is_admin(actor_id) {
                return Err(PolicyError::NotAuthorized);
            }
            if !state.admins.contains(&target_id) {
                return Err(PolicyError::NotFound(target_id.clone()));
            }
            if state.admins.len() == 1 {
                return Err(PolicyError::LastAdmin);
            }
            state.admins.remove(&target_id);
            Ok(())
        })?;
        info!(actor = %normalize_id(actor_id), target = %target_id, "Removed admin");
        Ok(())
    }

    /// Insert into or remove from the channel allow-list
    ///
    /// Idempotent; returns whether the list changed.
    pub fn set_channel_allowed(&self, channel_id: &str, allowed: bool) -> Result<bool, PolicyError> {
        let channel_id = normalize_id(channel_id);
        let changed = self.mutate(|state| {
            Ok(if allowed {
                state.allowed_channels.insert(channel_id.clone())
            } else {
                state.allowed_channels.remove(&channel_id)
            })
        })?;
        debug!(channel_id = %channel_id, allowed, changed, "Updated channel allow-list");
        Ok(changed)
    }

    pub fn is_channel_allowed(&self, channel_id: &str, feature: &str) -> bool {
        self.read(|s| s.is_channel_allowed(channel_id, feature))
    }

    pub fn toggle_feature(&self, name: &str, enabled: bool) -> Result<(), PolicyError> {
        self.mutate(|state| {
            state.features.insert(name.to_string(), enabled);
            Ok(())
        })?;
        info!(feature = %name, enabled, "Feature toggled");
        Ok(())
    }

    pub fn is_feature_enabled(&self, name: &str) -> bool {
        self.read(|s| s.is_feature_enabled(name))
    }

    /// Read-only copy of the whole state
    pub fn snapshot(&self) -> PolicyState {
        self.read_guard().clone()
    }

    /// Replace the whole state from a backup, on behalf of an admin
    pub fn restore(&self, actor_id: &str, state: PolicyState) -> Result<(), PolicyError> {
        let state = state.normalized();
        self.mutate(|current| {
            if !current.is_admin(actor_id) {
                return Err(PolicyError::NotAuthorized);
            }
            if state.admins.is_empty() {
                return Err(PolicyError::LastAdmin);
            }
            *current = state;
            Ok(())
        })?;
        warn!(actor = %normalize_id(actor_id), "Policy state restored from backup");
        Ok(())
    }

    /// Path of the persisted snapshot, if any
    pub fn state_path(&self) -> Option<&Path> {
        self.state_path.as_deref()
    }
}

/// Write the snapshot to a temp file and rename it into place
fn write_snapshot(path: &Path, state: &PolicyState) -> Result<(), PolicyError> {
    let storage = |e: std::io::Error| PolicyError::Storage(format!("{}: {}", path.display(), e));

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(storage)?;
        }
    }

    let content = state.to_json_pretty().map_err(|e| PolicyError::Storage(e.to_string()))?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    std::fs::write(&tmp, content).map_err(storage)?;
    std::fs::rename(&tmp, path).map_err(storage)
}

fn normalize_ids<'a>(ids: impl IntoIterator<Item = &'a String>) -> BTreeSet<String> {
    ids.into_iter().map(|id| normalize_id(id)).filter(|id| !id.is_empty()).collect()
}
