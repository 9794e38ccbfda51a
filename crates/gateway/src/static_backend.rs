//! StaticBackend - Query backend served from configured fixtures
//!
//! Stands in for a live search server in local runs and tests. Saved searches
//! come from [`BackendConfig::searches`]; a raw query returns the rows of the
//! saved search with the same query text, or no rows.

use crate::backend::{BackendStatus, QueryBackend, ResultSet, SearchMeta, SearchParams};
use async_trait::async_trait;
use shared::{BackendConfig, BackendError, SavedSearchConfig};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Fixture-backed [`QueryBackend`]
#[derive(Debug)]
pub struct StaticBackend {
    searches: BTreeMap<String, SavedSearchConfig>,
    reachable: AtomicBool,
    latency: Duration,
}

impl StaticBackend {
    pub fn new() -> Self {
        Self {
            searches: BTreeMap::new(),
            reachable: AtomicBool::new(true),
            latency: Duration::ZERO,
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        config
            .searches
            .iter()
            .cloned()
            .fold(Self::new(), |backend, search| backend.with_search(search))
    }

    /// Add or replace a saved search
    pub fn with_search(mut self, search: SavedSearchConfig) -> Self {
        self.searches.insert(search.name.clone(), search);
        self
    }

    /// Delay every search call by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Simulate the server going down or coming back
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    fn ensure_reachable(&self) -> Result<(), BackendError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BackendError::Unreachable("static backend is offline".to_string()))
        }
    }

    async fn job(&self, search: Option<&SavedSearchConfig>, params: &SearchParams) -> ResultSet {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let rows = search
            .map(|s| s.rows.iter().take(params.limit).cloned().collect())
            .unwrap_or_default();

        ResultSet {
            sid: Uuid::new_v4().to_string(),
            rows,
        }
    }
}

impl Default for StaticBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueryBackend for StaticBackend {
    async fn run_search(&self, name: &str, params: &SearchParams) -> Result<ResultSet, BackendError> {
        self.ensure_reachable()?;
        let search = self
            .searches
            .get(name)
            .ok_or_else(|| BackendError::BadResponse(format!("saved search '{}' not found", name)))?;

        debug!(name, earliest = %params.earliest, latest = %params.latest, "Running saved search");
        Ok(self.job(Some(search), params).await)
    }

    async fn run_query(&self, query: &str, params: &SearchParams) -> Result<ResultSet, BackendError> {
        self.ensure_reachable()?;
        let query = query.trim();
        if query.is_empty() {
            return Err(BackendError::BadResponse("empty query".to_string()));
        }

        let search = self.searches.values().find(|s| s.query.trim() == query);
        debug!(query, matched = search.is_some(), "Running raw query");
        Ok(self.job(search, params).await)
    }

    async fn list_searches(&self, filter: Option<&str>) -> Result<Vec<SearchMeta>, BackendError> {
        self.ensure_reachable()?;
        let filter = filter.map(str::to_lowercase);

        Ok(self
            .searches
            .values()
            .filter(|s| match &filter {
                Some(f) => s.name.to_lowercase().contains(f.as_str()),
                None => true,
            })
            .map(|s| SearchMeta {
                name: s.name.clone(),
                description: s.description.clone(),
            })
            .collect())
    }

    async fn health(&self) -> Result<BackendStatus, BackendError> {
        self.ensure_reachable()?;
        Ok(BackendStatus {
            version: env!("CARGO_PKG_VERSION").to_string(),
            build: "static".to_string(),
            server_roles: vec!["search_head".to_string()],
        })
    }
}
