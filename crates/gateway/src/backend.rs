//! QueryBackend - Abstract search/query capability

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::BackendError;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// One result row: field name to value
pub type Row = BTreeMap<String, serde_json::Value>;

/// Rows returned by a search job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSet {
    /// Search job id
    pub sid: String,

    /// Result rows, already limited by the caller's request
    #[serde(default)]
    pub rows: Vec<Row>,
}

/// Saved search listing entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMeta {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Backend health report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendStatus {
    pub version: String,
    pub build: String,
    #[serde(default)]
    pub server_roles: Vec<String>,
}

/// Time window and row limit for a search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    pub earliest: String,
    pub latest: String,
    pub limit: usize,
}

impl SearchParams {
    /// Last 24 hours, `limit` rows
    pub fn with_limit(limit: usize) -> Self {
        Self {
            earliest: "-24h".to_string(),
            latest: "now".to_string(),
            limit,
        }
    }
}

impl Default for SearchParams {
    fn default() -> Self {
        Self::with_limit(5)
    }
}

/// Split `"<name> key=value ..."` into the leading name and search parameters
///
/// Recognized keys are `earliest`, `latest` and `limit`; others are ignored.
/// An unparsable `limit` keeps `default_limit`.
pub fn parse_search_args(text: &str, default_limit: usize) -> (Option<String>, SearchParams) {
    let mut params = SearchParams::with_limit(default_limit);
    let mut parts = text.split_whitespace();
    let name = parts.next().filter(|p| !p.contains('=')).map(str::to_string);
    let rest = if name.is_some() {
        parts.collect::<Vec<_>>()
    } else {
        text.split_whitespace().collect()
    };

    for token in rest {
        let Some((key, value)) = token.split_once('=') else {
            continue;
        };
        match key.trim() {
            "earliest" => params.earliest = value.trim().to_string(),
            "latest" => params.latest = value.trim().to_string(),
            "limit" => {
                if let Ok(limit) = value.trim().parse() {
                    params.limit = limit;
                }
            }
            _ => {}
        }
    }

    (name, params)
}

/// Search backend capability
///
/// Implementations own their wire protocol; callers only see these types.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Run a saved search by name
    async fn run_search(&self, name: &str, params: &SearchParams) -> Result<ResultSet, BackendError>;

    /// Run a raw query
    async fn run_query(&self, query: &str, params: &SearchParams) -> Result<ResultSet, BackendError>;

    /// List saved searches whose name contains `filter`
    async fn list_searches(&self, filter: Option<&str>) -> Result<Vec<SearchMeta>, BackendError>;

    /// Server status
    async fn health(&self) -> Result<BackendStatus, BackendError>;
}

/// Bounds every call of the wrapped backend with a timeout
pub struct TimeoutBackend<B> {
    inner: B,
    timeout: Duration,
}

impl<B: QueryBackend> TimeoutBackend<B> {
    pub fn new(inner: B, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<T>(
        &self,
        op: &str,
        fut: impl std::future::Future<Output = Result<T, BackendError>> + Send,
    ) -> Result<T, BackendError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(op, timeout_secs = self.timeout.as_secs_f64(), "Query backend call timed out");
                Err(BackendError::Timeout(self.timeout))
            }
        }
    }
}

#[async_trait]
impl<B: QueryBackend> QueryBackend for TimeoutBackend<B> {
    async fn run_search(&self, name: &str, params: &SearchParams) -> Result<ResultSet, BackendError> {
        self.bounded("run_search", self.inner.run_search(name, params)).await
    }

    async fn run_query(&self, query: &str, params: &SearchParams) -> Result<ResultSet, BackendError> {
        self.bounded("run_query", self.inner.run_query(query, params)).await
    }

    async fn list_searches(&self, filter: Option<&str>) -> Result<Vec<SearchMeta>, BackendError> {
        self.bounded("list_searches", self.inner.list_searches(filter)).await
    }

    async fn health(&self) -> Result<BackendStatus, BackendError> {
        self.bounded("health", self.inner.health()).await
    }
}

#[async_trait]
impl<T: QueryBackend + ?Sized> QueryBackend for Arc<T> {
    async fn run_search(&self, name: &str, params: &SearchParams) -> Result<ResultSet, BackendError> {
        (**self).run_search(name, params).await
    }

    async fn run_query(&self, query: &str, params: &SearchParams) -> Result<ResultSet, BackendError> {
        (**self).run_query(query, params).await
    }

    async fn list_searches(&self, filter: Option<&str>) -> Result<Vec<SearchMeta>, BackendError> {
        (**self).list_searches(filter).await
    }

    async fn health(&self) -> Result<BackendStatus, BackendError> {
        (**self).health().await
    }
}
