//! AuditLog - Append-only, strictly ordered audit trail

use crate::entry::{AuditEntry, AuditResult};
use crate::export::{self, ExportFormat};
use crate::store::{AuditStore, MemoryStore, NdjsonStore};
use chrono::Utc;
use shared::{AuditConfig, AuditError};
use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard};
use tracing::{error, info};

/// Default number of entries returned by `tail(0)`
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Audit statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AuditStats {
    pub total_entries: usize,
    pub denial_count: usize,
    pub error_count: usize,
}

#[derive(Debug)]
struct Inner {
    store: Box<dyn AuditStore>,
    entries: Vec<AuditEntry>,
    next_seq: u64,
}

/// Audit log
///
/// Appends are serialized behind a write lock and reach the backing store
/// before they become visible to readers.
#[derive(Debug)]
pub struct AuditLog {
    inner: RwLock<Inner>,
    default_page_size: usize,
}

impl AuditLog {
    /// Open a log over `store`, loading whatever it already holds
    pub fn with_store(store: Box<dyn AuditStore>) -> Result<Self, AuditError> {
        let entries = store.read_all()?;
        let next_seq = entries.iter().map(|e| e.seq + 1).max().unwrap_or(0);
        info!(entries = entries.len(), next_seq, "Audit log opened");

        Ok(Self {
            inner: RwLock::new(Inner {
                store,
                entries,
                next_seq,
            }),
            default_page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Open (or create) an NDJSON-backed log
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        Self::with_store(Box::new(NdjsonStore::open(path)?))
    }

    /// Open the log described by configuration
    pub fn from_config(config: &AuditConfig) -> Result<Self, AuditError> {
        Ok(Self::open(&config.path)?.with_default_page_size(config.default_page_size))
    }

    /// Volatile log for tests and dry runs
    pub fn in_memory() -> Self {
        Self {
            inner: RwLock::new(Inner {
                store: Box::new(MemoryStore::new()),
                entries: Vec::new(),
                next_seq: 0,
            }),
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Builder: page size used when a tail request gives no count
    pub fn with_default_page_size(mut self, size: usize) -> Self {
        self.default_page_size = size.max(1);
        self
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, Inner> {
        // Entries are pushed only after a successful append, so a poisoned
        // lock still guards a consistent prefix of the log.
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an entry durably
    ///
    /// Assigns the next sequence number and a timestamp no earlier than the
    /// previous entry's. Returns the entry as stored.
    pub fn record(&self, mut entry: AuditEntry) -> Result<AuditEntry, AuditError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| AuditError::WriteFailure("audit log lock poisoned".to_string()))?;

        let now = Utc::now();
        entry.timestamp = match inner.entries.last() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        };
        entry.seq = inner.next_seq;

        if let Err(e) = inner.store.append(&entry) {
            error!(error = %e, command = %entry.command, user_id = %entry.user_id, "Audit write failed");
            return Err(e);
        }

        inner.next_seq += 1;
        inner.entries.push(entry.clone());
        drop(inner);

        info!(
            seq = entry.seq,
            user_id = %entry.user_id,
            command = %entry.command,
            channel_id = %entry.channel_id,
            result = %entry.result,
            "AUDIT: {}",
            entry.action
        );
        Ok(entry)
    }

    /// Page size used by `tail(0)`
    pub fn default_page_size(&self) -> usize {
        self.default_page_size
    }

    /// The last `n` entries, oldest first. `n == 0` means the default page size.
    pub fn tail(&self, n: usize) -> Vec<AuditEntry> {
        let n = if n == 0 { self.default_page_size } else { n };
        let inner = self.read_guard();
        let start = inner.entries.len().saturating_sub(n);
        inner.entries[start..].to_vec()
    }

    /// Every stored entry in order
    pub fn all(&self) -> Vec<AuditEntry> {
        self.read_guard().entries.clone()
    }

    /// Serialize the full stored range
    pub fn export(&self, format: ExportFormat) -> Result<Vec<u8>, AuditError> {
        let inner = self.read_guard();
        match format {
            ExportFormat::Json => export::to_json(&inner.entries).map_err(|e| AuditError::Export(e.to_string())),
            ExportFormat::Csv => Ok(export::to_csv(&inner.entries).into_bytes()),
            ExportFormat::Txt => Ok(export::to_txt(&inner.entries).into_bytes()),
        }
    }

    /// Entries issued by a user
    pub fn by_user(&self, user_id: &str) -> Vec<AuditEntry> {
        self.filtered(|e| e.user_id == user_id)
    }

    /// Entries for a command name (e.g. `!splunk-query`)
    pub fn by_command(&self, command: &str) -> Vec<AuditEntry> {
        self.filtered(|e| e.command == command)
    }

    /// The last `limit` denials, oldest first
    pub fn recent_denials(&self, limit: usize) -> Vec<AuditEntry> {
        let mut denials: Vec<_> = self
            .read_guard()
            .entries
            .iter()
            .rev()
            .filter(|e| e.result == AuditResult::Denied)
            .take(limit)
            .cloned()
            .collect();
        denials.reverse();
        denials
    }

    fn filtered(&self, pred: impl Fn(&AuditEntry) -> bool) -> Vec<AuditEntry> {
        self.read_guard().entries.iter().filter(|e| pred(e)).cloned().collect()
    }

    /// Get statistics
    pub fn stats(&self) -> AuditStats {
        let inner = self.read_guard();
        AuditStats {
            total_entries: inner.entries.len(),
            denial_count: inner.entries.iter().filter(|e| e.result == AuditResult::Denied).count(),
            error_count: inner.entries.iter().filter(|e| e.result == AuditResult::Error).count(),
        }
    }

    pub fn len(&self) -> usize {
        self.read_guard().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
