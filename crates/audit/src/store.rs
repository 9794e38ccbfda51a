//! Append-only backing stores for the audit log
//!
//! [`NdjsonStore`] keeps one JSON object per line in a file opened in append
//! mode. Each append is written in one piece and synced before it returns, so
//! an entry that was acknowledged survives a crash. [`MemoryStore`] keeps
//! entries in a `Vec` and is meant for tests.

use crate::entry::AuditEntry;
use shared::AuditError;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Durable, append-only storage for audit entries
pub trait AuditStore: Send + Sync + fmt::Debug {
    /// Append one entry. Must not return until the entry is durable.
    fn append(&mut self, entry: &AuditEntry) -> Result<(), AuditError>;

    /// Read every stored entry in append order
    fn read_all(&self) -> Result<Vec<AuditEntry>, AuditError>;
}

/// NDJSON file store
///
/// A failed append leaves the file in an unknown state, so the store refuses
/// every later append until it is reopened.
#[derive(Debug)]
pub struct NdjsonStore {
    file: File,
    path: PathBuf,
    failed: bool,
}

impl NdjsonStore {
    /// Open or create the log file for appending
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if has_torn_tail(&path)? {
            warn!(path = %path.display(), "Audit log ends mid-line; sealing the partial entry");
            file.write_all(b"\n")?;
            file.sync_data()?;
        }

        Ok(Self {
            file,
            path,
            failed: false,
        })
    }

    /// Return the path to the log file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditStore for NdjsonStore {
    fn append(&mut self, entry: &AuditEntry) -> Result<(), AuditError> {
        if self.failed {
            return Err(AuditError::WriteFailure(format!(
                "{} is unusable after an earlier write failure",
                self.path.display()
            )));
        }

        let mut line = serde_json::to_vec(entry).map_err(|e| AuditError::WriteFailure(e.to_string()))?;
        line.push(b'\n');

        let written = self.file.write_all(&line).and_then(|()| self.file.sync_data());
        if let Err(e) = written {
            self.failed = true;
            return Err(e.into());
        }
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<AuditEntry>, AuditError> {
        let file = File::open(&self.path).map_err(|e| AuditError::Corrupt(e.to_string()))?;
        let mut entries = Vec::new();

        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| AuditError::Corrupt(e.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(
                    path = %self.path.display(),
                    line = index + 1,
                    error = %e,
                    "Skipping malformed audit line"
                ),
            }
        }

        Ok(entries)
    }
}

/// True when the file is non-empty and its last byte is not a newline
fn has_torn_tail(path: &Path) -> Result<bool, AuditError> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Vec<AuditEntry>,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every append fails, for exercising fatal audit paths
    pub fn failing() -> Self {
        Self {
            entries: Vec::new(),
            fail_writes: true,
        }
    }
}

impl AuditStore for MemoryStore {
    fn append(&mut self, entry: &AuditEntry) -> Result<(), AuditError> {
        if self.fail_writes {
            return Err(AuditError::WriteFailure("store is read-only".to_string()));
        }
        self.entries.push(entry.clone());
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<AuditEntry>, AuditError> {
        Ok(self.entries.clone())
    }
}
