//! # ChatOps Audit
//!
//! Append-only audit log with JSON, CSV and text export.

mod audit_log;
mod entry;
pub mod export;
mod store;

pub use audit_log::{AuditLog, AuditStats, DEFAULT_PAGE_SIZE};
pub use entry::{AuditEntry, AuditResult};
pub use export::ExportFormat;
pub use store::{AuditStore, MemoryStore, NdjsonStore};
