//! # ChatOps Shared
//!
//! Common types and interfaces used across all console crates.

pub mod config;
pub mod context;
pub mod error;
pub mod ids;

// Re-exports
pub use config::*;
pub use context::*;
pub use error::*;
pub use ids::*;
