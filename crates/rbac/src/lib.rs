//! # ChatOps RBAC
//!
//! Admin/channel/feature policy for the console.
//!
//! ## Components
//!
//! - `PolicyStore` - Lock-guarded, optionally persisted policy state
//! - `AuthorizationEngine` - Ordered allow/deny decision over the policy

pub mod authorization;
pub mod policy_store;

pub use authorization::{decide, AuthorizationEngine, Decision, DenyReason};
pub use policy_store::{PolicyState, PolicyStore};
