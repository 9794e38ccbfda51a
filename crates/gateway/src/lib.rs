//! # ChatOps Gateway
//!
//! The query backend capability consumed by search commands, plus adapters.

pub mod backend;
pub mod static_backend;

pub use backend::{
    parse_search_args, BackendStatus, QueryBackend, ResultSet, Row, SearchMeta, SearchParams, TimeoutBackend,
};
pub use static_backend::StaticBackend;
