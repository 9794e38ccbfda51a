//! # ChatOps Router
//!
//! Matches chat text to registered commands, authorizes the sender, runs the
//! handler and records the outcome in the audit log.
//!
//! ## Components
//!
//! - `CommandPattern` - Keyword plus argument grammar
//! - `CommandRouter` - Ordered command table and the dispatch pipeline
//! - `commands` - Built-in admin, audit and search commands

mod command_router;
pub mod commands;
mod handler;
mod pattern;

pub use command_router::{CommandDescriptor, CommandRouter, Reply, RouterError, DEFAULT_HANDLER_TIMEOUT};
pub use commands::{builtin_router, Builtin, ConsoleServices};
pub use handler::{CommandHandler, HandlerError, HandlerOutcome};
pub use pattern::{ArgGrammar, CommandPattern};
