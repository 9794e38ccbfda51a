//! # ChatOps CLI
//!
//! The `chatops` binary: admin subcommands and an interactive console, both
//! driving the same command router as a chat transport would.

pub mod app;
pub mod commands;
pub mod interactive;
pub mod output;

pub use app::App;
pub use interactive::{Identity, InteractiveConsole};
