//! CLI Commands

pub mod chat;
pub mod export;
pub mod restore;

pub use chat::ChatCommand;
pub use export::ExportCommand;
pub use restore::RestoreCommand;
