// Public modules
pub mod catalog;
pub mod chat;
pub mod client;
pub mod error;
pub mod indicator;
pub mod observability;
pub mod reveal;
pub mod store;
pub mod types;
pub mod utils;

// Re-exports
pub use catalog::{ModelOption, Provider, Selection};
pub use chat::{ChatConfig, ChatManager, TurnOutcome, TurnPhase};
pub use client::{BackendClient, CompletionClient};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use store::{FileStorage, HistoryStorage, MemoryStorage, SessionStore};
pub use types::*;
