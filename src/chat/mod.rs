//! The conversation session manager and its interactive front end.
//!
//! # Architecture
//!
//! The module is organized into several components:
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`manager`]: session state, turn orchestration and reveal
//! - [`commands`]: slash command parsing for the REPL
//! - [`render`]: the presentation-layer trait and a plain-text renderer

mod commands;
mod config;
mod manager;
mod render;

pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig};
pub use manager::{BACKEND_ERROR_MESSAGE, ChatManager, ChatView, TurnOutcome, TurnPhase};
pub use render::{PlainTextRenderer, Renderer};
