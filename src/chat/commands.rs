//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to manage sessions and the model selection without sending
//! messages to the backend.

/// A parsed chat command.
///
/// These commands control the session manager and are not sent to the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Start a fresh, unsaved conversation.
    New,

    /// List saved sessions.
    History,

    /// Resume a saved session by id (or unique id prefix).
    Load(String),

    /// Delete a saved session by id (or unique id prefix).
    Delete(String),

    /// Switch provider.
    Provider(String),

    /// Switch model within the current provider.
    Model(String),

    /// List the models of the current provider.
    Models,

    /// Show the current provider, model and session.
    Status,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a command,
/// or `None` if it should be treated as a regular message.
///
/// # Examples
///
/// ```
/// # use confab::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/provider huggingface").is_some());
/// assert!(parse_command("Hello there!").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    let rest = input.strip_prefix('/')?;
    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "new" | "clear" => ChatCommand::New,
        "history" | "sessions" | "ls" => ChatCommand::History,
        "load" | "open" => required(argument, ChatCommand::Load, "/load requires a session id"),
        "delete" | "rm" => {
            required(argument, ChatCommand::Delete, "/delete requires a session id")
        }
        "provider" => required(
            argument,
            ChatCommand::Provider,
            "/provider requires a provider name",
        ),
        "model" => required(argument, ChatCommand::Model, "/model requires a model name"),
        "models" => ChatCommand::Models,
        "status" | "stats" => ChatCommand::Status,
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

fn required<F>(argument: Option<&str>, constructor: F, missing: &str) -> ChatCommand
where
    F: Fn(String) -> ChatCommand,
{
    match argument {
        Some(arg) => constructor(arg.to_string()),
        None => ChatCommand::Invalid(missing.to_string()),
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /new                   Start a new, unsaved chat
  /history               List saved chats
  /load <id>             Resume a saved chat (a unique id prefix is enough)
  /delete <id>           Delete a saved chat
  /provider <name>       Switch provider (openai, huggingface, local)
  /model <name>          Switch model; starts a new chat
  /models                List models of the current provider
  /status                Show provider, model and current chat
  /help                  Show this help message
  /quit                  Exit the chat"#
}
