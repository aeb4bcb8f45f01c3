//! Interactive chat over a completion backend, with saved sessions.
//!
//! # Usage
//!
//! ```bash
//! # Talk to the backend on http://localhost:8000/
//! confab-chat
//!
//! # Start on another provider and model
//! confab-chat --provider huggingface --model gpt2
//!
//! # Disable colors (useful for piping output)
//! confab-chat --no-color
//! ```
//!
//! Set `CONFAB_LOG` (for example `CONFAB_LOG=confab=debug`) to see logs on
//! stderr.
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/new` - Start a new chat
//! - `/history` - List saved chats
//! - `/load <id>` - Resume a saved chat
//! - `/delete <id>` - Delete a saved chat
//! - `/provider <name>`, `/model <name>`, `/models` - Choose the model
//! - `/status` - Show the current selection
//! - `/quit` - Exit the application

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use time::format_description::well_known::Rfc3339;
use tracing_subscriber::EnvFilter;

use confab::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatManager, PlainTextRenderer, Renderer, TurnPhase,
    help_text, parse_command,
};
use confab::{BackendClient, Message, Provider, Session};

const LOG_ENV: &str = "CONFAB_LOG";

/// Whether the spinner currently occupies the start of the line.
#[derive(Debug, Default)]
struct Spinner {
    active: bool,
    drawn: bool,
}

impl Spinner {
    fn erase(&mut self) {
        self.active = false;
        if self.drawn {
            print!("\r  \r");
            self.drawn = false;
        }
    }
}

/// Plain text output that clears the spinner before the first response text.
struct Terminal {
    inner: PlainTextRenderer,
    spinner: Arc<Mutex<Spinner>>,
}

impl Terminal {
    fn clear_spinner(&self) {
        self.spinner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .erase();
    }
}

impl Renderer for Terminal {
    fn print_reveal(&mut self, frame: &str) {
        self.clear_spinner();
        self.inner.print_reveal(frame);
    }

    fn finish_response(&mut self, message: &Message) {
        self.clear_spinner();
        self.inner.finish_response(message);
    }

    fn print_error(&mut self, error: &str) {
        self.clear_spinner();
        self.inner.print_error(error);
    }

    fn print_info(&mut self, info: &str) {
        self.inner.print_info(info);
    }

    fn print_interrupted(&mut self) {
        self.clear_spinner();
        self.inner.print_interrupted();
    }
}

/// Main entry point for the confab-chat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("confab=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let (args, _) = ChatArgs::from_command_line_relaxed("confab-chat [OPTIONS]");
    let config = ChatConfig::from_args(args)?;
    let client = BackendClient::with_options(
        config.backend_url.clone(),
        Some(config.request_timeout),
    )?;
    tracing::info!(url = %client.chat_url(), history = %config.history_dir.display(), "starting");
    let manager = Arc::new(ChatManager::open(client, &config)?);

    let spinner = Arc::new(Mutex::new(Spinner::default()));
    let mut renderer = Terminal {
        inner: PlainTextRenderer::with_color(config.use_color),
        spinner: Arc::clone(&spinner),
    };
    let mut rl = DefaultEditor::new()?;

    // Ctrl+C during a turn discards it; at the prompt rustyline handles it.
    let interrupter = Arc::clone(&manager);
    ctrlc::set_handler(move || {
        interrupter.interrupt();
    })?;

    let spinner_task = {
        let manager = Arc::clone(&manager);
        let spinner = Arc::clone(&spinner);
        let mut glyphs = manager.subscribe_indicator();
        tokio::spawn(async move {
            while glyphs.changed().await.is_ok() {
                let glyph = *glyphs.borrow_and_update();
                let mut spinner = spinner.lock().unwrap_or_else(PoisonError::into_inner);
                // Drawn only until the reply starts printing; the clock itself runs longer.
                if spinner.active && manager.phase() == TurnPhase::Sending {
                    print!("\r{glyph} ");
                    let _ = std::io::stdout().flush();
                    spinner.drawn = true;
                }
            }
        })
    };

    println!(
        "confab ({} / {}, {} saved chats)",
        manager.selection().provider().label(),
        manager.selection().model_label(),
        manager.history().len()
    );
    println!("Type /help for commands, /quit to exit\n");

    loop {
        let readline = rl.readline("You: ");

        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                if let Some(cmd) = parse_command(line) {
                    if !run_command(&manager, cmd, &mut renderer) {
                        break;
                    }
                    continue;
                }

                spinner
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .active = true;
                let outcome = manager.submit(line, &mut renderer).await;
                renderer.clear_spinner();
                if let Err(e) = outcome {
                    renderer.print_error(&e.to_string());
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {}", err));
                break;
            }
        }
    }

    spinner_task.abort();
    Ok(())
}

/// Runs one slash command.  Returns false when the REPL should exit.
fn run_command(
    manager: &ChatManager<BackendClient>,
    cmd: ChatCommand,
    renderer: &mut dyn Renderer,
) -> bool {
    let result = match cmd {
        ChatCommand::Quit => {
            println!("Goodbye!");
            return false;
        }
        ChatCommand::New => manager
            .start_new_chat()
            .map(|()| renderer.print_info("Started a new chat.")),
        ChatCommand::Help => {
            for line in help_text().lines() {
                println!("    {}", line);
            }
            Ok(())
        }
        ChatCommand::History => {
            print_history(&manager.history(), manager.current_id().as_deref());
            Ok(())
        }
        ChatCommand::Load(prefix) => match resolve_id(&manager.history(), &prefix) {
            Ok(id) => manager.load_session(&id).map(|session| {
                renderer.print_info(&format!("Loaded \"{}\".", session.display_title()));
                for message in &session.messages {
                    print_message(message);
                }
            }),
            Err(msg) => {
                renderer.print_error(&msg);
                Ok(())
            }
        },
        ChatCommand::Delete(prefix) => match resolve_id(&manager.history(), &prefix) {
            Ok(id) => manager
                .delete_session(&id)
                .map(|()| renderer.print_info(&format!("Deleted {}.", short_id(&id)))),
            Err(msg) => {
                renderer.print_error(&msg);
                Ok(())
            }
        },
        ChatCommand::Provider(name) => name.parse::<Provider>().and_then(|provider| {
            manager.switch_provider(provider).map(|()| {
                renderer.print_info(&format!(
                    "Provider set to {}, model {}. Started a new chat.",
                    provider.label(),
                    provider.default_model().label
                ))
            })
        }),
        ChatCommand::Model(model) => manager.switch_model(&model).map(|()| {
            renderer.print_info(&format!(
                "Model set to {}. Started a new chat.",
                manager.selection().model_label()
            ))
        }),
        ChatCommand::Models => {
            let selection = manager.selection();
            println!("    Models for {}:", selection.provider().label());
            for option in selection.provider().models() {
                let marker = if option.value == selection.model() {
                    "*"
                } else {
                    " "
                };
                println!("    {marker} {:<24} {}", option.value, option.label);
            }
            Ok(())
        }
        ChatCommand::Status => {
            let view = manager.view();
            println!("    Provider: {}", view.provider.label());
            println!("    Model: {}", view.model);
            match view.current_id.as_deref() {
                Some(id) => println!("    Chat: {}", short_id(id)),
                None => println!("    Chat: (unsaved)"),
            }
            println!("    Messages: {}", view.messages.len());
            println!("    Saved chats: {}", view.history.len());
            Ok(())
        }
        ChatCommand::Invalid(message) => {
            renderer.print_error(&message);
            Ok(())
        }
    };
    if let Err(err) = result {
        renderer.print_error(&err.to_string());
    }
    true
}

fn print_history(history: &[Session], current: Option<&str>) {
    if history.is_empty() {
        println!("    No saved chats.");
        return;
    }
    for session in history {
        let marker = if Some(session.id.as_str()) == current {
            "*"
        } else {
            " "
        };
        let created = session.created_at.format(&Rfc3339).unwrap_or_default();
        println!(
            "    {marker} {}  {}  {} ({} messages)",
            short_id(&session.id),
            created,
            session.display_title(),
            session.messages.len()
        );
    }
}

fn print_message(message: &Message) {
    println!("{}: {}", message.role, message.content);
    if let Some(model) = &message.model {
        println!("    Model: {model}");
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Resolves a session id from a unique prefix.
fn resolve_id(history: &[Session], prefix: &str) -> Result<String, String> {
    if let Some(session) = history.iter().find(|s| s.id == prefix) {
        return Ok(session.id.clone());
    }
    let matches: Vec<&Session> = history
        .iter()
        .filter(|s| s.id.starts_with(prefix))
        .collect();
    match matches.as_slice() {
        [session] => Ok(session.id.clone()),
        [] => Err(format!("No saved chat matches {prefix}")),
        _ => Err(format!(
            "{prefix} matches {} saved chats; use a longer prefix",
            matches.len()
        )),
    }
}
