//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and configuration
//! structures for controlling the session manager.

use std::path::PathBuf;
use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::catalog::{Provider, Selection};
use crate::error::Result;
use crate::indicator::DEFAULT_INDICATOR_INTERVAL;
use crate::reveal::DEFAULT_REVEAL_INTERVAL;

/// Default per-request timeout.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Command-line arguments for the confab-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Base URL of the chat backend.
    #[arrrg(optional, "Backend base URL (default: $CONFAB_BACKEND_URL or http://localhost:8000/)", "URL")]
    pub backend_url: Option<String>,

    /// Provider to start with.
    #[arrrg(optional, "Provider: openai, huggingface or local (default: openai)", "PROVIDER")]
    pub provider: Option<String>,

    /// Model to start with.
    #[arrrg(optional, "Model within the provider (default: provider's first model)", "MODEL")]
    pub model: Option<String>,

    /// Directory holding the saved history.
    #[arrrg(optional, "Directory for saved chat history", "DIR")]
    pub history_dir: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a chat session manager.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Backend base URL.  `None` defers to the environment.
    pub backend_url: Option<String>,

    /// The provider and model selected at startup.
    pub selection: Selection,

    /// Directory for the saved history.
    pub history_dir: PathBuf,

    /// Pause between two reveal frames.
    pub reveal_interval: Duration,

    /// Pause between two indicator glyphs.
    pub indicator_interval: Duration,

    /// Timeout for one completion request.
    pub request_timeout: Duration,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Provider: openai, model gpt-3.5-turbo
    /// - Reveal: one character every 15 ms
    /// - Indicator: one glyph every 100 ms
    /// - Request timeout: 60 s
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            backend_url: None,
            selection: Selection::default(),
            history_dir: default_history_dir(),
            reveal_interval: DEFAULT_REVEAL_INTERVAL,
            indicator_interval: DEFAULT_INDICATOR_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            use_color: true,
        }
    }

    /// Resolves command-line arguments, validating provider and model.
    pub fn from_args(args: ChatArgs) -> Result<Self> {
        let provider = match args.provider.as_deref() {
            Some(provider) => provider.parse()?,
            None => Provider::default(),
        };
        let selection = match args.model.as_deref() {
            Some(model) => Selection::new(provider, model)?,
            None => Selection::for_provider(provider),
        };
        let mut config = ChatConfig::new().with_selection(selection);
        config.backend_url = args.backend_url;
        if let Some(dir) = args.history_dir {
            config.history_dir = PathBuf::from(dir);
        }
        if args.no_color {
            config = config.without_color();
        }
        Ok(config)
    }

    /// Sets the backend base URL.
    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = Some(url.into());
        self
    }

    /// Sets the starting provider and model.
    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    /// Starts on `provider` with its first model.
    pub fn with_provider(self, provider: Provider) -> Self {
        self.with_selection(Selection::for_provider(provider))
    }

    /// Switches to another model of the configured provider.
    pub fn with_model(mut self, model: &str) -> Result<Self> {
        self.selection.switch_model(model)?;
        Ok(self)
    }

    /// Sets the history directory.
    pub fn with_history_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.history_dir = dir.into();
        self
    }

    /// Sets the pause between reveal frames.
    pub fn with_reveal_interval(mut self, interval: Duration) -> Self {
        self.reveal_interval = interval;
        self
    }

    /// Sets the pause between indicator glyphs.
    pub fn with_indicator_interval(mut self, interval: Duration) -> Self {
        self.indicator_interval = interval;
        self
    }

    /// Sets the completion request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn default_history_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("confab"))
        .unwrap_or_else(|| PathBuf::from(".confab"))
}
