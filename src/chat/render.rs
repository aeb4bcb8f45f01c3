//! Output rendering for the chat application.
//!
//! This module provides a trait-based rendering abstraction so the session
//! manager never writes to a terminal itself.  The default implementation
//! prints reveal frames as they arrive and uses ANSI escape codes to set the
//! model tag and errors apart from the response text.

use std::io::{self, Stdout, Write};

use crate::types::Message;

/// ANSI escape code for dim text (used for the model tag).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Trait for rendering chat output.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling
/// - Plain text without styling (for piping/redirecting)
/// - Test renderers that record what they were shown
pub trait Renderer: Send {
    /// Show one reveal frame.
    ///
    /// `frame` is the full prefix revealed so far, one character longer than
    /// the previous frame of the same response.
    fn print_reveal(&mut self, frame: &str);

    /// Called once the assistant message of a turn is committed.
    ///
    /// For failed turns no frames precede this call; the message carries the
    /// error text.
    fn finish_response(&mut self, message: &Message);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Called when a turn is interrupted and discarded.
    fn print_interrupted(&mut self);
}

/// Plain text renderer with optional ANSI styling.
///
/// Each reveal frame prints only the characters not shown yet, so the
/// response appears to type itself out.
pub struct PlainTextRenderer<W: Write + Send = Stdout> {
    out: W,
    use_color: bool,
    shown: usize,
}

impl PlainTextRenderer<Stdout> {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(io::stdout(), use_color)
    }
}

impl<W: Write + Send> PlainTextRenderer<W> {
    /// Creates a renderer writing to `out`.
    pub fn with_writer(out: W, use_color: bool) -> Self {
        Self {
            out,
            use_color,
            shown: 0,
        }
    }

    /// Consumes the renderer, returning its writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Flushes output to ensure immediate display of revealed content.
    fn flush(&mut self) {
        let _ = self.out.flush();
    }

    /// Writes the part of `text` past what is already on screen.
    fn write_unseen(&mut self, text: &str) {
        let unseen = text.get(self.shown..).unwrap_or(text);
        let _ = write!(self.out, "{unseen}");
        self.shown = text.len();
    }
}

impl Default for PlainTextRenderer<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> Renderer for PlainTextRenderer<W> {
    fn print_reveal(&mut self, frame: &str) {
        self.write_unseen(frame);
        self.flush();
    }

    fn finish_response(&mut self, message: &Message) {
        self.write_unseen(&message.content);
        let _ = writeln!(self.out);
        if let Some(model) = &message.model {
            if self.use_color {
                let _ = writeln!(self.out, "{ANSI_DIM}Model: {model}{ANSI_RESET}");
            } else {
                let _ = writeln!(self.out, "Model: {model}");
            }
        }
        self.shown = 0;
        self.flush();
    }

    fn print_error(&mut self, error: &str) {
        self.shown = 0;
        if self.use_color {
            let _ = writeln!(self.out, "{ANSI_RED}Error: {error}{ANSI_RESET}");
        } else {
            let _ = writeln!(self.out, "Error: {error}");
        }
        self.flush();
    }

    fn print_info(&mut self, info: &str) {
        let _ = writeln!(self.out, "{info}");
        self.flush();
    }

    fn print_interrupted(&mut self) {
        self.shown = 0;
        let _ = writeln!(self.out, "\n[interrupted]");
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(renderer: PlainTextRenderer<Vec<u8>>) -> String {
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    #[test]
    fn renderer_default_has_color() {
        let renderer = PlainTextRenderer::new();
        assert!(renderer.use_color);
    }

    #[test]
    fn renderer_without_color() {
        let renderer = PlainTextRenderer::with_color(false);
        assert!(!renderer.use_color);
    }

    #[test]
    fn reveal_prints_only_new_characters() {
        let mut renderer = PlainTextRenderer::with_writer(Vec::new(), false);
        renderer.print_reveal("H");
        renderer.print_reveal("Hé");
        renderer.print_reveal("Hél");
        renderer.finish_response(&Message::assistant("Hél", "gpt2"));
        assert_eq!(rendered(renderer), "Hél\nModel: gpt2\n");
    }

    #[test]
    fn failed_turn_prints_whole_message() {
        let mut renderer = PlainTextRenderer::with_writer(Vec::new(), false);
        renderer.finish_response(&Message::assistant(
            "Error: Could not reach backend.",
            "gpt-4",
        ));
        assert_eq!(
            rendered(renderer),
            "Error: Could not reach backend.\nModel: gpt-4\n"
        );
    }

    #[test]
    fn interrupted_reveal_restarts_next_response() {
        let mut renderer = PlainTextRenderer::with_writer(Vec::new(), false);
        renderer.print_reveal("ab");
        renderer.print_interrupted();
        renderer.print_reveal("x");
        renderer.finish_response(&Message::user("x"));
        assert_eq!(rendered(renderer), "ab\n[interrupted]\nx\n");
    }

    #[test]
    fn color_wraps_model_tag() {
        let mut renderer = PlainTextRenderer::with_writer(Vec::new(), true);
        renderer.finish_response(&Message::assistant("ok", "local-mock"));
        assert_eq!(
            rendered(renderer),
            format!("ok\n{ANSI_DIM}Model: local-mock{ANSI_RESET}\n")
        );
    }
}
