//! Progressive reveal of an already complete response.
//!
//! A reveal replays a known string as if it were arriving one character at a
//! time.  [`prefixes`] gives the frames without timing; [`Reveal::into_stream`]
//! paces them on a fixed interval.  The first frame is immediate.

use std::time::Duration;

use futures::stream::{self, Stream};
use tokio::time::{Interval, MissedTickBehavior};

/// Default pause between two frames.
pub const DEFAULT_REVEAL_INTERVAL: Duration = Duration::from_millis(15);

/// Iterator over the growing prefixes of a string, one character at a time.
///
/// Prefixes always end on a character boundary, so multi-byte characters are
/// revealed whole.
#[derive(Debug, Clone)]
pub struct Prefixes<'a> {
    text: &'a str,
    chars: std::str::CharIndices<'a>,
}

impl<'a> Iterator for Prefixes<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let (offset, c) = self.chars.next()?;
        Some(&self.text[..offset + c.len_utf8()])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chars.size_hint()
    }
}

/// Returns the reveal frames for `text`.
///
/// An empty string has no frames.
pub fn prefixes(text: &str) -> Prefixes<'_> {
    Prefixes {
        text,
        chars: text.char_indices(),
    }
}

/// A paced reveal of one response.
#[derive(Debug, Clone)]
pub struct Reveal {
    text: String,
    interval: Duration,
}

impl Reveal {
    /// Creates a reveal of `text` advancing every `interval`.
    pub fn new(text: impl Into<String>, interval: Duration) -> Self {
        Self {
            text: text.into(),
            interval,
        }
    }

    /// The full text being revealed.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of frames the reveal will produce.
    pub fn frame_count(&self) -> usize {
        self.text.chars().count()
    }

    /// Turns the reveal into a lazy stream of owned frames.
    ///
    /// Frames are produced only while the stream is polled; dropping the
    /// stream drops its timer with it.
    pub fn into_stream(self) -> impl Stream<Item = String> + Send + 'static {
        let period = self.interval.max(Duration::from_millis(1));
        let boundaries: Vec<usize> = prefixes(&self.text).map(str::len).collect();
        let state: (String, std::vec::IntoIter<usize>, Option<Interval>) =
            (self.text, boundaries.into_iter(), None);
        stream::unfold(state, move |(text, mut boundaries, ticker)| async move {
            let end = boundaries.next()?;
            // The timer starts on first poll, not at construction.
            let mut ticker = ticker.unwrap_or_else(|| {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                ticker
            });
            ticker.tick().await;
            let frame = text[..end].to_string();
            Some((frame, (text, boundaries, Some(ticker))))
        })
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use tokio::time::Instant;

    use super::*;

    #[test]
    fn prefixes_of_hi() {
        let frames: Vec<&str> = prefixes("Hi").collect();
        assert_eq!(frames, vec!["H", "Hi"]);
    }

    #[test]
    fn prefixes_of_empty_string() {
        assert_eq!(prefixes("").count(), 0);
    }

    #[test]
    fn prefixes_respect_char_boundaries() {
        let frames: Vec<&str> = prefixes("né✓").collect();
        assert_eq!(frames, vec!["n", "né", "né✓"]);
    }

    #[test]
    fn frame_count_matches_characters() {
        let reveal = Reveal::new("héllo", DEFAULT_REVEAL_INTERVAL);
        assert_eq!(reveal.frame_count(), 5);
        assert_eq!(reveal.text(), "héllo");
    }

    #[tokio::test(start_paused = true)]
    async fn stream_is_paced() {
        let start = Instant::now();
        let frames: Vec<(String, Duration)> = Reveal::new("abc", Duration::from_millis(15))
            .into_stream()
            .map(|frame| (frame, start.elapsed()))
            .collect()
            .await;
        assert_eq!(
            frames,
            vec![
                ("a".to_string(), Duration::from_millis(0)),
                ("ab".to_string(), Duration::from_millis(15)),
                ("abc".to_string(), Duration::from_millis(30)),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stream_of_empty_text_ends_immediately() {
        let frames: Vec<String> = Reveal::new("", DEFAULT_REVEAL_INTERVAL)
            .into_stream()
            .collect()
            .await;
        assert!(frames.is_empty());
    }
}
