//! The busy indicator clock.
//!
//! The indicator ticks on its own schedule, independent of reveal timing, and
//! publishes the current glyph through a watch channel.  Each started clock is
//! owned by an [`IndicatorHandle`]; stopping or dropping the handle aborts the
//! timer task, so a clock never outlives the turn that started it.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Default pause between two glyphs.
pub const DEFAULT_INDICATOR_INTERVAL: Duration = Duration::from_millis(100);

/// The glyphs cycled by the indicator, in order.
pub const FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Starts indicator clocks and publishes their glyph.
#[derive(Debug)]
pub struct ActivityIndicator {
    interval: Duration,
    glyph: Arc<watch::Sender<&'static str>>,
    running: Arc<AtomicUsize>,
}

impl ActivityIndicator {
    /// Creates an indicator that advances every `interval`.
    pub fn new(interval: Duration) -> Self {
        let (glyph, _) = watch::channel(FRAMES[0]);
        Self {
            interval: interval.max(Duration::from_millis(1)),
            glyph: Arc::new(glyph),
            running: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Subscribes to glyph changes.
    pub fn subscribe(&self) -> watch::Receiver<&'static str> {
        self.glyph.subscribe()
    }

    /// The most recently published glyph.
    pub fn glyph(&self) -> &'static str {
        *self.glyph.borrow()
    }

    /// Number of clocks currently running.
    pub fn running(&self) -> usize {
        self.running.load(Ordering::Acquire)
    }

    /// Starts a clock.  Must be called from within a tokio runtime.
    pub fn start(&self) -> IndicatorHandle {
        let glyph = Arc::clone(&self.glyph);
        let interval = self.interval;
        self.running.fetch_add(1, Ordering::AcqRel);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            for frame in FRAMES.iter().cycle() {
                ticker.tick().await;
                glyph.send_replace(*frame);
            }
        });
        IndicatorHandle {
            task: Some(task),
            running: Arc::clone(&self.running),
        }
    }
}

impl Default for ActivityIndicator {
    fn default() -> Self {
        Self::new(DEFAULT_INDICATOR_INTERVAL)
    }
}

/// Ownership of one running indicator clock.
#[derive(Debug)]
pub struct IndicatorHandle {
    task: Option<JoinHandle<()>>,
    running: Arc<AtomicUsize>,
}

impl IndicatorHandle {
    /// Stops the clock.
    pub fn stop(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            self.running.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

impl Drop for IndicatorHandle {
    fn drop(&mut self) {
        self.halt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn cycles_through_frames() {
        let indicator = ActivityIndicator::new(Duration::from_millis(100));
        let mut glyphs = indicator.subscribe();
        let handle = indicator.start();

        let mut seen = Vec::new();
        for _ in 0..12 {
            glyphs.changed().await.unwrap();
            seen.push(*glyphs.borrow_and_update());
        }
        handle.stop();

        let expected: Vec<&str> = FRAMES.iter().cycle().take(12).copied().collect();
        // The first tick republishes the initial glyph, which watch reports as a change.
        assert_eq!(seen, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_the_clock() {
        let indicator = ActivityIndicator::new(Duration::from_millis(100));
        let handle = indicator.start();
        assert_eq!(indicator.running(), 1);
        tokio::time::sleep(Duration::from_millis(250)).await;
        handle.stop();
        assert_eq!(indicator.running(), 0);

        let frozen = indicator.glyph();
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(indicator.glyph(), frozen);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_halts_the_clock() {
        let indicator = ActivityIndicator::default();
        {
            let _first = indicator.start();
            let _second = indicator.start();
            assert_eq!(indicator.running(), 2);
        }
        assert_eq!(indicator.running(), 0);
    }
}
