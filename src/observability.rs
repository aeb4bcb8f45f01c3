use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("confab.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("confab.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("confab.client.request_duration_seconds");

pub(crate) static TURNS_STARTED: Counter = Counter::new("confab.turn.started");
pub(crate) static TURNS_COMMITTED: Counter = Counter::new("confab.turn.committed");
pub(crate) static TURNS_FAILED: Counter = Counter::new("confab.turn.failed");
pub(crate) static TURNS_CANCELLED: Counter = Counter::new("confab.turn.cancelled");
pub(crate) static TURNS_IGNORED: Counter = Counter::new("confab.turn.ignored");

pub(crate) static REVEAL_FRAMES: Counter = Counter::new("confab.reveal.frames");

pub(crate) static STORE_WRITES: Counter = Counter::new("confab.store.writes");
pub(crate) static STORE_WRITE_ERRORS: Counter = Counter::new("confab.store.write_errors");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&TURNS_STARTED);
    collector.register_counter(&TURNS_COMMITTED);
    collector.register_counter(&TURNS_FAILED);
    collector.register_counter(&TURNS_CANCELLED);
    collector.register_counter(&TURNS_IGNORED);

    collector.register_counter(&REVEAL_FRAMES);

    collector.register_counter(&STORE_WRITES);
    collector.register_counter(&STORE_WRITE_ERRORS);
}
