use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("parlance.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("parlance.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("parlance.client.request_duration_seconds");

pub(crate) static STREAM_CHUNKS: Counter = Counter::new("parlance.stream.chunks");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("parlance.stream.errors");
pub(crate) static STREAM_CANCELLATIONS: Counter = Counter::new("parlance.stream.cancellations");
pub(crate) static STREAM_BYTES: Counter = Counter::new("parlance.stream.bytes");
pub(crate) static STREAM_TTFB: Moments = Moments::new("parlance.stream.ttfb_seconds");
pub(crate) static STREAM_DURATION: Moments = Moments::new("parlance.stream.duration_seconds");

pub(crate) static STORE_DISPATCHES: Counter = Counter::new("parlance.store.dispatches");
pub(crate) static STORE_NOOPS: Counter = Counter::new("parlance.store.noops");
pub(crate) static STORE_PERSIST_WRITES: Counter = Counter::new("parlance.store.persist_writes");
pub(crate) static STORE_PERSIST_ERRORS: Counter = Counter::new("parlance.store.persist_errors");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_CHUNKS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_CANCELLATIONS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_moments(&STREAM_TTFB);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&STORE_DISPATCHES);
    collector.register_counter(&STORE_NOOPS);
    collector.register_counter(&STORE_PERSIST_WRITES);
    collector.register_counter(&STORE_PERSIST_ERRORS);
}
