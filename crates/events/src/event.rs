use serde_json::Value as JsonValue;

use tokenforge_core::StreamId;

/// A domain event.
///
/// Events are:
/// - **immutable** (treat them as facts, rejections included)
/// - **versioned** (schema evolution)
/// - designed to be **append-only**
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable discriminant (e.g. "ClientApplicationWasOnBoarded").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// Tag of the aggregate type whose stream owns this event.
    fn aggregate_type(&self) -> &'static str;

    /// Stream this event belongs to.
    ///
    /// Pure and total; must agree with [`crate::Command::target_stream_id`] for
    /// commands addressed to the same aggregate instance.
    fn stream_id(&self) -> StreamId;
}

/// Recover a typed event from a stored `(event_type, payload)` record.
pub trait DecodeEvent: Sized {
    /// Returns `None` when `event_type` is not a discriminant this type knows,
    /// so readers can skip records written by newer code.
    fn decode(event_type: &str, payload: &JsonValue) -> Option<Result<Self, serde_json::Error>>;
}
