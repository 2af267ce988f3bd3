use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use tokenforge_core::{ExpectedVersion, StreamId};
use std::sync::Arc;

/// An event ready to be appended to a stream (not yet assigned a sequence number).
///
/// ## Event Lifecycle
///
/// 1. **Domain event**: emitted by an aggregate's `handle()` or by a pre-command handler
/// 2. **UncommittedEvent**: serialized and wrapped with stream metadata
/// 3. **StoredEvent**: persisted with an assigned `sequence_number` and `recorded_at`
///
/// Use [`UncommittedEvent::from_typed`] to build one from a typed event. The
/// stream and aggregate type are taken from the event itself, so a caller can
/// never file an event under the wrong stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub stream_id: StreamId,
    pub aggregate_type: String,

    pub event_type: String,
    pub event_version: u32,

    pub payload: JsonValue,
}

/// A stored event in an append-only stream (assigned a sequence number).
///
/// Sequence numbers are assigned by the store during append and are:
/// - **Gap-free**: each event gets `last + 1`, starting at 1
/// - **Stream-scoped**: numbering is per `stream_id`
/// - **Immutable**: once assigned they never change
///
/// The last sequence number read is the stream version used for optimistic
/// concurrency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub stream_id: StreamId,
    pub aggregate_type: String,

    /// Position in the stream, 1-based.
    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub recorded_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    pub fn stream_version(&self) -> u64 {
        self.sequence_number
    }
}

/// Event store operation error.
///
/// These are **infrastructure errors** (storage, concurrency) as opposed to
/// business rejections, which are recorded as events.
#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    /// The store cannot serve the request right now (IO failure, shutdown,
    /// cancelled operation).
    #[error("event store unavailable: {0}")]
    Unavailable(String),

    #[error("aggregate type mismatch: {0}")]
    AggregateTypeMismatch(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),
}

/// Lazy, forward-only sequence of records in stream order.
pub type EventStream<'a> = Box<dyn Iterator<Item = Result<StoredEvent, EventStoreError>> + Send + 'a>;

/// Append-only event store.
///
/// ## Append Semantics
///
/// `append()`:
/// - Validates that all events of the batch target the same stream
/// - Checks optimistic concurrency against the stream's last sequence number
/// - Assigns sequence numbers starting at `current_version + 1`
/// - Persists the batch atomically (all or nothing)
///
/// ## Load Semantics
///
/// `load_stream()`:
/// - Yields the records of one stream in sequence order
/// - Yields nothing for a stream that does not exist yet
/// - Records are raw; decoding (and skipping unknown `event_type`s) is the
///   reader's business
pub trait EventStore: Send + Sync {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    fn load_stream(&self, stream_id: &StreamId) -> Result<EventStream<'_>, EventStoreError>;
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append(events, expected_version)
    }

    fn load_stream(&self, stream_id: &StreamId) -> Result<EventStream<'_>, EventStoreError> {
        (**self).load_stream(stream_id)
    }
}

impl UncommittedEvent {
    /// Serialize a typed event, taking stream and aggregate type from the event.
    ///
    /// The event ID is a UUIDv7 so IDs sort by creation time.
    pub fn from_typed<E>(event: &E) -> Result<Self, EventStoreError>
    where
        E: tokenforge_events::Event + Serialize,
    {
        let payload = serde_json::to_value(event)
            .map_err(|e| EventStoreError::InvalidAppend(format!("payload serialization failed: {e}")))?;

        Ok(Self {
            event_id: Uuid::now_v7(),
            stream_id: event.stream_id(),
            aggregate_type: event.aggregate_type().to_string(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            payload,
        })
    }
}
