use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use tracing::instrument;

use tokenforge_core::{ExpectedVersion, StreamId};

use super::r#trait::{EventStore, EventStoreError, EventStream, StoredEvent, UncommittedEvent};

/// In-memory append-only event store.
///
/// Intended for tests/dev. `load_stream` snapshots the stream under the read
/// lock, so a reader never blocks writers while it iterates.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<StreamId, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }

    /// Number of records in `stream_id` (0 when absent).
    pub fn stream_len(&self, stream_id: &StreamId) -> Result<usize, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(streams.get(stream_id).map(Vec::len).unwrap_or(0))
    }
}

impl EventStore for InMemoryEventStore {
    #[instrument(skip(self, events), fields(batch = events.len()), err)]
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let Some(first) = events.first() else {
            return Ok(vec![]);
        };

        // All events must target the same stream.
        let stream_id = first.stream_id.clone();
        let aggregate_type = first.aggregate_type.clone();

        for (idx, e) in events.iter().enumerate() {
            if e.stream_id != stream_id {
                return Err(EventStoreError::InvalidAppend(format!(
                    "batch contains multiple stream_ids (index {idx})"
                )));
            }
            if e.aggregate_type != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "batch contains multiple aggregate_types (index {idx})"
                )));
            }
        }

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::Unavailable("lock poisoned".to_string()))?;

        // Validate before touching the map.
        let existing = streams.get(&stream_id).map(Vec::as_slice).unwrap_or_default();
        let current = Self::current_version(existing);

        if !expected_version.matches(current) {
            return Err(EventStoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current}"
            )));
        }

        // Aggregate type is fixed by the first record of a stream.
        if let Some(first) = existing.first() {
            if first.aggregate_type != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "stream aggregate_type is '{}', attempted append with '{}'",
                    first.aggregate_type, aggregate_type
                )));
            }
        }

        let stream = streams.entry(stream_id).or_default();

        let recorded_at = Utc::now();
        let mut next = current + 1;
        let mut committed = Vec::with_capacity(events.len());
        for e in events {
            let stored = StoredEvent {
                event_id: e.event_id,
                stream_id: e.stream_id,
                aggregate_type: e.aggregate_type,
                sequence_number: next,
                event_type: e.event_type,
                event_version: e.event_version,
                recorded_at,
                payload: e.payload,
            };
            next += 1;
            stream.push(stored.clone());
            committed.push(stored);
        }

        Ok(committed)
    }

    #[instrument(skip(self), fields(stream_id = %stream_id), err)]
    fn load_stream(&self, stream_id: &StreamId) -> Result<EventStream<'_>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::Unavailable("lock poisoned".to_string()))?;

        let records = streams.get(stream_id).cloned().unwrap_or_default();
        Ok(Box::new(records.into_iter().map(Ok)))
    }
}
