//! Command execution pipeline (application-level orchestration).
//!
//! ## Command Execution Flow
//!
//! ```text
//! OAuthCommand
//!   ↓
//! 1. Pre-command handlers, in order (each verdict's events persisted right away)
//!   ↓  stop on the first "do not continue"
//! 2. Route by aggregate kind (exhaustive)
//!   ↓
//! 3. Load the target stream and rehydrate the aggregate
//!   ↓
//! 4. Handle the command (pure decision logic, emits events)
//!   ↓
//! 5. Append the emitted events as one batch, expecting the version read in 3
//! ```
//!
//! Business rejections are events and come back as `Ok`. Only infrastructure
//! failures are `DispatchError`s.

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use tokenforge_auth::{AggregateKind, ClientApplication, OAuthCommand, OAuthEvent, ResourceOwner};
use tokenforge_core::{Aggregate, EventSourced, ExpectedVersion, StreamId, TokenGenerator};
use tokenforge_events::{Command, DecodeEvent};

use crate::config::DispatcherConfig;
use crate::event_store::{EventStore, EventStoreError, UncommittedEvent};
use crate::pre_command::{AuthorizationCommandHandler, PreCommandHandler};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The target stream moved between read and append; re-dispatch to retry.
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    #[error("event store error: {0}")]
    Store(EventStoreError),

    /// A stored record of a known event type could not be decoded.
    #[error("failed to decode stored event: {0}")]
    Deserialize(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            other => DispatchError::Store(other),
        }
    }
}

/// Rebuild an aggregate from its stream.
///
/// Records whose `event_type` the aggregate's event type does not know are
/// skipped, but still advance the version used for the next append.
pub fn rehydrate<A, S>(store: &S, stream_id: &StreamId) -> Result<EventSourced<A>, DispatchError>
where
    A: Aggregate,
    A::Event: DecodeEvent,
    S: EventStore + ?Sized,
{
    let mut root = EventSourced::<A>::new();
    let mut last = 0u64;

    for record in store.load_stream(stream_id)? {
        let record = record?;

        if &record.stream_id != stream_id {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "loaded stream '{stream_id}' contains a record of '{}'",
                record.stream_id
            ))));
        }
        if record.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                record.sequence_number
            ))));
        }
        last = record.sequence_number;

        match A::Event::decode(&record.event_type, &record.payload) {
            Some(Ok(event)) => root.apply_historical(&event, record.sequence_number),
            Some(Err(err)) => {
                return Err(DispatchError::Deserialize(format!(
                    "{} at {}#{}: {err}",
                    record.event_type, record.stream_id, record.sequence_number
                )));
            }
            None => {
                debug!(
                    stream_id = %record.stream_id,
                    sequence_number = record.sequence_number,
                    event_type = %record.event_type,
                    "skipping unknown event record"
                );
                root.observe(record.sequence_number);
            }
        }
    }

    Ok(root)
}

/// Runs OAuth2 commands against an event store.
///
/// The store, token generator and pre-command chain are injected at
/// construction; the dispatcher keeps no state between calls and can be
/// shared across threads.
pub struct CommandDispatcher<S, T> {
    store: S,
    tokens: T,
    handlers: Vec<Box<dyn PreCommandHandler>>,
    config: DispatcherConfig,
}

impl<S, T> core::fmt::Debug for CommandDispatcher<S, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("handlers", &self.handlers.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<S, T> CommandDispatcher<S, T> {
    pub fn new(store: S, tokens: T, handlers: Vec<Box<dyn PreCommandHandler>>) -> Self {
        Self {
            store,
            tokens,
            handlers,
            config: DispatcherConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S, T> CommandDispatcher<S, T>
where
    S: EventStore + Clone + 'static,
{
    /// Dispatcher with the standard chain: cross-aggregate authorization only.
    pub fn with_default_handlers(store: S, tokens: T) -> Self {
        let handlers: Vec<Box<dyn PreCommandHandler>> =
            vec![Box::new(AuthorizationCommandHandler::new(store.clone()))];
        Self::new(store, tokens, handlers)
    }
}

impl<S, T> CommandDispatcher<S, T>
where
    S: EventStore,
    T: TokenGenerator,
{
    /// Run `command` through the pipeline and return every event it produced,
    /// in emission order.
    #[instrument(
        skip(self, command),
        fields(command_type = command.command_type(), stream_id = %command.target_stream_id()),
        err
    )]
    pub fn dispatch(&self, command: &OAuthCommand) -> Result<Vec<OAuthEvent>, DispatchError> {
        let mut events = Vec::new();

        // 1) Pre-command chain. A handler never read the target stream, so its
        //    events carry no version expectation.
        for handler in &self.handlers {
            let mut outcome = handler.handle(command)?;
            let pending = outcome.take_pending();
            self.persist(&pending, ExpectedVersion::Any)?;
            events.extend(pending);

            if !outcome.should_continue() {
                info!("command stopped by pre-command handler");
                return Ok(events);
            }
        }

        // 2) Route
        let emitted = match command.aggregate_kind() {
            AggregateKind::ClientApplication => self.execute::<ClientApplication>(command)?,
            AggregateKind::ResourceOwner => self.execute::<ResourceOwner>(command)?,
        };
        events.extend(emitted);

        Ok(events)
    }

    /// [`dispatch`](Self::dispatch), re-run on concurrency conflicts up to
    /// `max_conflict_retries` times.
    pub fn dispatch_with_retry(&self, command: &OAuthCommand) -> Result<Vec<OAuthEvent>, DispatchError> {
        let mut attempt = 0u32;
        loop {
            match self.dispatch(command) {
                Err(DispatchError::Concurrency(reason)) if attempt < self.config.max_conflict_retries => {
                    attempt += 1;
                    warn!(
                        command_type = command.command_type(),
                        attempt,
                        %reason,
                        "concurrency conflict, retrying command"
                    );
                }
                other => return other,
            }
        }
    }

    fn execute<A>(&self, command: &OAuthCommand) -> Result<Vec<OAuthEvent>, DispatchError>
    where
        A: Aggregate<Command = OAuthCommand, Event = OAuthEvent>,
    {
        // 3) Rehydrate
        let mut root = rehydrate::<A, S>(&self.store, &command.target_stream_id())?;

        // 4) Decide
        root.handle(command, &self.tokens);
        let pending = root.take_pending();

        // 5) Persist (one batch, optimistic)
        self.persist(&pending, root.expected_version())?;
        Ok(pending)
    }

    fn persist(&self, events: &[OAuthEvent], expected_version: ExpectedVersion) -> Result<(), DispatchError> {
        if events.is_empty() {
            return Ok(());
        }

        let uncommitted = events
            .iter()
            .map(UncommittedEvent::from_typed)
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected_version)?;
        if let Some(last) = committed.last() {
            info!(
                stream_id = %last.stream_id,
                count = committed.len(),
                last_sequence_number = last.sequence_number,
                "committed events"
            );
        }
        Ok(())
    }
}
