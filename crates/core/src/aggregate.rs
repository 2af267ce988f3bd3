//! Aggregate fold/handle engine for event-sourced domain models.

use core::borrow::Borrow;

use crate::error::{DomainError, DomainResult};
use crate::token::TokenGenerator;

/// Optimistic concurrency expectation for a stream append.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking (facts that do not depend on the stream's state).
    Any,
    /// Require the stream to be at an exact version (last sequence number, 0 when empty).
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "optimistic concurrency check failed (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}

/// Aggregate execution semantics.
///
/// - **State evolution**: `apply(&mut self, event)` folds one event into state.
///   It must be deterministic and must ignore events that do not concern it.
/// - **Decision logic**: `handle(root, cmd, tokens)` inspects the current state
///   and emits events through [`EventSourced::emit`]. Commands the aggregate has
///   nothing to say about emit nothing.
///
/// Aggregates must not perform IO. The only outside capability they get is the
/// token generator.
pub trait Aggregate: Default + Clone + core::fmt::Debug {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;

    /// Evolve in-memory state from a single event.
    fn apply(&mut self, event: &Self::Event);

    /// Decide which events to emit for `command`.
    fn handle(root: &mut EventSourced<Self>, command: &Self::Command, tokens: &dyn TokenGenerator);

    /// Fold `events` onto an existing state, left to right.
    ///
    /// `A::default().replay(h[..k]).replay(h[k..])` equals
    /// `A::default().replay(h)` for every split point `k`.
    fn replay<I>(mut self, events: I) -> Self
    where
        I: IntoIterator,
        I::Item: Borrow<Self::Event>,
    {
        for event in events {
            self.apply(event.borrow());
        }
        self
    }
}

/// A transient aggregate instance: replayed state, the stream version it was
/// built from, and the events emitted while handling one command.
#[derive(Debug, Clone)]
pub struct EventSourced<A: Aggregate> {
    state: A,
    version: u64,
    pending: Vec<A::Event>,
}

impl<A: Aggregate> Default for EventSourced<A> {
    fn default() -> Self {
        Self::from_state(A::default(), 0)
    }
}

impl<A: Aggregate> EventSourced<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from a previously folded state observed at `version`.
    pub fn from_state(state: A, version: u64) -> Self {
        Self {
            state,
            version,
            pending: Vec::new(),
        }
    }

    /// Replay a full history from the zero state.
    ///
    /// The version is the number of events consumed, which matches the store's
    /// gap-free sequence numbering.
    pub fn reconstruct<I>(events: I) -> Self
    where
        I: IntoIterator,
        I::Item: Borrow<A::Event>,
    {
        let mut root = Self::default();
        for event in events {
            root.state.apply(event.borrow());
            root.version += 1;
        }
        root
    }

    /// Fold one historical event that was stored at `sequence_number`.
    pub fn apply_historical(&mut self, event: &A::Event, sequence_number: u64) {
        self.state.apply(event);
        self.version = sequence_number;
    }

    /// Record that a stream position was read without a decodable event.
    ///
    /// Unknown records still count towards the expected version.
    pub fn observe(&mut self, sequence_number: u64) {
        self.version = sequence_number;
    }

    pub fn state(&self) -> &A {
        &self.state
    }

    pub fn into_state(self) -> A {
        self.state
    }

    /// Last stream position folded into this instance.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Expectation to use when appending this instance's pending events.
    pub fn expected_version(&self) -> ExpectedVersion {
        ExpectedVersion::Exact(self.version)
    }

    /// Apply `event` to local state immediately and queue it for persistence.
    pub fn emit(&mut self, event: A::Event) {
        self.state.apply(&event);
        self.pending.push(event);
    }

    pub fn handle(&mut self, command: &A::Command, tokens: &dyn TokenGenerator) {
        A::handle(self, command, tokens);
    }

    pub fn pending(&self) -> &[A::Event] {
        &self.pending
    }

    pub fn take_pending(&mut self) -> Vec<A::Event> {
        core::mem::take(&mut self.pending)
    }
}
