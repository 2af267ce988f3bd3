//! Infrastructure layer: event store, command pipeline, configuration.

pub mod command_dispatcher;
pub mod config;
pub mod event_store;
pub mod pre_command;
pub mod token;

#[cfg(test)]
mod integration_tests;

pub use command_dispatcher::{CommandDispatcher, DispatchError, rehydrate};
pub use config::DispatcherConfig;
pub use event_store::{EventStore, EventStoreError, EventStream, InMemoryEventStore, StoredEvent, UncommittedEvent};
pub use pre_command::{AuthorizationCommandHandler, PreCommandHandler, PreCommandOutcome};
pub use token::UuidTokenGenerator;
