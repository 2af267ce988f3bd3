//! Pre-command handlers: interceptors run before a command reaches its aggregate.
//!
//! A handler may read any stream it needs, but it never writes: the events it
//! returns are persisted by the dispatcher, which also halts the pipeline on
//! the first handler that says the command must not continue.

use tracing::{debug, instrument};

use tokenforge_auth::{
    ClientApplication, OAuthCommand, OAuthEvent, Prerequisite, ResourceOwner, authorize_with_client_application,
    authorize_with_resource_owner, client_application_stream, prerequisite, resource_owner_stream,
};
use tokenforge_events::{Command, Event};

use crate::command_dispatcher::{DispatchError, rehydrate};
use crate::event_store::EventStore;

/// Verdict of one pre-command handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreCommandOutcome {
    proceed: bool,
    pending: Vec<OAuthEvent>,
}

impl PreCommandOutcome {
    /// Let the command continue, with nothing to record.
    pub fn proceed() -> Self {
        Self {
            proceed: true,
            pending: Vec::new(),
        }
    }

    /// Stop the pipeline and record `rejection`.
    pub fn reject(rejection: OAuthEvent) -> Self {
        Self {
            proceed: false,
            pending: vec![rejection],
        }
    }

    pub fn should_continue(&self) -> bool {
        self.proceed
    }

    pub fn pending(&self) -> &[OAuthEvent] {
        &self.pending
    }

    pub fn take_pending(&mut self) -> Vec<OAuthEvent> {
        core::mem::take(&mut self.pending)
    }
}

/// An interceptor in the dispatcher's ordered pre-command chain.
///
/// Handlers hold no per-command state; everything a call produces is in the
/// returned outcome, so one chain can serve concurrent dispatches.
pub trait PreCommandHandler: Send + Sync {
    fn handle(&self, command: &OAuthCommand) -> Result<PreCommandOutcome, DispatchError>;
}

/// Enforces rules whose facts live in a stream other than the command's target.
///
/// Resolves the prerequisite stream named by [`prerequisite`], reconstructs
/// that aggregate and evaluates the pure rule against it.
#[derive(Debug, Clone)]
pub struct AuthorizationCommandHandler<S> {
    store: S,
}

impl<S> AuthorizationCommandHandler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S> PreCommandHandler for AuthorizationCommandHandler<S>
where
    S: EventStore,
{
    #[instrument(skip(self, command), fields(command_type = command.command_type()), err)]
    fn handle(&self, command: &OAuthCommand) -> Result<PreCommandOutcome, DispatchError> {
        let rejection = match prerequisite(command) {
            None => return Ok(PreCommandOutcome::proceed()),
            Some(Prerequisite::ResourceOwner(user_id)) => {
                let actor = rehydrate::<ResourceOwner, _>(&self.store, &resource_owner_stream(&user_id))?;
                authorize_with_resource_owner(command, actor.state())
            }
            Some(Prerequisite::ClientApplication(client_id)) => {
                let client = rehydrate::<ClientApplication, _>(&self.store, &client_application_stream(&client_id))?;
                authorize_with_client_application(command, client.state())
            }
        };

        match rejection {
            Some(event) => {
                debug!(rejection = event.event_type(), "command rejected");
                Ok(PreCommandOutcome::reject(event))
            }
            None => Ok(PreCommandOutcome::proceed()),
        }
    }
}
