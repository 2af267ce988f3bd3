//! Client Application aggregate (event-sourced).
//!
//! `NotOnboarded → Onboarded` via `ClientApplicationWasOnBoarded`. Once
//! onboarded, the aggregate judges client-credentials grants.

use tokenforge_core::{Aggregate, ClientId, EventSourced, TokenGenerator, UserId};

use crate::commands::{OAuthCommand, OnBoardClientApplication, RequestAccessTokenViaClientCredentialsGrant};
use crate::credentials::secrets_match;
use crate::events::{
    AccessTokenWasIssuedToClientApplicationViaClientCredentialsGrant, ClientApplicationWasOnBoarded,
    OAuthEvent, OnBoardClientApplicationWasRejectedDueToExistingClientApplication,
    RequestAccessTokenViaClientCredentialsGrantWasRejectedDueToInvalidClientApplicationID,
    RequestAccessTokenViaClientCredentialsGrantWasRejectedDueToInvalidClientApplicationSecret,
};

/// Aggregate root: ClientApplication.
///
/// The zero value is the `NotOnboarded` state; an absent stream folds to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientApplication {
    is_onboarded: bool,
    client_id: Option<ClientId>,
    client_secret: String,
    redirect_uri: String,
    onboarded_by: Option<UserId>,
}

impl ClientApplication {
    pub fn is_onboarded(&self) -> bool {
        self.is_onboarded
    }

    pub fn client_id(&self) -> Option<&ClientId> {
        self.client_id.as_ref()
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn onboarded_by(&self) -> Option<&UserId> {
        self.onboarded_by.as_ref()
    }

    /// Exact match against the registered secret. Always false before onboarding.
    pub fn secret_matches(&self, client_secret: &str) -> bool {
        self.is_onboarded && secrets_match(client_secret, &self.client_secret)
    }
}

impl Aggregate for ClientApplication {
    type Command = OAuthCommand;
    type Event = OAuthEvent;

    fn apply(&mut self, event: &Self::Event) {
        if let OAuthEvent::ClientApplicationWasOnBoarded(e) = event {
            self.is_onboarded = true;
            self.client_id = Some(e.client_id.clone());
            self.client_secret = e.client_secret.clone();
            self.redirect_uri = e.redirect_uri.clone();
            self.onboarded_by = Some(e.user_id.clone());
        }
    }

    fn handle(root: &mut EventSourced<Self>, command: &Self::Command, tokens: &dyn TokenGenerator) {
        match command {
            OAuthCommand::OnBoardClientApplication(cmd) => handle_onboard(root, cmd),
            OAuthCommand::RequestAccessTokenViaClientCredentialsGrant(cmd) => {
                handle_client_credentials(root, cmd, tokens)
            }
            _ => {}
        }
    }
}

fn handle_onboard(root: &mut EventSourced<ClientApplication>, cmd: &OnBoardClientApplication) {
    if root.state().is_onboarded {
        root.emit(
            OnBoardClientApplicationWasRejectedDueToExistingClientApplication {
                client_id: cmd.client_id.clone(),
            }
            .into(),
        );
        return;
    }

    root.emit(
        ClientApplicationWasOnBoarded {
            client_id: cmd.client_id.clone(),
            client_secret: cmd.client_secret.clone(),
            redirect_uri: cmd.redirect_uri.clone(),
            user_id: cmd.user_id.clone(),
        }
        .into(),
    );
}

fn handle_client_credentials(
    root: &mut EventSourced<ClientApplication>,
    cmd: &RequestAccessTokenViaClientCredentialsGrant,
    tokens: &dyn TokenGenerator,
) {
    // Identity before secret: an unknown client never gets a secret comparison.
    if !root.state().is_onboarded {
        root.emit(
            RequestAccessTokenViaClientCredentialsGrantWasRejectedDueToInvalidClientApplicationID {
                client_id: cmd.client_id.clone(),
            }
            .into(),
        );
        return;
    }

    if !root.state().secret_matches(&cmd.client_secret) {
        root.emit(
            RequestAccessTokenViaClientCredentialsGrantWasRejectedDueToInvalidClientApplicationSecret {
                client_id: cmd.client_id.clone(),
            }
            .into(),
        );
        return;
    }

    root.emit(
        AccessTokenWasIssuedToClientApplicationViaClientCredentialsGrant {
            client_id: cmd.client_id.clone(),
            access_token: tokens.generate(),
        }
        .into(),
    );
}
