//! OAuth2 commands.
//!
//! Routing is an exhaustive `match` in [`OAuthCommand::aggregate_kind`]: adding
//! a command without deciding which aggregate judges it does not compile.

use serde::{Deserialize, Serialize};

use tokenforge_core::{ClientId, StreamId, UserId};
use tokenforge_events::Command;

use crate::stream::{AggregateKind, client_application_stream, resource_owner_stream};

/// Command: register a client application on behalf of `user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnBoardClientApplication {
    pub client_id: ClientId,
    pub client_secret: String,
    pub redirect_uri: String,
    pub user_id: UserId,
}

/// Command: client-credentials grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestAccessTokenViaClientCredentialsGrant {
    pub client_id: ClientId,
    pub client_secret: String,
}

/// Command: register a resource owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnBoardUser {
    pub user_id: UserId,
    pub username: String,
    pub password: String,
}

/// Command: make `user_id` an administrator; `granting_user_id` must be one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantUserAdministratorRole {
    pub user_id: UserId,
    pub granting_user_id: UserId,
}

/// Command: allow `user_id` to onboard client applications; `authorizing_user_id` must be an administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeUserToOnBoardClientApplications {
    pub user_id: UserId,
    pub authorizing_user_id: UserId,
}

/// Command: implicit grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestAccessTokenViaImplicitGrant {
    pub user_id: UserId,
    pub client_id: ClientId,
    pub redirect_uri: String,
    pub username: String,
    pub password: String,
}

/// Command: resource owner password credentials grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestAccessTokenViaROPCGrant {
    pub user_id: UserId,
    pub client_id: ClientId,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub scope: String,
}

/// All OAuth2 commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OAuthCommand {
    OnBoardClientApplication(OnBoardClientApplication),
    RequestAccessTokenViaClientCredentialsGrant(RequestAccessTokenViaClientCredentialsGrant),
    OnBoardUser(OnBoardUser),
    GrantUserAdministratorRole(GrantUserAdministratorRole),
    AuthorizeUserToOnBoardClientApplications(AuthorizeUserToOnBoardClientApplications),
    RequestAccessTokenViaImplicitGrant(RequestAccessTokenViaImplicitGrant),
    RequestAccessTokenViaROPCGrant(RequestAccessTokenViaROPCGrant),
}

impl OAuthCommand {
    /// The aggregate type that judges this command.
    pub fn aggregate_kind(&self) -> AggregateKind {
        match self {
            OAuthCommand::OnBoardClientApplication(_)
            | OAuthCommand::RequestAccessTokenViaClientCredentialsGrant(_) => {
                AggregateKind::ClientApplication
            }
            OAuthCommand::OnBoardUser(_)
            | OAuthCommand::GrantUserAdministratorRole(_)
            | OAuthCommand::AuthorizeUserToOnBoardClientApplications(_)
            | OAuthCommand::RequestAccessTokenViaImplicitGrant(_)
            | OAuthCommand::RequestAccessTokenViaROPCGrant(_) => AggregateKind::ResourceOwner,
        }
    }
}

impl Command for OAuthCommand {
    fn command_type(&self) -> &'static str {
        match self {
            OAuthCommand::OnBoardClientApplication(_) => "OnBoardClientApplication",
            OAuthCommand::RequestAccessTokenViaClientCredentialsGrant(_) => {
                "RequestAccessTokenViaClientCredentialsGrant"
            }
            OAuthCommand::OnBoardUser(_) => "OnBoardUser",
            OAuthCommand::GrantUserAdministratorRole(_) => "GrantUserAdministratorRole",
            OAuthCommand::AuthorizeUserToOnBoardClientApplications(_) => {
                "AuthorizeUserToOnBoardClientApplications"
            }
            OAuthCommand::RequestAccessTokenViaImplicitGrant(_) => "RequestAccessTokenViaImplicitGrant",
            OAuthCommand::RequestAccessTokenViaROPCGrant(_) => "RequestAccessTokenViaROPCGrant",
        }
    }

    fn target_stream_id(&self) -> StreamId {
        match self {
            OAuthCommand::OnBoardClientApplication(c) => client_application_stream(&c.client_id),
            OAuthCommand::RequestAccessTokenViaClientCredentialsGrant(c) => {
                client_application_stream(&c.client_id)
            }
            OAuthCommand::OnBoardUser(c) => resource_owner_stream(&c.user_id),
            OAuthCommand::GrantUserAdministratorRole(c) => resource_owner_stream(&c.user_id),
            OAuthCommand::AuthorizeUserToOnBoardClientApplications(c) => resource_owner_stream(&c.user_id),
            OAuthCommand::RequestAccessTokenViaImplicitGrant(c) => resource_owner_stream(&c.user_id),
            OAuthCommand::RequestAccessTokenViaROPCGrant(c) => resource_owner_stream(&c.user_id),
        }
    }
}

macro_rules! impl_from_command {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for OAuthCommand {
                fn from(command: $variant) -> Self {
                    OAuthCommand::$variant(command)
                }
            }
        )*
    };
}

impl_from_command!(
    OnBoardClientApplication,
    RequestAccessTokenViaClientCredentialsGrant,
    OnBoardUser,
    GrantUserAdministratorRole,
    AuthorizeUserToOnBoardClientApplications,
    RequestAccessTokenViaImplicitGrant,
    RequestAccessTokenViaROPCGrant,
);
