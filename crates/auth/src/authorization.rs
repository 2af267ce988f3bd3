//! Cross-aggregate authorization rules (pure).
//!
//! Some commands are judged by one aggregate but depend on facts owned by
//! another stream: a client application may only be onboarded by a user who
//! was authorized to do so, a role may only be granted by an administrator,
//! and user grants must name a valid client. This module decides those checks
//! over read-only aggregate state.
//!
//! - No IO
//! - No panics
//! - At most one rejection per command
//!
//! Loading the prerequisite stream and persisting the rejection is done by the
//! pre-command handler in `tokenforge-infra`.

use url::Url;

use tokenforge_core::{ClientId, UserId};

use crate::client_application::ClientApplication;
use crate::commands::{
    AuthorizeUserToOnBoardClientApplications, GrantUserAdministratorRole, OAuthCommand, OnBoardClientApplication,
    RequestAccessTokenViaImplicitGrant, RequestAccessTokenViaROPCGrant,
};
use crate::events::{
    AuthorizeUserToOnBoardClientApplicationsWasRejectedDueToMissingAuthorizingUser,
    AuthorizeUserToOnBoardClientApplicationsWasRejectedDueToNonAdministrator,
    GrantUserAdministratorRoleWasRejectedDueToMissingGrantingUser,
    GrantUserAdministratorRoleWasRejectedDueToNonAdministrator, OAuthEvent,
    OnBoardClientApplicationWasRejectedDueToInsecureRedirectUri,
    OnBoardClientApplicationWasRejectedDueToInvalidRedirectUri,
    OnBoardClientApplicationWasRejectedDueToUnAuthorizeUser,
    RequestAccessTokenViaImplicitGrantWasRejectedDueToInvalidClientApplicationID,
    RequestAccessTokenViaImplicitGrantWasRejectedDueToInvalidClientApplicationRedirectUri,
    RequestAccessTokenViaROPCGrantWasRejectedDueToInvalidClientApplicationCredentials,
};
use crate::resource_owner::ResourceOwner;

/// The other stream a command must consult before its own aggregate judges it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prerequisite {
    ResourceOwner(UserId),
    ClientApplication(ClientId),
}

/// Which stream (if any) must be read to authorize `command`.
pub fn prerequisite(command: &OAuthCommand) -> Option<Prerequisite> {
    match command {
        OAuthCommand::OnBoardClientApplication(c) => Some(Prerequisite::ResourceOwner(c.user_id.clone())),
        OAuthCommand::GrantUserAdministratorRole(c) => {
            Some(Prerequisite::ResourceOwner(c.granting_user_id.clone()))
        }
        OAuthCommand::AuthorizeUserToOnBoardClientApplications(c) => {
            Some(Prerequisite::ResourceOwner(c.authorizing_user_id.clone()))
        }
        OAuthCommand::RequestAccessTokenViaImplicitGrant(c) => {
            Some(Prerequisite::ClientApplication(c.client_id.clone()))
        }
        OAuthCommand::RequestAccessTokenViaROPCGrant(c) => {
            Some(Prerequisite::ClientApplication(c.client_id.clone()))
        }
        OAuthCommand::RequestAccessTokenViaClientCredentialsGrant(_) | OAuthCommand::OnBoardUser(_) => None,
    }
}

/// Judge `command` against the user it names as actor.
///
/// Returns the rejection to record, or `None` when the command may proceed.
pub fn authorize_with_resource_owner(command: &OAuthCommand, actor: &ResourceOwner) -> Option<OAuthEvent> {
    match command {
        OAuthCommand::OnBoardClientApplication(c) => check_client_onboarding(c, actor),
        OAuthCommand::GrantUserAdministratorRole(c) => check_granting_user(c, actor),
        OAuthCommand::AuthorizeUserToOnBoardClientApplications(c) => check_authorizing_user(c, actor),
        _ => None,
    }
}

/// Judge `command` against the client application it names.
pub fn authorize_with_client_application(command: &OAuthCommand, client: &ClientApplication) -> Option<OAuthEvent> {
    match command {
        OAuthCommand::RequestAccessTokenViaImplicitGrant(c) => check_implicit_client(c, client),
        OAuthCommand::RequestAccessTokenViaROPCGrant(c) => check_ropc_client(c, client),
        _ => None,
    }
}

/// Outcome of validating a redirect URI for registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectUriCheck {
    Valid,
    Invalid,
    Insecure,
}

/// Redirect URIs must be absolute and use `https`.
pub fn validate_redirect_uri(redirect_uri: &str) -> RedirectUriCheck {
    match Url::parse(redirect_uri) {
        Err(_) => RedirectUriCheck::Invalid,
        Ok(url) if url.cannot_be_a_base() || url.host_str().is_none() => RedirectUriCheck::Invalid,
        Ok(url) if url.scheme() != "https" => RedirectUriCheck::Insecure,
        Ok(_) => RedirectUriCheck::Valid,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rules
// ─────────────────────────────────────────────────────────────────────────────

fn check_client_onboarding(c: &OnBoardClientApplication, actor: &ResourceOwner) -> Option<OAuthEvent> {
    if !actor.is_authorized_to_onboard_client_applications() {
        return Some(
            OnBoardClientApplicationWasRejectedDueToUnAuthorizeUser {
                client_id: c.client_id.clone(),
                user_id: c.user_id.clone(),
            }
            .into(),
        );
    }

    match validate_redirect_uri(&c.redirect_uri) {
        RedirectUriCheck::Valid => None,
        RedirectUriCheck::Invalid => Some(
            OnBoardClientApplicationWasRejectedDueToInvalidRedirectUri {
                client_id: c.client_id.clone(),
                redirect_uri: c.redirect_uri.clone(),
            }
            .into(),
        ),
        RedirectUriCheck::Insecure => Some(
            OnBoardClientApplicationWasRejectedDueToInsecureRedirectUri {
                client_id: c.client_id.clone(),
                redirect_uri: c.redirect_uri.clone(),
            }
            .into(),
        ),
    }
}

fn check_granting_user(c: &GrantUserAdministratorRole, grantor: &ResourceOwner) -> Option<OAuthEvent> {
    let (user_id, granting_user_id) = (c.user_id.clone(), c.granting_user_id.clone());

    if !grantor.is_onboarded() {
        return Some(
            GrantUserAdministratorRoleWasRejectedDueToMissingGrantingUser { user_id, granting_user_id }.into(),
        );
    }
    if !grantor.is_administrator() {
        return Some(GrantUserAdministratorRoleWasRejectedDueToNonAdministrator { user_id, granting_user_id }.into());
    }
    None
}

fn check_authorizing_user(c: &AuthorizeUserToOnBoardClientApplications, grantor: &ResourceOwner) -> Option<OAuthEvent> {
    let (user_id, authorizing_user_id) = (c.user_id.clone(), c.authorizing_user_id.clone());

    if !grantor.is_onboarded() {
        return Some(
            AuthorizeUserToOnBoardClientApplicationsWasRejectedDueToMissingAuthorizingUser {
                user_id,
                authorizing_user_id,
            }
            .into(),
        );
    }
    if !grantor.is_administrator() {
        return Some(
            AuthorizeUserToOnBoardClientApplicationsWasRejectedDueToNonAdministrator {
                user_id,
                authorizing_user_id,
            }
            .into(),
        );
    }
    None
}

fn check_implicit_client(c: &RequestAccessTokenViaImplicitGrant, client: &ClientApplication) -> Option<OAuthEvent> {
    if !client.is_onboarded() {
        return Some(
            RequestAccessTokenViaImplicitGrantWasRejectedDueToInvalidClientApplicationID {
                user_id: c.user_id.clone(),
                client_id: c.client_id.clone(),
            }
            .into(),
        );
    }
    if client.redirect_uri() != c.redirect_uri {
        return Some(
            RequestAccessTokenViaImplicitGrantWasRejectedDueToInvalidClientApplicationRedirectUri {
                user_id: c.user_id.clone(),
                client_id: c.client_id.clone(),
                redirect_uri: c.redirect_uri.clone(),
            }
            .into(),
        );
    }
    None
}

fn check_ropc_client(c: &RequestAccessTokenViaROPCGrant, client: &ClientApplication) -> Option<OAuthEvent> {
    // Unknown client and wrong secret are deliberately indistinguishable here.
    if !client.secret_matches(&c.client_secret) {
        return Some(
            RequestAccessTokenViaROPCGrantWasRejectedDueToInvalidClientApplicationCredentials {
                user_id: c.user_id.clone(),
                client_id: c.client_id.clone(),
            }
            .into(),
        );
    }
    None
}
