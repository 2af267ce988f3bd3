//! Resource Owner aggregate for user identity and roles (event-sourced).
//!
//! This module implements the user lifecycle and the user-facing grants.
//!
//! # Invariants
//! - A user is onboarded at most once.
//! - Roles can only be granted to onboarded users.
//! - Tokens are only issued to onboarded users presenting matching credentials.
//! - Grantor checks (is the *granting* user an administrator?) live in
//!   [`crate::authorization`], because the grantor is a different stream.

use tokenforge_core::{Aggregate, ClientId, EventSourced, TokenGenerator, UserId};

use crate::commands::{
    AuthorizeUserToOnBoardClientApplications, GrantUserAdministratorRole, OAuthCommand, OnBoardUser,
    RequestAccessTokenViaImplicitGrant, RequestAccessTokenViaROPCGrant,
};
use crate::credentials::{hash_password, secrets_match, verify_password};
use crate::events::{
    AccessTokenWasIssuedToUserViaImplicitGrant, AccessTokenWasIssuedToUserViaROPCGrant,
    AuthorizeUserToOnBoardClientApplicationsWasRejectedDueToMissingTargetUser,
    GrantUserAdministratorRoleWasRejectedDueToMissingTargetUser, OAuthEvent,
    OnBoardUserWasRejectedDueToExistingUser, RefreshTokenWasIssuedToUserViaROPCGrant,
    RequestAccessTokenViaImplicitGrantWasRejectedDueToInvalidUser,
    RequestAccessTokenViaImplicitGrantWasRejectedDueToInvalidUserCredentials,
    RequestAccessTokenViaROPCGrantWasRejectedDueToInvalidUser,
    RequestAccessTokenViaROPCGrantWasRejectedDueToInvalidUserCredentials,
    UserWasAuthorizedToOnBoardClientApplications, UserWasGrantedAdministratorRole, UserWasOnBoarded,
};

// ─────────────────────────────────────────────────────────────────────────────
// Resource Owner Aggregate
// ─────────────────────────────────────────────────────────────────────────────

/// Resource Owner aggregate.
///
/// The zero value is the `NotOnboarded` state. The two role flags are
/// orthogonal to each other and only ever set after onboarding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceOwner {
    is_onboarded: bool,
    user_id: Option<UserId>,
    username: String,
    password_hash: String,
    is_administrator: bool,
    is_authorized_to_onboard_client_applications: bool,
}

impl ResourceOwner {
    pub fn is_onboarded(&self) -> bool {
        self.is_onboarded
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn is_administrator(&self) -> bool {
        self.is_administrator
    }

    pub fn is_authorized_to_onboard_client_applications(&self) -> bool {
        self.is_authorized_to_onboard_client_applications
    }

    /// Username and password both match. Always false before onboarding.
    fn credentials_match(&self, username: &str, password: &str) -> bool {
        let Some(user_id) = &self.user_id else {
            return false;
        };
        // Evaluate both so timing does not reveal which one failed.
        let username_ok = secrets_match(username, &self.username);
        let password_ok = verify_password(user_id, password, &self.password_hash);
        self.is_onboarded && username_ok && password_ok
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate Implementation
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for ResourceOwner {
    type Command = OAuthCommand;
    type Event = OAuthEvent;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OAuthEvent::UserWasOnBoarded(e) => self.apply_onboarded(e),
            OAuthEvent::UserWasGrantedAdministratorRole(_) => self.is_administrator = true,
            OAuthEvent::UserWasAuthorizedToOnBoardClientApplications(_) => {
                self.is_authorized_to_onboard_client_applications = true;
            }
            _ => {}
        }
    }

    fn handle(root: &mut EventSourced<Self>, command: &Self::Command, tokens: &dyn TokenGenerator) {
        match command {
            OAuthCommand::OnBoardUser(cmd) => handle_onboard(root, cmd),
            OAuthCommand::GrantUserAdministratorRole(cmd) => handle_grant_administrator(root, cmd),
            OAuthCommand::AuthorizeUserToOnBoardClientApplications(cmd) => {
                handle_authorize_onboarding(root, cmd)
            }
            OAuthCommand::RequestAccessTokenViaImplicitGrant(cmd) => handle_implicit(root, cmd, tokens),
            OAuthCommand::RequestAccessTokenViaROPCGrant(cmd) => handle_ropc(root, cmd, tokens),
            _ => {}
        }
    }
}

impl ResourceOwner {
    fn apply_onboarded(&mut self, e: &UserWasOnBoarded) {
        self.is_onboarded = true;
        self.user_id = Some(e.user_id.clone());
        self.username = e.username.clone();
        self.password_hash = e.password_hash.clone();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command Handlers
// ─────────────────────────────────────────────────────────────────────────────

fn handle_onboard(root: &mut EventSourced<ResourceOwner>, cmd: &OnBoardUser) {
    if root.state().is_onboarded {
        root.emit(
            OnBoardUserWasRejectedDueToExistingUser {
                user_id: cmd.user_id.clone(),
            }
            .into(),
        );
        return;
    }

    root.emit(
        UserWasOnBoarded {
            user_id: cmd.user_id.clone(),
            username: cmd.username.clone(),
            password_hash: hash_password(&cmd.user_id, &cmd.password),
        }
        .into(),
    );
}

fn handle_grant_administrator(root: &mut EventSourced<ResourceOwner>, cmd: &GrantUserAdministratorRole) {
    if !root.state().is_onboarded {
        root.emit(
            GrantUserAdministratorRoleWasRejectedDueToMissingTargetUser {
                user_id: cmd.user_id.clone(),
                granting_user_id: cmd.granting_user_id.clone(),
            }
            .into(),
        );
        return;
    }

    root.emit(
        UserWasGrantedAdministratorRole {
            user_id: cmd.user_id.clone(),
            granting_user_id: cmd.granting_user_id.clone(),
        }
        .into(),
    );
}

fn handle_authorize_onboarding(
    root: &mut EventSourced<ResourceOwner>,
    cmd: &AuthorizeUserToOnBoardClientApplications,
) {
    if !root.state().is_onboarded {
        root.emit(
            AuthorizeUserToOnBoardClientApplicationsWasRejectedDueToMissingTargetUser {
                user_id: cmd.user_id.clone(),
                authorizing_user_id: cmd.authorizing_user_id.clone(),
            }
            .into(),
        );
        return;
    }

    root.emit(
        UserWasAuthorizedToOnBoardClientApplications {
            user_id: cmd.user_id.clone(),
            authorizing_user_id: cmd.authorizing_user_id.clone(),
        }
        .into(),
    );
}

fn handle_implicit(
    root: &mut EventSourced<ResourceOwner>,
    cmd: &RequestAccessTokenViaImplicitGrant,
    tokens: &dyn TokenGenerator,
) {
    let (user_id, client_id) = (cmd.user_id.clone(), cmd.client_id.clone());

    if !root.state().is_onboarded {
        root.emit(RequestAccessTokenViaImplicitGrantWasRejectedDueToInvalidUser { user_id, client_id }.into());
        return;
    }

    if !root.state().credentials_match(&cmd.username, &cmd.password) {
        root.emit(
            RequestAccessTokenViaImplicitGrantWasRejectedDueToInvalidUserCredentials { user_id, client_id }.into(),
        );
        return;
    }

    root.emit(
        AccessTokenWasIssuedToUserViaImplicitGrant {
            user_id,
            client_id,
            access_token: tokens.generate(),
        }
        .into(),
    );
}

fn handle_ropc(
    root: &mut EventSourced<ResourceOwner>,
    cmd: &RequestAccessTokenViaROPCGrant,
    tokens: &dyn TokenGenerator,
) {
    let (user_id, client_id) = (cmd.user_id.clone(), cmd.client_id.clone());

    if !root.state().is_onboarded {
        root.emit(RequestAccessTokenViaROPCGrantWasRejectedDueToInvalidUser { user_id, client_id }.into());
        return;
    }

    if !root.state().credentials_match(&cmd.username, &cmd.password) {
        root.emit(RequestAccessTokenViaROPCGrantWasRejectedDueToInvalidUserCredentials { user_id, client_id }.into());
        return;
    }

    issue_ropc_tokens(root, user_id, client_id, &cmd.scope, tokens);
}

fn issue_ropc_tokens(
    root: &mut EventSourced<ResourceOwner>,
    user_id: UserId,
    client_id: ClientId,
    scope: &str,
    tokens: &dyn TokenGenerator,
) {
    root.emit(
        AccessTokenWasIssuedToUserViaROPCGrant {
            user_id: user_id.clone(),
            client_id: client_id.clone(),
            access_token: tokens.generate(),
            scope: scope.to_string(),
        }
        .into(),
    );
    root.emit(
        RefreshTokenWasIssuedToUserViaROPCGrant {
            user_id,
            client_id,
            refresh_token: tokens.generate(),
            scope: scope.to_string(),
        }
        .into(),
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
