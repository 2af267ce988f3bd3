//! OAuth2 domain events.
//!
//! Every outcome is an event, rejections included, so the stream doubles as a
//! self-describing audit log. Each event is owned by exactly one stream,
//! derived from the aggregate kind and the key field listed in
//! `oauth_events!` below.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use tokenforge_core::{ClientId, StreamId, UserId};
use tokenforge_events::{DecodeEvent, Event};

use crate::stream::AggregateKind;

// ─────────────────────────────────────────────────────────────────────────────
// Client Application stream
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientApplicationWasOnBoarded {
    pub client_id: ClientId,
    pub client_secret: String,
    pub redirect_uri: String,
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnBoardClientApplicationWasRejectedDueToUnAuthorizeUser {
    pub client_id: ClientId,
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnBoardClientApplicationWasRejectedDueToInsecureRedirectUri {
    pub client_id: ClientId,
    pub redirect_uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnBoardClientApplicationWasRejectedDueToInvalidRedirectUri {
    pub client_id: ClientId,
    pub redirect_uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnBoardClientApplicationWasRejectedDueToExistingClientApplication {
    pub client_id: ClientId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenWasIssuedToClientApplicationViaClientCredentialsGrant {
    pub client_id: ClientId,
    pub access_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestAccessTokenViaClientCredentialsGrantWasRejectedDueToInvalidClientApplicationID {
    pub client_id: ClientId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestAccessTokenViaClientCredentialsGrantWasRejectedDueToInvalidClientApplicationSecret {
    pub client_id: ClientId,
}

// ─────────────────────────────────────────────────────────────────────────────
// Resource Owner stream
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserWasOnBoarded {
    pub user_id: UserId,
    pub username: String,
    /// Hex SHA-256 digest, see [`crate::credentials::hash_password`].
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnBoardUserWasRejectedDueToExistingUser {
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserWasGrantedAdministratorRole {
    pub user_id: UserId,
    pub granting_user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantUserAdministratorRoleWasRejectedDueToMissingGrantingUser {
    pub user_id: UserId,
    pub granting_user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantUserAdministratorRoleWasRejectedDueToMissingTargetUser {
    pub user_id: UserId,
    pub granting_user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantUserAdministratorRoleWasRejectedDueToNonAdministrator {
    pub user_id: UserId,
    pub granting_user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserWasAuthorizedToOnBoardClientApplications {
    pub user_id: UserId,
    pub authorizing_user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeUserToOnBoardClientApplicationsWasRejectedDueToMissingAuthorizingUser {
    pub user_id: UserId,
    pub authorizing_user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeUserToOnBoardClientApplicationsWasRejectedDueToMissingTargetUser {
    pub user_id: UserId,
    pub authorizing_user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeUserToOnBoardClientApplicationsWasRejectedDueToNonAdministrator {
    pub user_id: UserId,
    pub authorizing_user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenWasIssuedToUserViaImplicitGrant {
    pub user_id: UserId,
    pub client_id: ClientId,
    pub access_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestAccessTokenViaImplicitGrantWasRejectedDueToInvalidClientApplicationID {
    pub user_id: UserId,
    pub client_id: ClientId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestAccessTokenViaImplicitGrantWasRejectedDueToInvalidClientApplicationRedirectUri {
    pub user_id: UserId,
    pub client_id: ClientId,
    pub redirect_uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestAccessTokenViaImplicitGrantWasRejectedDueToInvalidUser {
    pub user_id: UserId,
    pub client_id: ClientId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestAccessTokenViaImplicitGrantWasRejectedDueToInvalidUserCredentials {
    pub user_id: UserId,
    pub client_id: ClientId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenWasIssuedToUserViaROPCGrant {
    pub user_id: UserId,
    pub client_id: ClientId,
    pub access_token: String,
    pub scope: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenWasIssuedToUserViaROPCGrant {
    pub user_id: UserId,
    pub client_id: ClientId,
    pub refresh_token: String,
    pub scope: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestAccessTokenViaROPCGrantWasRejectedDueToInvalidClientApplicationCredentials {
    pub user_id: UserId,
    pub client_id: ClientId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestAccessTokenViaROPCGrantWasRejectedDueToInvalidUser {
    pub user_id: UserId,
    pub client_id: ClientId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestAccessTokenViaROPCGrantWasRejectedDueToInvalidUserCredentials {
    pub user_id: UserId,
    pub client_id: ClientId,
}

// ─────────────────────────────────────────────────────────────────────────────
// Closed event set
// ─────────────────────────────────────────────────────────────────────────────

/// Declares `OAuthEvent` with one variant per event struct, grouped by the
/// aggregate kind owning the stream and naming the struct field that keys it.
macro_rules! oauth_events {
    ($( $kind:ident { $( $variant:ident => $key:ident ),* $(,)? } )*) => {
        /// All OAuth2 domain events.
        ///
        /// Serialized externally tagged: the tag is the variant name, which is
        /// also the stored `event_type`.
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        pub enum OAuthEvent {
            $($( $variant($variant), )*)*
        }

        impl OAuthEvent {
            /// Every discriminant this build understands.
            pub const KINDS: &'static [&'static str] = &[$($( stringify!($variant), )*)*];

            pub fn aggregate_kind(&self) -> AggregateKind {
                match self {
                    $($( OAuthEvent::$variant(_) => AggregateKind::$kind, )*)*
                }
            }

            fn stream_key(&self) -> &str {
                match self {
                    $($( OAuthEvent::$variant(e) => e.$key.as_str(), )*)*
                }
            }
        }

        impl Event for OAuthEvent {
            fn event_type(&self) -> &'static str {
                match self {
                    $($( OAuthEvent::$variant(_) => stringify!($variant), )*)*
                }
            }

            fn version(&self) -> u32 {
                1
            }

            fn aggregate_type(&self) -> &'static str {
                self.aggregate_kind().tag()
            }

            fn stream_id(&self) -> StreamId {
                StreamId::new(self.aggregate_kind().tag(), self.stream_key())
            }
        }

        $($(
            impl From<$variant> for OAuthEvent {
                fn from(event: $variant) -> Self {
                    OAuthEvent::$variant(event)
                }
            }
        )*)*
    };
}

oauth_events! {
    ClientApplication {
        ClientApplicationWasOnBoarded => client_id,
        OnBoardClientApplicationWasRejectedDueToUnAuthorizeUser => client_id,
        OnBoardClientApplicationWasRejectedDueToInsecureRedirectUri => client_id,
        OnBoardClientApplicationWasRejectedDueToInvalidRedirectUri => client_id,
        OnBoardClientApplicationWasRejectedDueToExistingClientApplication => client_id,
        AccessTokenWasIssuedToClientApplicationViaClientCredentialsGrant => client_id,
        RequestAccessTokenViaClientCredentialsGrantWasRejectedDueToInvalidClientApplicationID => client_id,
        RequestAccessTokenViaClientCredentialsGrantWasRejectedDueToInvalidClientApplicationSecret => client_id,
    }
    ResourceOwner {
        UserWasOnBoarded => user_id,
        OnBoardUserWasRejectedDueToExistingUser => user_id,
        UserWasGrantedAdministratorRole => user_id,
        GrantUserAdministratorRoleWasRejectedDueToMissingGrantingUser => user_id,
        GrantUserAdministratorRoleWasRejectedDueToMissingTargetUser => user_id,
        GrantUserAdministratorRoleWasRejectedDueToNonAdministrator => user_id,
        UserWasAuthorizedToOnBoardClientApplications => user_id,
        AuthorizeUserToOnBoardClientApplicationsWasRejectedDueToMissingAuthorizingUser => user_id,
        AuthorizeUserToOnBoardClientApplicationsWasRejectedDueToMissingTargetUser => user_id,
        AuthorizeUserToOnBoardClientApplicationsWasRejectedDueToNonAdministrator => user_id,
        AccessTokenWasIssuedToUserViaImplicitGrant => user_id,
        RequestAccessTokenViaImplicitGrantWasRejectedDueToInvalidClientApplicationID => user_id,
        RequestAccessTokenViaImplicitGrantWasRejectedDueToInvalidClientApplicationRedirectUri => user_id,
        RequestAccessTokenViaImplicitGrantWasRejectedDueToInvalidUser => user_id,
        RequestAccessTokenViaImplicitGrantWasRejectedDueToInvalidUserCredentials => user_id,
        AccessTokenWasIssuedToUserViaROPCGrant => user_id,
        RefreshTokenWasIssuedToUserViaROPCGrant => user_id,
        RequestAccessTokenViaROPCGrantWasRejectedDueToInvalidClientApplicationCredentials => user_id,
        RequestAccessTokenViaROPCGrantWasRejectedDueToInvalidUser => user_id,
        RequestAccessTokenViaROPCGrantWasRejectedDueToInvalidUserCredentials => user_id,
    }
}

impl OAuthEvent {
    /// True for every rejection outcome.
    pub fn is_rejection(&self) -> bool {
        self.event_type().contains("WasRejectedDueTo")
    }
}

impl DecodeEvent for OAuthEvent {
    fn decode(event_type: &str, payload: &JsonValue) -> Option<Result<Self, serde_json::Error>> {
        if !Self::KINDS.contains(&event_type) {
            return None;
        }
        let decoded = match serde_json::from_value::<Self>(payload.clone()) {
            Ok(decoded) => decoded,
            Err(err) => return Some(Err(err)),
        };
        // The record's discriminant is authoritative.
        if decoded.event_type() != event_type {
            return Some(Err(serde::de::Error::custom(format!(
                "payload is tagged '{}' but the record is '{event_type}'",
                decoded.event_type()
            ))));
        }
        Some(Ok(decoded))
    }
}
