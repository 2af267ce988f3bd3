//! `tokenforge-auth` — the OAuth2 domain: commands, events, aggregates and
//! the cross-aggregate authorization rules.
//!
//! This crate is intentionally decoupled from storage and transport.

pub mod authorization;
pub mod client_application;
pub mod commands;
pub mod credentials;
pub mod events;
pub mod resource_owner;
pub mod stream;

pub use authorization::{
    Prerequisite, RedirectUriCheck, authorize_with_client_application, authorize_with_resource_owner, prerequisite,
    validate_redirect_uri,
};
pub use client_application::ClientApplication;
pub use commands::OAuthCommand;
pub use events::OAuthEvent;
pub use resource_owner::ResourceOwner;
pub use stream::{AggregateKind, client_application_stream, resource_owner_stream};
