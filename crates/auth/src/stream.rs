//! Stream addressing for the two OAuth2 aggregates.
//!
//! Events and commands both go through these functions, so a command for a
//! brand-new aggregate resolves the same stream its first event will land in.

use serde::{Deserialize, Serialize};

use tokenforge_core::{ClientId, StreamId, UserId};

/// The closed set of aggregate types.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateKind {
    ClientApplication,
    ResourceOwner,
}

impl AggregateKind {
    /// Stable tag used as the stream ID prefix and as `aggregate_type` in the store.
    pub fn tag(self) -> &'static str {
        match self {
            AggregateKind::ClientApplication => "client-application",
            AggregateKind::ResourceOwner => "resource-owner",
        }
    }
}

impl core::fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.tag())
    }
}

pub fn client_application_stream(client_id: &ClientId) -> StreamId {
    StreamId::new(AggregateKind::ClientApplication.tag(), client_id.as_str())
}

pub fn resource_owner_stream(user_id: &UserId) -> StreamId {
    StreamId::new(AggregateKind::ResourceOwner.tag(), user_id.as_str())
}
