//! `tokenforge-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod error;
pub mod id;
pub mod token;

pub use aggregate::{Aggregate, EventSourced, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{ClientId, StreamId, UserId};
pub use token::TokenGenerator;
