//! Event and command capability traits shared by domain and infrastructure.

pub mod command;
pub mod event;

pub use command::Command;
pub use event::{DecodeEvent, Event};
