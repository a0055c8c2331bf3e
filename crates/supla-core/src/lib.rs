//! World state, event bus and configuration model.
//!
//! This crate owns everything the server knows that is not tied to one
//! connection: the in-memory registry of devices, channels, scenes, icons
//! and clients ([`state`]), the scoped event queues that fan state
//! transitions out to connected peers ([`events`]), and the TOML-backed
//! configuration model the world is built from at startup ([`config`]).
//!
//! No I/O happens here beyond reading icon files during state
//! construction; connection handling lives in the server crate.

pub mod config;
pub mod error;
pub mod events;
pub mod state;

pub use config::Config;
pub use error::{ConfigError, StateError};
pub use events::{Event, EventId, EventPayload, EventScope, EventSink};
pub use state::ServerState;
