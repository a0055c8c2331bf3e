//! Client- and device-side helpers.
//!
//! The server core is symmetric enough that talking to it only needs the
//! packet and record primitives from `supla-proto`; this crate adds the
//! small amount of glue a peer wants on top: transport setup including
//! TLS ([`transport`]), typed channel helpers ([`channels`]), a device
//! driver that registers and answers the server's requests ([`device`])
//! and a client driver that registers and pumps the startup listing
//! ([`client`]).

pub mod channels;
pub mod client;
pub mod device;
pub mod error;
pub mod transport;

pub use client::Client;
pub use device::{Device, DeviceConfig, RunningDevice};
pub use error::ClientError;
pub use transport::{connect, ClientStream};
