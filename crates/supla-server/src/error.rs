//! Server error types.

use thiserror::Error;

/// Errors that prevent the server from starting or keep running.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration problem (bad addresses, unreadable TLS material).
    #[error("configuration error: {0}")]
    Config(String),

    /// TLS setup failure.
    #[error("tls error: {0}")]
    Tls(String),

    /// Listener or socket failure.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised inside call and event handlers.
///
/// A handler error on the reader path marks the connection errored; on
/// the event path it is logged and the connection keeps running.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Malformed request payload.
    #[error(transparent)]
    Codec(#[from] supla_proto::CodecError),

    /// World-state lookup failure.
    #[error(transparent)]
    State(#[from] supla_core::StateError),

    /// The peer went away mid-reply.
    #[error(transparent)]
    Network(#[from] supla_proto::NetworkError),
}
