//! Peer-side error types.

use supla_proto::records::ResultCode;
use thiserror::Error;

/// Errors raised by the client and device drivers.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Socket or TLS failure.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS setup failure.
    #[error("tls error: {0}")]
    Tls(#[from] rustls::Error),

    /// Packet framing failure.
    #[error(transparent)]
    Network(#[from] supla_proto::NetworkError),

    /// Record coding failure.
    #[error(transparent)]
    Codec(#[from] supla_proto::CodecError),

    /// The server rejected registration.
    #[error("Register failed: {0:?}")]
    Rejected(ResultCode),

    /// The server answered with an unexpected call.
    #[error("unexpected call {0}")]
    UnexpectedCall(supla_proto::Call),
}
