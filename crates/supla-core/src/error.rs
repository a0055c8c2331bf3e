//! State and configuration error types.

use thiserror::Error;

/// Errors raised by world-state operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    /// No device with this id.
    #[error("device id {0} does not exist")]
    UnknownDevice(i32),

    /// No device with this GUID.
    #[error("device not found with guid {0}")]
    UnknownDeviceGuid(String),

    /// No channel with this id.
    #[error("channel id {0} does not exist")]
    UnknownChannel(i32),

    /// No channel with this name.
    #[error("channel {0:?} does not exist")]
    UnknownChannelName(String),

    /// No scene with this id.
    #[error("scene id {0} does not exist")]
    UnknownScene(i32),

    /// No icon with this id.
    #[error("icon id {0} does not exist")]
    UnknownIcon(i32),

    /// No client with this id.
    #[error("client id {0} does not exist")]
    UnknownClient(i32),

    /// A channel with this name already exists.
    #[error("channel {0:?} already exists")]
    DuplicateChannelName(String),

    /// The device exists but no connection is draining its queue.
    #[error("device id {0} is not connected")]
    DeviceNotConnected(i32),

    /// The client exists but no connection is draining its queue.
    #[error("client id {0} is not connected")]
    ClientNotConnected(i32),

    /// A scene step names a channel that does not exist.
    #[error("scene step references unknown channel {0:?}")]
    BadSceneStep(String),
}

/// Errors raised while loading configuration into a world state.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A GUID string was not 32 hex digits.
    #[error("invalid guid {guid:?}: {reason}")]
    BadGuid {
        /// The offending value.
        guid: String,
        /// What was wrong with it.
        reason: &'static str,
    },

    /// An icon file could not be read.
    #[error("failed to read icon {path}: {source}")]
    Icon {
        /// Path as configured.
        path: String,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// A channel or scene entry was rejected by the state.
    #[error(transparent)]
    State(#[from] StateError),
}
