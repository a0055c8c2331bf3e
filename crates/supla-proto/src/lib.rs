//! SUPLA protocol primitives.
//!
//! This crate holds everything two peers need to talk the SUPLA wire
//! protocol: the binary codec for fixed-layout records ([`codec`]), the
//! record types themselves ([`records`]), the call id table ([`calls`]),
//! typed helpers for the opaque 8-byte channel values ([`values`]) and the
//! `SUPLA`-tagged packet framing over a byte stream ([`packets`]).
//!
//! The codec is deliberately free of any I/O; only [`packets`] touches the
//! network, through the tokio `AsyncRead`/`AsyncWrite` traits so the same
//! framing runs over plain TCP and TLS.

pub mod calls;
pub mod codec;
pub mod errors;
pub mod packets;
pub mod records;
pub mod values;

pub use calls::Call;
pub use codec::{Codec, Reader};
pub use errors::{CodecError, NetworkError};
pub use packets::{Packet, PacketReader, PacketSender, PacketStream};

/// Protocol version spoken by this implementation.
pub const PROTO_VERSION: u8 = 23;

/// Oldest protocol version peers may use.
pub const PROTO_VERSION_MIN: u8 = 10;

/// Lower clamp for the negotiated activity timeout, in seconds.
pub const ACTIVITY_TIMEOUT_MIN: u8 = 30;

/// Upper clamp for the negotiated activity timeout, in seconds.
pub const ACTIVITY_TIMEOUT_MAX: u8 = 240;

/// Default activity timeout handed to freshly registered peers, in seconds.
pub const ACTIVITY_TIMEOUT_DEFAULT: u8 = 120;

/// Maximum number of channels a single device may register.
pub const DEVICE_CHANNEL_MAXCOUNT: usize = 128;

/// Maximum channels per `ChannelPack` batch.
pub const CHANNELPACK_MAXCOUNT: usize = 20;

/// Maximum entries per `ChannelValuePack` batch.
pub const CHANNELVALUE_PACK_MAXCOUNT: usize = 20;

/// Maximum scenes per `ScenePack` batch.
pub const SCENE_PACK_MAXCOUNT: usize = 20;

/// Maximum entries per `ChannelRelationPack` batch.
pub const CHANNEL_RELATION_PACK_MAXCOUNT: usize = 100;

/// Byte length of device and client GUIDs.
pub const GUID_SIZE: usize = 16;

/// Byte length of the shared authkey blob.
pub const AUTHKEY_SIZE: usize = 16;

/// Byte length of an encoded channel value.
pub const CHANNELVALUE_SIZE: usize = 8;
