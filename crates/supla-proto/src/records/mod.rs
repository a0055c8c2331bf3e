//! Wire record types.
//!
//! Each record mirrors one fixed binary layout from the SUPLA protocol.
//! Layouts are hand-written against the [`crate::codec`] primitives; the
//! call id table in [`crate::calls`] names which record travels under which
//! id.
//!
//! Enums reject unknown raw values with [`CodecError::InvalidEnum`]; flag
//! fields are open bit sets and pass through unvalidated.

pub mod client;
pub mod config;
pub mod device;

use crate::{
    codec::{Codec, Reader},
    errors::CodecError,
    CHANNELVALUE_SIZE,
};

/// An opaque encoded channel value.
pub type ChannelValue = [u8; CHANNELVALUE_SIZE];

/// Fixed width of email fields.
pub const EMAIL_MAXSIZE: usize = 256;
/// Fixed width of password fields.
pub const PASSWORD_MAXSIZE: usize = 64;
/// Fixed width of peer name fields.
pub const NAME_MAXSIZE: usize = 201;
/// Fixed width of software version fields.
pub const SOFTVER_MAXSIZE: usize = 21;
/// Fixed width of server name fields.
pub const SERVER_NAME_MAXSIZE: usize = 65;
/// Longest caption accepted in packs (prefix-sized, NUL-terminated).
pub const CAPTION_MAXSIZE: usize = 401;
/// Longest payload of a calcfg request or result.
pub const CALCFG_DATA_MAXSIZE: usize = 128;
/// Longest encoded channel config blob.
pub const CHANNEL_CONFIG_MAXSIZE: usize = 512;
/// Longest action parameter blob.
pub const ACTION_PARAM_MAXSIZE: usize = 500;
/// Longest OAuth token blob.
pub const OAUTH_TOKEN_MAXSIZE: usize = 256;
/// Fixed width of measurement unit fields in GPM configs.
pub const GPM_UNIT_MAXSIZE: usize = 15;

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident: $repr:ty {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
        }

        impl $name {
            /// Raw wire value.
            pub fn to_raw(self) -> $repr {
                match self {
                    $( Self::$variant => $value, )+
                }
            }

            /// Parse a raw wire value.
            pub fn from_raw(value: $repr) -> Result<Self, CodecError> {
                match value {
                    $( $value => Ok(Self::$variant), )+
                    other => Err(CodecError::InvalidEnum {
                        what: stringify!($name),
                        value: i64::from(other),
                    }),
                }
            }
        }
    };
}

macro_rules! wire_flags {
    (
        $(#[$meta:meta])*
        $name:ident: $repr:ty {
            $( $(#[$fmeta:meta])* $flag:ident = $value:expr; )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name(pub $repr);

        impl $name {
            /// Empty flag set.
            pub const NONE: Self = Self(0);
            $( $(#[$fmeta])* pub const $flag: Self = Self($value); )*

            /// All the bits of `other` are set in `self`.
            pub fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }
        }

        impl std::ops::BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }
    };
}

wire_enum! {
    /// Outcome code carried by registration and action results.
    ResultCode: i32 {
        /// No outcome recorded.
        None = 0,
        /// The request shape is not supported.
        Unsupported = 1,
        /// The request was rejected.
        False = 2,
        /// The request succeeded.
        True = 3,
        /// Credentials were rejected.
        BadCredentials = 37,
        /// Superuser authorization granted.
        Authorized = 26,
        /// Superuser authorization denied.
        Unauthorized = 27,
    }
}

wire_enum! {
    /// Hardware kind of a channel.
    ChannelType: i32 {
        /// Binary relay output.
        Relay = 2900,
        /// Temperature sensor.
        Thermometer = 3034,
        /// Humidity sensor.
        HumiditySensor = 3036,
        /// Combined temperature and humidity sensor.
        HumidityAndTempSensor = 3038,
        /// Dimmable light output.
        Dimmer = 4000,
        /// Free-form numeric measurement.
        GeneralPurposeMeasurement = 560,
    }
}

wire_enum! {
    /// Configured function of a channel.
    ChannelFunc: i32 {
        /// No function assigned.
        None = 0,
        /// Thermometer readout.
        Thermometer = 40,
        /// Humidity readout.
        Humidity = 42,
        /// Combined temperature and humidity readout.
        HumidityAndTemperature = 45,
        /// Generic power switch.
        PowerSwitch = 130,
        /// Light switch.
        LightSwitch = 140,
        /// Dimmer output.
        Dimmer = 180,
        /// General purpose measurement readout.
        GeneralPurposeMeasurement = 520,
    }
}

wire_enum! {
    /// Action requested by a client.
    ActionType: i32 {
        /// Open a gate or valve.
        Open = 10,
        /// Close a gate or valve.
        Close = 20,
        /// Switch on.
        TurnOn = 60,
        /// Switch off.
        TurnOff = 70,
        /// Invert the current on/off state.
        Toggle = 80,
        /// Abort a running movement.
        Interrupt = 3001,
        /// Run a scene.
        Execute = 3000,
    }
}

wire_enum! {
    /// What an action request addresses.
    ActionSubjectType: u8 {
        /// A single channel.
        Channel = 1,
        /// A channel group.
        ChannelGroup = 2,
        /// A scene.
        Scene = 3,
        /// A schedule entry.
        Schedule = 4,
    }
}

wire_enum! {
    /// Target kind of a raw value write.
    Target: u8 {
        /// A single channel.
        Channel = 1,
        /// A channel group.
        ChannelGroup = 2,
        /// A whole device.
        IoDevice = 3,
    }
}

wire_enum! {
    /// Requested channel config representation.
    ConfigType: u8 {
        /// The default config shape for the channel function.
        Default = 0,
    }
}

wire_enum! {
    /// Outcome of a channel config query.
    ConfigResult: u8 {
        /// No config available.
        False = 0,
        /// Config attached.
        True = 1,
    }
}

wire_enum! {
    /// Outcome of an OAuth token request.
    OAuthResultCode: u8 {
        /// Token issuance failed.
        Error = 0,
        /// Token attached.
        Success = 1,
    }
}

wire_enum! {
    /// Chart rendering hint for general purpose measurements.
    GpmChartType: u8 {
        /// Line chart.
        Linear = 0,
        /// Bar chart.
        Bar = 1,
        /// Candle chart.
        Candle = 2,
    }
}

wire_flags! {
    /// Capability bits of a channel, negotiated at device registration.
    ChannelFlags: u64 {
        /// The channel answers channel-state queries.
        CHANNELSTATE = 0x0001_0000;
        /// RGBW command set supported.
        RGBW_COMMANDS_SUPPORTED = 0x0100;
        /// Roller-shutter auto calibration supported.
        RS_AUTO_CALIBRATION = 0x0040;
        /// Channel is bridged over Z-Wave.
        ZWAVE_BRIDGE = 0x0010;
    }
}

wire_flags! {
    /// Action-trigger capabilities announced by a device channel.
    ActionCaps: u32 {
        /// Can be switched on.
        TURN_ON = 0x01;
        /// Can be switched off.
        TURN_OFF = 0x02;
        /// Single-toggle trigger.
        TOGGLE_X1 = 0x04;
        /// Double-toggle trigger.
        TOGGLE_X2 = 0x08;
        /// Triple-toggle trigger.
        TOGGLE_X3 = 0x10;
        /// Quadruple-toggle trigger.
        TOGGLE_X4 = 0x20;
        /// Quintuple-toggle trigger.
        TOGGLE_X5 = 0x40;
    }
}

wire_flags! {
    /// Device-level capability bits.
    DeviceFlags: i32 {
        /// Device config supported over calcfg.
        CALCFG = 0x0010;
        /// Channel state reporting supported.
        CHANNEL_STATE = 0x0004;
    }
}

wire_flags! {
    /// Which fields of a channel-state record are populated.
    ChannelStateFields: i32 {
        /// `ipv4` is valid.
        IPV4 = 0x0001;
        /// `mac` is valid.
        MAC = 0x0002;
        /// `battery_level` is valid.
        BATTERY_LEVEL = 0x0004;
        /// `battery_powered` is valid.
        BATTERY_POWERED = 0x0008;
        /// `wifi_rssi` is valid.
        WIFI_RSSI = 0x0010;
        /// `wifi_signal_strength` is valid.
        WIFI_SIGNAL_STRENGTH = 0x0020;
        /// Uptime counters are valid.
        UPTIME = 0x0040;
    }
}

/// Seconds/microseconds wall-clock pair used by ping messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeVal {
    /// Whole seconds since the Unix epoch.
    pub tv_sec: i64,
    /// Microsecond remainder.
    pub tv_usec: i64,
}

impl Codec for TimeVal {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        buf.extend_from_slice(&self.tv_sec.to_le_bytes());
        buf.extend_from_slice(&self.tv_usec.to_le_bytes());
        Ok(())
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self { tv_sec: r.i64()?, tv_usec: r.i64()? })
    }
}

/// Keepalive ping carrying the sender's clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingServer {
    /// Sender wall-clock time.
    pub now: TimeVal,
}

impl Codec for PingServer {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        self.now.encode_to(buf)
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self { now: TimeVal::decode_from(r)? })
    }
}

/// Ping reply carrying the server's clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingServerResult {
    /// Server wall-clock time.
    pub now: TimeVal,
}

impl Codec for PingServerResult {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        self.now.encode_to(buf)
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self { now: TimeVal::decode_from(r)? })
    }
}

/// Registration-enabled reply. Zero timestamps mean registration windows
/// are never open; peers are provisioned through server configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationEnabled {
    /// Until when client self-registration is open.
    pub client_timestamp: u32,
    /// Until when device self-registration is open.
    pub iodevice_timestamp: u32,
}

impl Codec for RegistrationEnabled {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        buf.extend_from_slice(&self.client_timestamp.to_le_bytes());
        buf.extend_from_slice(&self.iodevice_timestamp.to_le_bytes());
        Ok(())
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self { client_timestamp: r.u32()?, iodevice_timestamp: r.u32()? })
    }
}

/// Activity-timeout negotiation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetActivityTimeout {
    /// Requested timeout in seconds; the server clamps it.
    pub activity_timeout: u8,
}

impl Codec for SetActivityTimeout {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        buf.push(self.activity_timeout);
        Ok(())
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self { activity_timeout: r.u8()? })
    }
}

/// Activity-timeout negotiation reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetActivityTimeoutResult {
    /// The clamped timeout now in force.
    pub activity_timeout: u8,
    /// Lowest accepted value.
    pub min: u8,
    /// Highest accepted value.
    pub max: u8,
}

impl Codec for SetActivityTimeoutResult {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        buf.push(self.activity_timeout);
        buf.push(self.min);
        buf.push(self.max);
        Ok(())
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self { activity_timeout: r.u8()?, min: r.u8()?, max: r.u8()? })
    }
}

/// A channel value with its optional sub-value, as pushed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelValueB {
    /// Primary encoded value.
    pub value: ChannelValue,
    /// Secondary encoded value (sensor attached to a relay, etc).
    pub sub_value: ChannelValue,
    /// Kind of the sub-value; zero when unused.
    pub sub_value_type: u8,
}

impl ChannelValueB {
    /// Wrap a bare value with an empty sub-value.
    pub fn new(value: ChannelValue) -> Self {
        Self { value, sub_value: [0; CHANNELVALUE_SIZE], sub_value_type: 0 }
    }
}

impl Codec for ChannelValueB {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        buf.extend_from_slice(&self.value);
        buf.extend_from_slice(&self.sub_value);
        buf.push(self.sub_value_type);
        Ok(())
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self { value: r.array()?, sub_value: r.array()?, sub_value_type: r.u8()? })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_val_layout() {
        let msg = TimeVal { tv_sec: 1, tv_usec: 2 };
        let data = msg.encode().unwrap();
        assert_eq!(data, b"\x01\x00\x00\x00\x00\x00\x00\x00\x02\x00\x00\x00\x00\x00\x00\x00");
        let (decoded, size) = TimeVal::decode(&data).unwrap();
        assert_eq!(size, 16);
        assert_eq!(decoded, msg);
    }

    #[test]
    fn ping_round_trip() {
        let msg = PingServer { now: TimeVal { tv_sec: 1, tv_usec: 2 } };
        let data = msg.encode().unwrap();
        assert_eq!(data.len(), 16);
        let (decoded, size) = PingServer::decode(&data).unwrap();
        assert_eq!(size, 16);
        assert_eq!(decoded, msg);
    }

    #[test]
    fn activity_timeout_result_layout() {
        let msg = SetActivityTimeoutResult { activity_timeout: 195, min: 30, max: 240 };
        let data = msg.encode().unwrap();
        assert_eq!(data, [195, 30, 240]);
    }

    #[test]
    fn enum_rejects_unknown_value() {
        let err = ChannelType::from_raw(1).unwrap_err();
        assert_eq!(err, CodecError::InvalidEnum { what: "ChannelType", value: 1 });
    }

    #[test]
    fn flags_combine() {
        let flags = ActionCaps::TURN_ON | ActionCaps::TURN_OFF;
        assert_eq!(flags.0, 3);
        assert!(flags.contains(ActionCaps::TURN_ON));
        assert!(!flags.contains(ActionCaps::TOGGLE_X1));
    }

    #[test]
    fn channel_value_b_layout() {
        let msg = ChannelValueB::new([1, 2, 3, 4, 5, 6, 7, 8]);
        let data = msg.encode().unwrap();
        assert_eq!(data.len(), 17);
        let (decoded, size) = ChannelValueB::decode(&data).unwrap();
        assert_eq!(size, 17);
        assert_eq!(decoded, msg);
    }
}
