//! Channel state, channel config and calcfg records.
//!
//! These calls are relayed across both hops: a client asks the server, the
//! server forwards to the owning device with ids remapped, and the reply
//! travels back the same way. The `sender_id`/`receiver_id` fields carry
//! the originating client id so the server can route the response.

use crc::{Crc, CRC_32_ISO_HDLC};

use super::{
    ChannelFunc, ChannelStateFields, ConfigResult, ConfigType, GpmChartType,
    CALCFG_DATA_MAXSIZE, CHANNEL_CONFIG_MAXSIZE, GPM_UNIT_MAXSIZE,
};
use crate::{
    codec::{check_len, put_fixed_str, Codec, Reader},
    errors::CodecError,
};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Client request for the state of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelStateRequest {
    /// Requesting client id; devices see the value the server fills in.
    pub sender_id: i32,
    /// Channel id in the client's world view.
    pub channel_id: i32,
}

impl Codec for ChannelStateRequest {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        buf.extend_from_slice(&self.sender_id.to_le_bytes());
        buf.extend_from_slice(&self.channel_id.to_le_bytes());
        Ok(())
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self { sender_id: r.i32()?, channel_id: r.i32()? })
    }
}

/// Channel-state request as forwarded to the owning device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceChannelStateRequest {
    /// Originating client id, echoed back in the result.
    pub sender_id: i32,
    /// Channel number on the device.
    pub channel_number: u8,
}

impl Codec for DeviceChannelStateRequest {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        buf.extend_from_slice(&self.sender_id.to_le_bytes());
        buf.push(self.channel_number);
        Ok(())
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self { sender_id: r.i32()?, channel_number: r.u8()? })
    }
}

macro_rules! channel_state_record {
    (
        $(#[$meta:meta])*
        $name:ident, $id_field:ident: $id_doc:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name {
            /// Id of the peer the result is routed to.
            pub receiver_id: i32,
            #[doc = $id_doc]
            pub $id_field: i32,
            /// Which of the following fields are populated.
            pub fields: ChannelStateFields,
            /// Icon override suggested by the state.
            pub default_icon_field: i32,
            /// IPv4 address of the device.
            pub ipv4: u32,
            /// MAC address of the device.
            pub mac: [u8; 6],
            /// Battery charge percentage.
            pub battery_level: u8,
            /// The device runs on battery.
            pub battery_powered: bool,
            /// Raw Wi-Fi RSSI.
            pub wifi_rssi: u8,
            /// Wi-Fi signal strength percentage.
            pub wifi_signal_strength: u8,
            /// A bridged node is reachable.
            pub bridge_node_online: bool,
            /// Bridged node signal strength percentage.
            pub bridge_node_signal_strength: u8,
            /// Seconds since device boot.
            pub uptime: u32,
            /// Seconds since the device connected.
            pub connected_uptime: u32,
            /// Battery health percentage.
            pub battery_health: u8,
            /// Reason code of the last connection reset.
            pub last_connection_reset_cause: u8,
            /// Rated light source lifespan in hours.
            pub light_source_lifespan: u16,
            /// Light source operating time in seconds.
            pub light_source_operating_time: i32,
            /// Reserved trailer bytes.
            pub reserved: [u8; 2],
        }

        impl Codec for $name {
            fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
                buf.extend_from_slice(&self.receiver_id.to_le_bytes());
                buf.extend_from_slice(&self.$id_field.to_le_bytes());
                buf.extend_from_slice(&self.fields.0.to_le_bytes());
                buf.extend_from_slice(&self.default_icon_field.to_le_bytes());
                buf.extend_from_slice(&self.ipv4.to_le_bytes());
                buf.extend_from_slice(&self.mac);
                buf.push(self.battery_level);
                buf.push(u8::from(self.battery_powered));
                buf.push(self.wifi_rssi);
                buf.push(self.wifi_signal_strength);
                buf.push(u8::from(self.bridge_node_online));
                buf.push(self.bridge_node_signal_strength);
                buf.extend_from_slice(&self.uptime.to_le_bytes());
                buf.extend_from_slice(&self.connected_uptime.to_le_bytes());
                buf.push(self.battery_health);
                buf.push(self.last_connection_reset_cause);
                buf.extend_from_slice(&self.light_source_lifespan.to_le_bytes());
                buf.extend_from_slice(&self.light_source_operating_time.to_le_bytes());
                buf.extend_from_slice(&self.reserved);
                Ok(())
            }

            fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
                Ok(Self {
                    receiver_id: r.i32()?,
                    $id_field: r.i32()?,
                    fields: ChannelStateFields(r.i32()?),
                    default_icon_field: r.i32()?,
                    ipv4: r.u32()?,
                    mac: r.array()?,
                    battery_level: r.u8()?,
                    battery_powered: r.bool()?,
                    wifi_rssi: r.u8()?,
                    wifi_signal_strength: r.u8()?,
                    bridge_node_online: r.bool()?,
                    bridge_node_signal_strength: r.u8()?,
                    uptime: r.u32()?,
                    connected_uptime: r.u32()?,
                    battery_health: r.u8()?,
                    last_connection_reset_cause: r.u8()?,
                    light_source_lifespan: r.u16()?,
                    light_source_operating_time: r.i32()?,
                    reserved: r.array()?,
                })
            }
        }
    };
}

channel_state_record! {
    /// Channel state as reported by a device. The channel is addressed by
    /// its number on the device.
    ChannelState, channel_number: "Channel number on the reporting device."
}

channel_state_record! {
    /// Channel state as relayed to a client. Identical layout to
    /// [`ChannelState`] with the device-local number replaced by the
    /// world-wide channel id.
    ChannelStateResult, channel_id: "Channel id in the client's world view."
}

impl ChannelState {
    /// Re-address a device report for delivery to a client.
    pub fn into_result(self, channel_id: i32) -> ChannelStateResult {
        ChannelStateResult {
            receiver_id: self.receiver_id,
            channel_id,
            fields: self.fields,
            default_icon_field: self.default_icon_field,
            ipv4: self.ipv4,
            mac: self.mac,
            battery_level: self.battery_level,
            battery_powered: self.battery_powered,
            wifi_rssi: self.wifi_rssi,
            wifi_signal_strength: self.wifi_signal_strength,
            bridge_node_online: self.bridge_node_online,
            bridge_node_signal_strength: self.bridge_node_signal_strength,
            uptime: self.uptime,
            connected_uptime: self.connected_uptime,
            battery_health: self.battery_health,
            last_connection_reset_cause: self.last_connection_reset_cause,
            light_source_lifespan: self.light_source_lifespan,
            light_source_operating_time: self.light_source_operating_time,
            reserved: self.reserved,
        }
    }
}

/// Client request for a channel's config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetChannelConfigRequest {
    /// Channel id.
    pub channel_id: i32,
    /// Requested config representation.
    pub config_type: ConfigType,
    /// Request modifier bits; currently unused.
    pub flags: u32,
}

impl Codec for GetChannelConfigRequest {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        buf.extend_from_slice(&self.channel_id.to_le_bytes());
        buf.push(self.config_type.to_raw());
        buf.extend_from_slice(&self.flags.to_le_bytes());
        Ok(())
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            channel_id: r.i32()?,
            config_type: ConfigType::from_raw(r.u8()?)?,
            flags: r.u32()?,
        })
    }
}

/// A channel config blob with its addressing metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Channel id.
    pub channel_id: i32,
    /// Function the config applies to.
    pub func: ChannelFunc,
    /// Config representation.
    pub config_type: ConfigType,
    /// Encoded config; empty when the channel has none.
    pub config: Vec<u8>,
}

impl Codec for ChannelConfig {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        check_len("config", self.config.len(), CHANNEL_CONFIG_MAXSIZE)?;
        buf.extend_from_slice(&self.channel_id.to_le_bytes());
        buf.extend_from_slice(&self.func.to_raw().to_le_bytes());
        buf.push(self.config_type.to_raw());
        buf.extend_from_slice(&(self.config.len() as u16).to_le_bytes());
        buf.extend_from_slice(&self.config);
        Ok(())
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let channel_id = r.i32()?;
        let func = ChannelFunc::from_raw(r.i32()?)?;
        let config_type = ConfigType::from_raw(r.u8()?)?;
        let len = r.u16()? as usize;
        check_len("config", len, CHANNEL_CONFIG_MAXSIZE)?;
        Ok(Self { channel_id, func, config_type, config: r.take(len)?.to_vec() })
    }
}

/// Channel config query outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfigUpdateOrResult {
    /// Whether a config is attached.
    pub result: ConfigResult,
    /// The config payload.
    pub config: ChannelConfig,
}

impl Codec for ChannelConfigUpdateOrResult {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        buf.push(self.result.to_raw());
        self.config.encode_to(buf)
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            result: ConfigResult::from_raw(r.u8()?)?,
            config: ChannelConfig::decode_from(r)?,
        })
    }
}

/// Display config of a general purpose measurement channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelConfigGpm {
    /// Divider applied to raw values (thousandths).
    pub value_divider: i32,
    /// Multiplier applied to raw values (thousandths).
    pub value_multiplier: i32,
    /// Offset added to scaled values (thousandths).
    pub value_added: i64,
    /// Decimal places shown.
    pub value_precision: u8,
    /// Unit shown before the value.
    pub unit_before_value: String,
    /// Unit shown after the value.
    pub unit_after_value: String,
    /// Suppress the space between unit and value.
    pub no_space_before_value: bool,
    /// Suppress the space between value and unit.
    pub no_space_after_value: bool,
    /// Keep a measurement history.
    pub keep_history: bool,
    /// Chart rendering hint.
    pub chart_type: GpmChartType,
    /// Refresh interval hint; zero for default.
    pub refresh_interval_ms: u16,
    /// Provisioned default for `value_divider`.
    pub default_value_divider: i32,
    /// Provisioned default for `value_multiplier`.
    pub default_value_multiplier: i32,
    /// Provisioned default for `value_added`.
    pub default_value_added: i64,
    /// Provisioned default for `value_precision`.
    pub default_value_precision: u8,
    /// Provisioned default for `unit_before_value`.
    pub default_unit_before_value: String,
    /// Provisioned default for `unit_after_value`.
    pub default_unit_after_value: String,
}

impl ChannelConfigGpm {
    /// Checksum of the encoded config, as carried in shape-E channel
    /// packs.
    pub fn crc32(&self) -> Result<u32, CodecError> {
        Ok(CRC32.checksum(&self.encode()?))
    }
}

impl Codec for ChannelConfigGpm {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        buf.extend_from_slice(&self.value_divider.to_le_bytes());
        buf.extend_from_slice(&self.value_multiplier.to_le_bytes());
        buf.extend_from_slice(&self.value_added.to_le_bytes());
        buf.push(self.value_precision);
        put_fixed_str(buf, "unit_before_value", &self.unit_before_value, GPM_UNIT_MAXSIZE)?;
        put_fixed_str(buf, "unit_after_value", &self.unit_after_value, GPM_UNIT_MAXSIZE)?;
        buf.push(u8::from(self.no_space_before_value));
        buf.push(u8::from(self.no_space_after_value));
        buf.push(u8::from(self.keep_history));
        buf.push(self.chart_type.to_raw());
        buf.extend_from_slice(&self.refresh_interval_ms.to_le_bytes());
        buf.extend_from_slice(&self.default_value_divider.to_le_bytes());
        buf.extend_from_slice(&self.default_value_multiplier.to_le_bytes());
        buf.extend_from_slice(&self.default_value_added.to_le_bytes());
        buf.push(self.default_value_precision);
        put_fixed_str(
            buf,
            "default_unit_before_value",
            &self.default_unit_before_value,
            GPM_UNIT_MAXSIZE,
        )?;
        put_fixed_str(
            buf,
            "default_unit_after_value",
            &self.default_unit_after_value,
            GPM_UNIT_MAXSIZE,
        )?;
        Ok(())
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            value_divider: r.i32()?,
            value_multiplier: r.i32()?,
            value_added: r.i64()?,
            value_precision: r.u8()?,
            unit_before_value: r.fixed_str(GPM_UNIT_MAXSIZE)?,
            unit_after_value: r.fixed_str(GPM_UNIT_MAXSIZE)?,
            no_space_before_value: r.bool()?,
            no_space_after_value: r.bool()?,
            keep_history: r.bool()?,
            chart_type: GpmChartType::from_raw(r.u8()?)?,
            refresh_interval_ms: r.u16()?,
            default_value_divider: r.i32()?,
            default_value_multiplier: r.i32()?,
            default_value_added: r.i64()?,
            default_value_precision: r.u8()?,
            default_unit_before_value: r.fixed_str(GPM_UNIT_MAXSIZE)?,
            default_unit_after_value: r.fixed_str(GPM_UNIT_MAXSIZE)?,
        })
    }
}

/// Calibration/config request from a client (shape B).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCalCfgRequestB {
    /// Channel id.
    pub channel_id: i32,
    /// Addressing modifier; zero addresses the channel itself.
    pub target: u8,
    /// Vendor command code.
    pub command: i32,
    /// Vendor data type tag.
    pub datatype: i32,
    /// Command payload.
    pub data: Vec<u8>,
}

impl Codec for DeviceCalCfgRequestB {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        check_len("data", self.data.len(), CALCFG_DATA_MAXSIZE)?;
        buf.extend_from_slice(&self.channel_id.to_le_bytes());
        buf.push(self.target);
        buf.extend_from_slice(&self.command.to_le_bytes());
        buf.extend_from_slice(&self.datatype.to_le_bytes());
        buf.extend_from_slice(&(self.data.len() as i32).to_le_bytes());
        buf.extend_from_slice(&self.data);
        Ok(())
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let channel_id = r.i32()?;
        let target = r.u8()?;
        let command = r.i32()?;
        let datatype = r.i32()?;
        let len = r.i32()?;
        let len = usize::try_from(len).map_err(|_| CodecError::UnexpectedEof)?;
        check_len("data", len, CALCFG_DATA_MAXSIZE)?;
        Ok(Self { channel_id, target, command, datatype, data: r.take(len)?.to_vec() })
    }
}

/// Calibration/config request as forwarded to the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCalCfgRequest {
    /// Originating client id, echoed back in the result.
    pub sender_id: i32,
    /// Channel number on the device.
    pub channel_number: u8,
    /// Vendor command code.
    pub command: i32,
    /// The requesting client holds superuser authorization.
    pub super_user_authorized: bool,
    /// Vendor data type tag.
    pub datatype: i32,
    /// Command payload.
    pub data: Vec<u8>,
}

impl Codec for DeviceCalCfgRequest {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        check_len("data", self.data.len(), CALCFG_DATA_MAXSIZE)?;
        buf.extend_from_slice(&self.sender_id.to_le_bytes());
        buf.push(self.channel_number);
        buf.extend_from_slice(&self.command.to_le_bytes());
        buf.push(u8::from(self.super_user_authorized));
        buf.extend_from_slice(&self.datatype.to_le_bytes());
        buf.extend_from_slice(&(self.data.len() as i32).to_le_bytes());
        buf.extend_from_slice(&self.data);
        Ok(())
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let sender_id = r.i32()?;
        let channel_number = r.u8()?;
        let command = r.i32()?;
        let super_user_authorized = r.bool()?;
        let datatype = r.i32()?;
        let len = r.i32()?;
        let len = usize::try_from(len).map_err(|_| CodecError::UnexpectedEof)?;
        check_len("data", len, CALCFG_DATA_MAXSIZE)?;
        Ok(Self {
            sender_id,
            channel_number,
            command,
            super_user_authorized,
            datatype,
            data: r.take(len)?.to_vec(),
        })
    }
}

/// Calibration/config result from a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCalCfgResult {
    /// Client id the result is routed to.
    pub receiver_id: i32,
    /// Channel number on the device.
    pub channel_number: u8,
    /// Vendor command code.
    pub command: i32,
    /// Vendor result code.
    pub result: i32,
    /// Result payload.
    pub data: Vec<u8>,
}

impl Codec for DeviceCalCfgResult {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        check_len("data", self.data.len(), CALCFG_DATA_MAXSIZE)?;
        buf.extend_from_slice(&self.receiver_id.to_le_bytes());
        buf.push(self.channel_number);
        buf.extend_from_slice(&self.command.to_le_bytes());
        buf.extend_from_slice(&self.result.to_le_bytes());
        buf.extend_from_slice(&(self.data.len() as i32).to_le_bytes());
        buf.extend_from_slice(&self.data);
        Ok(())
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let receiver_id = r.i32()?;
        let channel_number = r.u8()?;
        let command = r.i32()?;
        let result = r.i32()?;
        let len = r.i32()?;
        let len = usize::try_from(len).map_err(|_| CodecError::UnexpectedEof)?;
        check_len("data", len, CALCFG_DATA_MAXSIZE)?;
        Ok(Self { receiver_id, channel_number, command, result, data: r.take(len)?.to_vec() })
    }
}

/// Calibration/config result as relayed to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCalCfgResultC {
    /// Channel id in the client's world view.
    pub channel_id: i32,
    /// Vendor command code.
    pub command: i32,
    /// Vendor result code.
    pub result: i32,
    /// Result payload.
    pub data: Vec<u8>,
}

impl Codec for DeviceCalCfgResultC {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        check_len("data", self.data.len(), CALCFG_DATA_MAXSIZE)?;
        buf.extend_from_slice(&self.channel_id.to_le_bytes());
        buf.extend_from_slice(&self.command.to_le_bytes());
        buf.extend_from_slice(&self.result.to_le_bytes());
        buf.extend_from_slice(&(self.data.len() as i32).to_le_bytes());
        buf.extend_from_slice(&self.data);
        Ok(())
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let channel_id = r.i32()?;
        let command = r.i32()?;
        let result = r.i32()?;
        let len = r.i32()?;
        let len = usize::try_from(len).map_err(|_| CodecError::UnexpectedEof)?;
        check_len("data", len, CALCFG_DATA_MAXSIZE)?;
        Ok(Self { channel_id, command, result, data: r.take(len)?.to_vec() })
    }
}
