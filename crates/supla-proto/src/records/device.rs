//! Records exchanged between devices and the server.

use super::{
    ActionCaps, ChannelFlags, ChannelFunc, ChannelType, ChannelValue, DeviceFlags, ResultCode,
    EMAIL_MAXSIZE, NAME_MAXSIZE, SERVER_NAME_MAXSIZE, SOFTVER_MAXSIZE,
};
use crate::{
    codec::{check_len, put_fixed_str, Codec, Reader},
    errors::CodecError,
    AUTHKEY_SIZE, DEVICE_CHANNEL_MAXCOUNT, GUID_SIZE,
};

/// One channel as announced in a device registration (shape C).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceChannelC {
    /// Zero-based index of the channel on its device.
    pub number: u8,
    /// Hardware kind.
    pub channel_type: ChannelType,
    /// Announced action-trigger capabilities.
    pub action_trigger_caps: ActionCaps,
    /// Function the device suggests for the channel.
    pub default_func: ChannelFunc,
    /// Capability bits.
    pub flags: ChannelFlags,
    /// Initial encoded value.
    pub value: ChannelValue,
}

impl Codec for DeviceChannelC {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        buf.push(self.number);
        buf.extend_from_slice(&self.channel_type.to_raw().to_le_bytes());
        buf.extend_from_slice(&self.action_trigger_caps.0.to_le_bytes());
        buf.extend_from_slice(&self.default_func.to_raw().to_le_bytes());
        // Registration carries 32-bit flags; the wider field only exists in
        // the client-facing channel packs.
        buf.extend_from_slice(&(self.flags.0 as u32).to_le_bytes());
        buf.extend_from_slice(&self.value);
        Ok(())
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            number: r.u8()?,
            channel_type: ChannelType::from_raw(r.i32()?)?,
            action_trigger_caps: ActionCaps(r.u32()?),
            default_func: ChannelFunc::from_raw(r.i32()?)?,
            flags: ChannelFlags(u64::from(r.u32()?)),
            value: r.array()?,
        })
    }
}

/// Device registration request (shape E).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterDeviceE {
    /// Account email the device was provisioned for.
    pub email: String,
    /// Shared authentication blob.
    pub authkey: [u8; AUTHKEY_SIZE],
    /// Device GUID.
    pub guid: [u8; GUID_SIZE],
    /// Human-readable device name.
    pub name: String,
    /// Firmware version string.
    pub soft_ver: String,
    /// Server the device believes it is talking to.
    pub server_name: String,
    /// Device capability bits.
    pub flags: DeviceFlags,
    /// Manufacturer id the device was provisioned with.
    pub manufacturer_id: i16,
    /// Product id the device was provisioned with.
    pub product_id: i16,
    /// The device's channels, ordered by channel number.
    pub channels: Vec<DeviceChannelC>,
}

impl Codec for RegisterDeviceE {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        check_len("channels", self.channels.len(), DEVICE_CHANNEL_MAXCOUNT)?;
        put_fixed_str(buf, "email", &self.email, EMAIL_MAXSIZE)?;
        buf.extend_from_slice(&self.authkey);
        buf.extend_from_slice(&self.guid);
        put_fixed_str(buf, "name", &self.name, NAME_MAXSIZE)?;
        put_fixed_str(buf, "soft_ver", &self.soft_ver, SOFTVER_MAXSIZE)?;
        put_fixed_str(buf, "server_name", &self.server_name, SERVER_NAME_MAXSIZE)?;
        buf.extend_from_slice(&self.flags.0.to_le_bytes());
        buf.extend_from_slice(&self.manufacturer_id.to_le_bytes());
        buf.extend_from_slice(&self.product_id.to_le_bytes());
        buf.push(self.channels.len() as u8);
        for channel in &self.channels {
            channel.encode_to(buf)?;
        }
        Ok(())
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let email = r.fixed_str(EMAIL_MAXSIZE)?;
        let authkey = r.array()?;
        let guid = r.array()?;
        let name = r.fixed_str(NAME_MAXSIZE)?;
        let soft_ver = r.fixed_str(SOFTVER_MAXSIZE)?;
        let server_name = r.fixed_str(SERVER_NAME_MAXSIZE)?;
        let flags = DeviceFlags(r.i32()?);
        let manufacturer_id = r.i16()?;
        let product_id = r.i16()?;
        let count = r.u8()? as usize;
        check_len("channels", count, DEVICE_CHANNEL_MAXCOUNT)?;
        let mut channels = Vec::with_capacity(count);
        for _ in 0..count {
            channels.push(DeviceChannelC::decode_from(r)?);
        }
        Ok(Self {
            email,
            authkey,
            guid,
            name,
            soft_ver,
            server_name,
            flags,
            manufacturer_id,
            product_id,
            channels,
        })
    }
}

/// Device registration outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterDeviceResult {
    /// Outcome code; `False` closes the connection.
    pub result_code: ResultCode,
    /// Activity timeout currently in force for the connection.
    pub activity_timeout: u8,
    /// Server protocol version.
    pub version: u8,
    /// Oldest protocol version the server accepts.
    pub version_min: u8,
}

impl Codec for RegisterDeviceResult {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        buf.extend_from_slice(&self.result_code.to_raw().to_le_bytes());
        buf.push(self.activity_timeout);
        buf.push(self.version);
        buf.push(self.version_min);
        Ok(())
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            result_code: ResultCode::from_raw(r.i32()?)?,
            activity_timeout: r.u8()?,
            version: r.u8()?,
            version_min: r.u8()?,
        })
    }
}

/// Device-initiated value update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceChannelValue {
    /// Channel number on the sending device.
    pub channel_number: u8,
    /// New encoded value.
    pub value: ChannelValue,
}

impl Codec for DeviceChannelValue {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        buf.push(self.channel_number);
        buf.extend_from_slice(&self.value);
        Ok(())
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self { channel_number: r.u8()?, value: r.array()? })
    }
}

/// Device-initiated value update with offline/validity metadata (shape C).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceChannelValueC {
    /// Channel number on the sending device.
    pub channel_number: u8,
    /// The channel reports itself offline.
    pub offline: bool,
    /// How long the value stays valid; zero for indefinitely.
    pub validity_time_sec: u32,
    /// New encoded value.
    pub value: ChannelValue,
}

impl Codec for DeviceChannelValueC {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        buf.push(self.channel_number);
        buf.push(u8::from(self.offline));
        buf.extend_from_slice(&self.validity_time_sec.to_le_bytes());
        buf.extend_from_slice(&self.value);
        Ok(())
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            channel_number: r.u8()?,
            offline: r.bool()?,
            validity_time_sec: r.u32()?,
            value: r.array()?,
        })
    }
}

/// Server-initiated value change pushed to a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelNewValue {
    /// Originator id echoed back in the result; zero when untracked.
    pub sender_id: i32,
    /// Channel number on the receiving device.
    pub channel_number: u8,
    /// Requested transition duration.
    pub duration_ms: u32,
    /// New encoded value.
    pub value: ChannelValue,
}

impl Codec for ChannelNewValue {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        buf.extend_from_slice(&self.sender_id.to_le_bytes());
        buf.push(self.channel_number);
        buf.extend_from_slice(&self.duration_ms.to_le_bytes());
        buf.extend_from_slice(&self.value);
        Ok(())
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            sender_id: r.i32()?,
            channel_number: r.u8()?,
            duration_ms: r.u32()?,
            value: r.array()?,
        })
    }
}

/// Device acknowledgement of a value change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelNewValueResult {
    /// Channel number on the acknowledging device.
    pub channel_number: u8,
    /// Originator id from the request.
    pub sender_id: i32,
    /// The device applied the value.
    pub success: bool,
}

impl Codec for ChannelNewValueResult {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        buf.push(self.channel_number);
        buf.extend_from_slice(&self.sender_id.to_le_bytes());
        buf.push(u8::from(self.success));
        Ok(())
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self { channel_number: r.u8()?, sender_id: r.i32()?, success: r.bool()? })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_channel(number: u8, value: ChannelValue) -> DeviceChannelC {
        DeviceChannelC {
            number,
            channel_type: ChannelType::Dimmer,
            action_trigger_caps: ActionCaps::NONE,
            default_func: ChannelFunc::Dimmer,
            flags: ChannelFlags::RGBW_COMMANDS_SUPPORTED,
            value,
        }
    }

    fn sample_register() -> RegisterDeviceE {
        RegisterDeviceE {
            email: "email@example.com".to_owned(),
            authkey: *b"\xDD\xDD\xDD\xDD\x4A\xD3\xB8\xAA\x36\x66\x21\x6F\x2A\x86\x42\x23",
            guid: *b"\xCC\xCC\xCC\xCC\xE5\x34\xD1\xA7\x06\xAC\x5F\x41\x67\x19\x89\x9E",
            name: "Test Client".to_owned(),
            soft_ver: "1.2.3".to_owned(),
            server_name: "localhost".to_owned(),
            flags: DeviceFlags::NONE,
            manufacturer_id: 42,
            product_id: 7,
            channels: vec![sample_channel(1, [6, 0, 0, 0, 0, 0, 0, 0])],
        }
    }

    #[test]
    fn device_channel_layout() {
        let channel = sample_channel(1, [6, 0, 0, 0, 0, 0, 0, 0]);
        let data = channel.encode().unwrap();
        assert_eq!(data.len(), 25);
        // number, type 4000, caps 0, func 180, flags 256, value
        assert_eq!(&data[..5], b"\x01\xa0\x0f\x00\x00");
        assert_eq!(&data[9..13], b"\xb4\x00\x00\x00");
        assert_eq!(&data[13..17], b"\x00\x01\x00\x00");
        assert_eq!(&data[17..25], b"\x06\x00\x00\x00\x00\x00\x00\x00");
        let (decoded, size) = DeviceChannelC::decode(&data).unwrap();
        assert_eq!(size, 25);
        assert_eq!(decoded, channel);
    }

    #[test]
    fn register_device_round_trip() {
        let msg = sample_register();
        let data = msg.encode().unwrap();
        assert_eq!(data.len(), 609);
        let (decoded, size) = RegisterDeviceE::decode(&data).unwrap();
        assert_eq!(size, 609);
        assert_eq!(decoded, msg);
    }

    #[test]
    fn register_device_grows_per_channel() {
        let mut msg = sample_register();
        msg.channels.push(sample_channel(7, [12, 0, 0, 0, 0, 0, 0, 0]));
        let data = msg.encode().unwrap();
        assert_eq!(data.len(), 609 + 25);
        let (decoded, _) = RegisterDeviceE::decode(&data).unwrap();
        assert_eq!(decoded.channels.len(), 2);
        assert_eq!(decoded.channels[1].number, 7);
    }

    #[test]
    fn register_device_rejects_truncation() {
        let data = sample_register().encode().unwrap();
        let err = RegisterDeviceE::decode(&data[..data.len() - 1]).unwrap_err();
        assert_eq!(err, CodecError::UnexpectedEof);
    }

    #[test]
    fn register_result_layout() {
        let msg = RegisterDeviceResult {
            result_code: ResultCode::True,
            activity_timeout: 2,
            version: 3,
            version_min: 4,
        };
        let data = msg.encode().unwrap();
        assert_eq!(data, b"\x03\x00\x00\x00\x02\x03\x04");
        let (decoded, size) = RegisterDeviceResult::decode(&data).unwrap();
        assert_eq!(size, 7);
        assert_eq!(decoded, msg);
    }

    #[test]
    fn new_value_round_trip() {
        let msg = ChannelNewValue {
            sender_id: 0,
            channel_number: 2,
            duration_ms: 0,
            value: [1, 0, 0, 0, 0, 0, 0, 0],
        };
        let (decoded, size) = ChannelNewValue::decode(&msg.encode().unwrap()).unwrap();
        assert_eq!(size, 17);
        assert_eq!(decoded, msg);
    }
}
