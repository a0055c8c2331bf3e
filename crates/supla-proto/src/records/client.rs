//! Records exchanged between clients and the server.

use super::{
    ActionSubjectType, ActionType, ChannelFlags, ChannelFunc, ChannelType, ChannelValue,
    ChannelValueB, OAuthResultCode, ResultCode, Target, ACTION_PARAM_MAXSIZE, CAPTION_MAXSIZE,
    EMAIL_MAXSIZE, NAME_MAXSIZE, OAUTH_TOKEN_MAXSIZE, PASSWORD_MAXSIZE, SERVER_NAME_MAXSIZE,
    SOFTVER_MAXSIZE,
};
use crate::{
    codec::{check_len, put_fixed_str, Codec, Reader},
    errors::CodecError,
    AUTHKEY_SIZE, CHANNELPACK_MAXCOUNT, CHANNELVALUE_PACK_MAXCOUNT,
    CHANNEL_RELATION_PACK_MAXCOUNT, GUID_SIZE, SCENE_PACK_MAXCOUNT,
};

/// Append a prefix-sized, NUL-terminated caption.
fn put_caption(buf: &mut Vec<u8>, s: &str) -> Result<(), CodecError> {
    let bytes = s.as_bytes();
    check_len("caption", bytes.len() + 1, CAPTION_MAXSIZE)?;
    buf.extend_from_slice(&((bytes.len() + 1) as i32).to_le_bytes());
    buf.extend_from_slice(bytes);
    buf.push(0);
    Ok(())
}

/// Read a prefix-sized, NUL-terminated caption.
fn read_caption(r: &mut Reader<'_>) -> Result<String, CodecError> {
    let len = r.i32()?;
    let len = usize::try_from(len).map_err(|_| CodecError::UnexpectedEof)?;
    check_len("caption", len, CAPTION_MAXSIZE)?;
    r.var_str(len, true)
}

/// Append a `[count][total_left][items...]` pack body. The count is written
/// first even though it sizes the trailing array.
fn encode_pack<T: Codec>(
    buf: &mut Vec<u8>,
    items: &[T],
    total_left: i32,
    max: usize,
) -> Result<(), CodecError> {
    check_len("pack items", items.len(), max)?;
    buf.extend_from_slice(&(items.len() as i32).to_le_bytes());
    buf.extend_from_slice(&total_left.to_le_bytes());
    for item in items {
        item.encode_to(buf)?;
    }
    Ok(())
}

/// Read a `[count][total_left][items...]` pack body.
fn decode_pack<T: Codec>(r: &mut Reader<'_>, max: usize) -> Result<(Vec<T>, i32), CodecError> {
    let count = r.i32()?;
    let count = usize::try_from(count).map_err(|_| CodecError::UnexpectedEof)?;
    check_len("pack items", count, max)?;
    let total_left = r.i32()?;
    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        items.push(T::decode_from(r)?);
    }
    Ok((items, total_left))
}

/// Client registration request (shape D).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterClientD {
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
    /// Client GUID.
    pub guid: [u8; GUID_SIZE],
    /// Shared authentication blob.
    pub authkey: [u8; AUTHKEY_SIZE],
    /// Human-readable client name.
    pub name: String,
    /// Client software version.
    pub soft_ver: String,
    /// Server the client believes it is talking to.
    pub server_name: String,
}

impl Codec for RegisterClientD {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        put_fixed_str(buf, "email", &self.email, EMAIL_MAXSIZE)?;
        put_fixed_str(buf, "password", &self.password, PASSWORD_MAXSIZE)?;
        buf.extend_from_slice(&self.guid);
        buf.extend_from_slice(&self.authkey);
        put_fixed_str(buf, "name", &self.name, NAME_MAXSIZE)?;
        put_fixed_str(buf, "soft_ver", &self.soft_ver, SOFTVER_MAXSIZE)?;
        put_fixed_str(buf, "server_name", &self.server_name, SERVER_NAME_MAXSIZE)?;
        Ok(())
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            email: r.fixed_str(EMAIL_MAXSIZE)?,
            password: r.fixed_str(PASSWORD_MAXSIZE)?,
            guid: r.array()?,
            authkey: r.array()?,
            name: r.fixed_str(NAME_MAXSIZE)?,
            soft_ver: r.fixed_str(SOFTVER_MAXSIZE)?,
            server_name: r.fixed_str(SERVER_NAME_MAXSIZE)?,
        })
    }
}

/// Client registration outcome (shape D).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterClientResultD {
    /// Outcome code; `False` closes the connection.
    pub result_code: ResultCode,
    /// The client's stable id.
    pub client_id: i32,
    /// Number of configured locations.
    pub location_count: i16,
    /// Number of configured channels.
    pub channel_count: i16,
    /// Number of configured channel groups.
    pub channel_group_count: i16,
    /// Number of configured scenes.
    pub scene_count: i16,
    /// Activity timeout currently in force for the connection.
    pub activity_timeout: u8,
    /// Server protocol version.
    pub version: u8,
    /// Oldest protocol version the server accepts.
    pub version_min: u8,
    /// Server wall-clock at registration.
    pub server_unix_timestamp: i64,
}

impl Codec for RegisterClientResultD {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        buf.extend_from_slice(&self.result_code.to_raw().to_le_bytes());
        buf.extend_from_slice(&self.client_id.to_le_bytes());
        buf.extend_from_slice(&self.location_count.to_le_bytes());
        buf.extend_from_slice(&self.channel_count.to_le_bytes());
        buf.extend_from_slice(&self.channel_group_count.to_le_bytes());
        buf.extend_from_slice(&self.scene_count.to_le_bytes());
        buf.push(self.activity_timeout);
        buf.push(self.version);
        buf.push(self.version_min);
        buf.extend_from_slice(&self.server_unix_timestamp.to_le_bytes());
        Ok(())
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            result_code: ResultCode::from_raw(r.i32()?)?,
            client_id: r.i32()?,
            location_count: r.i16()?,
            channel_count: r.i16()?,
            channel_group_count: r.i16()?,
            scene_count: r.i16()?,
            activity_timeout: r.u8()?,
            version: r.u8()?,
            version_min: r.u8()?,
            server_unix_timestamp: r.i64()?,
        })
    }
}

/// One location entry in a location pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Last entry of the whole listing.
    pub eol: bool,
    /// Location id.
    pub id: i32,
    /// Display name.
    pub caption: String,
}

impl Codec for Location {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        buf.push(u8::from(self.eol));
        buf.extend_from_slice(&self.id.to_le_bytes());
        put_caption(buf, &self.caption)
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self { eol: r.bool()?, id: r.i32()?, caption: read_caption(r)? })
    }
}

/// Batched location listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationPack {
    /// Entries still to come in later packs.
    pub total_left: i32,
    /// This batch.
    pub items: Vec<Location>,
}

impl Codec for LocationPack {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        encode_pack(buf, &self.items, self.total_left, CHANNELPACK_MAXCOUNT)
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let (items, total_left) = decode_pack(r, CHANNELPACK_MAXCOUNT)?;
        Ok(Self { total_left, items })
    }
}

/// One channel entry in a shape-D channel pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelD {
    /// Last entry of the whole listing.
    pub eol: bool,
    /// Channel id.
    pub id: i32,
    /// Owning device id.
    pub device_id: i32,
    /// Location the channel is shown under.
    pub location_id: i32,
    /// Hardware kind.
    pub channel_type: ChannelType,
    /// Configured function.
    pub func: ChannelFunc,
    /// Alternative built-in icon number.
    pub alt_icon: i32,
    /// Content-addressed user icon id; zero when none.
    pub user_icon: i32,
    /// Manufacturer id of the owning device.
    pub manufacturer_id: i16,
    /// Product id of the owning device.
    pub product_id: i16,
    /// Capability bits (32-bit shape).
    pub flags: ChannelFlags,
    /// Protocol version the owning device negotiated.
    pub protocol_version: u8,
    /// The owning device is connected.
    pub online: bool,
    /// Last known value.
    pub value: ChannelValueB,
    /// Display name.
    pub caption: String,
}

impl Codec for ChannelD {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        buf.push(u8::from(self.eol));
        buf.extend_from_slice(&self.id.to_le_bytes());
        buf.extend_from_slice(&self.device_id.to_le_bytes());
        buf.extend_from_slice(&self.location_id.to_le_bytes());
        buf.extend_from_slice(&self.channel_type.to_raw().to_le_bytes());
        buf.extend_from_slice(&self.func.to_raw().to_le_bytes());
        buf.extend_from_slice(&self.alt_icon.to_le_bytes());
        buf.extend_from_slice(&self.user_icon.to_le_bytes());
        buf.extend_from_slice(&self.manufacturer_id.to_le_bytes());
        buf.extend_from_slice(&self.product_id.to_le_bytes());
        buf.extend_from_slice(&(self.flags.0 as u32).to_le_bytes());
        buf.push(self.protocol_version);
        buf.push(u8::from(self.online));
        self.value.encode_to(buf)?;
        put_caption(buf, &self.caption)
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            eol: r.bool()?,
            id: r.i32()?,
            device_id: r.i32()?,
            location_id: r.i32()?,
            channel_type: ChannelType::from_raw(r.i32()?)?,
            func: ChannelFunc::from_raw(r.i32()?)?,
            alt_icon: r.i32()?,
            user_icon: r.i32()?,
            manufacturer_id: r.i16()?,
            product_id: r.i16()?,
            flags: ChannelFlags(u64::from(r.u32()?)),
            protocol_version: r.u8()?,
            online: r.bool()?,
            value: ChannelValueB::decode_from(r)?,
            caption: read_caption(r)?,
        })
    }
}

/// Batched channel listing (shape D).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPackD {
    /// Entries still to come in later packs.
    pub total_left: i32,
    /// This batch.
    pub items: Vec<ChannelD>,
}

impl Codec for ChannelPackD {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        encode_pack(buf, &self.items, self.total_left, CHANNELPACK_MAXCOUNT)
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let (items, total_left) = decode_pack(r, CHANNELPACK_MAXCOUNT)?;
        Ok(Self { total_left, items })
    }
}

/// One channel entry in a shape-E channel pack.
///
/// Extends [`ChannelD`] with a checksum of the channel's default config and
/// the full-width flag field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelE {
    /// Last entry of the whole listing.
    pub eol: bool,
    /// Channel id.
    pub id: i32,
    /// Owning device id.
    pub device_id: i32,
    /// Location the channel is shown under.
    pub location_id: i32,
    /// Hardware kind.
    pub channel_type: ChannelType,
    /// Configured function.
    pub func: ChannelFunc,
    /// Alternative built-in icon number.
    pub alt_icon: i32,
    /// Content-addressed user icon id; zero when none.
    pub user_icon: i32,
    /// Manufacturer id of the owning device.
    pub manufacturer_id: i16,
    /// Product id of the owning device.
    pub product_id: i16,
    /// CRC-32 of the channel's default config blob; zero when none.
    pub default_config_crc32: u32,
    /// Capability bits.
    pub flags: ChannelFlags,
    /// Protocol version the owning device negotiated.
    pub protocol_version: u8,
    /// The owning device is connected.
    pub online: bool,
    /// Last known value.
    pub value: ChannelValueB,
    /// Display name.
    pub caption: String,
}

impl Codec for ChannelE {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        buf.push(u8::from(self.eol));
        buf.extend_from_slice(&self.id.to_le_bytes());
        buf.extend_from_slice(&self.device_id.to_le_bytes());
        buf.extend_from_slice(&self.location_id.to_le_bytes());
        buf.extend_from_slice(&self.channel_type.to_raw().to_le_bytes());
        buf.extend_from_slice(&self.func.to_raw().to_le_bytes());
        buf.extend_from_slice(&self.alt_icon.to_le_bytes());
        buf.extend_from_slice(&self.user_icon.to_le_bytes());
        buf.extend_from_slice(&self.manufacturer_id.to_le_bytes());
        buf.extend_from_slice(&self.product_id.to_le_bytes());
        buf.extend_from_slice(&self.default_config_crc32.to_le_bytes());
        buf.extend_from_slice(&self.flags.0.to_le_bytes());
        buf.push(self.protocol_version);
        buf.push(u8::from(self.online));
        self.value.encode_to(buf)?;
        put_caption(buf, &self.caption)
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            eol: r.bool()?,
            id: r.i32()?,
            device_id: r.i32()?,
            location_id: r.i32()?,
            channel_type: ChannelType::from_raw(r.i32()?)?,
            func: ChannelFunc::from_raw(r.i32()?)?,
            alt_icon: r.i32()?,
            user_icon: r.i32()?,
            manufacturer_id: r.i16()?,
            product_id: r.i16()?,
            default_config_crc32: r.u32()?,
            flags: ChannelFlags(r.u64()?),
            protocol_version: r.u8()?,
            online: r.bool()?,
            value: ChannelValueB::decode_from(r)?,
            caption: read_caption(r)?,
        })
    }
}

/// Batched channel listing (shape E).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPackE {
    /// Entries still to come in later packs.
    pub total_left: i32,
    /// This batch.
    pub items: Vec<ChannelE>,
}

impl Codec for ChannelPackE {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        encode_pack(buf, &self.items, self.total_left, CHANNELPACK_MAXCOUNT)
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let (items, total_left) = decode_pack(r, CHANNELPACK_MAXCOUNT)?;
        Ok(Self { total_left, items })
    }
}

/// Parent/child relationship between two channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelRelation {
    /// Last entry of the whole listing.
    pub eol: bool,
    /// Channel id.
    pub id: i32,
    /// Parent channel id.
    pub parent_id: i32,
    /// Relationship kind.
    pub relation_type: u16,
}

impl Codec for ChannelRelation {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        buf.push(u8::from(self.eol));
        buf.extend_from_slice(&self.id.to_le_bytes());
        buf.extend_from_slice(&self.parent_id.to_le_bytes());
        buf.extend_from_slice(&self.relation_type.to_le_bytes());
        Ok(())
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self { eol: r.bool()?, id: r.i32()?, parent_id: r.i32()?, relation_type: r.u16()? })
    }
}

/// Batched channel relation listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRelationPack {
    /// Entries still to come in later packs.
    pub total_left: i32,
    /// This batch.
    pub items: Vec<ChannelRelation>,
}

impl Codec for ChannelRelationPack {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        encode_pack(buf, &self.items, self.total_left, CHANNEL_RELATION_PACK_MAXCOUNT)
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let (items, total_left) = decode_pack(r, CHANNEL_RELATION_PACK_MAXCOUNT)?;
        Ok(Self { total_left, items })
    }
}

/// One value entry in a channel-value pack (shape B).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelValueItemB {
    /// Last entry of this update.
    pub eol: bool,
    /// Channel id.
    pub id: i32,
    /// The owning device is connected.
    pub online: bool,
    /// Current value.
    pub value: ChannelValueB,
}

impl Codec for ChannelValueItemB {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        buf.push(u8::from(self.eol));
        buf.extend_from_slice(&self.id.to_le_bytes());
        buf.push(u8::from(self.online));
        self.value.encode_to(buf)
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            eol: r.bool()?,
            id: r.i32()?,
            online: r.bool()?,
            value: ChannelValueB::decode_from(r)?,
        })
    }
}

/// Batched channel-value update (shape B).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelValuePackB {
    /// Entries still to come in later packs.
    pub total_left: i32,
    /// This batch.
    pub items: Vec<ChannelValueItemB>,
}

impl Codec for ChannelValuePackB {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        encode_pack(buf, &self.items, self.total_left, CHANNELVALUE_PACK_MAXCOUNT)
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let (items, total_left) = decode_pack(r, CHANNELVALUE_PACK_MAXCOUNT)?;
        Ok(Self { total_left, items })
    }
}

/// One scene entry in a scene pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneItem {
    /// Last entry of the whole listing.
    pub eol: bool,
    /// Scene id.
    pub id: i32,
    /// Location the scene is shown under.
    pub location_id: i32,
    /// Alternative built-in icon number.
    pub alt_icon: i32,
    /// Content-addressed user icon id; zero when none.
    pub user_icon: i32,
    /// Display name.
    pub caption: String,
}

impl Codec for SceneItem {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        buf.push(u8::from(self.eol));
        buf.extend_from_slice(&self.id.to_le_bytes());
        buf.extend_from_slice(&self.location_id.to_le_bytes());
        buf.extend_from_slice(&self.alt_icon.to_le_bytes());
        buf.extend_from_slice(&self.user_icon.to_le_bytes());
        put_caption(buf, &self.caption)
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            eol: r.bool()?,
            id: r.i32()?,
            location_id: r.i32()?,
            alt_icon: r.i32()?,
            user_icon: r.i32()?,
            caption: read_caption(r)?,
        })
    }
}

/// Batched scene listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenePack {
    /// Entries still to come in later packs.
    pub total_left: i32,
    /// This batch.
    pub items: Vec<SceneItem>,
}

impl Codec for ScenePack {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        encode_pack(buf, &self.items, self.total_left, SCENE_PACK_MAXCOUNT)
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let (items, total_left) = decode_pack(r, SCENE_PACK_MAXCOUNT)?;
        Ok(Self { total_left, items })
    }
}

/// Client action request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    /// Requested action.
    pub action_id: ActionType,
    /// Channel or scene id, per `subject_type`.
    pub subject_id: i32,
    /// What the action addresses.
    pub subject_type: ActionSubjectType,
    /// Optional action parameter blob.
    pub param: Vec<u8>,
}

impl Codec for Action {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        check_len("param", self.param.len(), ACTION_PARAM_MAXSIZE)?;
        buf.extend_from_slice(&self.action_id.to_raw().to_le_bytes());
        buf.extend_from_slice(&self.subject_id.to_le_bytes());
        buf.push(self.subject_type.to_raw());
        buf.extend_from_slice(&(self.param.len() as i16).to_le_bytes());
        buf.extend_from_slice(&self.param);
        Ok(())
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let action_id = ActionType::from_raw(r.i32()?)?;
        let subject_id = r.i32()?;
        let subject_type = ActionSubjectType::from_raw(r.u8()?)?;
        let len = r.i16()?;
        let len = usize::try_from(len).map_err(|_| CodecError::UnexpectedEof)?;
        check_len("param", len, ACTION_PARAM_MAXSIZE)?;
        let param = r.take(len)?.to_vec();
        Ok(Self { action_id, subject_id, subject_type, param })
    }
}

/// Action outcome reported back to the requesting client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionExecutionResult {
    /// Outcome code.
    pub result_code: ResultCode,
    /// The requested action, echoed.
    pub action_id: ActionType,
    /// The addressed subject, echoed.
    pub subject_id: i32,
    /// The subject kind, echoed.
    pub subject_type: ActionSubjectType,
}

impl Codec for ActionExecutionResult {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        buf.extend_from_slice(&self.result_code.to_raw().to_le_bytes());
        buf.extend_from_slice(&self.action_id.to_raw().to_le_bytes());
        buf.extend_from_slice(&self.subject_id.to_le_bytes());
        buf.push(self.subject_type.to_raw());
        Ok(())
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            result_code: ResultCode::from_raw(r.i32()?)?,
            action_id: ActionType::from_raw(r.i32()?)?,
            subject_id: r.i32()?,
            subject_type: ActionSubjectType::from_raw(r.u8()?)?,
        })
    }
}

/// Client raw value write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewValue {
    /// Channel id the write addresses.
    pub value_id: i32,
    /// Target kind; only channels are writable.
    pub target: Target,
    /// New encoded value.
    pub value: ChannelValue,
}

impl Codec for NewValue {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        buf.extend_from_slice(&self.value_id.to_le_bytes());
        buf.push(self.target.to_raw());
        buf.extend_from_slice(&self.value);
        Ok(())
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self { value_id: r.i32()?, target: Target::from_raw(r.u8()?)?, value: r.array()? })
    }
}

/// Superuser authorization request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperUserAuthorizationRequest {
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
}

impl Codec for SuperUserAuthorizationRequest {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        put_fixed_str(buf, "email", &self.email, EMAIL_MAXSIZE)?;
        put_fixed_str(buf, "password", &self.password, PASSWORD_MAXSIZE)?;
        Ok(())
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            email: r.fixed_str(EMAIL_MAXSIZE)?,
            password: r.fixed_str(PASSWORD_MAXSIZE)?,
        })
    }
}

/// Superuser authorization outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperUserAuthorizationResult {
    /// `Authorized` or `Unauthorized`.
    pub result: ResultCode,
}

impl Codec for SuperUserAuthorizationResult {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        buf.extend_from_slice(&self.result.to_raw().to_le_bytes());
        Ok(())
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self { result: ResultCode::from_raw(r.i32()?)? })
    }
}

/// Bearer token handed to clients for the HTTP API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthToken {
    /// Token lifetime in seconds.
    pub expires_in: u32,
    /// Opaque token bytes.
    pub token: Vec<u8>,
}

impl Codec for OAuthToken {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        check_len("token", self.token.len(), OAUTH_TOKEN_MAXSIZE)?;
        buf.extend_from_slice(&self.expires_in.to_le_bytes());
        buf.extend_from_slice(&(self.token.len() as i32).to_le_bytes());
        buf.extend_from_slice(&self.token);
        Ok(())
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let expires_in = r.u32()?;
        let len = r.i32()?;
        let len = usize::try_from(len).map_err(|_| CodecError::UnexpectedEof)?;
        check_len("token", len, OAUTH_TOKEN_MAXSIZE)?;
        Ok(Self { expires_in, token: r.take(len)?.to_vec() })
    }
}

/// OAuth token request outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthTokenRequestResult {
    /// Outcome code.
    pub result_code: OAuthResultCode,
    /// The issued token.
    pub token: OAuthToken,
}

impl Codec for OAuthTokenRequestResult {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        buf.push(self.result_code.to_raw());
        self.token.encode_to(buf)
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            result_code: OAuthResultCode::from_raw(r.u8()?)?,
            token: OAuthToken::decode_from(r)?,
        })
    }
}
