//! In-memory world state.
//!
//! The state owns every device, channel, scene, icon and client
//! exclusively; connections refer to entities by id and re-enter the
//! state for every access. The server wraps the whole state in a single
//! `tokio::sync::Mutex` — mutating operations here are plain synchronous
//! functions called with that lock held, and the lock is never held
//! across peer I/O.
//!
//! Devices, channels, scenes and icons are created at startup from
//! configuration and never destroyed. Clients are created on first
//! registration and persist for the process lifetime; a reconnect reuses
//! the existing id.

use std::collections::HashMap;

use serde::Deserialize;
use sha2::{Digest, Sha256};
use supla_proto::records::{
    config::ChannelConfigGpm, ActionType, ChannelFlags, ChannelFunc, ChannelType, ChannelValue,
    GpmChartType,
};

use crate::{error::StateError, events::EventSink};

/// Dense device id, assigned from 1 in configuration order.
pub type DeviceId = i32;
/// Dense channel id, unique across all devices.
pub type ChannelId = i32;
/// Dense scene id.
pub type SceneId = i32;
/// Content-addressed icon id (24-bit, non-zero).
pub type IconId = i32;
/// Dense client id.
pub type ClientId = i32;

/// A configured device.
#[derive(Debug, Clone)]
pub struct Device {
    /// Device id.
    pub id: DeviceId,
    /// Configured name; used in logs.
    pub name: String,
    /// Configured GUID.
    pub guid: [u8; supla_proto::GUID_SIZE],
    /// Expected manufacturer id.
    pub manufacturer_id: i16,
    /// Expected product id.
    pub product_id: i16,
    /// The device's channels, in registration order.
    pub channel_ids: Vec<ChannelId>,
    /// Protocol version negotiated at the last registration.
    pub proto_version: u8,
    /// A connection is currently registered for this device.
    pub online: bool,
}

impl Device {
    /// Channel number of `channel_id` on this device.
    pub fn channel_number(&self, channel_id: ChannelId) -> Option<u8> {
        self.channel_ids.iter().position(|&id| id == channel_id).map(|n| n as u8)
    }
}

/// Display configuration of a general purpose measurement channel.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct GpmConfig {
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
}

impl From<&GpmConfig> for ChannelConfigGpm {
    fn from(config: &GpmConfig) -> Self {
        Self {
            value_divider: config.value_divider,
            value_multiplier: config.value_multiplier,
            value_added: config.value_added,
            value_precision: config.value_precision,
            unit_before_value: config.unit_before_value.clone(),
            unit_after_value: config.unit_after_value.clone(),
            no_space_before_value: config.no_space_before_value,
            no_space_after_value: config.no_space_after_value,
            keep_history: false,
            chart_type: GpmChartType::Linear,
            refresh_interval_ms: 0,
            default_value_divider: config.value_divider,
            default_value_multiplier: config.value_multiplier,
            default_value_added: config.value_added,
            default_value_precision: config.value_precision,
            default_unit_before_value: config.unit_before_value.clone(),
            default_unit_after_value: config.unit_after_value.clone(),
        }
    }
}

/// Typed channel configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelConfig {
    /// General purpose measurement display config.
    GeneralPurposeMeasurement(GpmConfig),
}

/// A configured channel.
#[derive(Debug, Clone)]
pub struct Channel {
    /// Channel id.
    pub id: ChannelId,
    /// Owning device.
    pub device_id: DeviceId,
    /// World-unique name; scenes address channels by it.
    pub name: String,
    /// Display name pushed to clients.
    pub caption: String,
    /// Hardware kind.
    pub channel_type: ChannelType,
    /// Configured function.
    pub func: ChannelFunc,
    /// Capability bits.
    pub flags: ChannelFlags,
    /// Alternative built-in icon number.
    pub alt_icon: i32,
    /// Content-addressed user icon id; zero when none.
    pub user_icon: IconId,
    /// Last known encoded value.
    pub value: ChannelValue,
    /// Most recent non-off value; dimmers restore it on turn-on.
    pub last_value: Option<ChannelValue>,
    /// Optional typed config.
    pub config: Option<ChannelConfig>,
}

/// One step of a scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneStep {
    /// Name of the channel the step drives.
    pub channel_name: String,
    /// Action applied to the channel.
    pub action: ActionType,
    /// Optional action parameter (dimmer brightness, etc).
    pub param: Option<Vec<u8>>,
}

/// A configured scene.
#[derive(Debug, Clone)]
pub struct Scene {
    /// Scene id.
    pub id: SceneId,
    /// Configured name.
    pub name: String,
    /// Display name pushed to clients.
    pub caption: String,
    /// Alternative built-in icon number.
    pub alt_icon: i32,
    /// Content-addressed user icon id; zero when none.
    pub user_icon: IconId,
    /// Ordered steps.
    pub steps: Vec<SceneStep>,
}

/// A stored icon set.
#[derive(Debug, Clone)]
pub struct Icon {
    /// Content-addressed id.
    pub id: IconId,
    /// The raw images making up the set.
    pub images: Vec<Vec<u8>>,
}

/// A known client.
#[derive(Debug, Clone)]
pub struct Client {
    /// Client id.
    pub id: ClientId,
    /// GUID presented at first registration.
    pub guid: [u8; supla_proto::GUID_SIZE],
    /// A connection is currently registered for this client.
    pub online: bool,
    /// The client passed superuser authorization.
    pub authorized: bool,
}

/// Derive the content-addressed id of an icon set.
///
/// The first three bytes of the SHA-256 of the concatenated images,
/// big-endian and forced non-zero, so identical icon sets share an id
/// across process restarts.
fn icon_id(images: &[Vec<u8>]) -> IconId {
    let mut hasher = Sha256::new();
    for image in images {
        hasher.update(image);
    }
    let digest = hasher.finalize();
    let id = u32::from_be_bytes([0, digest[0], digest[1], digest[2]]);
    if id == 0 {
        1
    } else {
        id as IconId
    }
}

/// The server's world state.
#[derive(Debug, Default)]
pub struct ServerState {
    devices: Vec<Device>,
    devices_by_guid: HashMap<[u8; supla_proto::GUID_SIZE], DeviceId>,
    channels: Vec<Channel>,
    channels_by_name: HashMap<String, ChannelId>,
    scenes: Vec<Scene>,
    icons: Vec<Icon>,
    clients: Vec<Client>,
    clients_by_guid: HashMap<[u8; supla_proto::GUID_SIZE], ClientId>,
    device_events: HashMap<DeviceId, EventSink>,
    client_events: HashMap<ClientId, EventSink>,
}

impl ServerState {
    /// Create an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    fn device_index(&self, device_id: DeviceId) -> Result<usize, StateError> {
        if device_id < 1 || device_id as usize > self.devices.len() {
            return Err(StateError::UnknownDevice(device_id));
        }
        Ok(device_id as usize - 1)
    }

    fn channel_index(&self, channel_id: ChannelId) -> Result<usize, StateError> {
        if channel_id < 1 || channel_id as usize > self.channels.len() {
            return Err(StateError::UnknownChannel(channel_id));
        }
        Ok(channel_id as usize - 1)
    }

    fn client_index(&self, client_id: ClientId) -> Result<usize, StateError> {
        if client_id < 1 || client_id as usize > self.clients.len() {
            return Err(StateError::UnknownClient(client_id));
        }
        Ok(client_id as usize - 1)
    }

    /// Register a device at configuration time.
    pub fn add_device(
        &mut self,
        name: impl Into<String>,
        guid: [u8; supla_proto::GUID_SIZE],
        manufacturer_id: i16,
        product_id: i16,
    ) -> DeviceId {
        let id = self.devices.len() as DeviceId + 1;
        self.devices.push(Device {
            id,
            name: name.into(),
            guid,
            manufacturer_id,
            product_id,
            channel_ids: Vec::new(),
            proto_version: 0,
            online: false,
        });
        self.devices_by_guid.insert(guid, id);
        id
    }

    /// Add a channel to a device at configuration time.
    ///
    /// Channel names are unique across the whole world; icons are
    /// interned by content.
    #[allow(clippy::too_many_arguments)]
    pub fn add_channel(
        &mut self,
        device_id: DeviceId,
        name: impl Into<String>,
        caption: impl Into<String>,
        channel_type: ChannelType,
        func: ChannelFunc,
        flags: ChannelFlags,
        alt_icon: i32,
        icons: Vec<Vec<u8>>,
        config: Option<ChannelConfig>,
    ) -> Result<ChannelId, StateError> {
        let name = name.into();
        let device_index = self.device_index(device_id)?;
        if self.channels_by_name.contains_key(&name) {
            return Err(StateError::DuplicateChannelName(name));
        }

        let user_icon = if icons.is_empty() { 0 } else { self.intern_icon(icons) };
        let id = self.channels.len() as ChannelId + 1;
        self.channels.push(Channel {
            id,
            device_id,
            name: name.clone(),
            caption: caption.into(),
            channel_type,
            func,
            flags,
            alt_icon,
            user_icon,
            value: [0; supla_proto::CHANNELVALUE_SIZE],
            last_value: None,
            config,
        });
        self.channels_by_name.insert(name, id);
        self.devices[device_index].channel_ids.push(id);
        Ok(id)
    }

    /// Add a scene at configuration time.
    ///
    /// Steps must reference existing channels by name.
    pub fn add_scene(
        &mut self,
        name: impl Into<String>,
        caption: impl Into<String>,
        steps: Vec<SceneStep>,
        alt_icon: i32,
        icons: Vec<Vec<u8>>,
    ) -> Result<SceneId, StateError> {
        for step in &steps {
            if !self.channels_by_name.contains_key(&step.channel_name) {
                return Err(StateError::BadSceneStep(step.channel_name.clone()));
            }
        }
        let user_icon = if icons.is_empty() { 0 } else { self.intern_icon(icons) };
        let id = self.scenes.len() as SceneId + 1;
        self.scenes.push(Scene {
            id,
            name: name.into(),
            caption: caption.into(),
            alt_icon,
            user_icon,
            steps,
        });
        Ok(id)
    }

    fn intern_icon(&mut self, images: Vec<Vec<u8>>) -> IconId {
        let id = icon_id(&images);
        if !self.icons.iter().any(|icon| icon.id == id) {
            self.icons.push(Icon { id, images });
        }
        id
    }

    /// Create a client for a GUID, or return the existing id.
    pub fn add_client(&mut self, guid: [u8; supla_proto::GUID_SIZE]) -> ClientId {
        if let Some(&id) = self.clients_by_guid.get(&guid) {
            return id;
        }
        let id = self.clients.len() as ClientId + 1;
        self.clients.push(Client { id, guid, online: false, authorized: false });
        self.clients_by_guid.insert(guid, id);
        id
    }

    /// Transition a device to online, storing its event sink.
    ///
    /// Returns `false` if the device is already online; the state is
    /// unchanged in that case.
    pub fn device_connected(
        &mut self,
        device_id: DeviceId,
        proto_version: u8,
        events: EventSink,
    ) -> Result<bool, StateError> {
        let index = self.device_index(device_id)?;
        if self.devices[index].online {
            return Ok(false);
        }
        self.devices[index].online = true;
        self.devices[index].proto_version = proto_version;
        self.device_events.insert(device_id, events);
        Ok(true)
    }

    /// Transition a device to offline and drop its event sink.
    pub fn device_disconnected(&mut self, device_id: DeviceId) -> Result<(), StateError> {
        let index = self.device_index(device_id)?;
        self.devices[index].online = false;
        self.device_events.remove(&device_id);
        Ok(())
    }

    /// Bind a connection to a client, storing its event sink.
    ///
    /// Returns `false` if the client already has a live connection.
    pub fn client_connected(
        &mut self,
        client_id: ClientId,
        events: EventSink,
    ) -> Result<bool, StateError> {
        let index = self.client_index(client_id)?;
        if self.clients[index].online {
            return Ok(false);
        }
        self.clients[index].online = true;
        self.client_events.insert(client_id, events);
        Ok(true)
    }

    /// Unbind a client's connection; authorization does not survive it.
    pub fn client_disconnected(&mut self, client_id: ClientId) -> Result<(), StateError> {
        let index = self.client_index(client_id)?;
        self.clients[index].online = false;
        self.clients[index].authorized = false;
        self.client_events.remove(&client_id);
        Ok(())
    }

    /// Mark a client as superuser-authorized for this session.
    pub fn set_client_authorized(&mut self, client_id: ClientId) -> Result<(), StateError> {
        let index = self.client_index(client_id)?;
        self.clients[index].authorized = true;
        Ok(())
    }

    /// Replace a channel's value.
    ///
    /// Dimmer channels additionally retain the most recent non-zero
    /// brightness so a later turn-on can restore it.
    pub fn set_channel_value(
        &mut self,
        channel_id: ChannelId,
        value: ChannelValue,
    ) -> Result<(), StateError> {
        let index = self.channel_index(channel_id)?;
        let channel = &mut self.channels[index];
        channel.value = value;
        if channel.channel_type == ChannelType::Dimmer && value[0] != 0 {
            channel.last_value = Some(value);
        }
        Ok(())
    }

    /// Look up a device.
    pub fn get_device(&self, device_id: DeviceId) -> Result<&Device, StateError> {
        Ok(&self.devices[self.device_index(device_id)?])
    }

    /// Look up a device id by GUID.
    pub fn get_device_id(
        &self,
        guid: &[u8; supla_proto::GUID_SIZE],
    ) -> Result<DeviceId, StateError> {
        self.devices_by_guid
            .get(guid)
            .copied()
            .ok_or_else(|| StateError::UnknownDeviceGuid(hex(guid)))
    }

    /// All devices, in id order.
    pub fn get_devices(&self) -> &[Device] {
        &self.devices
    }

    /// Channel ids of a device, in channel-number order.
    pub fn get_device_channels(&self, device_id: DeviceId) -> Result<&[ChannelId], StateError> {
        Ok(&self.devices[self.device_index(device_id)?].channel_ids)
    }

    /// Look up a channel.
    pub fn get_channel(&self, channel_id: ChannelId) -> Result<&Channel, StateError> {
        Ok(&self.channels[self.channel_index(channel_id)?])
    }

    /// Look up a channel by its world-unique name.
    pub fn get_channel_by_name(&self, name: &str) -> Result<&Channel, StateError> {
        let id = self
            .channels_by_name
            .get(name)
            .ok_or_else(|| StateError::UnknownChannelName(name.to_owned()))?;
        self.get_channel(*id)
    }

    /// All channels, in id order.
    pub fn get_channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Look up a scene.
    pub fn get_scene(&self, scene_id: SceneId) -> Result<&Scene, StateError> {
        if scene_id < 1 || scene_id as usize > self.scenes.len() {
            return Err(StateError::UnknownScene(scene_id));
        }
        Ok(&self.scenes[scene_id as usize - 1])
    }

    /// All scenes, in id order.
    pub fn get_scenes(&self) -> &[Scene] {
        &self.scenes
    }

    /// Look up an icon set.
    pub fn get_icon(&self, icon_id: IconId) -> Result<&Icon, StateError> {
        self.icons
            .iter()
            .find(|icon| icon.id == icon_id)
            .ok_or(StateError::UnknownIcon(icon_id))
    }

    /// All icon sets, in interning order.
    pub fn get_icons(&self) -> &[Icon] {
        &self.icons
    }

    /// Look up a client.
    pub fn get_client(&self, client_id: ClientId) -> Result<&Client, StateError> {
        Ok(&self.clients[self.client_index(client_id)?])
    }

    /// Event sink of a connected device.
    pub fn get_device_events(&self, device_id: DeviceId) -> Result<&EventSink, StateError> {
        self.device_index(device_id)?;
        self.device_events
            .get(&device_id)
            .ok_or(StateError::DeviceNotConnected(device_id))
    }

    /// Event sink of a connected client.
    pub fn get_client_events(&self, client_id: ClientId) -> Result<&EventSink, StateError> {
        self.client_index(client_id)?;
        self.client_events
            .get(&client_id)
            .ok_or(StateError::ClientNotConnected(client_id))
    }

    /// Event sinks of every connected peer, devices first.
    pub fn connected_event_sinks(&self) -> impl Iterator<Item = &EventSink> {
        self.device_events.values().chain(self.client_events.values())
    }
}

/// Lower-case hex rendering used in GUID log lines.
pub fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}
