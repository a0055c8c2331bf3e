//! Server configuration model.
//!
//! The whole world — devices, channels, scenes, icons — is declared in a
//! TOML file and loaded once at startup; there is no dynamic onboarding.
//! This module only models and validates the configuration; the server
//! binary does the actual TOML parsing and hands the result to
//! [`build_state`].

use std::path::{Path, PathBuf};

use serde::Deserialize;
use supla_proto::records::{ActionType, ChannelFlags, ChannelFunc, ChannelType};

use crate::{
    error::ConfigError,
    state::{ChannelConfig, GpmConfig, SceneStep, ServerState},
};

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Listener and credential settings.
    pub server: ServerSection,
    /// Configured devices.
    #[serde(default)]
    pub devices: Vec<DeviceSection>,
    /// Configured scenes.
    #[serde(default)]
    pub scenes: Vec<SceneSection>,
}

/// Listener addresses, TLS material and account credentials.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// Address the listeners bind to.
    #[serde(default = "default_listen_host")]
    pub listen_host: String,
    /// Hostname advertised to peers (OAuth URLs, API links).
    pub host: String,
    /// Plain TCP listener port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// TLS listener port.
    #[serde(default = "default_secure_port")]
    pub secure_port: u16,
    /// HTTPS API listener port.
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    /// PEM certificate chain; self-signed when absent.
    #[serde(default)]
    pub certfile: Option<PathBuf>,
    /// PEM private key; self-signed when absent.
    #[serde(default)]
    pub keyfile: Option<PathBuf>,
    /// Caption of the single location every channel lives in.
    pub location_name: String,
    /// Account email checked by superuser authorization.
    pub email: String,
    /// Account password checked by superuser authorization.
    pub password: String,
    /// Activity timeout handed to registering peers, in seconds.
    #[serde(default = "default_activity_timeout")]
    pub activity_timeout: u8,
}

fn default_listen_host() -> String {
    "0.0.0.0".to_owned()
}

fn default_port() -> u16 {
    2015
}

fn default_secure_port() -> u16 {
    2016
}

fn default_api_port() -> u16 {
    5000
}

fn default_activity_timeout() -> u8 {
    supla_proto::ACTIVITY_TIMEOUT_DEFAULT
}

/// One configured device.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceSection {
    /// Device name; used in logs.
    pub name: String,
    /// GUID as 32 hex digits.
    pub guid: String,
    /// Expected manufacturer id.
    #[serde(default)]
    pub manufacturer_id: i16,
    /// Expected product id.
    #[serde(default)]
    pub product_id: i16,
    /// The device's channels, in channel-number order.
    pub channels: Vec<ChannelSection>,
}

/// Channel hardware kinds accepted in configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelKind {
    /// Binary relay output.
    Relay,
    /// Temperature sensor.
    Thermometer,
    /// Humidity sensor.
    HumiditySensor,
    /// Combined temperature and humidity sensor.
    HumidityAndTempSensor,
    /// Dimmable light output.
    Dimmer,
    /// Free-form numeric measurement.
    GeneralPurposeMeasurement,
}

impl ChannelKind {
    fn channel_type(self) -> ChannelType {
        match self {
            Self::Relay => ChannelType::Relay,
            Self::Thermometer => ChannelType::Thermometer,
            Self::HumiditySensor => ChannelType::HumiditySensor,
            Self::HumidityAndTempSensor => ChannelType::HumidityAndTempSensor,
            Self::Dimmer => ChannelType::Dimmer,
            Self::GeneralPurposeMeasurement => ChannelType::GeneralPurposeMeasurement,
        }
    }
}

/// Channel functions accepted in configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelRole {
    /// Thermometer readout.
    Thermometer,
    /// Humidity readout.
    Humidity,
    /// Combined temperature and humidity readout.
    HumidityAndTemperature,
    /// Generic power switch.
    PowerSwitch,
    /// Light switch.
    LightSwitch,
    /// Dimmer output.
    Dimmer,
    /// General purpose measurement readout.
    GeneralPurposeMeasurement,
}

impl ChannelRole {
    fn func(self) -> ChannelFunc {
        match self {
            Self::Thermometer => ChannelFunc::Thermometer,
            Self::Humidity => ChannelFunc::Humidity,
            Self::HumidityAndTemperature => ChannelFunc::HumidityAndTemperature,
            Self::PowerSwitch => ChannelFunc::PowerSwitch,
            Self::LightSwitch => ChannelFunc::LightSwitch,
            Self::Dimmer => ChannelFunc::Dimmer,
            Self::GeneralPurposeMeasurement => ChannelFunc::GeneralPurposeMeasurement,
        }
    }
}

/// One configured channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelSection {
    /// World-unique channel name.
    pub name: String,
    /// Display name pushed to clients.
    pub caption: String,
    /// Hardware kind.
    #[serde(rename = "type")]
    pub kind: ChannelKind,
    /// Configured function.
    pub func: ChannelRole,
    /// Alternative built-in icon number.
    #[serde(default)]
    pub alt_icon: i32,
    /// Icon image files, light variant first.
    #[serde(default)]
    pub icons: Vec<PathBuf>,
    /// Display config for general purpose measurement channels.
    #[serde(default)]
    pub config: Option<GpmConfig>,
}

/// Scene actions accepted in configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SceneAction {
    /// Switch the channel on.
    TurnOn,
    /// Switch the channel off.
    TurnOff,
    /// Invert the channel.
    Toggle,
}

impl SceneAction {
    fn action(self) -> ActionType {
        match self {
            Self::TurnOn => ActionType::TurnOn,
            Self::TurnOff => ActionType::TurnOff,
            Self::Toggle => ActionType::Toggle,
        }
    }
}

/// One configured scene.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SceneSection {
    /// Scene name.
    pub name: String,
    /// Display name pushed to clients.
    pub caption: String,
    /// Alternative built-in icon number.
    #[serde(default)]
    pub alt_icon: i32,
    /// Icon image files.
    #[serde(default)]
    pub icons: Vec<PathBuf>,
    /// Ordered steps.
    pub steps: Vec<SceneStepSection>,
}

/// One configured scene step.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SceneStepSection {
    /// Name of the channel the step drives.
    pub channel: String,
    /// Action applied to the channel.
    pub action: SceneAction,
    /// Brightness parameter for dimmer turn-on steps.
    #[serde(default)]
    pub brightness: Option<u8>,
}

fn parse_guid(guid: &str) -> Result<[u8; supla_proto::GUID_SIZE], ConfigError> {
    let bad = |reason| ConfigError::BadGuid { guid: guid.to_owned(), reason };
    if guid.len() != supla_proto::GUID_SIZE * 2 {
        return Err(bad("expected 32 hex digits"));
    }
    let mut out = [0u8; supla_proto::GUID_SIZE];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&guid[i * 2..i * 2 + 2], 16)
            .map_err(|_| bad("expected 32 hex digits"))?;
    }
    Ok(out)
}

fn load_icons(base: &Path, paths: &[PathBuf]) -> Result<Vec<Vec<u8>>, ConfigError> {
    paths
        .iter()
        .map(|path| {
            let resolved = if path.is_absolute() { path.clone() } else { base.join(path) };
            std::fs::read(&resolved).map_err(|source| ConfigError::Icon {
                path: resolved.display().to_string(),
                source,
            })
        })
        .collect()
}

/// Build the world state a configuration describes.
///
/// Relative icon paths are resolved against `base`, normally the
/// directory the config file was read from.
pub fn build_state(config: &Config, base: &Path) -> Result<ServerState, ConfigError> {
    let mut state = ServerState::new();

    for device in &config.devices {
        let guid = parse_guid(&device.guid)?;
        let device_id =
            state.add_device(&device.name, guid, device.manufacturer_id, device.product_id);
        for channel in &device.channels {
            let icons = load_icons(base, &channel.icons)?;
            state.add_channel(
                device_id,
                &channel.name,
                &channel.caption,
                channel.kind.channel_type(),
                channel.func.func(),
                ChannelFlags::CHANNELSTATE,
                channel.alt_icon,
                icons,
                channel.config.clone().map(ChannelConfig::GeneralPurposeMeasurement),
            )?;
        }
    }

    for scene in &config.scenes {
        let icons = load_icons(base, &scene.icons)?;
        let steps = scene
            .steps
            .iter()
            .map(|step| SceneStep {
                channel_name: step.channel.clone(),
                action: step.action.action(),
                param: step.brightness.map(|b| vec![b]),
            })
            .collect();
        state.add_scene(&scene.name, &scene.caption, steps, scene.alt_icon, icons)?;
    }

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [server]
        host = "192.168.1.10"
        location_name = "Home"
        email = "email@email.com"
        password = "password123"

        [[devices]]
        name = "device-1"
        guid = "01000000000000000000000000000000"

        [[devices.channels]]
        name = "relay"
        caption = "Relay"
        type = "relay"
        func = "power-switch"

        [[devices.channels]]
        name = "lights"
        caption = "Lights"
        type = "dimmer"
        func = "dimmer"
        alt_icon = 1

        [[devices.channels]]
        name = "gpm-1"
        caption = "Measurement 1"
        type = "general-purpose-measurement"
        func = "general-purpose-measurement"

        [devices.channels.config]
        value_divider = 10
        value_added = 42
        unit_after_value = "%"
        no_space_after_value = true

        [[scenes]]
        name = "all-off"
        caption = "All Off"

        [[scenes.steps]]
        channel = "relay"
        action = "turn-off"

        [[scenes.steps]]
        channel = "lights"
        action = "turn-on"
        brightness = 10
    "#;

    #[test]
    fn sample_config_builds_a_world() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.server.port, 2015);
        assert_eq!(config.server.listen_host, "0.0.0.0");

        let state = build_state(&config, Path::new(".")).unwrap();
        assert_eq!(state.get_devices().len(), 1);
        assert_eq!(state.get_channels().len(), 3);
        assert_eq!(state.get_channel_by_name("lights").unwrap().alt_icon, 1);

        let gpm = state.get_channel_by_name("gpm-1").unwrap();
        match &gpm.config {
            Some(ChannelConfig::GeneralPurposeMeasurement(config)) => {
                assert_eq!(config.value_divider, 10);
                assert_eq!(config.unit_after_value, "%");
                assert!(config.no_space_after_value);
            },
            other => panic!("unexpected config {other:?}"),
        }

        let scene = state.get_scene(1).unwrap();
        assert_eq!(scene.steps.len(), 2);
        assert_eq!(scene.steps[1].param.as_deref(), Some(&[10][..]));
    }

    #[test]
    fn bad_guid_is_rejected() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        config.devices[0].guid = "xyz".to_owned();
        let err = build_state(&config, Path::new(".")).unwrap_err();
        assert!(matches!(err, ConfigError::BadGuid { .. }));
    }

    #[test]
    fn scene_step_must_reference_known_channel() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        config.scenes[0].steps[0].channel = "missing".to_owned();
        let err = build_state(&config, Path::new(".")).unwrap_err();
        assert!(matches!(err, ConfigError::State(_)));
    }
}
