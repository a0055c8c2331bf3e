//! Shared fixtures for the integration suites.
//!
//! The world mirrors a small installation: a three-channel relay/sensor
//! device, a dimmer, two measurement-only devices and three scenes. The
//! channel-pack batch size is lowered so the startup listing spans
//! several packs.

#![allow(dead_code)]

use std::time::Duration;

use supla_client::{client::ClientConfig, transport, Client, ClientStream};
use supla_core::{
    state::{ChannelConfig, GpmConfig, SceneStep, ServerState},
    StateError,
};
use supla_proto::{
    packets::Packet,
    records::{
        device::{DeviceChannelC, RegisterDeviceE, RegisterDeviceResult},
        ActionCaps, ActionType, ChannelFlags, ChannelFunc, ChannelType, DeviceFlags, ResultCode,
    },
    Call, Codec,
};
use supla_server::{handlers, RuntimeConfig, Server};

/// GUID of the fixture device `n`.
pub fn device_guid(n: u8) -> [u8; 16] {
    let mut guid = [0u8; 16];
    guid[0] = n;
    guid
}

/// Runtime settings for tests: loopback only, random ports, small packs.
pub fn test_config() -> RuntimeConfig {
    RuntimeConfig {
        channelpack_limit: 5,
        activity_timeout: Duration::from_secs(30),
        location_name: "Test".to_owned(),
        email: "email@email.com".to_owned(),
        password: "password123".to_owned(),
        ..RuntimeConfig::default()
    }
}

/// The fixture world.
pub fn setup_state() -> Result<ServerState, StateError> {
    let mut state = ServerState::new();

    let device = state.add_device("device-1", device_guid(1), 0, 0);
    state.add_channel(
        device,
        "relay",
        "Relay",
        ChannelType::Relay,
        ChannelFunc::PowerSwitch,
        ChannelFlags::CHANNELSTATE,
        0,
        vec![],
        None,
    )?;
    state.add_channel(
        device,
        "thermometer",
        "Thermometer",
        ChannelType::Thermometer,
        ChannelFunc::Thermometer,
        ChannelFlags::CHANNELSTATE,
        0,
        vec![],
        None,
    )?;
    state.add_channel(
        device,
        "relay2",
        "Relay2",
        ChannelType::Relay,
        ChannelFunc::PowerSwitch,
        ChannelFlags::CHANNELSTATE,
        0,
        vec![],
        None,
    )?;

    let device = state.add_device("device-2", device_guid(2), 7, 1);
    state.add_channel(
        device,
        "lights",
        "Lights",
        ChannelType::Dimmer,
        ChannelFunc::Dimmer,
        ChannelFlags::CHANNELSTATE,
        1,
        vec![],
        None,
    )?;

    let device = state.add_device("device-3", device_guid(3), 0, 0);
    state.add_channel(
        device,
        "gpm-1",
        "Measurement 1",
        ChannelType::GeneralPurposeMeasurement,
        ChannelFunc::GeneralPurposeMeasurement,
        ChannelFlags::CHANNELSTATE,
        0,
        vec![],
        Some(ChannelConfig::GeneralPurposeMeasurement(GpmConfig::default())),
    )?;
    state.add_channel(
        device,
        "gpm-2",
        "Measurement 2",
        ChannelType::GeneralPurposeMeasurement,
        ChannelFunc::GeneralPurposeMeasurement,
        ChannelFlags::CHANNELSTATE,
        0,
        vec![],
        Some(ChannelConfig::GeneralPurposeMeasurement(GpmConfig {
            value_divider: 10,
            value_added: 42,
            unit_after_value: "%".to_owned(),
            no_space_after_value: true,
            ..GpmConfig::default()
        })),
    )?;

    let device = state.add_device("device-4", device_guid(4), 0, 0);
    state.add_channel(
        device,
        "lights-2",
        "Lights 2",
        ChannelType::Relay,
        ChannelFunc::LightSwitch,
        ChannelFlags::CHANNELSTATE,
        0,
        vec![b"icon1".to_vec(), b"icon2".to_vec()],
        None,
    )?;
    state.add_channel(
        device,
        "gpm-3",
        "Measurement 3",
        ChannelType::GeneralPurposeMeasurement,
        ChannelFunc::GeneralPurposeMeasurement,
        ChannelFlags::CHANNELSTATE,
        0,
        vec![b"icon3".to_vec()],
        Some(ChannelConfig::GeneralPurposeMeasurement(GpmConfig::default())),
    )?;
    state.add_channel(
        device,
        "gpm-4",
        "Measurement 4",
        ChannelType::GeneralPurposeMeasurement,
        ChannelFunc::GeneralPurposeMeasurement,
        ChannelFlags::CHANNELSTATE,
        0,
        vec![b"icon3".to_vec()],
        Some(ChannelConfig::GeneralPurposeMeasurement(GpmConfig::default())),
    )?;

    state.add_scene(
        "scene-1",
        "Scene 1",
        vec![
            SceneStep {
                channel_name: "relay".to_owned(),
                action: ActionType::TurnOn,
                param: None,
            },
            SceneStep {
                channel_name: "relay2".to_owned(),
                action: ActionType::TurnOff,
                param: None,
            },
        ],
        0,
        vec![],
    )?;
    state.add_scene(
        "scene-2",
        "Scene 2",
        vec![SceneStep {
            channel_name: "lights".to_owned(),
            action: ActionType::TurnOn,
            param: Some(vec![10]),
        }],
        3,
        vec![],
    )?;
    state.add_scene(
        "scene-3",
        "Scene 3",
        vec![SceneStep {
            channel_name: "lights-2".to_owned(),
            action: ActionType::Toggle,
            param: None,
        }],
        0,
        vec![b"icon3".to_vec()],
    )?;

    Ok(state)
}

/// Start a server over the fixture world.
pub async fn start_server() -> Server {
    start_server_with(test_config()).await
}

/// Start a server over the fixture world with custom runtime settings.
pub async fn start_server_with(config: RuntimeConfig) -> Server {
    let state = setup_state().expect("fixture state");
    let registry = handlers::default_registry().build();
    Server::start(config, state, registry).await.expect("server start")
}

/// Open a raw packet stream to the server.
pub async fn open_connection(server: &Server, secure: bool) -> ClientStream {
    let port = if secure { server.secure_port() } else { server.port() };
    transport::connect("127.0.0.1", port, secure).await.expect("connect")
}

/// The registration record fixture device `n` would send.
pub fn register_device_message(device_id: u8) -> RegisterDeviceE {
    let channel = |number, channel_type, caps, func| DeviceChannelC {
        number,
        channel_type,
        action_trigger_caps: caps,
        default_func: func,
        flags: ChannelFlags::CHANNELSTATE,
        value: [0; 8],
    };
    let (manufacturer_id, product_id, channels) = match device_id {
        1 => (
            0,
            0,
            vec![
                channel(
                    0,
                    ChannelType::Relay,
                    ActionCaps::TURN_ON | ActionCaps::TURN_OFF,
                    ChannelFunc::PowerSwitch,
                ),
                channel(1, ChannelType::Thermometer, ActionCaps::NONE, ChannelFunc::Thermometer),
                channel(
                    2,
                    ChannelType::Relay,
                    ActionCaps::TURN_ON | ActionCaps::TURN_OFF,
                    ChannelFunc::PowerSwitch,
                ),
            ],
        ),
        2 => (7, 1, vec![channel(0, ChannelType::Dimmer, ActionCaps::NONE, ChannelFunc::Dimmer)]),
        3 => (
            0,
            0,
            vec![
                channel(
                    0,
                    ChannelType::GeneralPurposeMeasurement,
                    ActionCaps::NONE,
                    ChannelFunc::GeneralPurposeMeasurement,
                ),
                channel(
                    1,
                    ChannelType::GeneralPurposeMeasurement,
                    ActionCaps::NONE,
                    ChannelFunc::GeneralPurposeMeasurement,
                ),
            ],
        ),
        4 => (
            0,
            0,
            vec![
                channel(0, ChannelType::Relay, ActionCaps::NONE, ChannelFunc::LightSwitch),
                channel(
                    1,
                    ChannelType::GeneralPurposeMeasurement,
                    ActionCaps::NONE,
                    ChannelFunc::GeneralPurposeMeasurement,
                ),
                channel(
                    2,
                    ChannelType::GeneralPurposeMeasurement,
                    ActionCaps::NONE,
                    ChannelFunc::GeneralPurposeMeasurement,
                ),
            ],
        ),
        other => panic!("no fixture device {other}"),
    };

    RegisterDeviceE {
        email: "email@example.com".to_owned(),
        guid: device_guid(device_id),
        authkey: [0xAB; 16],
        name: format!("Device #{device_id}"),
        soft_ver: "1.2.3".to_owned(),
        server_name: "localhost".to_owned(),
        flags: DeviceFlags::NONE,
        manufacturer_id,
        product_id,
        channels,
    }
}

/// Register fixture device `n` over a raw stream, asserting success.
pub async fn register_device(stream: &mut ClientStream, device_id: u8) {
    let msg = register_device_message(device_id);
    stream
        .send(&Packet::new(Call::DsRegisterDeviceE, msg.encode().expect("encode")))
        .await
        .expect("send");
    let packet = stream.recv().await.expect("register result");
    assert_eq!(packet.call_id, Call::SdRegisterDeviceResult);
    let (result, _) = RegisterDeviceResult::decode(&packet.data).expect("decode");
    assert_eq!(result.result_code, ResultCode::True);
    assert!(result.activity_timeout >= supla_proto::ACTIVITY_TIMEOUT_MIN);
}

/// Open a raw stream with fixture device `n` registered.
pub async fn open_device(server: &Server, device_id: u8, secure: bool) -> ClientStream {
    let mut stream = open_connection(server, secure).await;
    register_device(&mut stream, device_id).await;
    stream
}

/// Register a client by name (stable GUID per name) and pump the
/// startup listing.
pub async fn open_client(server: &Server, name: &str) -> Client {
    let config = ClientConfig::new("127.0.0.1", server.port(), name);
    Client::register(config).await.expect("client register")
}
