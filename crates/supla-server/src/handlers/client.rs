//! Client-side call and event handlers.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::Bytes;
use rand::Rng;
use supla_core::{
    state::{Channel, ChannelConfig, ChannelId, SceneStep},
    Event, EventId, EventPayload,
};
use supla_proto::{
    records::{
        client::{
            Action, ActionExecutionResult, ChannelD, ChannelE, ChannelPackD, ChannelPackE,
            ChannelRelationPack, ChannelValueItemB, ChannelValuePackB, Location, LocationPack,
            NewValue, OAuthToken, OAuthTokenRequestResult, RegisterClientD, RegisterClientResultD,
            ScenePack, SceneItem, SuperUserAuthorizationRequest, SuperUserAuthorizationResult,
        },
        config::{
            ChannelConfig as ChannelConfigRecord, ChannelConfigGpm, ChannelConfigUpdateOrResult,
            ChannelStateRequest, DeviceCalCfgRequestB, DeviceCalCfgResultC,
            GetChannelConfigRequest,
        },
        ActionSubjectType, ActionType, ChannelFunc, ChannelType, ChannelValue, ChannelValueB,
        ConfigResult, ConfigType, OAuthResultCode, ResultCode, Target,
    },
    values::{DimmerValue, RelayValue},
    Call, Codec, PROTO_VERSION, PROTO_VERSION_MIN,
};

use crate::{
    connection::{Connection, Peer, SyncPhase},
    error::HandlerError,
    handlers::{common::now_timeval, CallResult},
};

/// `CS_REGISTER_CLIENT_D`: create-or-reuse the client, bind the
/// connection and kick off the startup listing.
///
/// The result is sent imperatively so it is on the wire before the
/// event loop starts pushing the startup packs.
pub async fn register_client(conn: Arc<Connection>, data: Bytes) -> CallResult {
    let (msg, _) = RegisterClientD::decode(&data)?;
    let server = Arc::clone(conn.server());

    let mut state = server.state.lock().await;
    let client_id = state.add_client(msg.guid);
    let connected = state.client_connected(client_id, conn.events.clone())?;
    let channel_count = state.get_channels().len() as i16;
    let scene_count = state.get_scenes().len() as i16;
    drop(state);

    let result_code = if connected {
        conn.set_peer(Peer::Client(client_id));
        conn.set_label(format!("client[{}]", msg.name));
        conn.set_sync_phase(SyncPhase::Channels(0));
        tracing::info!("{} registered; proto={}", conn.label(), conn.proto_version());
        ResultCode::True
    } else {
        tracing::warn!("{} client already connected", conn.label());
        conn.set_errored();
        ResultCode::False
    };

    conn.send(
        Call::ScRegisterClientResultD,
        &RegisterClientResultD {
            result_code,
            client_id,
            location_count: 1,
            channel_count,
            channel_group_count: 0,
            scene_count,
            activity_timeout: conn.activity_timeout_secs(),
            version: PROTO_VERSION,
            version_min: PROTO_VERSION_MIN,
            server_unix_timestamp: now_timeval().tv_sec,
        },
    )
    .await?;

    if connected {
        server.events.send(Event::peer(EventId::ClientConnected, client_id));
        conn.events.send(Event::bare(EventId::SendLocations));
    }
    Ok(None)
}

/// `CS_GET_NEXT`: queue the next startup batch for this client.
pub async fn get_next(conn: Arc<Connection>, _data: Bytes) -> CallResult {
    if !matches!(conn.peer(), Peer::Client(_)) {
        return Ok(None);
    }
    let server = conn.server();
    match conn.sync_phase() {
        SyncPhase::Channels(offset) => {
            let channel_count = server.state.lock().await.get_channels().len();
            conn.events.send(Event::new(
                EventId::SendChannels,
                EventPayload::ChannelBatch { offset },
            ));
            let next = offset + server.config.channelpack_limit;
            if next >= channel_count {
                conn.set_sync_phase(SyncPhase::Relations);
            } else {
                conn.set_sync_phase(SyncPhase::Channels(next));
            }
        },
        SyncPhase::Relations => {
            conn.events.send(Event::bare(EventId::SendChannelRelations));
            conn.set_sync_phase(SyncPhase::Scenes);
        },
        SyncPhase::Scenes => {
            conn.events.send(Event::bare(EventId::SendScenes));
            conn.set_sync_phase(SyncPhase::Done);
        },
        SyncPhase::Done => {},
    }
    Ok(None)
}

fn action_failure(msg: &Action) -> Result<Option<Vec<u8>>, HandlerError> {
    Ok(Some(
        ActionExecutionResult {
            result_code: ResultCode::False,
            action_id: msg.action_id,
            subject_id: msg.subject_id,
            subject_type: msg.subject_type,
        }
        .encode()?,
    ))
}

fn action_success(msg: &Action) -> Result<Option<Vec<u8>>, HandlerError> {
    Ok(Some(
        ActionExecutionResult {
            result_code: ResultCode::True,
            action_id: msg.action_id,
            subject_id: msg.subject_id,
            subject_type: msg.subject_type,
        }
        .encode()?,
    ))
}

/// Value a direct channel action would set, `None` when the action does
/// not apply to the channel.
fn channel_action_value(channel: &Channel, action: ActionType) -> Option<ChannelValue> {
    match channel.channel_type {
        ChannelType::Relay => match action {
            ActionType::TurnOn => Some(RelayValue { on: true, flags: 0 }.encode()),
            ActionType::TurnOff => Some(RelayValue { on: false, flags: 0 }.encode()),
            ActionType::Toggle => Some(RelayValue::toggled(channel.value)),
            _ => None,
        },
        ChannelType::Dimmer => match action {
            ActionType::TurnOff => Some(DimmerValue { brightness: 0 }.encode()),
            ActionType::TurnOn => Some(
                channel.last_value.unwrap_or_else(|| DimmerValue { brightness: 100 }.encode()),
            ),
            _ => None,
        },
        _ => None,
    }
}

/// Value a scene step sets on its channel, `None` when the step does not
/// apply. Differs from direct actions in that a dimmer turn-on may carry
/// an explicit brightness parameter.
fn scene_step_value(channel: &Channel, step: &SceneStep) -> Option<ChannelValue> {
    let param_brightness = step
        .param
        .as_ref()
        .and_then(|param| param.first())
        .map(|&brightness| DimmerValue { brightness }.encode());
    match (channel.channel_type, step.action) {
        (ChannelType::Dimmer, ActionType::TurnOn) => Some(
            param_brightness
                .or(channel.last_value)
                .unwrap_or_else(|| DimmerValue { brightness: 100 }.encode()),
        ),
        (ChannelType::Dimmer, ActionType::Toggle) => {
            if channel.value[0] != 0 {
                Some(DimmerValue { brightness: 0 }.encode())
            } else {
                Some(
                    param_brightness
                        .or(channel.last_value)
                        .unwrap_or_else(|| DimmerValue { brightness: 100 }.encode()),
                )
            }
        },
        _ => channel_action_value(channel, step.action),
    }
}

/// `CS_EXECUTE_ACTION`: drive a channel directly or run a scene.
pub async fn execute_action(conn: Arc<Connection>, data: Bytes) -> CallResult {
    let (msg, _) = Action::decode(&data)?;
    let server = Arc::clone(conn.server());

    match msg.subject_type {
        ActionSubjectType::Channel => {
            let mut state = server.state.lock().await;
            let Ok(channel) = state.get_channel(msg.subject_id) else {
                drop(state);
                tracing::warn!(
                    "{} failed to execute action; channel id {} does not exist",
                    conn.label(),
                    msg.subject_id
                );
                return action_failure(&msg);
            };

            let value = match channel.channel_type {
                ChannelType::Relay | ChannelType::Dimmer => {
                    match channel_action_value(channel, msg.action_id) {
                        Some(value) => value,
                        None => {
                            let kind = channel.channel_type;
                            drop(state);
                            tracing::warn!(
                                "{} failed to execute action; {kind:?} action {:?} not supported",
                                conn.label(),
                                msg.action_id
                            );
                            return action_failure(&msg);
                        },
                    }
                },
                other => {
                    drop(state);
                    tracing::warn!(
                        "{} failed to execute action; channel type {other:?} not supported",
                        conn.label()
                    );
                    return action_failure(&msg);
                },
            };

            state.set_channel_value(msg.subject_id, value)?;
            drop(state);
            server
                .events
                .send(Event::channel_value(EventId::ChannelSetValue, msg.subject_id, value));
            action_success(&msg)
        },

        ActionSubjectType::Scene => {
            if msg.action_id != ActionType::Execute {
                tracing::warn!(
                    "{} failed to execute action; {:?} not implemented",
                    conn.label(),
                    msg.action_id
                );
                return action_failure(&msg);
            }

            let mut state = server.state.lock().await;
            let Ok(scene) = state.get_scene(msg.subject_id) else {
                drop(state);
                tracing::warn!(
                    "{} failed to execute action; scene id {} does not exist",
                    conn.label(),
                    msg.subject_id
                );
                return action_failure(&msg);
            };

            // Resolve every step before applying anything so a bad scene
            // leaves state unchanged.
            let steps = scene.steps.clone();
            let mut updates: Vec<(ChannelId, ChannelValue)> = Vec::with_capacity(steps.len());
            for step in &steps {
                let Ok(channel) = state.get_channel_by_name(&step.channel_name) else {
                    drop(state);
                    tracing::warn!(
                        "{} failed to execute action; scene step channel {:?} does not exist",
                        conn.label(),
                        step.channel_name
                    );
                    return action_failure(&msg);
                };
                let Some(value) = scene_step_value(channel, step) else {
                    let kind = channel.channel_type;
                    drop(state);
                    tracing::warn!(
                        "{} failed to execute action; scene step {:?} not supported on {kind:?}",
                        conn.label(),
                        step.action
                    );
                    return action_failure(&msg);
                };
                updates.push((channel.id, value));
            }
            for (channel_id, value) in &updates {
                state.set_channel_value(*channel_id, *value)?;
            }
            drop(state);
            for (channel_id, value) in updates {
                server
                    .events
                    .send(Event::channel_value(EventId::ChannelSetValue, channel_id, value));
            }
            action_success(&msg)
        },

        other => {
            tracing::warn!(
                "{} failed to execute action; subject type {other:?} not supported",
                conn.label()
            );
            action_failure(&msg)
        },
    }
}

/// `CS_SET_VALUE`: one-way raw value write to a channel.
pub async fn set_value(conn: Arc<Connection>, data: Bytes) -> CallResult {
    let (msg, _) = NewValue::decode(&data)?;
    if msg.target != Target::Channel {
        tracing::error!("{} failed to set value; target not supported", conn.label());
        return Ok(None);
    }
    let server = conn.server();
    let mut state = server.state.lock().await;
    if state.get_channel(msg.value_id).is_err() {
        drop(state);
        tracing::error!(
            "{} failed to set value; channel id {} does not exist",
            conn.label(),
            msg.value_id
        );
        return Ok(None);
    }
    state.set_channel_value(msg.value_id, msg.value)?;
    drop(state);
    server
        .events
        .send(Event::channel_value(EventId::ChannelSetValue, msg.value_id, msg.value));
    Ok(None)
}

/// `CS_GET_CHANNEL_CONFIG`: answer with the channel's typed config when
/// it has one.
pub async fn get_channel_config(conn: Arc<Connection>, data: Bytes) -> CallResult {
    let (msg, _) = GetChannelConfigRequest::decode(&data)?;
    let server = conn.server();
    let state = server.state.lock().await;

    let Ok(channel) = state.get_channel(msg.channel_id) else {
        drop(state);
        tracing::error!(
            "{} failed to get channel config; channel id {} does not exist",
            conn.label(),
            msg.channel_id
        );
        return Ok(Some(
            ChannelConfigUpdateOrResult {
                result: ConfigResult::False,
                config: ChannelConfigRecord {
                    channel_id: msg.channel_id,
                    func: ChannelFunc::None,
                    config_type: ConfigType::Default,
                    config: vec![],
                },
            }
            .encode()?,
        ));
    };

    let config_blob = match &channel.config {
        Some(ChannelConfig::GeneralPurposeMeasurement(config)) => {
            Some(ChannelConfigGpm::from(config).encode()?)
        },
        None => None,
    };
    let func = channel.func;
    drop(state);

    Ok(Some(
        ChannelConfigUpdateOrResult {
            result: if config_blob.is_some() { ConfigResult::True } else { ConfigResult::False },
            config: ChannelConfigRecord {
                channel_id: msg.channel_id,
                func,
                config_type: ConfigType::Default,
                config: config_blob.unwrap_or_default(),
            },
        }
        .encode()?,
    ))
}

/// `CSD_GET_CHANNEL_STATE` from a client: queue the query on the owning
/// device, stamped with the real client id.
pub async fn get_channel_state(conn: Arc<Connection>, data: Bytes) -> CallResult {
    let (msg, _) = ChannelStateRequest::decode(&data)?;
    let Peer::Client(client_id) = conn.peer() else {
        tracing::warn!("{} channel state request before registration", conn.label());
        return Ok(None);
    };
    let server = conn.server();
    let state = server.state.lock().await;
    let channel = state.get_channel(msg.channel_id)?;
    // the wire sender id is always zero; the connection knows who asks
    let events = state.get_device_events(channel.device_id)?.clone();
    drop(state);
    events.send(Event::new(
        EventId::GetChannelState,
        EventPayload::GetChannelState { sender_id: client_id, channel_id: msg.channel_id },
    ));
    Ok(None)
}

/// `CS_SUPERUSER_AUTHORIZATION_REQUEST`: check credentials against the
/// configured account.
pub async fn superuser_authorization(conn: Arc<Connection>, data: Bytes) -> CallResult {
    let (msg, _) = SuperUserAuthorizationRequest::decode(&data)?;
    let Peer::Client(client_id) = conn.peer() else {
        tracing::warn!("{} authorization request before registration", conn.label());
        return Ok(None);
    };
    let server = conn.server();
    let result = if msg.email == server.config.email && msg.password == server.config.password {
        tracing::info!("{} authorized", conn.label());
        server.state.lock().await.set_client_authorized(client_id)?;
        ResultCode::Authorized
    } else {
        tracing::warn!("{} unauthorized", conn.label());
        ResultCode::Unauthorized
    };
    conn.send(
        Call::ScSuperuserAuthorizationResult,
        &SuperUserAuthorizationResult { result },
    )
    .await?;
    Ok(None)
}

/// `CS_OAUTH_TOKEN_REQUEST`: issue a random key plus the API URL.
///
/// No real OAuth; the key is random and trusted by convention.
pub async fn oauth_token_request(conn: Arc<Connection>, _data: Bytes) -> CallResult {
    const HEX_CHARS: &[u8] = b"0123456789abcdef";
    let server = conn.server();

    let mut rng = rand::thread_rng();
    let key: String =
        (0..86).map(|_| HEX_CHARS[rng.gen_range(0..HEX_CHARS.len())] as char).collect();
    let url = format!("https://{}:{}", server.config.host, server.api_port());

    let mut token = key.into_bytes();
    token.push(b'.');
    token.extend_from_slice(BASE64.encode(url.as_bytes()).as_bytes());
    token.push(0);

    Ok(Some(
        OAuthTokenRequestResult {
            result_code: OAuthResultCode::Success,
            token: OAuthToken { expires_in: 300, token },
        }
        .encode()?,
    ))
}

/// `CS_DEVICE_CALCFG_REQUEST_B`: queue a calcfg request on the owning
/// device.
pub async fn calcfg_request(conn: Arc<Connection>, data: Bytes) -> CallResult {
    let (msg, _) = DeviceCalCfgRequestB::decode(&data)?;
    let Peer::Client(client_id) = conn.peer() else {
        tracing::warn!("{} calcfg request before registration", conn.label());
        return Ok(None);
    };
    let server = conn.server();
    let state = server.state.lock().await;
    let Ok(channel) = state.get_channel(msg.channel_id) else {
        drop(state);
        tracing::error!(
            "{} failed calcfg request; channel id {} does not exist",
            conn.label(),
            msg.channel_id
        );
        return Ok(None);
    };
    let device_id = channel.device_id;
    let device = state.get_device(device_id)?;
    let Some(channel_number) = device.channel_number(channel.id) else {
        return Ok(None);
    };
    let Ok(events) = state.get_device_events(device_id).cloned() else {
        drop(state);
        tracing::error!(
            "{} failed calcfg request; device id {device_id} is not connected",
            conn.label()
        );
        return Ok(None);
    };
    drop(state);
    events.send(Event::new(
        EventId::DeviceConfig,
        EventPayload::CalCfgRequest { request: msg, client_id, channel_number },
    ));
    Ok(None)
}

/// `SEND_LOCATIONS`: push the single configured location.
pub async fn on_send_locations(conn: Arc<Connection>, _event: Event) -> Result<(), HandlerError> {
    let server = conn.server();
    let pack = LocationPack {
        total_left: 0,
        items: vec![Location { eol: true, id: 1, caption: server.config.location_name.clone() }],
    };
    conn.send(Call::ScLocationPackUpdate, &pack).await
}

/// `SEND_CHANNELS`: push one channel batch, in the shape the client's
/// protocol version understands.
pub async fn on_send_channels(conn: Arc<Connection>, event: Event) -> Result<(), HandlerError> {
    let EventPayload::ChannelBatch { offset } = event.payload else {
        return Ok(());
    };
    let server = conn.server();
    let limit = server.config.channelpack_limit;
    // Older clients get the narrower D shape without config checksums.
    let shape_e = conn.proto_version() >= 23;

    let state = server.state.lock().await;
    let channels = state.get_channels();
    let end = (offset + limit).min(channels.len());
    let total_left = (channels.len() - end) as i32;

    let packet = if shape_e {
        let mut items = Vec::with_capacity(end.saturating_sub(offset));
        for channel in &channels[offset.min(end)..end] {
            let device = state.get_device(channel.device_id)?;
            let default_config_crc32 = match &channel.config {
                Some(ChannelConfig::GeneralPurposeMeasurement(config)) => {
                    ChannelConfigGpm::from(config).crc32()?
                },
                None => 0,
            };
            items.push(ChannelE {
                eol: false,
                id: channel.id,
                device_id: channel.device_id,
                location_id: 1,
                channel_type: channel.channel_type,
                func: channel.func,
                alt_icon: channel.alt_icon,
                user_icon: channel.user_icon,
                manufacturer_id: device.manufacturer_id,
                product_id: device.product_id,
                default_config_crc32,
                flags: channel.flags,
                protocol_version: device.proto_version,
                online: device.online,
                value: ChannelValueB::new(channel.value),
                caption: channel.caption.clone(),
            });
        }
        if let Some(last) = items.last_mut() {
            last.eol = true;
        }
        let pack = ChannelPackE { total_left, items };
        (Call::ScChannelPackUpdateE, pack.encode()?)
    } else {
        let mut items = Vec::with_capacity(end.saturating_sub(offset));
        for channel in &channels[offset.min(end)..end] {
            let device = state.get_device(channel.device_id)?;
            items.push(ChannelD {
                eol: false,
                id: channel.id,
                device_id: channel.device_id,
                location_id: 1,
                channel_type: channel.channel_type,
                func: channel.func,
                alt_icon: channel.alt_icon,
                user_icon: channel.user_icon,
                manufacturer_id: device.manufacturer_id,
                product_id: device.product_id,
                flags: channel.flags,
                protocol_version: device.proto_version,
                online: device.online,
                value: ChannelValueB::new(channel.value),
                caption: channel.caption.clone(),
            });
        }
        if let Some(last) = items.last_mut() {
            last.eol = true;
        }
        let pack = ChannelPackD { total_left, items };
        (Call::ScChannelPackUpdateD, pack.encode()?)
    };
    drop(state);

    conn.send_packet(&supla_proto::packets::Packet::new(packet.0, packet.1)).await
}

/// `SEND_CHANNEL_RELATIONS`: no channel hierarchies here; push an empty
/// listing so the client's pump can move on.
pub async fn on_send_channel_relations(
    conn: Arc<Connection>,
    _event: Event,
) -> Result<(), HandlerError> {
    let pack = ChannelRelationPack { total_left: 0, items: vec![] };
    conn.send(Call::ScChannelRelationPackUpdate, &pack).await
}

/// `SEND_SCENES`: push the scene listing.
pub async fn on_send_scenes(conn: Arc<Connection>, _event: Event) -> Result<(), HandlerError> {
    let server = conn.server();
    let state = server.state.lock().await;
    let mut items: Vec<SceneItem> = state
        .get_scenes()
        .iter()
        .map(|scene| SceneItem {
            eol: false,
            id: scene.id,
            location_id: 1,
            alt_icon: scene.alt_icon,
            user_icon: scene.user_icon,
            caption: scene.caption.clone(),
        })
        .collect();
    drop(state);
    if let Some(last) = items.last_mut() {
        last.eol = true;
    }
    conn.send(Call::ScScenePackUpdate, &ScenePack { total_left: 0, items }).await
}

/// `DEVICE_CONNECTED`/`DEVICE_DISCONNECTED`: refresh the values of the
/// device's channels on this client.
pub async fn on_device_connection_changed(
    conn: Arc<Connection>,
    event: Event,
) -> Result<(), HandlerError> {
    let EventPayload::Peer(device_id) = event.payload else {
        return Ok(());
    };
    let server = conn.server();
    let limit = server.config.channelvalue_pack_limit;

    let state = server.state.lock().await;
    let Ok(device) = state.get_device(device_id) else {
        return Ok(());
    };
    let online = device.online;
    let channel_ids = device.channel_ids.clone();

    let mut packs = Vec::new();
    let mut total_left = channel_ids.len() as i32;
    for batch in channel_ids.chunks(limit.max(1)) {
        let mut items = Vec::with_capacity(batch.len());
        for &channel_id in batch {
            let channel = state.get_channel(channel_id)?;
            items.push(ChannelValueItemB {
                eol: false,
                id: channel.id,
                online,
                value: ChannelValueB::new(channel.value),
            });
        }
        if let Some(last) = items.last_mut() {
            last.eol = true;
        }
        total_left -= batch.len() as i32;
        packs.push(ChannelValuePackB { total_left, items });
    }
    drop(state);

    for pack in packs {
        conn.send(Call::ScChannelValuePackUpdateB, &pack).await?;
    }
    Ok(())
}

/// `CHANNEL_VALUE_CHANGED`: push a single-channel value update.
pub async fn on_channel_value_changed(
    conn: Arc<Connection>,
    event: Event,
) -> Result<(), HandlerError> {
    let EventPayload::ChannelValue { channel_id, value } = event.payload else {
        return Ok(());
    };
    let pack = ChannelValuePackB {
        total_left: 0,
        items: vec![ChannelValueItemB {
            eol: true,
            id: channel_id,
            online: true,
            value: ChannelValueB::new(value),
        }],
    };
    conn.send(Call::ScChannelValuePackUpdateB, &pack).await
}

/// `CHANNEL_STATE_RESULT`: relay a device's state report, re-addressed
/// to the world-wide channel id.
pub async fn on_channel_state_result(
    conn: Arc<Connection>,
    event: Event,
) -> Result<(), HandlerError> {
    let EventPayload::ChannelStateResult { state, channel_id } = event.payload else {
        return Ok(());
    };
    conn.send(Call::DscChannelStateResult, &state.into_result(channel_id)).await
}

/// `DEVICE_CONFIG_RESULT`: relay a device's calcfg result.
pub async fn on_calcfg_result(conn: Arc<Connection>, event: Event) -> Result<(), HandlerError> {
    let EventPayload::CalCfgResult { result, channel_id } = event.payload else {
        return Ok(());
    };
    conn.send(
        Call::ScDeviceCalcfgResult,
        &DeviceCalCfgResultC {
            channel_id,
            command: result.command,
            result: result.result,
            data: result.data,
        },
    )
    .await
}
