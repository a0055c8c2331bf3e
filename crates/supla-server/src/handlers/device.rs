//! Device-side call and event handlers.

use std::sync::Arc;

use bytes::Bytes;
use supla_core::{
    state::hex, Event, EventId, EventPayload,
};
use supla_proto::{
    records::{
        config::{ChannelState, DeviceCalCfgRequest, DeviceCalCfgResult, DeviceChannelStateRequest},
        device::{
            ChannelNewValue, ChannelNewValueResult, DeviceChannelValue, DeviceChannelValueC,
            RegisterDeviceE, RegisterDeviceResult,
        },
        ChannelValue, ResultCode,
    },
    Call, Codec, ACTIVITY_TIMEOUT_MIN, PROTO_VERSION, PROTO_VERSION_MIN,
};

use crate::{
    connection::{Connection, Peer},
    error::HandlerError,
    handlers::CallResult,
};

fn register_failure() -> Result<Option<Vec<u8>>, HandlerError> {
    Ok(Some(
        RegisterDeviceResult {
            result_code: ResultCode::False,
            activity_timeout: ACTIVITY_TIMEOUT_MIN,
            version: PROTO_VERSION,
            version_min: PROTO_VERSION_MIN,
        }
        .encode()?,
    ))
}

/// `DS_REGISTER_DEVICE_E`: validate the announced identity and channel
/// list against configuration, bind the connection and publish the
/// initial channel values.
pub async fn register_device(conn: Arc<Connection>, data: Bytes) -> CallResult {
    let (msg, _) = RegisterDeviceE::decode(&data)?;
    let server = Arc::clone(conn.server());

    let mut state = server.state.lock().await;

    let device_id = match state.get_device_id(&msg.guid) {
        Ok(id) => id,
        Err(_) => {
            tracing::warn!("{} device not found with guid {}", conn.label(), hex(&msg.guid));
            conn.set_errored();
            return register_failure();
        },
    };
    let device = state.get_device(device_id)?;

    if device.manufacturer_id != msg.manufacturer_id {
        tracing::warn!(
            "{} manufacturer id mismatch; expected {} got {}",
            conn.label(),
            device.manufacturer_id,
            msg.manufacturer_id
        );
        conn.set_errored();
        return register_failure();
    }
    if device.product_id != msg.product_id {
        tracing::warn!(
            "{} product id mismatch; expected {} got {}",
            conn.label(),
            device.product_id,
            msg.product_id
        );
        conn.set_errored();
        return register_failure();
    }

    let channel_ids = device.channel_ids.clone();
    let device_name = device.name.clone();

    if msg.channels.len() != channel_ids.len() {
        tracing::warn!(
            "{} incorrect number of channels; expected {} got {}",
            conn.label(),
            channel_ids.len(),
            msg.channels.len()
        );
        conn.set_errored();
        return register_failure();
    }
    for (number, (channel_id, announced)) in
        channel_ids.iter().zip(msg.channels.iter()).enumerate()
    {
        let channel = state.get_channel(*channel_id)?;
        if announced.number != number as u8 {
            tracing::warn!("{} incorrect channel number", conn.label());
            conn.set_errored();
            return register_failure();
        }
        if channel.channel_type != announced.channel_type {
            tracing::warn!(
                "{} incorrect type for channel number {number}; expected {:?} got {:?}",
                conn.label(),
                channel.channel_type,
                announced.channel_type
            );
            conn.set_errored();
            return register_failure();
        }
        if channel.func != announced.default_func {
            tracing::warn!(
                "{} incorrect function for channel number {number}; expected {:?} got {:?}",
                conn.label(),
                channel.func,
                announced.default_func
            );
            conn.set_errored();
            return register_failure();
        }
        if channel.flags != announced.flags {
            tracing::warn!(
                "{} incorrect flags for channel number {number}; expected {:?} got {:?}",
                conn.label(),
                channel.flags,
                announced.flags
            );
            conn.set_errored();
            return register_failure();
        }
    }

    let proto_version = conn.proto_version();
    if !state.device_connected(device_id, proto_version, conn.events.clone())? {
        tracing::warn!("{} device already connected", conn.label());
        conn.set_errored();
        return register_failure();
    }

    conn.set_peer(Peer::Device(device_id));
    conn.set_label(format!("device[{device_name}]"));

    for (channel_id, announced) in channel_ids.iter().zip(msg.channels.iter()) {
        state.set_channel_value(*channel_id, announced.value)?;
    }
    drop(state);

    for (channel_id, announced) in channel_ids.iter().zip(msg.channels.iter()) {
        server
            .events
            .send(Event::channel_value(EventId::ChannelRegisterValue, *channel_id, announced.value));
    }
    server.events.send(Event::peer(EventId::DeviceConnected, device_id));

    tracing::info!(
        "{} registered; {} {} proto={proto_version} (mid={}, pid={})",
        conn.label(),
        msg.name,
        msg.soft_ver,
        msg.manufacturer_id,
        msg.product_id
    );

    Ok(Some(
        RegisterDeviceResult {
            result_code: ResultCode::True,
            activity_timeout: conn.activity_timeout_secs(),
            version: PROTO_VERSION,
            version_min: PROTO_VERSION_MIN,
        }
        .encode()?,
    ))
}

async fn apply_channel_value(
    conn: &Arc<Connection>,
    channel_number: u8,
    value: ChannelValue,
) -> Result<(), HandlerError> {
    let Peer::Device(device_id) = conn.peer() else {
        tracing::warn!("{} value change before registration", conn.label());
        return Ok(());
    };
    let server = conn.server();
    let mut state = server.state.lock().await;
    let device = state.get_device(device_id)?;
    let Some(&channel_id) = device.channel_ids.get(channel_number as usize) else {
        tracing::error!(
            "{} value change for unknown channel number {channel_number}",
            conn.label()
        );
        return Ok(());
    };
    state.set_channel_value(channel_id, value)?;
    drop(state);
    server.events.send(Event::channel_value(EventId::ChannelValueChanged, channel_id, value));
    Ok(())
}

/// `DS_DEVICE_CHANNEL_VALUE_CHANGED`: one-way value update.
pub async fn channel_value_changed(conn: Arc<Connection>, data: Bytes) -> CallResult {
    let (msg, _) = DeviceChannelValue::decode(&data)?;
    apply_channel_value(&conn, msg.channel_number, msg.value).await?;
    Ok(None)
}

/// `DS_DEVICE_CHANNEL_VALUE_CHANGED_C`: value update with validity
/// metadata; the metadata is accepted and dropped.
pub async fn channel_value_changed_c(conn: Arc<Connection>, data: Bytes) -> CallResult {
    let (msg, _) = DeviceChannelValueC::decode(&data)?;
    apply_channel_value(&conn, msg.channel_number, msg.value).await?;
    Ok(None)
}

/// `DS_CHANNEL_SET_VALUE_RESULT`: the device acknowledged a set-value;
/// publish the now-current value to clients.
pub async fn channel_set_value_result(conn: Arc<Connection>, data: Bytes) -> CallResult {
    let (msg, _) = ChannelNewValueResult::decode(&data)?;
    let Peer::Device(device_id) = conn.peer() else {
        return Ok(None);
    };
    let server = conn.server();
    let state = server.state.lock().await;
    let device = state.get_device(device_id)?;
    let Some(&channel_id) = device.channel_ids.get(msg.channel_number as usize) else {
        tracing::error!(
            "{} failed to handle set value result; channel number {} does not exist",
            conn.label(),
            msg.channel_number
        );
        return Ok(None);
    };
    let value = state.get_channel(channel_id)?.value;
    drop(state);
    server.events.send(Event::channel_value(EventId::ChannelValueChanged, channel_id, value));
    Ok(None)
}

/// `DSC_CHANNEL_STATE_RESULT` from a device: route the report back to
/// the client named by `receiver_id`.
pub async fn channel_state_result(conn: Arc<Connection>, data: Bytes) -> CallResult {
    let (msg, _) = ChannelState::decode(&data)?;
    let Peer::Device(device_id) = conn.peer() else {
        return Ok(None);
    };
    let server = conn.server();
    let state = server.state.lock().await;
    let Ok(events) = state.get_client_events(msg.receiver_id) else {
        tracing::error!(
            "{} failed channel state result; client id {} does not exist",
            conn.label(),
            msg.receiver_id
        );
        return Ok(None);
    };
    let device = state.get_device(device_id)?;
    let Some(&channel_id) = device.channel_ids.get(msg.channel_number as usize) else {
        tracing::error!(
            "{} failed channel state result; channel number {} does not exist",
            conn.label(),
            msg.channel_number
        );
        return Ok(None);
    };
    events.send(Event::new(
        EventId::ChannelStateResult,
        EventPayload::ChannelStateResult { state: Box::new(msg), channel_id },
    ));
    Ok(None)
}

/// `DS_DEVICE_CALCFG_RESULT`: route a calcfg result back to the client
/// named by `receiver_id`.
pub async fn calcfg_result(conn: Arc<Connection>, data: Bytes) -> CallResult {
    let (msg, _) = DeviceCalCfgResult::decode(&data)?;
    let Peer::Device(device_id) = conn.peer() else {
        return Ok(None);
    };
    let server = conn.server();
    let state = server.state.lock().await;
    if state.get_client(msg.receiver_id).is_err() {
        tracing::error!(
            "{} failed calcfg result; client id {} does not exist",
            conn.label(),
            msg.receiver_id
        );
        return Ok(None);
    }
    let device = state.get_device(device_id)?;
    let Some(&channel_id) = device.channel_ids.get(msg.channel_number as usize) else {
        tracing::error!(
            "{} failed calcfg result; channel number {} does not exist",
            conn.label(),
            msg.channel_number
        );
        return Ok(None);
    };
    let Ok(events) = state.get_client_events(msg.receiver_id) else {
        return Ok(None);
    };
    events.send(Event::new(
        EventId::DeviceConfigResult,
        EventPayload::CalCfgResult { result: msg, channel_id },
    ));
    Ok(None)
}

/// `CHANNEL_SET_VALUE` on a device queue: forward the new value to the
/// physical device if the channel lives on it.
pub async fn on_channel_set_value(conn: Arc<Connection>, event: Event) -> Result<(), HandlerError> {
    let EventPayload::ChannelValue { channel_id, value } = event.payload else {
        return Ok(());
    };
    let Peer::Device(device_id) = conn.peer() else {
        return Ok(());
    };
    let server = conn.server();
    let state = server.state.lock().await;
    let device = state.get_device(device_id)?;
    // channel not on this device: the event was fanned out to everyone
    let Some(channel_number) = device.channel_number(channel_id) else {
        return Ok(());
    };
    drop(state);
    // sender id 0: all clients learn of the change, no need to track who
    // asked for it
    conn.send(
        Call::SdChannelSetValue,
        &ChannelNewValue { sender_id: 0, channel_number, duration_ms: 0, value },
    )
    .await
}

/// `GET_CHANNEL_STATE` on a device queue: forward the query to the
/// physical device with the channel remapped to its local number.
pub async fn on_get_channel_state(conn: Arc<Connection>, event: Event) -> Result<(), HandlerError> {
    let EventPayload::GetChannelState { sender_id, channel_id } = event.payload else {
        return Ok(());
    };
    let Peer::Device(device_id) = conn.peer() else {
        return Ok(());
    };
    let server = conn.server();
    let state = server.state.lock().await;
    let device = state.get_device(device_id)?;
    let Some(channel_number) = device.channel_number(channel_id) else {
        return Ok(());
    };
    drop(state);
    conn.send(
        Call::CsdGetChannelState,
        &DeviceChannelStateRequest { sender_id, channel_number },
    )
    .await
}

/// `DEVICE_CONFIG` on a device queue: forward a client's calcfg request
/// with the client's authorization attached.
pub async fn on_calcfg_request(conn: Arc<Connection>, event: Event) -> Result<(), HandlerError> {
    let EventPayload::CalCfgRequest { request, client_id, channel_number } = event.payload else {
        return Ok(());
    };
    let server = conn.server();
    let state = server.state.lock().await;
    let authorized = state.get_client(client_id)?.authorized;
    drop(state);
    conn.send(
        Call::SdDeviceCalcfgRequest,
        &DeviceCalCfgRequest {
            sender_id: client_id,
            channel_number,
            command: request.command,
            super_user_authorized: authorized,
            datatype: request.datatype,
            data: request.data,
        },
    )
    .await
}
