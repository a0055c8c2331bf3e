//! Device driver.
//!
//! Registers a set of channels with the server, answers its requests
//! (set-value, channel state, ping replies) and pushes local channel
//! changes upstream. The driver is a thin specialization of the shared
//! packet/record primitives; all protocol knowledge lives in
//! `supla-proto`.

use std::sync::Arc;

use supla_proto::{
    packets::Packet,
    records::{
        config::{ChannelState, DeviceChannelStateRequest},
        device::{
            ChannelNewValue, ChannelNewValueResult, DeviceChannelValueC, DeviceChannelC,
            RegisterDeviceE, RegisterDeviceResult,
        },
        ChannelStateFields, ChannelValue, DeviceFlags, PingServer, ResultCode,
    },
    Call, Codec, AUTHKEY_SIZE, GUID_SIZE,
};
use tokio::sync::mpsc;

use crate::{
    channels::{ChannelCell, DeviceChannel},
    error::ClientError,
    transport,
};

/// Identity and connection settings of a device.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Server hostname.
    pub host: String,
    /// Server port (plain or TLS, per `secure`).
    pub port: u16,
    /// Connect over TLS.
    pub secure: bool,
    /// Account email.
    pub email: String,
    /// Device name.
    pub name: String,
    /// Firmware version string.
    pub version: String,
    /// Shared authentication blob.
    pub authkey: [u8; AUTHKEY_SIZE],
    /// Device GUID; must be configured on the server.
    pub guid: [u8; GUID_SIZE],
    /// Manufacturer id; must match the server configuration.
    pub manufacturer_id: i16,
    /// Product id; must match the server configuration.
    pub product_id: i16,
    /// MAC address reported in channel-state replies.
    pub mac: [u8; 6],
}

impl DeviceConfig {
    /// Settings for a local plain-TCP device with zero ids.
    pub fn new(host: impl Into<String>, port: u16, guid: [u8; GUID_SIZE]) -> Self {
        Self {
            host: host.into(),
            port,
            secure: false,
            email: "email@email.com".to_owned(),
            name: "device".to_owned(),
            version: "1.0.0".to_owned(),
            authkey: [0; AUTHKEY_SIZE],
            guid,
            manufacturer_id: 0,
            product_id: 0,
            mac: [0; 6],
        }
    }
}

/// A device that has not connected yet.
pub struct Device {
    config: DeviceConfig,
    channels: Vec<Arc<ChannelCell>>,
}

impl Device {
    /// Start assembling a device.
    pub fn new(config: DeviceConfig) -> Self {
        Self { config, channels: Vec::new() }
    }

    /// Append a channel; its number is its position.
    pub fn add(&mut self, channel: &impl DeviceChannel) -> &mut Self {
        self.channels.push(Arc::clone(channel.cell()));
        self
    }

    /// Connect, register and spawn the device loop.
    ///
    /// Fails with [`ClientError::Rejected`] when the server refuses the
    /// registration (unknown GUID, mismatched channels, duplicate
    /// session).
    pub async fn start(self) -> Result<RunningDevice, ClientError> {
        let stream = transport::connect(&self.config.host, self.config.port, self.config.secure)
            .await?;
        let (mut reader, sender) = stream.into_split();

        let channels: Vec<DeviceChannelC> = self
            .channels
            .iter()
            .enumerate()
            .map(|(number, cell)| {
                let spec = cell.spec();
                DeviceChannelC {
                    number: number as u8,
                    channel_type: spec.channel_type,
                    action_trigger_caps: spec.action_caps,
                    default_func: spec.default_func,
                    flags: spec.flags,
                    value: cell.encoded_value(),
                }
            })
            .collect();

        let register = RegisterDeviceE {
            email: self.config.email.clone(),
            authkey: self.config.authkey,
            guid: self.config.guid,
            name: self.config.name.clone(),
            soft_ver: self.config.version.clone(),
            server_name: self.config.host.clone(),
            flags: DeviceFlags::NONE,
            manufacturer_id: self.config.manufacturer_id,
            product_id: self.config.product_id,
            channels,
        };
        sender.send(&Packet::new(Call::DsRegisterDeviceE, register.encode()?)).await?;

        let packet = reader.recv().await?;
        if packet.call_id != Call::SdRegisterDeviceResult {
            return Err(ClientError::UnexpectedCall(packet.call_id));
        }
        let (result, _) = RegisterDeviceResult::decode(&packet.data)?;
        if result.result_code != ResultCode::True {
            return Err(ClientError::Rejected(result.result_code));
        }
        tracing::debug!("device registered; activity_timeout={}", result.activity_timeout);

        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        for (number, cell) in self.channels.iter().enumerate() {
            cell.bind(number as u8, updates_tx.clone());
        }

        let task = tokio::spawn(device_loop(
            reader,
            sender.clone(),
            self.channels,
            updates_rx,
            u64::from(result.activity_timeout.max(2)) / 2,
            self.config.mac,
        ));

        Ok(RunningDevice { sender, task })
    }
}

/// Handle to a connected device.
pub struct RunningDevice {
    sender: supla_proto::PacketSender<Box<dyn tokio::io::AsyncWrite + Send + Unpin>>,
    task: tokio::task::JoinHandle<()>,
}

impl RunningDevice {
    /// Disconnect and stop the device loop.
    pub async fn stop(self) {
        let _ = self.sender.shutdown().await;
        self.task.abort();
        let _ = self.task.await;
    }
}

type BoxedReader = supla_proto::PacketReader<Box<dyn tokio::io::AsyncRead + Send + Unpin>>;
type BoxedSender = supla_proto::PacketSender<Box<dyn tokio::io::AsyncWrite + Send + Unpin>>;

async fn device_loop(
    mut reader: BoxedReader,
    sender: BoxedSender,
    channels: Vec<Arc<ChannelCell>>,
    mut updates: mpsc::UnboundedReceiver<(u8, ChannelValue)>,
    ping_secs: u64,
    mac: [u8; 6],
) {
    let period = std::time::Duration::from_secs(ping_secs.max(1));
    let mut ping = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

    loop {
        tokio::select! {
            packet = reader.recv() => {
                let packet = match packet {
                    Ok(packet) => packet,
                    Err(error) => {
                        tracing::debug!("device disconnected: {error}");
                        return;
                    },
                };
                if let Err(error) = handle_packet(&sender, &channels, mac, &packet).await {
                    tracing::debug!("device loop stopping: {error}");
                    return;
                }
            },
            update = updates.recv() => {
                let Some((channel_number, value)) = update else { return };
                let msg = DeviceChannelValueC {
                    channel_number,
                    offline: false,
                    validity_time_sec: 0,
                    value,
                };
                tracing::debug!("channel {channel_number} value changed");
                if send(&sender, Call::DsDeviceChannelValueChangedC, &msg).await.is_err() {
                    return;
                }
            },
            _ = ping.tick() => {
                tracing::debug!("ping");
                let msg = PingServer { now: now_timeval() };
                if send(&sender, Call::DcsPingServer, &msg).await.is_err() {
                    return;
                }
            },
        }
    }
}

async fn handle_packet(
    sender: &BoxedSender,
    channels: &[Arc<ChannelCell>],
    mac: [u8; 6],
    packet: &Packet,
) -> Result<(), ClientError> {
    match packet.call_id {
        Call::SdChannelSetValue => {
            let (msg, _) = ChannelNewValue::decode(&packet.data)?;
            let Some(cell) = channels.get(msg.channel_number as usize) else {
                tracing::warn!("set value for unknown channel {}", msg.channel_number);
                return Ok(());
            };
            tracing::debug!("channel {} new value", msg.channel_number);
            cell.server_write(msg.value);
            send(
                sender,
                Call::DsChannelSetValueResult,
                &ChannelNewValueResult {
                    channel_number: msg.channel_number,
                    sender_id: msg.sender_id,
                    success: true,
                },
            )
            .await?;
            // report the applied value back as a regular change
            send(
                sender,
                Call::DsDeviceChannelValueChangedC,
                &DeviceChannelValueC {
                    channel_number: msg.channel_number,
                    offline: false,
                    validity_time_sec: 0,
                    value: msg.value,
                },
            )
            .await?;
        },
        Call::CsdGetChannelState => {
            let (msg, _) = DeviceChannelStateRequest::decode(&packet.data)?;
            tracing::debug!("channel state request");
            let state = ChannelState {
                receiver_id: msg.sender_id,
                channel_number: i32::from(msg.channel_number),
                fields: ChannelStateFields::MAC,
                default_icon_field: 0,
                ipv4: 0,
                mac,
                battery_level: 0,
                battery_powered: false,
                wifi_rssi: 0,
                wifi_signal_strength: 0,
                bridge_node_online: false,
                bridge_node_signal_strength: 0,
                uptime: 0,
                connected_uptime: 0,
                battery_health: 0,
                last_connection_reset_cause: 0,
                light_source_lifespan: 0,
                light_source_operating_time: 0,
                reserved: [0; 2],
            };
            tracing::debug!("channel state result");
            send(sender, Call::DscChannelStateResult, &state).await?;
        },
        Call::SdcPingServerResult => {
            tracing::debug!("pong");
        },
        other => {
            tracing::debug!("ignoring call {other}");
        },
    }
    Ok(())
}

fn now_timeval() -> supla_proto::records::TimeVal {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    supla_proto::records::TimeVal {
        tv_sec: now.as_secs() as i64,
        tv_usec: i64::from(now.subsec_micros()),
    }
}

async fn send<M: Codec>(sender: &BoxedSender, call: Call, msg: &M) -> Result<(), ClientError> {
    sender.send(&Packet::new(call, msg.encode()?)).await?;
    Ok(())
}
