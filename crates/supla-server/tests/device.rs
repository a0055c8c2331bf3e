//! The device helper library against a live server.

mod common;

use std::time::Duration;

use supla_client::{
    channels::{Relay, Temperature},
    client::ClientConfig,
    Client, ClientError, Device, DeviceConfig,
};
use supla_proto::records::{config::ChannelStateRequest, ResultCode};
use supla_proto::{packets::Packet, Call, Codec};

use common::{device_guid, start_server};

fn fixture_device(server: &supla_server::Server) -> (Device, Relay, Temperature, Relay) {
    let mut config = DeviceConfig::new("127.0.0.1", server.port(), device_guid(1));
    config.name = "device".to_owned();
    config.mac = [1, 2, 3, 4, 5, 6];
    let relay = Relay::new();
    let temperature = Temperature::new();
    let relay2 = Relay::new();
    let mut device = Device::new(config);
    device.add(&relay).add(&temperature).add(&relay2);
    (device, relay, temperature, relay2)
}

async fn wait_for<F>(what: &str, mut check: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..250 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for {what}");
}

#[tokio::test]
async fn device_helper_registers() {
    let server = start_server().await;
    let (device, ..) = fixture_device(&server);

    let running = device.start().await.expect("device start");
    assert!(server.inner().state.lock().await.get_device(1).unwrap().online);

    running.stop().await;
    let inner = server.inner().clone();
    wait_for("device offline", || {
        inner.state.try_lock().map(|state| !state.get_device(1).unwrap().online).unwrap_or(false)
    })
    .await;
    server.stop().await;
}

#[tokio::test]
async fn wrong_channel_order_is_rejected() {
    let server = start_server().await;
    let mut config = DeviceConfig::new("127.0.0.1", server.port(), device_guid(1));
    config.name = "device".to_owned();
    let mut device = Device::new(config);
    // relay, relay, temperature does not match relay, temperature, relay
    device.add(&Relay::new()).add(&Relay::new()).add(&Temperature::new());

    let result = device.start().await;
    assert!(matches!(result, Err(ClientError::Rejected(ResultCode::False))));
    server.stop().await;
}

#[tokio::test]
async fn no_channels_is_rejected() {
    let server = start_server().await;
    let config = DeviceConfig::new("127.0.0.1", server.port(), device_guid(1));
    let result = Device::new(config).start().await;
    assert!(matches!(result, Err(ClientError::Rejected(ResultCode::False))));
    server.stop().await;
}

#[tokio::test]
async fn local_changes_reach_the_server_state() {
    let server = start_server().await;
    let (device, _relay, temperature, _relay2) = fixture_device(&server);
    let running = device.start().await.expect("device start");

    temperature.set(42.0);
    let inner = server.inner().clone();
    wait_for("temperature in state", || {
        inner
            .state
            .try_lock()
            .map(|state| {
                let value = state.get_channel(2).unwrap().value;
                f64::from_le_bytes(value) == 42.0
            })
            .unwrap_or(false)
    })
    .await;

    running.stop().await;
    server.stop().await;
}

#[tokio::test]
async fn server_writes_reach_the_channel_and_are_acked() {
    let server = start_server().await;
    let mut client = Client::register(ClientConfig::new("127.0.0.1", server.port(), "test"))
        .await
        .expect("client");
    let (device, relay, ..) = fixture_device(&server);
    let running = device.start().await.expect("device start");

    // wait for the connect refresh so later packs are the interesting ones
    client.recv_value_pack().await.expect("refresh");

    client.set_value(1, [1, 0, 0, 0, 0, 0, 0, 0]).await.expect("set value");

    // the device applies the write
    wait_for("relay on", || relay.is_on()).await;

    // the ack pushes a value-changed pack out to clients
    let pack = client.recv_value_pack().await.expect("value pack");
    assert_eq!(pack.items.len(), 1);
    assert_eq!(pack.items[0].id, 1);
    assert_eq!(pack.items[0].value.value, [1, 0, 0, 0, 0, 0, 0, 0]);

    running.stop().await;
    server.stop().await;
}

#[tokio::test]
async fn channel_state_is_answered_by_the_helper() {
    let server = start_server().await;
    let (device, ..) = fixture_device(&server);
    let running = device.start().await.expect("device start");
    let mut client = Client::register(ClientConfig::new("127.0.0.1", server.port(), "test"))
        .await
        .expect("client");

    let request = ChannelStateRequest { sender_id: 0, channel_id: 2 };
    client
        .send(&Packet::new(Call::CsdGetChannelState, request.encode().unwrap()))
        .await
        .expect("send");

    let packet = client.recv().await.expect("state result");
    assert_eq!(packet.call_id, Call::DscChannelStateResult);
    let (result, _) =
        supla_proto::records::config::ChannelStateResult::decode(&packet.data).unwrap();
    assert_eq!(result.receiver_id, client.client_id);
    assert_eq!(result.channel_id, 2);
    assert_eq!(result.mac, [1, 2, 3, 4, 5, 6]);

    running.stop().await;
    server.stop().await;
}
