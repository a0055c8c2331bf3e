//! Device and client registration, lifecycle events and the startup
//! listing pump.

mod common;

use std::time::Duration;

use supla_core::{Event, EventId, EventPayload};
use supla_proto::{
    packets::Packet,
    records::{
        device::{RegisterDeviceE, RegisterDeviceResult},
        ChannelFlags, ChannelFunc, ChannelType, ResultCode,
    },
    Call, Codec,
};
use supla_server::handlers;
use tokio::sync::mpsc;

use common::{
    device_guid, open_client, open_connection, open_device, register_device_message, setup_state,
    start_server, test_config,
};

async fn expect_register_false_and_close(
    server: &supla_server::Server,
    msg: &RegisterDeviceE,
) {
    let mut stream = open_connection(server, false).await;
    stream
        .send(&Packet::new(Call::DsRegisterDeviceE, msg.encode().unwrap()))
        .await
        .unwrap();
    let packet = stream.recv().await.unwrap();
    assert_eq!(packet.call_id, Call::SdRegisterDeviceResult);
    let (result, _) = RegisterDeviceResult::decode(&packet.data).unwrap();
    assert_eq!(result.result_code, ResultCode::False);

    // the server closes after the negative result
    assert!(stream.recv().await.is_err());
}

#[tokio::test]
async fn register_device_plain_and_tls() {
    let server = start_server().await;
    for (device_id, secure) in [(1, false), (2, true), (3, false)] {
        let stream = open_device(&server, device_id, secure).await;
        let online = server
            .inner()
            .state
            .lock()
            .await
            .get_device(i32::from(device_id))
            .unwrap()
            .online;
        assert!(online, "device {device_id} should be online");
        drop(stream);
    }
    server.stop().await;
}

#[tokio::test]
async fn register_device_emits_lifecycle_events() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut builder = handlers::default_registry();
    for id in
        [EventId::ChannelRegisterValue, EventId::DeviceConnected, EventId::DeviceDisconnected]
    {
        let tx = tx.clone();
        builder.on_server_event(id, move |_server, event: Event| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(event);
                Ok(())
            }
        });
    }
    let server =
        supla_server::Server::start(test_config(), setup_state().unwrap(), builder.build())
            .await
            .unwrap();

    let stream = open_device(&server, 1, false).await;

    let mut register_values = Vec::new();
    for _ in 0..3 {
        let event = recv_event(&mut rx).await;
        assert_eq!(event.id, EventId::ChannelRegisterValue);
        match event.payload {
            EventPayload::ChannelValue { channel_id, value } => {
                register_values.push(channel_id);
                assert_eq!(value, [0; 8]);
            },
            other => panic!("unexpected payload {other:?}"),
        }
    }
    assert_eq!(register_values, [1, 2, 3]);

    let event = recv_event(&mut rx).await;
    assert_eq!(event.id, EventId::DeviceConnected);
    assert!(matches!(event.payload, EventPayload::Peer(1)));

    drop(stream);
    let event = recv_event(&mut rx).await;
    assert_eq!(event.id, EventId::DeviceDisconnected);
    assert!(matches!(event.payload, EventPayload::Peer(1)));

    server.stop().await;
}

async fn recv_event(rx: &mut mpsc::UnboundedReceiver<Event>) -> Event {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("event timeout")
        .expect("event channel closed")
}

#[tokio::test]
async fn register_device_unknown_guid() {
    let server = start_server().await;
    let mut msg = register_device_message(1);
    msg.guid = [0xff; 16];
    expect_register_false_and_close(&server, &msg).await;
    server.stop().await;
}

#[tokio::test]
async fn register_device_wrong_manufacturer_id() {
    let server = start_server().await;
    let mut msg = register_device_message(1);
    msg.manufacturer_id = 16;
    expect_register_false_and_close(&server, &msg).await;
    server.stop().await;
}

#[tokio::test]
async fn register_device_wrong_product_id() {
    let server = start_server().await;
    let mut msg = register_device_message(1);
    msg.product_id = 42;
    expect_register_false_and_close(&server, &msg).await;
    server.stop().await;
}

#[tokio::test]
async fn register_device_wrong_channel_count() {
    let server = start_server().await;
    let mut msg = register_device_message(1);
    msg.channels.truncate(1);
    expect_register_false_and_close(&server, &msg).await;
    server.stop().await;
}

#[tokio::test]
async fn register_device_wrong_channel_number() {
    let server = start_server().await;
    let mut msg = register_device_message(1);
    msg.channels[0].number = 10;
    expect_register_false_and_close(&server, &msg).await;
    server.stop().await;
}

#[tokio::test]
async fn register_device_wrong_channel_type() {
    let server = start_server().await;
    let mut msg = register_device_message(1);
    msg.channels[1].channel_type = ChannelType::Relay;
    expect_register_false_and_close(&server, &msg).await;
    server.stop().await;
}

#[tokio::test]
async fn register_device_wrong_channel_func() {
    let server = start_server().await;
    let mut msg = register_device_message(1);
    msg.channels[0].default_func = ChannelFunc::Thermometer;
    expect_register_false_and_close(&server, &msg).await;
    server.stop().await;
}

#[tokio::test]
async fn register_device_wrong_channel_flags() {
    let server = start_server().await;
    let mut msg = register_device_message(1);
    msg.channels[0].flags = ChannelFlags::RS_AUTO_CALIBRATION | ChannelFlags::ZWAVE_BRIDGE;
    expect_register_false_and_close(&server, &msg).await;
    server.stop().await;
}

#[tokio::test]
async fn register_device_twice_rejects_second_session() {
    let server = start_server().await;
    let mut first = open_device(&server, 1, false).await;

    // second session with the same guid gets FALSE and is closed
    expect_register_false_and_close(&server, &register_device_message(1)).await;

    // the first session is unaffected
    assert!(server.inner().state.lock().await.get_device(1).unwrap().online);
    first
        .send(&Packet::new(
            Call::DcsPingServer,
            supla_proto::records::PingServer {
                now: supla_proto::records::TimeVal { tv_sec: 1, tv_usec: 0 },
            }
            .encode()
            .unwrap(),
        ))
        .await
        .unwrap();
    let packet = first.recv().await.unwrap();
    assert_eq!(packet.call_id, Call::SdcPingServerResult);

    server.stop().await;
}

#[tokio::test]
async fn register_client_pumps_startup_listing() {
    let server = start_server().await;
    let client = open_client(&server, "Test Client").await;

    assert_eq!(client.result.location_count, 1);
    assert_eq!(client.result.channel_count, 9);
    assert_eq!(client.result.scene_count, 3);
    assert!(client.result.activity_timeout >= 30);

    // location listing
    assert_eq!(client.location_pack.items.len(), 1);
    assert_eq!(client.location_pack.items[0].id, 1);
    assert_eq!(client.location_pack.items[0].caption, "Test");
    assert!(client.location_pack.items[0].eol);

    // channel listing arrives in two packs of at most five
    assert_eq!(client.channel_packs.len(), 2);
    assert_eq!(client.channel_packs[0].items.len(), 5);
    assert_eq!(client.channel_packs[0].total_left, 4);
    assert_eq!(client.channel_packs[1].items.len(), 4);
    assert_eq!(client.channel_packs[1].total_left, 0);
    assert!(client.channel_packs[0].items[4].eol);
    assert!(client.channel_packs[1].items[3].eol);

    let first = &client.channel_packs[0].items[0];
    assert_eq!(first.id, 1);
    assert_eq!(first.caption, "Relay");
    assert_eq!(first.device_id, 1);
    assert_eq!(first.channel_type, ChannelType::Relay);
    assert_eq!(first.alt_icon, 0);
    assert_eq!(first.user_icon, 0);
    assert_eq!(first.default_config_crc32, 0);
    assert!(!first.online);
    assert_eq!(first.flags, ChannelFlags::CHANNELSTATE);

    let lights = &client.channel_packs[0].items[3];
    assert_eq!(lights.id, 4);
    assert_eq!(lights.caption, "Lights");
    assert_eq!(lights.device_id, 2);
    assert_eq!(lights.channel_type, ChannelType::Dimmer);
    assert_eq!(lights.alt_icon, 1);

    // measurement channels carry a config checksum
    let gpm1 = &client.channel_packs[0].items[4];
    assert_eq!(gpm1.id, 5);
    assert_eq!(gpm1.caption, "Measurement 1");
    assert_ne!(gpm1.default_config_crc32, 0);
    let gpm2 = &client.channel_packs[1].items[0];
    assert_eq!(gpm2.id, 6);
    assert_ne!(gpm2.default_config_crc32, 0);
    assert_ne!(gpm2.default_config_crc32, gpm1.default_config_crc32);

    // content-addressed icons
    let lights2 = &client.channel_packs[1].items[1];
    assert_eq!(lights2.id, 7);
    assert_eq!(lights2.user_icon, 16_688_710);
    let gpm3 = &client.channel_packs[1].items[2];
    assert_eq!(gpm3.user_icon, 4_151_541);
    let gpm4 = &client.channel_packs[1].items[3];
    assert_eq!(gpm4.user_icon, 4_151_541);

    // identical default configs share a checksum
    assert_eq!(gpm3.default_config_crc32, gpm1.default_config_crc32);

    // relation listing is empty, scene listing carries all three
    assert!(client.relation_pack.items.is_empty());
    assert_eq!(client.scene_pack.items.len(), 3);
    assert_eq!(client.scene_pack.items[0].caption, "Scene 1");
    assert_eq!(client.scene_pack.items[1].caption, "Scene 2");
    assert_eq!(client.scene_pack.items[1].alt_icon, 3);
    assert_eq!(client.scene_pack.items[2].caption, "Scene 3");
    assert_eq!(client.scene_pack.items[2].user_icon, 4_151_541);
    assert!(client.scene_pack.items[2].eol);

    server.stop().await;
}

#[tokio::test]
async fn register_client_twice_rejects_second_session() {
    let server = start_server().await;
    let mut first = open_client(&server, "test").await;

    let config = supla_client::client::ClientConfig::new("127.0.0.1", server.port(), "test");
    let second = supla_client::Client::register(config).await;
    assert!(matches!(
        second,
        Err(supla_client::ClientError::Rejected(ResultCode::False))
    ));

    // the first session is unaffected
    first
        .send(&Packet::new(
            Call::DcsPingServer,
            supla_proto::records::PingServer {
                now: supla_proto::records::TimeVal { tv_sec: 1, tv_usec: 0 },
            }
            .encode()
            .unwrap(),
        ))
        .await
        .unwrap();
    let packet = first.recv().await.unwrap();
    assert_eq!(packet.call_id, Call::SdcPingServerResult);

    server.stop().await;
}

#[tokio::test]
async fn client_reconnect_reuses_client_id() {
    let server = start_server().await;
    let first_id = {
        let client = open_client(&server, "test").await;
        client.client_id
    };
    // wait for the server to notice the disconnect
    wait_for_offline(&server, first_id).await;

    let client = open_client(&server, "test").await;
    assert_eq!(client.client_id, first_id);
    server.stop().await;
}

async fn wait_for_offline(server: &supla_server::Server, client_id: i32) {
    for _ in 0..100 {
        if !server.inner().state.lock().await.get_client(client_id).unwrap().online {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("client {client_id} never went offline");
}

#[tokio::test]
async fn devices_must_be_preconfigured() {
    // an unknown guid is rejected even with a plausible channel list
    let server = start_server().await;
    let mut msg = register_device_message(2);
    msg.guid = device_guid(99);
    expect_register_false_and_close(&server, &msg).await;
    server.stop().await;
}
