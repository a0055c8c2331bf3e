//! Action execution, raw value writes, scenes and dimmer memory.

mod common;

use supla_client::{Client, ClientStream};
use supla_proto::{
    records::{
        device::ChannelNewValue, ActionSubjectType, ActionType, ChannelValue, ResultCode,
    },
    Call, Codec,
};

use common::{open_client, open_device, start_server};

/// Expect the device to receive a set-value for `channel_number` with
/// `value`.
async fn expect_set_value(device: &mut ClientStream, channel_number: u8, value: ChannelValue) {
    let packet = device.recv().await.expect("device packet");
    assert_eq!(packet.call_id, Call::SdChannelSetValue);
    let (msg, _) = ChannelNewValue::decode(&packet.data).expect("decode");
    assert_eq!(
        msg,
        ChannelNewValue { sender_id: 0, channel_number, duration_ms: 0, value }
    );
}

async fn execute_ok(
    client: &mut Client,
    device: &mut ClientStream,
    action: ActionType,
    subject_id: i32,
    subject_type: ActionSubjectType,
    expected: &[(u8, ChannelValue)],
) {
    let result = client.execute_action(action, subject_id, subject_type).await.expect("action");
    assert_eq!(result.result_code, ResultCode::True);
    assert_eq!(result.action_id, action);
    assert_eq!(result.subject_id, subject_id);
    assert_eq!(result.subject_type, subject_type);
    for &(channel_number, value) in expected {
        expect_set_value(device, channel_number, value).await;
    }
}

async fn execute_err(
    client: &mut Client,
    action: ActionType,
    subject_id: i32,
    subject_type: ActionSubjectType,
) {
    let result = client.execute_action(action, subject_id, subject_type).await.expect("action");
    assert_eq!(result.result_code, ResultCode::False);
    assert_eq!(result.action_id, action);
    assert_eq!(result.subject_id, subject_id);
    assert_eq!(result.subject_type, subject_type);
}

#[tokio::test]
async fn turn_on_a_relay() {
    let server = start_server().await;
    let mut device = open_device(&server, 1, false).await;
    let mut client = open_client(&server, "test").await;

    execute_ok(
        &mut client,
        &mut device,
        ActionType::TurnOn,
        3,
        ActionSubjectType::Channel,
        &[(2, [1, 0, 0, 0, 0, 0, 0, 0])],
    )
    .await;

    assert_eq!(
        server.inner().state.lock().await.get_channel(3).unwrap().value,
        [1, 0, 0, 0, 0, 0, 0, 0]
    );
    server.stop().await;
}

#[tokio::test]
async fn turn_off_a_relay() {
    let server = start_server().await;
    let mut device = open_device(&server, 1, false).await;
    let mut client = open_client(&server, "test").await;

    execute_ok(
        &mut client,
        &mut device,
        ActionType::TurnOff,
        3,
        ActionSubjectType::Channel,
        &[(2, [0; 8])],
    )
    .await;
    server.stop().await;
}

#[tokio::test]
async fn toggle_flips_the_stored_value() {
    let server = start_server().await;
    let mut device = open_device(&server, 1, false).await;
    let mut client = open_client(&server, "test").await;

    // stored value is all zeros, so toggling turns on
    execute_ok(
        &mut client,
        &mut device,
        ActionType::Toggle,
        3,
        ActionSubjectType::Channel,
        &[(2, [1, 0, 0, 0, 0, 0, 0, 0])],
    )
    .await;

    // and toggling again turns back off
    execute_ok(
        &mut client,
        &mut device,
        ActionType::Toggle,
        3,
        ActionSubjectType::Channel,
        &[(2, [0; 8])],
    )
    .await;
    server.stop().await;
}

#[tokio::test]
async fn unsupported_subjects_and_actions_fail() {
    let server = start_server().await;
    let _device = open_device(&server, 1, false).await;
    let _dimmer = open_device(&server, 2, false).await;
    let mut client = open_client(&server, "test").await;

    // schedules are not a thing here
    execute_err(&mut client, ActionType::TurnOn, 3, ActionSubjectType::Schedule).await;
    // unknown channel
    execute_err(&mut client, ActionType::TurnOn, 42, ActionSubjectType::Channel).await;
    // relays cannot open
    execute_err(&mut client, ActionType::Open, 3, ActionSubjectType::Channel).await;
    // dimmers cannot be interrupted
    execute_err(&mut client, ActionType::Interrupt, 4, ActionSubjectType::Channel).await;
    // thermometers take no actions at all
    execute_err(&mut client, ActionType::TurnOn, 2, ActionSubjectType::Channel).await;

    server.stop().await;
}

#[tokio::test]
async fn scene_runs_each_step_in_order() {
    let server = start_server().await;
    let mut device = open_device(&server, 1, false).await;
    let mut client = open_client(&server, "test").await;

    execute_ok(
        &mut client,
        &mut device,
        ActionType::Execute,
        1,
        ActionSubjectType::Scene,
        &[(0, [1, 0, 0, 0, 0, 0, 0, 0]), (2, [0; 8])],
    )
    .await;
    server.stop().await;
}

#[tokio::test]
async fn scene_step_with_explicit_brightness() {
    let server = start_server().await;
    let mut device = open_device(&server, 2, false).await;
    let mut client = open_client(&server, "test").await;

    execute_ok(
        &mut client,
        &mut device,
        ActionType::Execute,
        2,
        ActionSubjectType::Scene,
        &[(0, [10, 0, 0, 0, 0, 0, 0, 0])],
    )
    .await;
    server.stop().await;
}

#[tokio::test]
async fn scene_failures_leave_state_unchanged() {
    let server = start_server().await;
    let _device = open_device(&server, 1, false).await;
    let mut client = open_client(&server, "test").await;

    // unknown scene
    execute_err(&mut client, ActionType::Execute, 42, ActionSubjectType::Scene).await;
    // scenes only execute
    execute_err(&mut client, ActionType::TurnOn, 1, ActionSubjectType::Scene).await;

    let state = server.inner().state.lock().await;
    assert_eq!(state.get_channel(1).unwrap().value, [0; 8]);
    assert_eq!(state.get_channel(3).unwrap().value, [0; 8]);
    drop(state);
    server.stop().await;
}

#[tokio::test]
async fn set_value_reaches_the_device() {
    let server = start_server().await;
    let mut device = open_device(&server, 1, false).await;
    let mut client = open_client(&server, "test").await;

    client.set_value(3, [1, 2, 3, 4, 5, 6, 7, 8]).await.unwrap();
    expect_set_value(&mut device, 2, [1, 2, 3, 4, 5, 6, 7, 8]).await;

    assert_eq!(
        server.inner().state.lock().await.get_channel(3).unwrap().value,
        [1, 2, 3, 4, 5, 6, 7, 8]
    );
    server.stop().await;
}

#[tokio::test]
async fn set_value_rejects_bad_targets_and_channels() {
    let server = start_server().await;
    let mut device = open_device(&server, 1, false).await;
    let mut client = open_client(&server, "test").await;

    // wrong target kind: dropped without a device write
    let msg = supla_proto::records::client::NewValue {
        value_id: 3,
        target: supla_proto::records::Target::IoDevice,
        value: [1; 8],
    };
    client
        .send(&supla_proto::packets::Packet::new(Call::CsSetValue, msg.encode().unwrap()))
        .await
        .unwrap();

    // unknown channel: also dropped
    client.set_value(42, [1; 8]).await.unwrap();

    // a valid write afterwards is the first thing the device sees
    client.set_value(3, [9, 0, 0, 0, 0, 0, 0, 0]).await.unwrap();
    expect_set_value(&mut device, 2, [9, 0, 0, 0, 0, 0, 0, 0]).await;
    server.stop().await;
}

#[tokio::test]
async fn dimmer_off_then_on_restores_brightness() {
    let server = start_server().await;
    let mut device = open_device(&server, 2, false).await;
    let mut client = open_client(&server, "test").await;

    client.set_value(4, [0x32, 0, 0, 0, 0, 0, 0, 0]).await.unwrap();
    expect_set_value(&mut device, 0, [0x32, 0, 0, 0, 0, 0, 0, 0]).await;

    execute_ok(
        &mut client,
        &mut device,
        ActionType::TurnOff,
        4,
        ActionSubjectType::Channel,
        &[(0, [0; 8])],
    )
    .await;
    execute_ok(
        &mut client,
        &mut device,
        ActionType::TurnOn,
        4,
        ActionSubjectType::Channel,
        &[(0, [0x32, 0, 0, 0, 0, 0, 0, 0])],
    )
    .await;
    server.stop().await;
}

#[tokio::test]
async fn dimmer_first_turn_on_uses_full_brightness() {
    let server = start_server().await;
    let mut device = open_device(&server, 2, false).await;
    let mut client = open_client(&server, "test").await;

    execute_ok(
        &mut client,
        &mut device,
        ActionType::TurnOn,
        4,
        ActionSubjectType::Channel,
        &[(0, [0x64, 0, 0, 0, 0, 0, 0, 0])],
    )
    .await;
    server.stop().await;
}

#[tokio::test]
async fn dimmer_turn_on_while_on_keeps_brightness() {
    let server = start_server().await;
    let mut device = open_device(&server, 2, false).await;
    let mut client = open_client(&server, "test").await;

    client.set_value(4, [0x32, 0, 0, 0, 0, 0, 0, 0]).await.unwrap();
    expect_set_value(&mut device, 0, [0x32, 0, 0, 0, 0, 0, 0, 0]).await;

    execute_ok(
        &mut client,
        &mut device,
        ActionType::TurnOn,
        4,
        ActionSubjectType::Channel,
        &[(0, [0x32, 0, 0, 0, 0, 0, 0, 0])],
    )
    .await;
    server.stop().await;
}

#[tokio::test]
async fn new_brightness_replaces_the_memory() {
    let server = start_server().await;
    let mut device = open_device(&server, 2, false).await;
    let mut client = open_client(&server, "test").await;

    client.set_value(4, [0x32, 0, 0, 0, 0, 0, 0, 0]).await.unwrap();
    expect_set_value(&mut device, 0, [0x32, 0, 0, 0, 0, 0, 0, 0]).await;
    client.set_value(4, [0x1e, 0, 0, 0, 0, 0, 0, 0]).await.unwrap();
    expect_set_value(&mut device, 0, [0x1e, 0, 0, 0, 0, 0, 0, 0]).await;

    execute_ok(
        &mut client,
        &mut device,
        ActionType::TurnOff,
        4,
        ActionSubjectType::Channel,
        &[(0, [0; 8])],
    )
    .await;
    execute_ok(
        &mut client,
        &mut device,
        ActionType::TurnOn,
        4,
        ActionSubjectType::Channel,
        &[(0, [0x1e, 0, 0, 0, 0, 0, 0, 0])],
    )
    .await;
    server.stop().await;
}
