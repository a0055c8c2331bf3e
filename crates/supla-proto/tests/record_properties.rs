//! Round-trip properties over generated records.
//!
//! `decode(encode(x))` must return `x` and consume exactly the encoded
//! length for every valid record instance.

use proptest::prelude::*;
use supla_proto::{
    records::{
        client::{Location, LocationPack, RegisterClientD},
        device::{DeviceChannelC, RegisterDeviceE},
        ActionCaps, ChannelFlags, ChannelFunc, ChannelType, DeviceFlags, TimeVal,
    },
    Codec,
};

fn channel_type() -> impl Strategy<Value = ChannelType> {
    prop_oneof![
        Just(ChannelType::Relay),
        Just(ChannelType::Thermometer),
        Just(ChannelType::HumiditySensor),
        Just(ChannelType::HumidityAndTempSensor),
        Just(ChannelType::Dimmer),
        Just(ChannelType::GeneralPurposeMeasurement),
    ]
}

fn channel_func() -> impl Strategy<Value = ChannelFunc> {
    prop_oneof![
        Just(ChannelFunc::None),
        Just(ChannelFunc::Thermometer),
        Just(ChannelFunc::Humidity),
        Just(ChannelFunc::HumidityAndTemperature),
        Just(ChannelFunc::PowerSwitch),
        Just(ChannelFunc::LightSwitch),
        Just(ChannelFunc::Dimmer),
        Just(ChannelFunc::GeneralPurposeMeasurement),
    ]
}

fn device_channel() -> impl Strategy<Value = DeviceChannelC> {
    (any::<u8>(), channel_type(), any::<u32>(), channel_func(), any::<u32>(), any::<[u8; 8]>())
        .prop_map(|(number, channel_type, caps, default_func, flags, value)| DeviceChannelC {
            number,
            channel_type,
            action_trigger_caps: ActionCaps(caps),
            default_func,
            flags: ChannelFlags(u64::from(flags)),
            value,
        })
}

fn short_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 @.-]{0,20}"
}

proptest! {
    #[test]
    fn time_val_round_trip(tv_sec: i64, tv_usec: i64) {
        let msg = TimeVal { tv_sec, tv_usec };
        let data = msg.encode().unwrap();
        let (decoded, size) = TimeVal::decode(&data).unwrap();
        prop_assert_eq!(size, data.len());
        prop_assert_eq!(decoded, msg);
    }

    #[test]
    fn device_channel_round_trip(channel in device_channel()) {
        let data = channel.encode().unwrap();
        let (decoded, size) = DeviceChannelC::decode(&data).unwrap();
        prop_assert_eq!(size, data.len());
        prop_assert_eq!(decoded, channel);
    }

    #[test]
    fn register_device_round_trip(
        email in short_text(),
        name in short_text(),
        soft_ver in "[0-9.]{0,10}",
        server_name in short_text(),
        manufacturer_id: i16,
        product_id: i16,
        channels in proptest::collection::vec(device_channel(), 0..8),
    ) {
        let msg = RegisterDeviceE {
            email,
            authkey: [0x42; 16],
            guid: [0x17; 16],
            name,
            soft_ver,
            server_name,
            flags: DeviceFlags::NONE,
            manufacturer_id,
            product_id,
            channels,
        };
        let data = msg.encode().unwrap();
        let (decoded, size) = RegisterDeviceE::decode(&data).unwrap();
        prop_assert_eq!(size, data.len());
        prop_assert_eq!(decoded, msg);
    }

    #[test]
    fn register_client_round_trip(
        email in short_text(),
        password in "[a-z0-9]{0,20}",
        name in short_text(),
    ) {
        let msg = RegisterClientD {
            email,
            password,
            guid: [0x01; 16],
            authkey: [0x02; 16],
            name,
            soft_ver: "1.2.3".to_owned(),
            server_name: "localhost".to_owned(),
        };
        let data = msg.encode().unwrap();
        let (decoded, size) = RegisterClientD::decode(&data).unwrap();
        prop_assert_eq!(size, data.len());
        prop_assert_eq!(decoded, msg);
    }

    #[test]
    fn location_pack_round_trip(
        total_left in 0..1000i32,
        captions in proptest::collection::vec("[a-zA-Z0-9 ]{0,30}", 0..10),
    ) {
        let items: Vec<Location> = captions
            .into_iter()
            .enumerate()
            .map(|(i, caption)| Location { eol: false, id: i as i32 + 1, caption })
            .collect();
        let msg = LocationPack { total_left, items };
        let data = msg.encode().unwrap();
        let (decoded, size) = LocationPack::decode(&data).unwrap();
        prop_assert_eq!(size, data.len());
        prop_assert_eq!(decoded, msg);
    }

    #[test]
    fn truncated_records_never_panic(
        channel in device_channel(),
        cut in 0usize..25,
    ) {
        let data = channel.encode().unwrap();
        // any strict prefix must decode to a clean error
        prop_assert!(DeviceChannelC::decode(&data[..cut]).is_err());
    }

    #[test]
    fn arbitrary_bytes_never_panic(data in proptest::collection::vec(any::<u8>(), 0..256)) {
        let _ = DeviceChannelC::decode(&data);
        let _ = RegisterDeviceE::decode(&data);
        let _ = LocationPack::decode(&data);
        let _ = TimeVal::decode(&data);
    }
}
