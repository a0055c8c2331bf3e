//! Fuzz target for record decoding.
//!
//! Decoding arbitrary bytes as any record type must never panic; every
//! malformed input maps to a `CodecError`.

#![no_main]

use libfuzzer_sys::fuzz_target;
use supla_proto::{
    records::{
        client::{Action, ChannelPackD, ChannelPackE, LocationPack, RegisterClientD, ScenePack},
        config::{ChannelConfigGpm, ChannelState, DeviceCalCfgRequestB},
        device::{DeviceChannelValueC, RegisterDeviceE},
        TimeVal,
    },
    Codec,
};

fuzz_target!(|data: &[u8]| {
    let _ = TimeVal::decode(data);
    let _ = RegisterDeviceE::decode(data);
    let _ = RegisterClientD::decode(data);
    let _ = DeviceChannelValueC::decode(data);
    let _ = LocationPack::decode(data);
    let _ = ChannelPackD::decode(data);
    let _ = ChannelPackE::decode(data);
    let _ = ScenePack::decode(data);
    let _ = Action::decode(data);
    let _ = ChannelState::decode(data);
    let _ = ChannelConfigGpm::decode(data);
    let _ = DeviceCalCfgRequestB::decode(data);
});
