//! Calls shared by devices and clients.

use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use bytes::Bytes;
use supla_proto::{
    records::{
        PingServerResult, RegistrationEnabled, SetActivityTimeout, SetActivityTimeoutResult,
        TimeVal,
    },
    Codec, ACTIVITY_TIMEOUT_MAX, ACTIVITY_TIMEOUT_MIN,
};

use crate::{connection::Connection, handlers::CallResult};

/// Wall-clock now as a protocol timestamp.
pub(crate) fn now_timeval() -> TimeVal {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
    TimeVal { tv_sec: now.as_secs() as i64, tv_usec: i64::from(now.subsec_micros()) }
}

/// `DCS_PING_SERVER`: answer with the server clock.
pub async fn ping(_conn: Arc<Connection>, _data: Bytes) -> CallResult {
    Ok(Some(PingServerResult { now: now_timeval() }.encode()?))
}

/// `DCS_GET_REGISTRATION_ENABLED`: registration windows are never open;
/// devices come from configuration and clients are always allowed.
pub async fn get_registration_enabled(_conn: Arc<Connection>, _data: Bytes) -> CallResult {
    Ok(Some(RegistrationEnabled { client_timestamp: 0, iodevice_timestamp: 0 }.encode()?))
}

/// `DCS_SET_ACTIVITY_TIMEOUT`: clamp and apply the requested timeout.
pub async fn set_activity_timeout(conn: Arc<Connection>, data: Bytes) -> CallResult {
    let (msg, _) = SetActivityTimeout::decode(&data)?;
    let timeout = msg.activity_timeout.clamp(ACTIVITY_TIMEOUT_MIN, ACTIVITY_TIMEOUT_MAX);
    conn.set_activity_timeout(Duration::from_secs(u64::from(timeout)));
    Ok(Some(
        SetActivityTimeoutResult {
            activity_timeout: timeout,
            min: ACTIVITY_TIMEOUT_MIN,
            max: ACTIVITY_TIMEOUT_MAX,
        }
        .encode()?,
    ))
}
