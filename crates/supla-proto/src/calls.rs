//! Protocol call ids.
//!
//! Every framed packet carries a 32-bit call id naming the record type in
//! its payload. The prefix encodes the direction: `Dcs`/`Sdc` flow between
//! any peer and the server, `Ds`/`Sd` between a device and the server,
//! `Cs`/`Sc` between a client and the server, and `Csd`/`Dsc` are relayed
//! across both hops.

/// Call ids understood by this implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Call {
    /// Keepalive ping (device or client).
    DcsPingServer = 40,
    /// Ping reply.
    SdcPingServerResult = 50,
    /// Registration-enabled query.
    DcsGetRegistrationEnabled = 210,
    /// Registration-enabled reply.
    SdcGetRegistrationEnabledResult = 220,
    /// Activity timeout negotiation.
    DcsSetActivityTimeout = 190,
    /// Activity timeout reply.
    SdcSetActivityTimeoutResult = 200,

    /// Device registration (shape E).
    DsRegisterDeviceE = 69,
    /// Device registration result.
    SdRegisterDeviceResult = 70,
    /// Device-initiated channel value update.
    DsDeviceChannelValueChanged = 100,
    /// Device-initiated channel value update with validity metadata.
    DsDeviceChannelValueChangedC = 103,
    /// Server-initiated channel value change.
    SdChannelSetValue = 110,
    /// Device acknowledgement of a set value.
    DsChannelSetValueResult = 120,

    /// Client registration (shape D).
    CsRegisterClientD = 88,
    /// Client registration result (shape D).
    ScRegisterClientResultD = 99,
    /// Location batch push.
    ScLocationPackUpdate = 140,
    /// Channel batch push (shape D).
    ScChannelPackUpdateD = 330,
    /// Channel batch push (shape E).
    ScChannelPackUpdateE = 340,
    /// Channel relation batch push.
    ScChannelRelationPackUpdate = 350,
    /// Scene batch push.
    ScScenePackUpdate = 360,
    /// Channel value batch push (shape B).
    ScChannelValuePackUpdateB = 380,
    /// Client pump for the next startup batch.
    CsGetNext = 300,

    /// Client action request.
    CsExecuteAction = 645,
    /// Action outcome.
    ScActionExecutionResult = 655,
    /// Client raw value write.
    CsSetValue = 640,
    /// Channel config query.
    CsGetChannelConfig = 680,
    /// Channel config reply.
    ScChannelConfigUpdateOrResult = 690,

    /// Channel state query, client to server and server to device.
    CsdGetChannelState = 500,
    /// Channel state result, device to server and server to client.
    DscChannelStateResult = 510,

    /// Superuser authorization request.
    CsSuperuserAuthorizationRequest = 460,
    /// Superuser authorization result.
    ScSuperuserAuthorizationResult = 470,
    /// OAuth token request.
    CsOauthTokenRequest = 480,
    /// OAuth token reply.
    ScOauthTokenRequestResult = 490,

    /// Device calibration/config request from a client (shape B).
    CsDeviceCalcfgRequestB = 620,
    /// Calibration/config request relayed to the device.
    SdDeviceCalcfgRequest = 621,
    /// Calibration/config result from the device.
    DsDeviceCalcfgResult = 622,
    /// Calibration/config result relayed to the client.
    ScDeviceCalcfgResult = 623,
}

impl Call {
    /// Raw wire value.
    pub fn to_u32(self) -> u32 {
        self as u32
    }

    /// Parse a wire value. `None` if unrecognized.
    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            40 => Self::DcsPingServer,
            50 => Self::SdcPingServerResult,
            210 => Self::DcsGetRegistrationEnabled,
            220 => Self::SdcGetRegistrationEnabledResult,
            190 => Self::DcsSetActivityTimeout,
            200 => Self::SdcSetActivityTimeoutResult,
            69 => Self::DsRegisterDeviceE,
            70 => Self::SdRegisterDeviceResult,
            100 => Self::DsDeviceChannelValueChanged,
            103 => Self::DsDeviceChannelValueChangedC,
            110 => Self::SdChannelSetValue,
            120 => Self::DsChannelSetValueResult,
            88 => Self::CsRegisterClientD,
            99 => Self::ScRegisterClientResultD,
            140 => Self::ScLocationPackUpdate,
            330 => Self::ScChannelPackUpdateD,
            340 => Self::ScChannelPackUpdateE,
            350 => Self::ScChannelRelationPackUpdate,
            360 => Self::ScScenePackUpdate,
            380 => Self::ScChannelValuePackUpdateB,
            300 => Self::CsGetNext,
            645 => Self::CsExecuteAction,
            655 => Self::ScActionExecutionResult,
            640 => Self::CsSetValue,
            680 => Self::CsGetChannelConfig,
            690 => Self::ScChannelConfigUpdateOrResult,
            500 => Self::CsdGetChannelState,
            510 => Self::DscChannelStateResult,
            460 => Self::CsSuperuserAuthorizationRequest,
            470 => Self::ScSuperuserAuthorizationResult,
            480 => Self::CsOauthTokenRequest,
            490 => Self::ScOauthTokenRequestResult,
            620 => Self::CsDeviceCalcfgRequestB,
            621 => Self::SdDeviceCalcfgRequest,
            622 => Self::DsDeviceCalcfgResult,
            623 => Self::ScDeviceCalcfgResult,
            _ => return None,
        })
    }
}

impl std::fmt::Display for Call {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
