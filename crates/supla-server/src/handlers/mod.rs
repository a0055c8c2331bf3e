//! Call and event handler registry.
//!
//! Handlers are bound to call ids and `(scope, event id)` pairs in an
//! explicit table built once at startup. The connection runtime looks up
//! incoming packets by call id; event workers look up queued events by
//! their scope. Entries are immutable after [`RegistryBuilder::build`].
//!
//! A call handler receives the connection and the raw payload, decodes
//! its own request record and either returns the encoded reply (sent
//! under the entry's registered reply call id) or sends imperatively
//! through the connection and returns `None`.

pub mod client;
pub mod common;
pub mod device;

use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};

use bytes::Bytes;
use supla_core::{Event, EventId, EventScope};
use supla_proto::Call;

use crate::{connection::Connection, error::HandlerError, ServerInner};

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Result of a call handler: the encoded reply record, if any.
pub type CallResult = Result<Option<Vec<u8>>, HandlerError>;

type CallHandlerFn = Arc<dyn Fn(Arc<Connection>, Bytes) -> BoxFuture<CallResult> + Send + Sync>;

/// Handler bound to events on device or client queues.
pub type PeerEventHandler =
    Arc<dyn Fn(Arc<Connection>, Event) -> BoxFuture<Result<(), HandlerError>> + Send + Sync>;

/// Handler bound to events on the global server queue.
pub type ServerEventHandler =
    Arc<dyn Fn(Arc<ServerInner>, Event) -> BoxFuture<Result<(), HandlerError>> + Send + Sync>;

/// One registered call.
pub struct CallEntry {
    /// Call id the reply is sent under, for request/response calls.
    pub reply: Option<Call>,
    handler: CallHandlerFn,
}

impl CallEntry {
    /// Run the handler.
    pub fn invoke(&self, conn: Arc<Connection>, data: Bytes) -> BoxFuture<CallResult> {
        (self.handler)(conn, data)
    }
}

/// Immutable dispatch tables.
#[derive(Default)]
pub struct Registry {
    calls: HashMap<Call, CallEntry>,
    peer_events: HashMap<(EventScope, EventId), Vec<PeerEventHandler>>,
    server_events: HashMap<EventId, Vec<ServerEventHandler>>,
}

impl Registry {
    /// Look up a call entry.
    pub fn call(&self, call: Call) -> Option<&CallEntry> {
        self.calls.get(&call)
    }

    /// Handlers for an event on a device or client queue, in
    /// registration order.
    pub fn peer_handlers(&self, scope: EventScope, event: EventId) -> &[PeerEventHandler] {
        self.peer_events.get(&(scope, event)).map_or(&[], Vec::as_slice)
    }

    /// Handlers for an event on the server queue, in registration order.
    pub fn server_handlers(&self, event: EventId) -> &[ServerEventHandler] {
        self.server_events.get(&event).map_or(&[], Vec::as_slice)
    }
}

/// Builder for the dispatch tables.
#[derive(Default)]
pub struct RegistryBuilder {
    registry: Registry,
}

impl RegistryBuilder {
    /// Start an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a fire-and-forget call.
    pub fn on_call<F, Fut>(&mut self, call: Call, handler: F) -> &mut Self
    where
        F: Fn(Arc<Connection>, Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallResult> + Send + 'static,
    {
        self.insert_call(call, None, handler)
    }

    /// Bind a request/response call; the handler's reply record is sent
    /// under `reply`.
    pub fn on_call_replying<F, Fut>(&mut self, call: Call, reply: Call, handler: F) -> &mut Self
    where
        F: Fn(Arc<Connection>, Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallResult> + Send + 'static,
    {
        self.insert_call(call, Some(reply), handler)
    }

    fn insert_call<F, Fut>(&mut self, call: Call, reply: Option<Call>, handler: F) -> &mut Self
    where
        F: Fn(Arc<Connection>, Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallResult> + Send + 'static,
    {
        let handler: CallHandlerFn = Arc::new(move |conn, data| Box::pin(handler(conn, data)));
        self.registry.calls.insert(call, CallEntry { reply, handler });
        self
    }

    /// Bind an event on device queues.
    pub fn on_device_event<F, Fut>(&mut self, event: EventId, handler: F) -> &mut Self
    where
        F: Fn(Arc<Connection>, Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.insert_peer_event(EventScope::Device, event, handler)
    }

    /// Bind an event on client queues.
    pub fn on_client_event<F, Fut>(&mut self, event: EventId, handler: F) -> &mut Self
    where
        F: Fn(Arc<Connection>, Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.insert_peer_event(EventScope::Client, event, handler)
    }

    fn insert_peer_event<F, Fut>(
        &mut self,
        scope: EventScope,
        event: EventId,
        handler: F,
    ) -> &mut Self
    where
        F: Fn(Arc<Connection>, Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        let handler: PeerEventHandler = Arc::new(move |conn, event| Box::pin(handler(conn, event)));
        self.registry.peer_events.entry((scope, event)).or_default().push(handler);
        self
    }

    /// Bind an event on the global server queue.
    pub fn on_server_event<F, Fut>(&mut self, event: EventId, handler: F) -> &mut Self
    where
        F: Fn(Arc<ServerInner>, Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        let handler: ServerEventHandler =
            Arc::new(move |server, event| Box::pin(handler(server, event)));
        self.registry.server_events.entry(event).or_default().push(handler);
        self
    }

    /// Freeze the tables.
    pub fn build(self) -> Registry {
        self.registry
    }
}

/// The registry with every protocol handler bound.
///
/// Callers may add further event handlers (monitoring, bridges) before
/// building.
pub fn default_registry() -> RegistryBuilder {
    let mut builder = RegistryBuilder::new();

    // Device/client common calls
    builder
        .on_call_replying(Call::DcsPingServer, Call::SdcPingServerResult, common::ping)
        .on_call_replying(
            Call::DcsGetRegistrationEnabled,
            Call::SdcGetRegistrationEnabledResult,
            common::get_registration_enabled,
        )
        .on_call_replying(
            Call::DcsSetActivityTimeout,
            Call::SdcSetActivityTimeoutResult,
            common::set_activity_timeout,
        );

    // Device calls
    builder
        .on_call_replying(
            Call::DsRegisterDeviceE,
            Call::SdRegisterDeviceResult,
            device::register_device,
        )
        .on_call(Call::DsDeviceChannelValueChanged, device::channel_value_changed)
        .on_call(Call::DsDeviceChannelValueChangedC, device::channel_value_changed_c)
        .on_call(Call::DsChannelSetValueResult, device::channel_set_value_result)
        .on_call(Call::DscChannelStateResult, device::channel_state_result)
        .on_call(Call::DsDeviceCalcfgResult, device::calcfg_result);

    // Device queue events
    builder
        .on_device_event(EventId::ChannelSetValue, device::on_channel_set_value)
        .on_device_event(EventId::GetChannelState, device::on_get_channel_state)
        .on_device_event(EventId::DeviceConfig, device::on_calcfg_request);

    // Client calls
    builder
        // replies imperatively so the result precedes the startup packs
        .on_call(Call::CsRegisterClientD, client::register_client)
        .on_call(Call::CsGetNext, client::get_next)
        .on_call_replying(
            Call::CsExecuteAction,
            Call::ScActionExecutionResult,
            client::execute_action,
        )
        .on_call(Call::CsSetValue, client::set_value)
        .on_call_replying(
            Call::CsGetChannelConfig,
            Call::ScChannelConfigUpdateOrResult,
            client::get_channel_config,
        )
        .on_call(Call::CsdGetChannelState, client::get_channel_state)
        .on_call(Call::CsSuperuserAuthorizationRequest, client::superuser_authorization)
        .on_call_replying(
            Call::CsOauthTokenRequest,
            Call::ScOauthTokenRequestResult,
            client::oauth_token_request,
        )
        .on_call(Call::CsDeviceCalcfgRequestB, client::calcfg_request);

    // Client queue events
    builder
        .on_client_event(EventId::SendLocations, client::on_send_locations)
        .on_client_event(EventId::SendChannels, client::on_send_channels)
        .on_client_event(EventId::SendChannelRelations, client::on_send_channel_relations)
        .on_client_event(EventId::SendScenes, client::on_send_scenes)
        .on_client_event(EventId::DeviceConnected, client::on_device_connection_changed)
        .on_client_event(EventId::DeviceDisconnected, client::on_device_connection_changed)
        .on_client_event(EventId::ChannelValueChanged, client::on_channel_value_changed)
        .on_client_event(EventId::ChannelStateResult, client::on_channel_state_result)
        .on_client_event(EventId::DeviceConfigResult, client::on_calcfg_result);

    builder
}
