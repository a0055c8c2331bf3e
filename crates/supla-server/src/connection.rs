//! Per-connection runtime.
//!
//! Every accepted socket gets a [`Connection`] with three concurrent
//! activities: a reader loop that decodes packets and dispatches them to
//! call handlers, an event loop that drains the connection's event queue
//! into the handlers of its registered scope, and an activity watchdog
//! folded into the reader's receive timeout.
//!
//! The connection starts unregistered; a successful device or client
//! registration moves it to the matching peer state, stores its event
//! sink in the world state and emits the connection events. Any network
//! error, unknown call or handler failure is terminal: the runtime
//! cleans up state, emits the disconnect event and closes the socket.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering},
        Arc, Mutex as StdMutex,
    },
    time::Duration,
};

use supla_core::{
    events::{self, EventReceiver, EventScope},
    state::{ClientId, DeviceId},
    Event, EventId, EventSink,
};
use supla_proto::{packets::Packet, Call, Codec, PacketReader, PacketSender};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{error::HandlerError, ServerInner};

/// Read half type after transport erasure.
pub type BoxedReader = PacketReader<Box<dyn AsyncRead + Send + Unpin>>;
/// Write half type after transport erasure.
pub type BoxedSender = PacketSender<Box<dyn AsyncWrite + Send + Unpin>>;

/// Registration state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Peer {
    /// No registration yet; only the common calls are meaningful.
    Unregistered,
    /// Registered as the device with this id.
    Device(DeviceId),
    /// Registered as the client with this id.
    Client(ClientId),
}

/// Startup-listing cursor of a client connection, advanced by `CS_GET_NEXT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Next up: the channel batch starting at this offset.
    Channels(usize),
    /// Next up: the channel relation listing.
    Relations,
    /// Next up: the scene listing.
    Scenes,
    /// Startup listing finished; further pumps are ignored.
    Done,
}

/// Shared state of one accepted connection.
pub struct Connection {
    server: Arc<ServerInner>,
    sender: BoxedSender,
    /// This connection's event queue sink; handed to the world state at
    /// registration.
    pub(crate) events: EventSink,
    peer: StdMutex<Peer>,
    label: StdMutex<String>,
    sync: StdMutex<SyncPhase>,
    errored: AtomicBool,
    activity_timeout_ms: AtomicU64,
    proto_version: AtomicU8,
}

impl Connection {
    fn new(server: Arc<ServerInner>, sender: BoxedSender, events: EventSink, label: String) -> Self {
        let activity_timeout = server.config.activity_timeout;
        Self {
            server,
            sender,
            events,
            peer: StdMutex::new(Peer::Unregistered),
            label: StdMutex::new(label),
            sync: StdMutex::new(SyncPhase::Channels(0)),
            errored: AtomicBool::new(false),
            activity_timeout_ms: AtomicU64::new(activity_timeout.as_millis() as u64),
            proto_version: AtomicU8::new(0),
        }
    }

    /// The server this connection belongs to.
    pub fn server(&self) -> &Arc<ServerInner> {
        &self.server
    }

    /// Current registration state.
    pub fn peer(&self) -> Peer {
        *self.peer.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Move to a new registration state.
    pub fn set_peer(&self, peer: Peer) {
        *self.peer.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = peer;
    }

    /// Log label, `device[name]`/`client[name]` once registered.
    pub fn label(&self) -> String {
        self.label.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    /// Replace the log label after registration.
    pub fn set_label(&self, label: String) {
        *self.label.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = label;
    }

    /// Current startup-listing cursor.
    pub fn sync_phase(&self) -> SyncPhase {
        *self.sync.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Advance the startup-listing cursor.
    pub fn set_sync_phase(&self, phase: SyncPhase) {
        *self.sync.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = phase;
    }

    /// Mark the connection errored; it closes after the current reply.
    pub fn set_errored(&self) {
        self.errored.store(true, Ordering::Relaxed);
    }

    /// The connection has been marked errored.
    pub fn is_errored(&self) -> bool {
        self.errored.load(Ordering::Relaxed)
    }

    /// Current activity timeout.
    pub fn activity_timeout(&self) -> Duration {
        Duration::from_millis(self.activity_timeout_ms.load(Ordering::Relaxed))
    }

    /// Activity timeout in whole seconds, as reported to peers.
    pub fn activity_timeout_secs(&self) -> u8 {
        (self.activity_timeout().as_secs()).min(u64::from(u8::MAX)) as u8
    }

    /// Replace the activity timeout (already clamped by the caller).
    pub fn set_activity_timeout(&self, timeout: Duration) {
        self.activity_timeout_ms.store(timeout.as_millis() as u64, Ordering::Relaxed);
    }

    /// Protocol version the peer announced; 0 before the first packet.
    pub fn proto_version(&self) -> u8 {
        self.proto_version.load(Ordering::Relaxed)
    }

    /// Encode a record and send it under the given call id.
    pub async fn send<M: Codec>(&self, call: Call, msg: &M) -> Result<(), HandlerError> {
        let data = msg.encode()?;
        self.send_packet(&Packet::new(call, data)).await
    }

    /// Send an already-encoded packet.
    pub async fn send_packet(&self, packet: &Packet) -> Result<(), HandlerError> {
        tracing::debug!("{} send {}", self.label(), packet.call_id);
        self.sender.send(packet).await?;
        Ok(())
    }
}

/// Run a connection to completion.
///
/// Owns the transport; returns once the connection is fully torn down.
pub async fn run<S>(server: Arc<ServerInner>, stream: S, peer_label: String)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let reader: BoxedReader = PacketReader::with_min_version(
        Box::new(read_half),
        server.config.min_proto_version,
    );
    let sender: BoxedSender = PacketSender::new(Box::new(write_half));

    let (event_sink, event_rx) = events::queue();
    let conn = Arc::new(Connection::new(server, sender, event_sink, peer_label));

    tracing::debug!("{} connected", conn.label());

    let event_task = tokio::spawn(event_loop(Arc::clone(&conn), event_rx));

    read_loop(&conn, reader).await;
    tracing::debug!("{} call task stopped", conn.label());

    teardown(&conn).await;

    event_task.abort();
    let _ = event_task.await;
    tracing::debug!("{} event task stopped", conn.label());

    let _ = conn.sender.shutdown().await;
    tracing::debug!("{} closed", conn.label());
}

/// Receive packets and dispatch them to call handlers until the
/// connection dies.
async fn read_loop(conn: &Arc<Connection>, mut reader: BoxedReader) {
    loop {
        let timeout = conn.activity_timeout();
        let packet = match tokio::time::timeout(timeout, reader.recv()).await {
            Err(_) => {
                tracing::info!(
                    "{} timed out after {} seconds; closing connection",
                    conn.label(),
                    timeout.as_secs()
                );
                return;
            },
            Ok(Err(error)) => {
                tracing::info!("{} network error: {error}", conn.label());
                return;
            },
            Ok(Ok(packet)) => packet,
        };

        if let Some(version) = reader.proto_version() {
            conn.proto_version.store(version, Ordering::Relaxed);
        }

        let Some(entry) = conn.server.registry.call(packet.call_id) else {
            tracing::warn!("{} unhandled call {}", conn.label(), packet.call_id);
            conn.set_errored();
            close_if_errored(conn);
            return;
        };

        tracing::debug!("{} handle call {}", conn.label(), packet.call_id);
        match entry.invoke(Arc::clone(conn), packet.data.clone()).await {
            Ok(Some(reply)) => {
                let Some(reply_call) = entry.reply else {
                    tracing::error!(
                        "{} handler for {} produced a reply but declares none",
                        conn.label(),
                        packet.call_id
                    );
                    conn.set_errored();
                    return;
                };
                if let Err(error) = conn.send_packet(&Packet::new(reply_call, reply)).await {
                    tracing::info!("{} network error: {error}", conn.label());
                    return;
                }
            },
            Ok(None) => {},
            Err(error) => {
                tracing::error!(
                    "{} handler failed for {}: {error}",
                    conn.label(),
                    packet.call_id
                );
                conn.set_errored();
            },
        }

        if conn.is_errored() {
            close_if_errored(conn);
            return;
        }
    }
}

fn close_if_errored(conn: &Connection) {
    if conn.is_errored() {
        tracing::info!("{} error; closing connection", conn.label());
    }
}

/// Drain the connection's event queue into the handlers of its scope.
async fn event_loop(conn: Arc<Connection>, mut events: EventReceiver) {
    while let Some(event) = events.recv().await {
        let scope = match conn.peer() {
            Peer::Device(_) => EventScope::Device,
            Peer::Client(_) => EventScope::Client,
            Peer::Unregistered => continue,
        };
        for handler in conn.server.registry.peer_handlers(scope, event.id) {
            tracing::debug!("{} handle event {:?}", conn.label(), event.id);
            if let Err(error) = handler(Arc::clone(&conn), event.clone()).await {
                tracing::error!(
                    "{} event handler failed for {:?}: {error}",
                    conn.label(),
                    event.id
                );
            }
        }
    }
}

/// Undo the connection's registration and emit the disconnect event.
async fn teardown(conn: &Arc<Connection>) {
    match conn.peer() {
        Peer::Unregistered => {},
        Peer::Device(device_id) => {
            let mut state = conn.server.state.lock().await;
            let _ = state.device_disconnected(device_id);
            drop(state);
            conn.server.events.send(Event::peer(EventId::DeviceDisconnected, device_id));
            tracing::info!("{} disconnected", conn.label());
        },
        Peer::Client(client_id) => {
            let mut state = conn.server.state.lock().await;
            let _ = state.client_disconnected(client_id);
            drop(state);
            conn.server.events.send(Event::peer(EventId::ClientDisconnected, client_id));
            tracing::info!("{} disconnected", conn.label());
        },
    }
}
