//! Lightweight SUPLA protocol server.
//!
//! The server owns the canonical state of all devices, channels and
//! scenes, routes value updates from devices to clients, relays action
//! and configuration requests from clients to devices and exposes a
//! small read-only HTTPS API for icon retrieval.
//!
//! # Components
//!
//! - [`connection`]: per-connection runtime (reader loop, event loop,
//!   activity watchdog)
//! - [`handlers`]: the explicit call/event dispatch tables
//! - [`api`]: the HTTPS icon endpoint
//! - [`Server`]: listeners, accept loops and the server event worker

#![forbid(unsafe_code)]

pub mod api;
pub mod connection;
pub mod error;
pub mod handlers;
pub mod tls;

use std::{
    net::SocketAddr,
    path::PathBuf,
    sync::{
        atomic::{AtomicU16, Ordering},
        Arc,
    },
    time::Duration,
};

use supla_core::{
    events::{self, EventReceiver},
    EventSink, ServerState,
};
use tokio::{
    net::TcpListener,
    sync::{watch, Mutex},
    task::JoinSet,
};
use tokio_rustls::TlsAcceptor;

pub use error::{HandlerError, ServerError};
use handlers::Registry;
use tls::TlsMaterial;

/// Runtime settings of a server instance.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Address the listeners bind to.
    pub listen_host: String,
    /// Hostname advertised to peers (OAuth URLs).
    pub host: String,
    /// Plain TCP listener port; 0 picks a free port.
    pub port: u16,
    /// TLS listener port; 0 picks a free port.
    pub secure_port: u16,
    /// HTTPS API listener port; 0 picks a free port.
    pub api_port: u16,
    /// PEM certificate chain; self-signed when absent.
    pub certfile: Option<PathBuf>,
    /// PEM private key; self-signed when absent.
    pub keyfile: Option<PathBuf>,
    /// Caption of the single location every channel lives in.
    pub location_name: String,
    /// Account email checked by superuser authorization.
    pub email: String,
    /// Account password checked by superuser authorization.
    pub password: String,
    /// Activity timeout for fresh connections.
    pub activity_timeout: Duration,
    /// Oldest protocol version accepted on the wire.
    pub min_proto_version: u8,
    /// Channels per startup channel pack.
    pub channelpack_limit: usize,
    /// Entries per channel-value pack.
    pub channelvalue_pack_limit: usize,
}

impl RuntimeConfig {
    /// Derive runtime settings from a parsed configuration file.
    pub fn from_config(config: &supla_core::Config) -> Self {
        let server = &config.server;
        Self {
            listen_host: server.listen_host.clone(),
            host: server.host.clone(),
            port: server.port,
            secure_port: server.secure_port,
            api_port: server.api_port,
            certfile: server.certfile.clone(),
            keyfile: server.keyfile.clone(),
            location_name: server.location_name.clone(),
            email: server.email.clone(),
            password: server.password.clone(),
            activity_timeout: Duration::from_secs(u64::from(server.activity_timeout)),
            min_proto_version: supla_proto::PROTO_VERSION_MIN,
            channelpack_limit: supla_proto::CHANNELPACK_MAXCOUNT,
            channelvalue_pack_limit: supla_proto::CHANNELVALUE_PACK_MAXCOUNT,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            listen_host: "127.0.0.1".to_owned(),
            host: "localhost".to_owned(),
            port: 0,
            secure_port: 0,
            api_port: 0,
            certfile: None,
            keyfile: None,
            location_name: "Home".to_owned(),
            email: "email@email.com".to_owned(),
            password: "password".to_owned(),
            activity_timeout: Duration::from_secs(u64::from(
                supla_proto::ACTIVITY_TIMEOUT_DEFAULT,
            )),
            min_proto_version: supla_proto::PROTO_VERSION_MIN,
            channelpack_limit: supla_proto::CHANNELPACK_MAXCOUNT,
            channelvalue_pack_limit: supla_proto::CHANNELVALUE_PACK_MAXCOUNT,
        }
    }
}

/// State shared by every connection and listener of one server.
pub struct ServerInner {
    /// Runtime settings.
    pub config: RuntimeConfig,
    /// The world state, behind the single coarse lock.
    pub state: Mutex<ServerState>,
    /// Sink of the global server event queue.
    pub events: EventSink,
    /// Immutable dispatch tables.
    pub registry: Registry,
    api_port: AtomicU16,
    connections: Mutex<JoinSet<()>>,
}

impl ServerInner {
    /// Actual HTTPS API port, once listeners are up.
    pub fn api_port(&self) -> u16 {
        self.api_port.load(Ordering::Relaxed)
    }
}

/// A running server.
pub struct Server {
    inner: Arc<ServerInner>,
    port: u16,
    secure_port: u16,
    api_port: u16,
    shutdown: watch::Sender<bool>,
    tasks: JoinSet<()>,
    api_handle: axum_server::Handle,
}

impl Server {
    /// Bind all listeners and start serving.
    pub async fn start(
        config: RuntimeConfig,
        state: ServerState,
        registry: Registry,
    ) -> Result<Self, ServerError> {
        tls::install_crypto_provider();

        let material = TlsMaterial::load(config.certfile.as_deref(), config.keyfile.as_deref())?;
        let tls_config = material.server_config()?;
        let acceptor = TlsAcceptor::from(Arc::clone(&tls_config));

        let plain = TcpListener::bind((config.listen_host.as_str(), config.port)).await?;
        let secure = TcpListener::bind((config.listen_host.as_str(), config.secure_port)).await?;
        let api = std::net::TcpListener::bind((config.listen_host.as_str(), config.api_port))?;
        api.set_nonblocking(true)?;

        let port = plain.local_addr()?.port();
        let secure_port = secure.local_addr()?.port();
        let api_port = api.local_addr()?.port();

        let (events, events_rx) = events::queue();
        let inner = Arc::new(ServerInner {
            config,
            state: Mutex::new(state),
            events,
            registry,
            api_port: AtomicU16::new(api_port),
            connections: Mutex::new(JoinSet::new()),
        });

        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut tasks = JoinSet::new();

        tasks.spawn(server_event_worker(Arc::clone(&inner), events_rx));
        tasks.spawn(accept_loop(Arc::clone(&inner), plain, None, shutdown_rx.clone()));
        tasks.spawn(accept_loop(Arc::clone(&inner), secure, Some(acceptor), shutdown_rx));

        let api_handle = axum_server::Handle::new();
        let rustls_config = axum_server::tls_rustls::RustlsConfig::from_config(tls_config);
        let router = api::router(Arc::clone(&inner));
        let handle = api_handle.clone();
        tasks.spawn(async move {
            let server = axum_server::from_tcp_rustls(api, rustls_config).handle(handle);
            if let Err(error) = server.serve(router.into_make_service()).await {
                tracing::error!("api listener failed: {error}");
            }
        });

        tracing::info!(
            "listening on {port} (tcp), {secure_port} (tls), {api_port} (https api)"
        );

        Ok(Self { inner, port, secure_port, api_port, shutdown, tasks, api_handle })
    }

    /// Shared server state, for embedding and tests.
    pub fn inner(&self) -> &Arc<ServerInner> {
        &self.inner
    }

    /// Bound plain TCP port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Bound TLS port.
    pub fn secure_port(&self) -> u16 {
        self.secure_port
    }

    /// Bound HTTPS API port.
    pub fn api_port(&self) -> u16 {
        self.api_port
    }

    /// Serve until interrupted.
    pub async fn run(self) -> Result<(), ServerError> {
        tokio::signal::ctrl_c().await?;
        tracing::info!("shutting down");
        self.stop().await;
        Ok(())
    }

    /// Stop accepting, tear down connections and release listeners.
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        self.api_handle.shutdown();
        self.inner.connections.lock().await.shutdown().await;
        self.tasks.shutdown().await;
    }
}

/// Accept sockets and hand each to a connection task.
async fn accept_loop(
    inner: Arc<ServerInner>,
    listener: TcpListener,
    acceptor: Option<TlsAcceptor>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let accepted = tokio::select! {
            _ = shutdown.changed() => return,
            accepted = listener.accept() => accepted,
        };
        let (stream, addr) = match accepted {
            Ok(accepted) => accepted,
            Err(error) => {
                tracing::warn!("accept failed: {error}");
                continue;
            },
        };

        let inner_for_conn = Arc::clone(&inner);
        let acceptor = acceptor.clone();
        inner.connections.lock().await.spawn(async move {
            let label = connection_label(addr);
            match acceptor {
                None => connection::run(inner_for_conn, stream, label).await,
                Some(acceptor) => match acceptor.accept(stream).await {
                    Ok(tls_stream) => connection::run(inner_for_conn, tls_stream, label).await,
                    Err(error) => {
                        tracing::info!("{label} tls handshake failed: {error}");
                    },
                },
            }
        });
    }
}

fn connection_label(addr: SocketAddr) -> String {
    format!("conn[{addr}]")
}

/// Drain the global server queue: run server-scope handlers, then fan
/// the event out to every connected peer queue.
async fn server_event_worker(inner: Arc<ServerInner>, mut events: EventReceiver) {
    while let Some(event) = events.recv().await {
        for handler in inner.registry.server_handlers(event.id) {
            if let Err(error) = handler(Arc::clone(&inner), event.clone()).await {
                tracing::error!("server event handler failed for {:?}: {error}", event.id);
            }
        }

        let sinks: Vec<EventSink> = {
            let state = inner.state.lock().await;
            state.connected_event_sinks().cloned().collect()
        };
        for sink in sinks {
            sink.send(event.clone());
        }
    }
}
