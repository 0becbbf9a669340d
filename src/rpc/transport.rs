//! Transport lifecycle for the plain-TCP and TLS byte stream
//!
//! The socket itself comes from an injected [`SocketFactory`], so the core is
//! transport-agnostic and testable against in-memory fakes. The
//! [`ConnectionManager`] owns connect/write/teardown and the spawned reader
//! task that feeds incoming chunks through the framer into the dispatcher.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

use crate::rpc::dispatch::Dispatcher;
use crate::rpc::framer::StreamFramer;
use crate::rpc::subscription::SubscriptionBus;
use crate::{ClientError, ClientResult};

/// Remote server address and transport mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16, tls: bool) -> Self {
        Self {
            host: host.into(),
            port,
            tls,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scheme = if self.tls { "tls" } else { "tcp" };
        write!(f, "{}://{}:{}", scheme, self.host, self.port)
    }
}

/// Connection lifecycle. Closed is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Idle,
    Connecting,
    Open,
    Closed,
}

/// Byte-stream handle produced by a socket factory
pub trait RpcStream: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin> RpcStream for T {}

/// Produces the byte stream a connection runs over. Injected so tests can
/// substitute in-memory pipes for real sockets.
#[async_trait]
pub trait SocketFactory: Send + Sync {
    async fn connect(&self, endpoint: &Endpoint) -> ClientResult<Box<dyn RpcStream>>;
}

/// Default factory: plain TCP, or TCP wrapped in rustls when the endpoint
/// asks for TLS. Certificate validation uses the webpki root set.
#[derive(Default)]
pub struct TcpSocketFactory;

#[async_trait]
impl SocketFactory for TcpSocketFactory {
    async fn connect(&self, endpoint: &Endpoint) -> ClientResult<Box<dyn RpcStream>> {
        let tcp = TcpStream::connect(endpoint.addr()).await.map_err(|e| {
            ClientError::transport(format!("failed to connect to {}: {}", endpoint, e))
        })?;

        if !endpoint.tls {
            return Ok(Box::new(tcp));
        }

        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        let connector = TlsConnector::from(Arc::new(config));
        let server_name = ServerName::try_from(endpoint.host.clone()).map_err(|e| {
            ClientError::transport(format!("invalid TLS server name {}: {}", endpoint.host, e))
        })?;
        let stream = connector.connect(server_name, tcp).await.map_err(|e| {
            ClientError::transport(format!("TLS handshake with {} failed: {}", endpoint, e))
        })?;
        Ok(Box::new(stream))
    }
}

/// Owns the transport lifecycle of one connection: connect, write, detect
/// close or error, and reject every pending completion on teardown.
pub struct ConnectionManager {
    endpoint: Endpoint,
    connect_timeout: Duration,
    factory: Arc<dyn SocketFactory>,
    dispatcher: Arc<Dispatcher>,
    bus: Arc<SubscriptionBus>,
    status: Mutex<ConnectionStatus>,
    writer: tokio::sync::Mutex<Option<WriteHalf<Box<dyn RpcStream>>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    pub fn new(
        endpoint: Endpoint,
        connect_timeout: Duration,
        factory: Arc<dyn SocketFactory>,
        dispatcher: Arc<Dispatcher>,
        bus: Arc<SubscriptionBus>,
    ) -> Self {
        Self {
            endpoint,
            connect_timeout,
            factory,
            dispatcher,
            bus,
            status: Mutex::new(ConnectionStatus::Idle),
            writer: tokio::sync::Mutex::new(None),
            reader: Mutex::new(None),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.lock().expect("status lock poisoned")
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Open the transport. Idempotent when already Open; fails with a
    /// transport error if the configured connect timeout elapses or the
    /// socket errors before the stream is up.
    pub async fn connect(self: &Arc<Self>) -> ClientResult<()> {
        {
            let mut status = self.status.lock().expect("status lock poisoned");
            match *status {
                ConnectionStatus::Open => return Ok(()),
                ConnectionStatus::Connecting => {
                    return Err(ClientError::transport("connect already in progress"))
                }
                ConnectionStatus::Closed => return Err(ClientError::ConnectionClosed),
                ConnectionStatus::Idle => *status = ConnectionStatus::Connecting,
            }
        }

        let stream = match timeout(self.connect_timeout, self.factory.connect(&self.endpoint))
            .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                self.revert_to_idle();
                return Err(e);
            }
            Err(_) => {
                self.revert_to_idle();
                return Err(ClientError::transport(format!(
                    "connect to {} timed out after {}ms",
                    self.endpoint,
                    self.connect_timeout.as_millis()
                )));
            }
        };

        // close() may have won the race while the factory was working.
        {
            let mut status = self.status.lock().expect("status lock poisoned");
            if *status != ConnectionStatus::Connecting {
                return Err(ClientError::ConnectionClosed);
            }
            *status = ConnectionStatus::Open;
        }

        let (read_half, write_half) = tokio::io::split(stream);
        *self.writer.lock().await = Some(write_half);
        let manager = Arc::clone(self);
        let handle = tokio::spawn(Self::read_loop(manager, read_half));
        *self.reader.lock().expect("reader lock poisoned") = Some(handle);

        debug!(endpoint = %self.endpoint, "connection open");
        Ok(())
    }

    /// Tear the transport down. Idempotent; repeated calls after Closed are
    /// no-ops. Every pending request is rejected with ConnectionClosed.
    pub async fn close(&self) {
        let handle = self.reader.lock().expect("reader lock poisoned").take();
        self.teardown().await;
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    /// Write one already-framed message to the socket. A write failure
    /// forces the connection Closed.
    pub async fn write(&self, frame: &[u8]) -> ClientResult<()> {
        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Err(ClientError::transport("socket is not open"));
        };

        let result = match writer.write_all(frame).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(error = %e, "socket write failed");
            guard.take();
            drop(guard);
            self.teardown().await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Fail fast when the stream is not up, without touching the socket.
    pub fn ensure_open(&self) -> ClientResult<()> {
        match self.status() {
            ConnectionStatus::Open => Ok(()),
            _ => Err(ClientError::transport("socket is not open")),
        }
    }

    fn revert_to_idle(&self) {
        let mut status = self.status.lock().expect("status lock poisoned");
        if *status == ConnectionStatus::Connecting {
            *status = ConnectionStatus::Idle;
        }
    }

    async fn teardown(&self) {
        {
            let mut status = self.status.lock().expect("status lock poisoned");
            if *status == ConnectionStatus::Closed {
                return;
            }
            *status = ConnectionStatus::Closed;
        }
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        self.dispatcher.fail_all();
        debug!(endpoint = %self.endpoint, "connection closed");
    }

    /// Single reader task: chunks off the socket go through the framer, and
    /// every complete document is dispatched from this one place. Ends on
    /// EOF or read error, which tears the connection down.
    async fn read_loop(manager: Arc<Self>, mut read_half: ReadHalf<Box<dyn RpcStream>>) {
        let mut framer = StreamFramer::new();
        let mut buf = vec![0u8; 8192];
        loop {
            match read_half.read(&mut buf).await {
                Ok(0) => {
                    debug!(endpoint = %manager.endpoint, "server ended the stream");
                    break;
                }
                Ok(n) => {
                    for document in framer.push(&buf[..n]) {
                        manager.dispatcher.handle_document(document, &manager.bus);
                    }
                }
                Err(e) => {
                    warn!(endpoint = %manager.endpoint, error = %e, "socket read failed");
                    break;
                }
            }
        }
        manager.teardown().await;
    }
}
