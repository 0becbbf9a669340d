//! Client facade composing framer, transport, dispatcher, and bus
//!
//! The facade owns no state of its own beyond the wiring. Any number of
//! caller tasks may issue requests back to back; concurrency is expressed as
//! multiple outstanding ids on one connection, not multiple sockets.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::config::settings::ClientSettings;
use crate::rpc::dispatch::Dispatcher;
use crate::rpc::protocol::Request;
use crate::rpc::subscription::SubscriptionBus;
use crate::rpc::transport::{ConnectionManager, ConnectionStatus, Endpoint, SocketFactory, TcpSocketFactory};
use crate::rpc::DEFAULT_CONNECT_TIMEOUT_MS;
use crate::{ClientError, ClientResult};

pub use crate::rpc::dispatch::BatchOutcome;

/// Long-lived client for one line-delimited JSON-RPC connection
pub struct Client {
    manager: Arc<ConnectionManager>,
    dispatcher: Arc<Dispatcher>,
    bus: Arc<SubscriptionBus>,
}

impl Client {
    /// Client over the default TCP/TLS socket factory
    pub fn new(endpoint: Endpoint) -> Self {
        Self::with_factory(
            endpoint,
            Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            Arc::new(TcpSocketFactory),
        )
    }

    pub fn from_settings(settings: &ClientSettings) -> Self {
        Self::with_factory(
            settings.endpoint(),
            settings.connect_timeout(),
            Arc::new(TcpSocketFactory),
        )
    }

    /// Client over an injected socket factory, e.g. an in-memory pipe
    pub fn with_factory(
        endpoint: Endpoint,
        connect_timeout: Duration,
        factory: Arc<dyn SocketFactory>,
    ) -> Self {
        let dispatcher = Arc::new(Dispatcher::new());
        let bus = Arc::new(SubscriptionBus::new());
        let manager = Arc::new(ConnectionManager::new(
            endpoint,
            connect_timeout,
            factory,
            Arc::clone(&dispatcher),
            Arc::clone(&bus),
        ));
        Self {
            manager,
            dispatcher,
            bus,
        }
    }

    /// Open the connection. Returns immediately when already Open.
    pub async fn connect(&self) -> ClientResult<()> {
        self.manager.connect().await
    }

    /// Tear the connection down, rejecting every outstanding call with
    /// ConnectionClosed. Idempotent.
    pub async fn close(&self) {
        self.manager.close().await;
    }

    pub fn status(&self) -> ConnectionStatus {
        self.manager.status()
    }

    /// Issue one call and suspend until its response arrives or the
    /// connection closes. `params` is the full JSON params array.
    pub async fn request(&self, method: &str, params: Value) -> ClientResult<Value> {
        self.manager.ensure_open()?;

        let (id, rx) = self.dispatcher.register_single();
        let mut frame = serde_json::to_vec(&Request::new(id, method, params))
            .map_err(|e| ClientError::protocol(format!("failed to serialize request: {}", e)))?;
        frame.push(b'\n');

        debug!(id, method, "sending request");
        if let Err(e) = self.manager.write(&frame).await {
            self.dispatcher.discard(id);
            return Err(e);
        }

        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ClientError::ConnectionClosed),
        }
    }

    /// Issue one call per entry of `params_list` in a single wire frame and
    /// suspend until the whole batch resolves. Each entry's wire params are
    /// `[param]`, or `[param, second_param]` when the latter is supplied.
    /// The result is aligned positionally with `params_list`; a server error
    /// for one entry fails that entry's outcome only.
    pub async fn request_batch(
        &self,
        method: &str,
        params_list: Vec<Value>,
        second_param: Option<Value>,
    ) -> ClientResult<Vec<BatchOutcome>> {
        if params_list.is_empty() {
            return Ok(Vec::new());
        }
        self.manager.ensure_open()?;

        let (ids, key, rx) = self.dispatcher.register_batch(params_list.clone());
        let requests: Vec<Request> = ids
            .iter()
            .zip(&params_list)
            .map(|(&id, param)| {
                let params = match &second_param {
                    Some(second) => Value::Array(vec![param.clone(), second.clone()]),
                    None => Value::Array(vec![param.clone()]),
                };
                Request::new(id, method, params)
            })
            .collect();

        let mut frame = serde_json::to_vec(&requests)
            .map_err(|e| ClientError::protocol(format!("failed to serialize batch: {}", e)))?;
        frame.push(b'\n');

        debug!(method, size = ids.len(), "sending batch request");
        if let Err(e) = self.manager.write(&frame).await {
            self.dispatcher.discard_batch(key);
            return Err(e);
        }

        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ClientError::ConnectionClosed),
        }
    }

    /// Register a listener for server-pushed notifications with the given
    /// event name. Listeners run synchronously in registration order.
    pub fn subscribe<F>(&self, event: impl Into<String>, listener: F)
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.bus.subscribe(event, listener);
    }
}
