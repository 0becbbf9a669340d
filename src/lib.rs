//! Ledgerline
//!
//! A long-lived client for line-delimited JSON-RPC over TCP or TLS, built to
//! talk to remote indexing/ledger servers: issue method calls, correlate
//! asynchronous responses with their originating ids, and receive
//! server-pushed notifications.

pub mod cli;
pub mod config;
pub mod rpc;

/// Client-wide error types with context preservation
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("protocol error: {message}")]
    Protocol { message: String },

    #[error("server returned error for request {id}: {error}")]
    Rpc { id: u64, error: serde_json::Value },

    #[error("connection closed")]
    ConnectionClosed,
}

impl ClientError {
    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create a server-side RPC error for a specific request id
    pub fn rpc(id: u64, error: serde_json::Value) -> Self {
        Self::Rpc { id, error }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(source: std::io::Error) -> Self {
        Self::Transport {
            message: source.to_string(),
        }
    }
}

/// Convenience type alias for Results
pub type ClientResult<T> = Result<T, ClientError>;

pub use rpc::client::{BatchOutcome, Client};
pub use rpc::transport::{ConnectionStatus, Endpoint, SocketFactory, TcpSocketFactory};
