//! Line-delimited JSON-RPC client core.
//!
//! The protocol is newline-framed JSON over a TCP or TLS byte stream:
//! requests carry a monotonically increasing integer id, responses echo
//! that id back with either a `result` or an `error` member, and id-less
//! messages are server-pushed notifications routed by method name.
//!
//! Components:
//! - `framer` — incremental chunk-to-document parser
//! - `transport` — socket lifecycle (plain TCP or TLS) and the reader task
//! - `dispatch` — pending-id table and response correlation
//! - `subscription` — per-method notification listeners
//! - `client` — the facade composing the four

pub mod client;
pub mod dispatch;
pub mod framer;
pub mod protocol;
pub mod subscription;
pub mod transport;

pub use client::{BatchOutcome, Client};
pub use protocol::{IncomingMessage, Notification, Request, Response};
pub use transport::{ConnectionStatus, Endpoint, SocketFactory, TcpSocketFactory};

/// Default connect timeout in milliseconds
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;
