//! Round-trip tests over a real loopback TCP socket.

use anyhow::Result;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use ledgerline::config::init_test_logging;
use ledgerline::{Client, ClientError, Endpoint};

/// One-shot line-delimited JSON-RPC server: answers every request on a
/// single accepted connection with `{"id": <id>, "result": "pong"}`.
async fn spawn_pong_server() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut socket = BufReader::new(socket);
        let mut line = String::new();
        while socket.read_line(&mut line).await.unwrap() > 0 {
            let request: Value = serde_json::from_str(&line).unwrap();
            let reply = json!({"id": request["id"], "result": "pong"});
            let mut bytes = serde_json::to_vec(&reply).unwrap();
            bytes.push(b'\n');
            socket.get_mut().write_all(&bytes).await.unwrap();
            line.clear();
        }
    });
    Ok(port)
}

#[tokio::test]
async fn test_tcp_round_trip() -> Result<()> {
    let _ = init_test_logging();
    let port = spawn_pong_server().await?;

    let client = Client::new(Endpoint::new("127.0.0.1", port, false));
    client.connect().await?;

    let result = client.request("server.ping", json!([])).await?;
    assert_eq!(result, json!("pong"));

    client.close().await;
    Ok(())
}

#[tokio::test]
async fn test_tcp_connect_refused_surfaces_transport_error() {
    // Bind then drop to get a port with nothing listening on it.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let client = Client::new(Endpoint::new("127.0.0.1", port, false));
    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, ClientError::Transport { .. }));
    assert_ne!(
        client.status(),
        ledgerline::ConnectionStatus::Closed,
        "a failed connect leaves the client reusable"
    );
}
