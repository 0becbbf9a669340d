//! CLI command implementations.

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::info;

use crate::config::settings::ClientSettings;
use crate::rpc::client::Client;

/// Connect, issue one request, print the result as JSON, close.
pub async fn call(settings: &ClientSettings, method: &str, params: Option<String>) -> Result<()> {
    let params: Value = match params {
        Some(raw) => serde_json::from_str(&raw).context("params must be a JSON value")?,
        None => Value::Array(Vec::new()),
    };
    anyhow::ensure!(params.is_array(), "params must be a JSON array");

    let client = Client::from_settings(settings);
    client
        .connect()
        .await
        .with_context(|| format!("failed to connect to {}", settings.endpoint()))?;

    let result = client.request(method, params).await;
    client.close().await;

    let result = result.with_context(|| format!("request {} failed", method))?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Connect, subscribe to the given events, and print each notification as
/// one JSON line until Ctrl-C.
pub async fn listen(settings: &ClientSettings, events: Vec<String>) -> Result<()> {
    let client = Client::from_settings(settings);
    client
        .connect()
        .await
        .with_context(|| format!("failed to connect to {}", settings.endpoint()))?;

    for event in &events {
        let name = event.clone();
        client.subscribe(event.clone(), move |params| {
            let line = serde_json::json!({ "event": name, "params": params });
            println!("{}", line);
        });
        info!(event = %event, "subscribed");
    }

    tokio::signal::ctrl_c().await.context("failed to wait for Ctrl-C")?;
    info!("interrupted, closing connection");
    client.close().await;
    Ok(())
}
