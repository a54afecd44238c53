//! Shared HTTP plumbing for source adapters.

use std::time::Duration;

use notifier_core::error::{NotifierError, Result};
use reqwest::Client;
use serde_json::Value;

const USER_AGENT: &str = concat!("game-update-notifier/", env!("CARGO_PKG_VERSION"));

/// Build the long-lived client an adapter (or sink) owns for its lifetime.
///
/// `timeout` bounds every request made through the client.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| NotifierError::Config(format!("failed to build HTTP client: {e}")))
}

/// GET `url` and decode the body as JSON.
///
/// Non-2xx answers become [`NotifierError::UnexpectedStatus`]; bodies that
/// are not JSON become [`NotifierError::Payload`].
pub async fn get_json(client: &Client, url: &str) -> Result<Value> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| NotifierError::http(url, e))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| NotifierError::http(url, e))?;

    tracing::trace!(status = status.as_u16(), url, "HTTP GET");
    tracing::trace!(%body);

    if !status.is_success() {
        return Err(NotifierError::UnexpectedStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    serde_json::from_str(&body)
        .map_err(|e| NotifierError::Payload(format!("{url} returned invalid JSON: {e}")))
}

/// Read a JSON number or numeric string as `u64`.
///
/// Upstream APIs are inconsistent about quoting integers.
pub(crate) fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
