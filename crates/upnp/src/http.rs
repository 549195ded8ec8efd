//! Shared reqwest helpers for GETs against the camera

use alphasync_core::{Result, TransportError};
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::debug;

/// Build an HTTP client with a whole-request timeout
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| TransportError::request("<client builder>", e).into())
}

/// Build an HTTP client for media downloads.
///
/// Only connecting is bounded here: a whole-request timeout would also cap
/// how long a body may take to stream, so callers bound stalls per chunk.
pub fn build_streaming_client(connect_timeout: Duration) -> Result<Client> {
    Client::builder()
        .connect_timeout(connect_timeout)
        .build()
        .map_err(|e| TransportError::request("<client builder>", e).into())
}

/// Send a GET and fail on transport errors or non-2xx statuses
pub async fn get(client: &Client, url: &str) -> Result<Response, TransportError> {
    debug!("GET {}", url);

    let response = client
        .get(url)
        .header("Accept", "*/*")
        .send()
        .await
        .map_err(|e| TransportError::request(url, e))?;

    ensure_success(response, url)
}

/// GET a URL and return the body as text
pub async fn get_text(client: &Client, url: &str) -> Result<String, TransportError> {
    let response = get(client, url).await?;
    response
        .text()
        .await
        .map_err(|e| TransportError::request(url, e))
}

pub(crate) fn ensure_success(response: Response, url: &str) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(TransportError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}
