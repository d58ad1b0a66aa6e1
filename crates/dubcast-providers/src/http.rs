//! Shared HTTP plumbing.

use reqwest::{Client, Response};
use std::time::Duration;

use crate::error::{ProviderError, ProviderResult};

/// Longest error body kept in a [`ProviderError::Status`].
const MAX_ERROR_BODY: usize = 512;

pub(crate) fn build_client(timeout: Duration) -> ProviderResult<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(ProviderError::Network)
}

/// Turn a non-2xx response into [`ProviderError::Status`].
pub(crate) async fn ensure_success(
    service: &'static str,
    response: Response,
) -> ProviderResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }

    Err(ProviderError::Status {
        service,
        status: status.as_u16(),
        body,
    })
}

pub(crate) fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

pub(crate) fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
