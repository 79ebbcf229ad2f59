//! Loading raw logs from a local path, the upload storage or over HTTP.

mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Context, Result};
use tracing::debug;

use crate::config::resolve_storage_path;

/// Downloads `url`. Non-2xx statuses are errors.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(
        reqwest::Method::GET,
        url.parse().with_context(|| format!("invalid url '{url}'"))?,
    );

    let resp = client.execute(req).await?.error_for_status()?;
    Ok(resp.bytes().await?.to_vec())
}

/// Reads a log given as an `http(s)` URL, a file path, or a bare storage id.
pub async fn load_source<C: HttpClient>(client: &C, source: &str) -> Result<Vec<u8>> {
    if source.starts_with("http://") || source.starts_with("https://") {
        return fetch_bytes(client, source).await;
    }
    let path = resolve_storage_path(source);
    debug!(path = %path.display(), "Reading log from disk");
    tokio::fs::read(&path)
        .await
        .with_context(|| format!("failed to read log {}", path.display()))
}
