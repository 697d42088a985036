//! Loading input bytes from a local path or an HTTP(S) URL.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Request, Response};
use tracing::debug;

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}

/// Plain `reqwest` client with connect and request timeouts.
pub struct BasicClient(reqwest::Client);

impl BasicClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self(client))
    }
}

#[async_trait]
impl HttpClient for BasicClient {
    async fn execute(&self, req: Request) -> reqwest::Result<Response> {
        self.0.execute(req).await
    }
}

pub fn is_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = Request::new(reqwest::Method::GET, url.parse()?);
    let resp = client
        .execute(req)
        .await
        .with_context(|| format!("request to {url} failed"))?
        .error_for_status()?;
    Ok(resp.bytes().await?.to_vec())
}

/// Reads `location` from disk, or over HTTP when it is a URL.
#[tracing::instrument(skip(client))]
pub async fn load_bytes<C: HttpClient>(client: &C, location: &str) -> Result<Vec<u8>> {
    let bytes = if is_url(location) {
        fetch_bytes(client, location).await?
    } else {
        tokio::fs::read(location)
            .await
            .with_context(|| format!("cannot read {location}"))?
    };
    debug!(bytes = bytes.len(), "Source loaded");
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    /// Fails the test if a request ever reaches the network layer.
    struct UnreachableClient;

    #[async_trait]
    impl HttpClient for UnreachableClient {
        async fn execute(&self, req: Request) -> reqwest::Result<Response> {
            panic!("unexpected request to {}", req.url());
        }
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.org/nodes.csv"));
        assert!(is_url("http://localhost:8000/nodes.csv"));
        assert!(!is_url("data/nodes.csv"));
    }

    #[tokio::test]
    async fn test_malformed_url_fails_before_request() {
        let err = fetch_bytes(&UnreachableClient, "http://exa mple.org/nodes.csv").await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_local_path_never_touches_client() {
        let path = env::temp_dir().join("traffic_shards_test_source_local.csv");
        std::fs::write(&path, "id,lat,lng\n").unwrap();

        let bytes = load_bytes(&UnreachableClient, path.to_str().unwrap())
            .await
            .unwrap();
        assert!(bytes.starts_with(b"id,"));
        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_load_bytes_from_file() {
        let path = env::temp_dir().join("traffic_shards_test_source.csv");
        std::fs::write(&path, "id,lat,lng\n").unwrap();
        let client = BasicClient::new().unwrap();

        let bytes = load_bytes(&client, path.to_str().unwrap()).await.unwrap();
        assert_eq!(bytes, b"id,lat,lng\n");
        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_load_bytes_missing_file_errors() {
        let client = BasicClient::new().unwrap();
        assert!(load_bytes(&client, "/nonexistent/nodes.csv").await.is_err());
    }
}
