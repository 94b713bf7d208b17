//! HTTP GET transport for context and DID document fetches.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Error;

pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

pub const ACCEPT_JSON_LD: &str = "application/ld+json, application/json";

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse, Error>;
}

/// GET `url` and parse the body as JSON, requiring a 2xx status.
pub async fn get_json(client: &dyn HttpClient, url: &str) -> Result<Value, Error> {
    log::info!("fetching {}", url);
    let response = client.get(url).await?;
    if !response.is_success() {
        return Err(Error::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }
    serde_json::from_slice(&response.body).map_err(|e| Error::Http {
        url: url.to_string(),
        message: format!("invalid JSON body: {e}"),
    })
}

/// Transport for deployments without network access.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHttpClient;

#[async_trait]
impl HttpClient for NoHttpClient {
    async fn get(&self, _url: &str) -> Result<HttpResponse, Error> {
        Err(Error::NetworkUnavailable)
    }
}

#[cfg(feature = "http")]
pub use reqwest_client::ReqwestClient;

#[cfg(feature = "http")]
mod reqwest_client {
    use super::*;
    use std::time::Duration;

    /// `reqwest` transport. Under async-std the `tokio1` feature supplies the
    /// runtime it needs.
    #[derive(Debug, Clone)]
    pub struct ReqwestClient {
        client: reqwest::Client,
    }

    impl ReqwestClient {
        pub fn new(timeout: Duration) -> Result<Self, Error> {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert(
                "User-Agent",
                reqwest::header::HeaderValue::from_static(USER_AGENT),
            );
            headers.insert(
                "Accept",
                reqwest::header::HeaderValue::from_static(ACCEPT_JSON_LD),
            );
            let client = reqwest::Client::builder()
                .default_headers(headers)
                .timeout(timeout)
                .build()
                .map_err(|e| Error::Http {
                    url: String::new(),
                    message: format!("Error building HTTP client: {e}"),
                })?;
            Ok(Self { client })
        }
    }

    #[async_trait]
    impl HttpClient for ReqwestClient {
        async fn get(&self, url: &str) -> Result<HttpResponse, Error> {
            let http_err = |e: reqwest::Error| Error::Http {
                url: url.to_string(),
                message: e.to_string(),
            };
            let resp = self.client.get(url).send().await.map_err(http_err)?;
            let status = resp.status().as_u16();
            let body = resp.bytes().await.map_err(http_err)?.to_vec();
            Ok(HttpResponse { status, body })
        }
    }
}
