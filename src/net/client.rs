use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use url::Url;

use super::types::{Request, Response};

/// Live network access.
///
/// An `Err` means the transport itself failed (DNS, refused connection, offline).
/// HTTP error statuses are still successful fetches and come back as `Ok`.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
  async fn fetch(&self, request: &Request) -> Result<Response>;
}

/// Fetcher backed by a shared reqwest client.
#[derive(Clone)]
pub struct HttpFetcher {
  client: reqwest::Client,
}

impl HttpFetcher {
  pub fn new() -> Result<Self> {
    let client = reqwest::Client::builder()
      .user_agent(concat!("sawmill-offline/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client })
  }
}

#[async_trait]
impl Fetcher for HttpFetcher {
  async fn fetch(&self, request: &Request) -> Result<Response> {
    let url = Url::parse(&request.url)
      .map_err(|e| eyre!("Cannot fetch invalid URL {}: {}", request.url, e))?;

    let response = self
      .client
      .request(request.method.clone(), url)
      .headers(request.headers.clone())
      .send()
      .await
      .map_err(|e| eyre!("Failed to fetch {}: {}", request.url, e))?;

    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let final_url = response.url().to_string();
    let body = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read body of {}: {}", request.url, e))?;

    Ok(Response::new(status, headers, body).with_url(final_url))
  }
}

