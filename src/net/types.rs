//! Request and response values passed between the host, the strategies and the cache.

use bytes::Bytes;
use std::borrow::Cow;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;

/// How the host issued a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RequestMode {
  /// Top-level document load
  Navigate,
  #[default]
  Cors,
}

/// An intercepted request.
#[derive(Debug, Clone)]
pub struct Request {
  pub method: Method,
  /// Raw URL as issued by the page; may be relative or malformed
  pub url: String,
  pub headers: HeaderMap,
  pub mode: RequestMode,
}

impl Request {
  pub fn new(method: Method, url: impl Into<String>) -> Self {
    Self {
      method,
      url: url.into(),
      headers: HeaderMap::new(),
      mode: RequestMode::default(),
    }
  }

  /// Plain GET request for a subresource.
  pub fn get(url: impl Into<String>) -> Self {
    Self::new(Method::GET, url)
  }

  /// GET request issued as a page navigation.
  #[cfg(test)]
  pub fn navigate(url: impl Into<String>) -> Self {
    Self::get(url).with_mode(RequestMode::Navigate)
  }

  pub fn with_mode(mut self, mode: RequestMode) -> Self {
    self.mode = mode;
    self
  }

  pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
    self.headers.insert(name, value);
    self
  }

  /// Header value as text, if present. Bytes that are not UTF-8 are replaced.
  pub fn header_text(&self, name: &HeaderName) -> Option<Cow<'_, str>> {
    self
      .headers
      .get(name)
      .map(|v| String::from_utf8_lossy(v.as_bytes()))
  }
}

/// Distinguishes real responses from the generic network-error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
  Basic,
  Error,
}

/// A response snapshot. Cloning is cheap: the body is reference counted.
#[derive(Debug, Clone)]
pub struct Response {
  pub kind: ResponseKind,
  pub status: u16,
  pub headers: HeaderMap,
  pub body: Bytes,
  /// Final URL after redirects, when known
  pub url: Option<String>,
}

impl Response {
  pub fn new(status: u16, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
    Self {
      kind: ResponseKind::Basic,
      status,
      headers,
      body: body.into(),
      url: None,
    }
  }

  /// The generic network-error response returned when nothing else is available.
  pub fn error() -> Self {
    Self {
      kind: ResponseKind::Error,
      status: 0,
      headers: HeaderMap::new(),
      body: Bytes::new(),
      url: None,
    }
  }

  pub fn with_url(mut self, url: impl Into<String>) -> Self {
    self.url = Some(url.into());
    self
  }

  pub fn is_error(&self) -> bool {
    self.kind == ResponseKind::Error
  }

  /// Status in the 2xx range.
  pub fn ok(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// Flatten a header map into (name, value) pairs for persistence.
pub fn headers_to_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
  headers
    .iter()
    .map(|(name, value)| {
      (
        name.as_str().to_string(),
        String::from_utf8_lossy(value.as_bytes()).into_owned(),
      )
    })
    .collect()
}

/// Rebuild a header map from persisted pairs, skipping anything no longer valid.
pub fn headers_from_pairs(pairs: &[(String, String)]) -> HeaderMap {
  let mut headers = HeaderMap::new();
  for (name, value) in pairs {
    if let (Ok(name), Ok(value)) = (
      HeaderName::from_bytes(name.as_bytes()),
      HeaderValue::from_str(value),
    ) {
      headers.append(name, value);
    }
  }
  headers
}
