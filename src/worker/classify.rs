//! Request classification.

use reqwest::header::ACCEPT;
use reqwest::Method;
use url::{Origin, Url};

use crate::net::{Request, RequestMode};

/// How an intercepted request is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
  /// Page loads: network-first, cached shell on failure
  Navigation,
  /// Scripts from a known external provider: cache-first
  ThirdPartyScript,
  /// Anything else under the page origin: cache-first
  SameOriginAsset,
  /// Cross-origin requests: network-first, any cached copy on failure
  Other,
}

/// Maps requests to a [`RequestClass`]. Rules are checked in order, first match wins.
#[derive(Debug, Clone)]
pub struct Classifier {
  scope: Url,
  origin: Origin,
  third_party_markers: Vec<String>,
}

impl Classifier {
  pub fn new(scope: Url, third_party_markers: Vec<String>) -> Self {
    let origin = scope.origin();
    Self {
      scope,
      origin,
      third_party_markers,
    }
  }

  pub fn classify(&self, request: &Request) -> RequestClass {
    if is_navigation(request) {
      RequestClass::Navigation
    } else if self.is_third_party_script(&request.url) {
      RequestClass::ThirdPartyScript
    } else if self.is_same_origin(&request.url) {
      RequestClass::SameOriginAsset
    } else {
      RequestClass::Other
    }
  }

  fn is_third_party_script(&self, url: &str) -> bool {
    self
      .third_party_markers
      .iter()
      .any(|marker| url.contains(marker.as_str()))
  }

  /// Unparseable URLs are never same-origin.
  fn is_same_origin(&self, url: &str) -> bool {
    self
      .scope
      .join(url)
      .map(|u| u.origin() == self.origin)
      .unwrap_or(false)
  }
}

fn is_navigation(request: &Request) -> bool {
  request.mode == RequestMode::Navigate
    || (request.method == Method::GET
      && request
        .header_text(&ACCEPT)
        .is_some_and(|accept| accept.contains("text/html")))
}
