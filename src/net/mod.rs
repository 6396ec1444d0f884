//! HTTP request/response values and live network access.

mod client;
mod types;

pub use client::{Fetcher, HttpFetcher};
pub use types::{headers_from_pairs, headers_to_pairs, Request, RequestMode, Response};
