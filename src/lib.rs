//! `fetchr` is an async HTTP(S) request client that follows redirects, retries
//! transient failures, and resolves to a fully read response.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use fetchr::prelude::{Client, RequestOptions};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct Item {
//!     id: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::builder()
//!         .user_agent("my-app/1.0")
//!         .default_retries(2)
//!         .try_build()?;
//!
//!     let response = client
//!         .get(
//!             "https://api.example.com/v1/items/42",
//!             RequestOptions::new()
//!                 .json(true)
//!                 .timeout(Duration::from_secs(3)),
//!         )
//!         .await?;
//!
//!     let item: Item = response.json()?;
//!     println!("item id={} via {}", item.id, response.url());
//!     Ok(())
//! }
//! ```
//!
//! # Behaviour
//!
//! - `GET`/`HEAD` redirects are followed up to ten times; other methods get
//!   the 3xx back.
//! - Transient transport failures are retried five times with exponential
//!   backoff unless [`RequestOptions::retries`] or
//!   [`RequestOptions::retry_strategy`] say otherwise.
//! - `gzip` and `deflate` bodies are decoded transparently.
//! - Failures surface as one of the [`Error`] variants, each carrying the
//!   host, method and path of the request.

use std::sync::OnceLock;

mod body;
mod client;
mod config;
mod content_encoding;
mod descriptor;
mod error;
mod metrics;
mod options;
mod orchestrator;
mod resolver;
mod response;
mod retry;
mod tls;
mod transport;
mod util;

pub use crate::body::StreamBody;
pub use crate::client::{Client, ClientBuilder};
pub use crate::config::{ClientConfig, DEFAULT_MAX_REDIRECTS, DEFAULT_RETRIES};
pub use crate::descriptor::{PreparedBody, RequestDescriptor, normalize};
pub use crate::error::{Error, ErrorCode, ErrorContext, TransportError, TransportErrorKind};
pub use crate::metrics::ClientMetricsSnapshot;
pub use crate::options::{
    Body, Encoding, Query, RequestOptions, RequestParts, Scheme, Target,
};
pub use crate::response::{Response, ResponseBody};
pub use crate::retry::{ExponentialBackoff, NeverRetry, RetryStrategy};
pub use crate::tls::TlsOptions;

pub type FetchrResult<T> = std::result::Result<T, Error>;

pub mod prelude {
    pub use crate::{
        Body, Client, ClientBuilder, ClientConfig, ClientMetricsSnapshot, Encoding, Error,
        ErrorCode, ExponentialBackoff, FetchrResult, NeverRetry, Query, RequestDescriptor,
        RequestOptions, RequestParts, Response, ResponseBody, RetryStrategy, StreamBody, Target,
        TlsOptions, TransportErrorKind,
    };
}

static DEFAULT_CLIENT: OnceLock<Client> = OnceLock::new();

fn default_client() -> FetchrResult<&'static Client> {
    if let Some(client) = DEFAULT_CLIENT.get() {
        return Ok(client);
    }
    let client = Client::builder().try_build()?;
    Ok(DEFAULT_CLIENT.get_or_init(|| client))
}

/// Issues a request with a shared client built from [`ClientConfig::default`].
pub async fn request(
    target: impl Into<Target>,
    options: RequestOptions,
) -> FetchrResult<Response> {
    default_client()?.request(target, options).await
}

pub async fn get(target: impl Into<Target>, options: RequestOptions) -> FetchrResult<Response> {
    default_client()?.get(target, options).await
}

pub async fn post(target: impl Into<Target>, options: RequestOptions) -> FetchrResult<Response> {
    default_client()?.post(target, options).await
}

pub async fn put(target: impl Into<Target>, options: RequestOptions) -> FetchrResult<Response> {
    default_client()?.put(target, options).await
}

pub async fn patch(target: impl Into<Target>, options: RequestOptions) -> FetchrResult<Response> {
    default_client()?.patch(target, options).await
}

pub async fn head(target: impl Into<Target>, options: RequestOptions) -> FetchrResult<Response> {
    default_client()?.head(target, options).await
}

pub async fn delete(target: impl Into<Target>, options: RequestOptions) -> FetchrResult<Response> {
    default_client()?.delete(target, options).await
}

#[cfg(test)]
mod tests;
