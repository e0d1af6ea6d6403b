use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::Method;
use serde::Serialize;

use crate::body::StreamBody;
use crate::descriptor::RequestDescriptor;
use crate::error::Error;
use crate::retry::{ExponentialBackoff, NeverRetry, RetryStrategy};
use crate::tls::TlsOptions;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

impl Scheme {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    pub const fn default_port(self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }

    pub(crate) fn parse(scheme: &str) -> Result<Self, Error> {
        match scheme.trim_end_matches(':').to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            other => Err(Error::invalid_options(format!(
                "unsupported protocol \"{other}:\""
            ))),
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// How the response body is materialized.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Text decoded per the `charset` of `content-type` (UTF-8 when absent),
    /// with malformed sequences replaced.
    #[default]
    Text,
    /// The bytes as received after content decoding.
    Raw,
}

#[derive(Clone, Debug)]
pub enum Body {
    Text(String),
    Bytes(Bytes),
    /// A key/value mapping sent as `application/x-www-form-urlencoded`.
    ///
    /// Anything other than a JSON object (or `null`, meaning no body) is
    /// rejected when the request is normalized.
    Object(serde_json::Value),
    Stream(StreamBody),
}

impl From<String> for Body {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Body {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<Bytes> for Body {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<Vec<u8>> for Body {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(value))
    }
}

impl From<&'static [u8]> for Body {
    fn from(value: &'static [u8]) -> Self {
        Self::Bytes(Bytes::from_static(value))
    }
}

impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        Self::Object(value)
    }
}

impl From<StreamBody> for Body {
    fn from(value: StreamBody) -> Self {
        Self::Stream(value)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Query {
    /// Used verbatim as the query string.
    Raw(String),
    /// A key/value object, form-encoded first.
    Params(serde_json::Value),
}

impl From<&str> for Query {
    fn from(value: &str) -> Self {
        Self::Raw(value.to_owned())
    }
}

impl From<String> for Query {
    fn from(value: String) -> Self {
        Self::Raw(value)
    }
}

impl From<serde_json::Value> for Query {
    fn from(value: serde_json::Value) -> Self {
        Self::Params(value)
    }
}

/// A partially specified request target, for callers that already hold the
/// url components.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestParts {
    pub scheme: Option<Scheme>,
    pub hostname: String,
    pub port: Option<u16>,
    pub path: String,
    pub headers: Vec<(String, String)>,
}

impl RequestParts {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            ..Self::default()
        }
    }

    pub fn scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = Some(scheme);
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// What a request is aimed at: a url, url components, or an already
/// normalized descriptor.
#[derive(Clone, Debug)]
pub enum Target {
    Url(String),
    Parts(RequestParts),
    Descriptor(Box<RequestDescriptor>),
}

impl From<&str> for Target {
    fn from(value: &str) -> Self {
        Self::Url(value.to_owned())
    }
}

impl From<String> for Target {
    fn from(value: String) -> Self {
        Self::Url(value)
    }
}

impl From<&String> for Target {
    fn from(value: &String) -> Self {
        Self::Url(value.clone())
    }
}

impl From<url::Url> for Target {
    fn from(value: url::Url) -> Self {
        Self::Url(value.into())
    }
}

impl From<RequestParts> for Target {
    fn from(value: RequestParts) -> Self {
        Self::Parts(value)
    }
}

impl From<RequestDescriptor> for Target {
    fn from(value: RequestDescriptor) -> Self {
        Self::Descriptor(Box::new(value))
    }
}

/// Per-call options. Anything left unset falls back to the target, then to
/// the client configuration.
#[derive(Clone, Default)]
pub struct RequestOptions {
    pub(crate) method: Option<Method>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Option<Body>,
    pub(crate) query: Option<Query>,
    pub(crate) json: Option<bool>,
    pub(crate) encoding: Option<Encoding>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) retry_strategy: Option<Arc<dyn RetryStrategy>>,
    pub(crate) follow_redirect: Option<bool>,
    pub(crate) auth: Option<String>,
    pub(crate) tls: Option<TlsOptions>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Sets the method from its name, in any case.
    pub fn try_method(self, method: &str) -> Result<Self, Error> {
        let upper = method.trim().to_ascii_uppercase();
        let method = Method::from_bytes(upper.as_bytes())
            .map_err(|source| Error::invalid_options(format!("invalid method {method}: {source}")))?;
        Ok(self.method(method))
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn headers<K, V, I>(mut self, headers: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.headers.extend(
            headers
                .into_iter()
                .map(|(name, value)| (name.into(), value.into())),
        );
        self
    }

    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sends `form` as an url-encoded form body.
    pub fn form<T>(self, form: &T) -> Result<Self, Error>
    where
        T: Serialize + ?Sized,
    {
        let value = serde_json::to_value(form)
            .map_err(|source| Error::invalid_options(format!("failed to serialize form: {source}")))?;
        Ok(self.body(Body::Object(value)))
    }

    pub fn query(mut self, query: impl Into<Query>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn query_params<T>(self, params: &T) -> Result<Self, Error>
    where
        T: Serialize + ?Sized,
    {
        let encoded = serde_urlencoded::to_string(params)
            .map_err(|source| Error::invalid_options(format!("failed to serialize query: {source}")))?;
        Ok(self.query(Query::Raw(encoded)))
    }

    pub fn json(mut self, json: bool) -> Self {
        self.json = Some(json);
        self
    }

    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Retries transient failures `retries` times with exponential backoff.
    pub fn retries(self, retries: usize) -> Self {
        self.retry_strategy(ExponentialBackoff::new(retries))
    }

    pub fn no_retries(self) -> Self {
        self.retry_strategy(NeverRetry)
    }

    pub fn retry_strategy(mut self, strategy: impl RetryStrategy + 'static) -> Self {
        self.retry_strategy = Some(Arc::new(strategy));
        self
    }

    pub fn follow_redirect(mut self, follow_redirect: bool) -> Self {
        self.follow_redirect = Some(follow_redirect);
        self
    }

    /// Basic credentials as `user:password`.
    pub fn auth(mut self, credentials: impl Into<String>) -> Self {
        self.auth = Some(credentials.into());
        self
    }

    pub fn tls(mut self, tls: TlsOptions) -> Self {
        self.tls = Some(tls);
        self
    }
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RequestOptions")
            .field("method", &self.method)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("query", &self.query)
            .field("json", &self.json)
            .field("encoding", &self.encoding)
            .field("timeout", &self.timeout)
            .field("retry_strategy", &self.retry_strategy.as_ref().map(|_| ".."))
            .field("follow_redirect", &self.follow_redirect)
            .field("auth", &self.auth.as_ref().map(|_| "<redacted>"))
            .field("tls", &self.tls)
            .finish()
    }
}
