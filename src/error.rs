use std::fmt;
use std::time::Duration;

use http::{Method, StatusCode};
use thiserror::Error;

use crate::response::Response;
use crate::util::status_message;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransportErrorKind {
    Dns,
    Connect,
    Tls,
    Timeout,
    Read,
    Other,
    BodyNotReplayable,
    InvalidRedirect,
}

impl TransportErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dns => "dns",
            Self::Connect => "connect",
            Self::Tls => "tls",
            Self::Timeout => "timeout",
            Self::Read => "read",
            Self::Other => "other",
            Self::BodyNotReplayable => "body_not_replayable",
            Self::InvalidRedirect => "invalid_redirect",
        }
    }

    /// Whether a failure of this kind is transient and may be retried.
    ///
    /// Name resolution and certificate failures will not change on a second
    /// try, and the last two kinds are raised by the client itself.
    pub const fn is_retry_allowed(self) -> bool {
        matches!(
            self,
            Self::Connect | Self::Timeout | Self::Read | Self::Other
        )
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A connection-level failure of a single attempt.
#[derive(Debug)]
pub struct TransportError {
    kind: TransportErrorKind,
    source: BoxError,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, source: impl Into<BoxError>) -> Self {
        Self {
            kind,
            source: source.into(),
        }
    }

    pub(crate) fn timed_out(after: Duration) -> Self {
        Self::new(
            TransportErrorKind::Timeout,
            format!("attempt timed out after {}ms", after.as_millis()),
        )
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn is_retry_allowed(&self) -> bool {
        self.kind.is_retry_allowed()
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.source)?;
        let mut cause = self.source.source();
        while let Some(inner) = cause {
            write!(formatter, ": {inner}")?;
            cause = inner.source();
        }
        Ok(())
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Request coordinates attached to every request-bound error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorContext {
    /// `hostname[:port]`, as it appeared in the request url.
    pub host: String,
    pub hostname: String,
    pub method: Method,
    pub path: String,
    pub url: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorCode {
    InvalidOptions,
    TlsConfig,
    Request,
    Read,
    Parse,
    HttpStatus,
    MaxRedirects,
}

impl ErrorCode {
    pub const fn all() -> &'static [ErrorCode] {
        &[
            Self::InvalidOptions,
            Self::TlsConfig,
            Self::Request,
            Self::Read,
            Self::Parse,
            Self::HttpStatus,
            Self::MaxRedirects,
        ]
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidOptions => "invalid_options",
            Self::TlsConfig => "tls_config",
            Self::Request => "request",
            Self::Read => "read",
            Self::Parse => "parse",
            Self::HttpStatus => "http_status",
            Self::MaxRedirects => "max_redirects",
        }
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("{message}")]
    InvalidOptions { message: String },
    #[error("invalid tls configuration: {message}")]
    TlsConfig { message: String },
    #[error("{source}")]
    Request {
        context: ErrorContext,
        #[source]
        source: TransportError,
    },
    #[error("{source}")]
    Read {
        context: ErrorContext,
        #[source]
        source: BoxError,
        response: Option<Box<Response>>,
    },
    #[error("{message}")]
    Parse {
        context: ErrorContext,
        status: StatusCode,
        message: String,
        #[source]
        source: serde_json::Error,
        response: Box<Response>,
    },
    #[error(
        "Response code {} ({})",
        .status.as_u16(),
        .status.canonical_reason().unwrap_or("Unknown")
    )]
    Http {
        context: ErrorContext,
        status: StatusCode,
        response: Box<Response>,
    },
    #[error("Redirected {max_redirects} times. Aborting.")]
    MaxRedirects {
        context: ErrorContext,
        status: StatusCode,
        max_redirects: usize,
    },
}

impl Error {
    pub(crate) fn invalid_options(message: impl Into<String>) -> Self {
        Self::InvalidOptions {
            message: message.into(),
        }
    }

    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidOptions { .. } => ErrorCode::InvalidOptions,
            Self::TlsConfig { .. } => ErrorCode::TlsConfig,
            Self::Request { .. } => ErrorCode::Request,
            Self::Read { .. } => ErrorCode::Read,
            Self::Parse { .. } => ErrorCode::Parse,
            Self::Http { .. } => ErrorCode::HttpStatus,
            Self::MaxRedirects { .. } => ErrorCode::MaxRedirects,
        }
    }

    /// The caller-facing error name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::InvalidOptions { .. } => "InvalidOptionsError",
            Self::TlsConfig { .. } => "TlsConfigError",
            Self::Request { .. } => "RequestError",
            Self::Read { .. } => "ReadError",
            Self::Parse { .. } => "ParseError",
            Self::Http { .. } => "HTTPError",
            Self::MaxRedirects { .. } => "MaxRedirectsError",
        }
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::InvalidOptions { .. } | Self::TlsConfig { .. } => None,
            Self::Request { context, .. }
            | Self::Read { context, .. }
            | Self::Parse { context, .. }
            | Self::Http { context, .. }
            | Self::MaxRedirects { context, .. } => Some(context),
        }
    }

    pub fn host(&self) -> Option<&str> {
        self.context().map(|context| context.host.as_str())
    }

    pub fn hostname(&self) -> Option<&str> {
        self.context().map(|context| context.hostname.as_str())
    }

    pub fn method(&self) -> Option<&Method> {
        self.context().map(|context| &context.method)
    }

    pub fn path(&self) -> Option<&str> {
        self.context().map(|context| context.path.as_str())
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Parse { status, .. }
            | Self::Http { status, .. }
            | Self::MaxRedirects { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn status_message(&self) -> Option<&'static str> {
        self.status().map(status_message)
    }

    /// The transport failure kind behind a `RequestError`.
    pub fn transport_kind(&self) -> Option<TransportErrorKind> {
        match self {
            Self::Request { source, .. } => Some(source.kind()),
            _ => None,
        }
    }

    /// The response that was being resolved when the error was raised.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Read { response, .. } => response.as_deref(),
            Self::Parse { response, .. } | Self::Http { response, .. } => Some(response),
            _ => None,
        }
    }

    pub fn into_response(self) -> Option<Response> {
        match self {
            Self::Read { response, .. } => response.map(|response| *response),
            Self::Parse { response, .. } | Self::Http { response, .. } => Some(*response),
            _ => None,
        }
    }
}
