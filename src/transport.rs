use std::future::Future;
use std::time::Duration;

use http::{Method, StatusCode};
use hyper::body::Incoming;
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use tokio::time::{Instant, timeout_at};
use tracing::debug;

use crate::body::{ReqBody, buffered_req_body, build_http_request, empty_req_body};
use crate::descriptor::{PreparedBody, RequestDescriptor};
use crate::error::{Error, TransportError, TransportErrorKind};
use crate::tls::{TlsOptions, build_rustls_config};
use crate::util::{classify_transport_error, is_redirect_status, redirect_location};

type HttpsConnector = hyper_rustls::HttpsConnector<HttpConnector>;
type HyperClient = Client<HttpsConnector, ReqBody>;

/// The point at which an attempt is abandoned, fixed when it starts.
#[derive(Clone, Copy, Debug)]
pub(crate) struct AttemptDeadline {
    at: Instant,
    limit: Duration,
}

impl AttemptDeadline {
    pub(crate) fn start(limit: Duration) -> Self {
        Self {
            at: Instant::now() + limit,
            limit,
        }
    }
}

/// Runs `future` under the attempt deadline, if there is one.
pub(crate) async fn within<F>(
    deadline: Option<AttemptDeadline>,
    future: F,
) -> Result<F::Output, TransportError>
where
    F: Future,
{
    match deadline {
        Some(deadline) => timeout_at(deadline.at, future)
            .await
            .map_err(|_| TransportError::timed_out(deadline.limit)),
        None => Ok(future.await),
    }
}

/// What one attempt produced.
#[derive(Debug)]
pub(crate) enum AttemptOutcome {
    /// A terminal response; its body is still unread and must be read
    /// before `deadline`.
    Response {
        response: http::Response<Incoming>,
        deadline: Option<AttemptDeadline>,
    },
    /// A redirect the orchestrator should chase.
    Redirect { status: StatusCode, location: String },
    Failed(TransportError),
}

/// Drives single attempts over plain or TLS connections.
#[derive(Clone, Debug)]
pub(crate) struct Transport {
    client: HyperClient,
}

impl Transport {
    pub(crate) fn new(tls: &TlsOptions) -> Result<Self, Error> {
        let tls_config = build_rustls_config(tls)?;
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        let https = HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .wrap_connector(http);
        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(0)
            .build(https);
        Ok(Self { client })
    }

    /// Sends `descriptor` once and classifies what came back.
    ///
    /// The timeout, when set, starts here and also bounds the read of the
    /// returned response body.
    pub(crate) async fn attempt(&self, descriptor: &RequestDescriptor) -> Result<AttemptOutcome, Error> {
        let deadline = descriptor.timeout().map(AttemptDeadline::start);
        let body = match descriptor.body() {
            None => empty_req_body(),
            Some(PreparedBody::Buffered(bytes)) => buffered_req_body(bytes.clone()),
            Some(PreparedBody::Streaming(stream)) => match stream.take() {
                Some(body) => body,
                None => {
                    return Ok(AttemptOutcome::Failed(TransportError::new(
                        TransportErrorKind::BodyNotReplayable,
                        "streaming request body was already consumed",
                    )));
                }
            },
        };
        let request = build_http_request(
            descriptor.method().clone(),
            descriptor.uri()?,
            descriptor.headers(),
            body,
        )
        .map_err(|source| Error::invalid_options(format!("failed to build request: {source}")))?;

        let response = match within(deadline, self.client.request(request)).await {
            Ok(Ok(response)) => response,
            Err(timed_out) => return Ok(AttemptOutcome::Failed(timed_out)),
            Ok(Err(source)) => {
                let kind = classify_transport_error(&source);
                return Ok(AttemptOutcome::Failed(TransportError::new(kind, source)));
            }
        };

        let status = response.status();
        debug!(status = status.as_u16(), "response head received");
        if is_redirect_status(status)
            && descriptor.follow_redirect()
            && matches!(*descriptor.method(), Method::GET | Method::HEAD)
            && let Some(location) = redirect_location(response.headers())
        {
            return Ok(AttemptOutcome::Redirect { status, location });
        }
        Ok(AttemptOutcome::Response { response, deadline })
    }
}
