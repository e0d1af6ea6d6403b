use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use http::response::Parts;
use hyper::body::Incoming;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::body::read_all_body;
use crate::descriptor::{PreparedBody, RequestDescriptor};
use crate::error::{Error, TransportError, TransportErrorKind};
use crate::metrics::ClientMetrics;
use crate::transport::{AttemptDeadline, AttemptOutcome, Transport, within};
use crate::util::resolve_redirect_url;

/// Counters for one logical request, shared by every hop and retry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct AttemptState {
    pub(crate) redirect_count: usize,
    pub(crate) retry_count: usize,
    pub(crate) last_redirect_url: Option<String>,
}

impl AttemptState {
    /// Counts a redirect and builds the next hop, or fails once more than
    /// `max_redirects` have been chased.
    pub(crate) fn on_redirect(
        &mut self,
        descriptor: &RequestDescriptor,
        status: StatusCode,
        location: &str,
        max_redirects: usize,
    ) -> Result<RequestDescriptor, Error> {
        self.redirect_count += 1;
        if self.redirect_count > max_redirects {
            return Err(Error::MaxRedirects {
                context: descriptor.context(),
                status,
                max_redirects,
            });
        }

        let Some(target) = resolve_redirect_url(&descriptor.url(), location) else {
            return Err(Error::Request {
                context: descriptor.context(),
                source: TransportError::new(
                    TransportErrorKind::InvalidRedirect,
                    format!("invalid redirect location {location:?}"),
                ),
            });
        };
        let next = descriptor.redirected_to(&target)?;
        self.last_redirect_url = Some(target.into());
        Ok(next)
    }

    /// Counts a failed attempt and asks the retry strategy for a delay.
    pub(crate) fn on_transport_error(
        &mut self,
        descriptor: &RequestDescriptor,
        error: TransportError,
    ) -> Result<Duration, Error> {
        self.retry_count += 1;
        let delay = descriptor
            .retry_strategy()
            .decide(self.retry_count, &error)
            .filter(|delay| !delay.is_zero());
        let Some(delay) = delay else {
            return Err(Error::Request {
                context: descriptor.context(),
                source: error,
            });
        };

        if let Some(PreparedBody::Streaming(stream)) = descriptor.body()
            && stream.is_consumed()
        {
            warn!(error = %error, "not retrying: streaming request body was already sent");
            return Err(Error::Request {
                context: descriptor.context(),
                source: TransportError::new(TransportErrorKind::BodyNotReplayable, error),
            });
        }
        Ok(delay)
    }
}

#[derive(Debug)]
enum Phase {
    Attempting,
    Redirecting { status: StatusCode, location: String },
    Retrying(TransportError),
    Reading {
        response: http::Response<Incoming>,
        deadline: Option<AttemptDeadline>,
    },
    Resolved {
        head: Parts,
        body: Result<Bytes, hyper::Error>,
    },
    Failed(Error),
}

/// A terminal response head and its body read, together with the hop that
/// produced them.
#[derive(Debug)]
pub(crate) struct Exchange {
    pub(crate) head: Parts,
    pub(crate) body: Result<Bytes, hyper::Error>,
    pub(crate) descriptor: RequestDescriptor,
    pub(crate) state: AttemptState,
}

/// Runs attempts until a terminal response or error.
///
/// Hops and retries are strictly sequential: the next attempt starts only
/// after the previous one has been classified. The terminal body is read
/// here under the same deadline as its attempt; running out of time is a
/// timeout like any other.
pub(crate) async fn run(
    transport: &Transport,
    descriptor: RequestDescriptor,
    max_redirects: usize,
    metrics: &ClientMetrics,
) -> Result<Exchange, Error> {
    let mut descriptor = descriptor;
    let mut state = AttemptState::default();
    let mut phase = Phase::Attempting;

    loop {
        phase = match phase {
            Phase::Attempting => {
                debug!(
                    url = %descriptor.url(),
                    redirects = state.redirect_count,
                    retries = state.retry_count,
                    "sending request"
                );
                match transport.attempt(&descriptor).await? {
                    AttemptOutcome::Response { response, deadline } => {
                        Phase::Reading { response, deadline }
                    }
                    AttemptOutcome::Redirect { status, location } => {
                        Phase::Redirecting { status, location }
                    }
                    AttemptOutcome::Failed(error) => Phase::Retrying(error),
                }
            }
            Phase::Redirecting { status, location } => {
                match state.on_redirect(&descriptor, status, &location, max_redirects) {
                    Ok(next) => {
                        metrics.record_redirect();
                        debug!(
                            status = status.as_u16(),
                            location = %next.url(),
                            "following redirect"
                        );
                        descriptor = next;
                        Phase::Attempting
                    }
                    Err(error) => Phase::Failed(error),
                }
            }
            Phase::Retrying(error) => {
                let message = error.to_string();
                match state.on_transport_error(&descriptor, error) {
                    Ok(delay) => {
                        metrics.record_retry();
                        warn!(
                            attempt = state.retry_count,
                            delay_ms = delay.as_millis() as u64,
                            error = %message,
                            "retrying request after transport error"
                        );
                        sleep(delay).await;
                        Phase::Attempting
                    }
                    Err(error) => Phase::Failed(error),
                }
            }
            Phase::Reading { response, deadline } => {
                let (head, incoming) = response.into_parts();
                match within(deadline, read_all_body(incoming)).await {
                    Ok(body) => Phase::Resolved { head, body },
                    Err(timed_out) => {
                        debug!(status = head.status.as_u16(), "response body read timed out");
                        Phase::Retrying(timed_out)
                    }
                }
            }
            Phase::Resolved { head, body } => {
                return Ok(Exchange {
                    head,
                    body,
                    descriptor,
                    state,
                });
            }
            Phase::Failed(error) => return Err(error),
        };
    }
}
