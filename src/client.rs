use std::sync::Arc;
use std::time::Instant;

use http::Method;
use tracing::{Instrument, debug, info_span};

use crate::config::ClientConfig;
use crate::descriptor::{RequestDescriptor, normalize};
use crate::error::Error;
use crate::metrics::{ClientMetrics, ClientMetricsSnapshot};
use crate::options::{RequestOptions, Target};
use crate::response::Response;
use crate::tls::TlsOptions;
use crate::transport::Transport;
use crate::{orchestrator, resolver};

#[derive(Clone, Debug, Default)]
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config = self.config.with_user_agent(user_agent);
        self
    }

    pub fn accept_encoding(mut self, accept_encoding: impl Into<String>) -> Self {
        self.config = self.config.with_accept_encoding(accept_encoding);
        self
    }

    /// Retry count used when a request sets no retry strategy of its own.
    pub fn default_retries(mut self, default_retries: usize) -> Self {
        self.config = self.config.with_default_retries(default_retries);
        self
    }

    pub fn max_redirects(mut self, max_redirects: usize) -> Self {
        self.config = self.config.with_max_redirects(max_redirects);
        self
    }

    pub fn tls(mut self, tls: TlsOptions) -> Self {
        self.config = self.config.with_tls(tls);
        self
    }

    pub fn tls_root_ca_pem(mut self, certificate_pem: impl Into<Vec<u8>>) -> Self {
        let tls = self.config.tls().clone().root_ca_pem(certificate_pem);
        self.config = self.config.with_tls(tls);
        self
    }

    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        let tls = self.config.tls().clone().danger_accept_invalid_certs(accept);
        self.config = self.config.with_tls(tls);
        self
    }

    pub fn try_build(self) -> Result<Client, Error> {
        let transport = Transport::new(self.config.tls())?;
        Ok(Client {
            inner: Arc::new(ClientInner {
                config: self.config,
                transport,
                metrics: ClientMetrics::default(),
            }),
        })
    }

    #[track_caller]
    pub fn build(self) -> Client {
        self.try_build().unwrap_or_else(|error| {
            panic!("failed to build fetchr client: {error}; use try_build() to handle configuration errors")
        })
    }
}

#[derive(Debug)]
struct ClientInner {
    config: ClientConfig,
    transport: Transport,
    metrics: ClientMetrics,
}

/// An HTTP(S) client. Cloning is cheap and clones share metrics.
#[derive(Clone, Debug)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Builds the descriptor a request would be sent with, without sending it.
    pub fn normalize(
        &self,
        target: impl Into<Target>,
        options: RequestOptions,
    ) -> Result<RequestDescriptor, Error> {
        normalize(target, options, &self.inner.config)
    }

    /// Issues a request, following redirects and retrying transient
    /// failures, and resolves to the fully read response.
    pub async fn request(
        &self,
        target: impl Into<Target>,
        options: RequestOptions,
    ) -> Result<Response, Error> {
        let descriptor = self.normalize(target, options)?;
        self.send(descriptor).await
    }

    pub async fn send(&self, descriptor: RequestDescriptor) -> Result<Response, Error> {
        let span = info_span!(
            "fetchr.request",
            method = %descriptor.method(),
            url = %descriptor.url()
        );
        self.execute(descriptor).instrument(span).await
    }

    pub async fn get(&self, target: impl Into<Target>, options: RequestOptions) -> Result<Response, Error> {
        self.request(target, options.method(Method::GET)).await
    }

    pub async fn post(&self, target: impl Into<Target>, options: RequestOptions) -> Result<Response, Error> {
        self.request(target, options.method(Method::POST)).await
    }

    pub async fn put(&self, target: impl Into<Target>, options: RequestOptions) -> Result<Response, Error> {
        self.request(target, options.method(Method::PUT)).await
    }

    pub async fn patch(&self, target: impl Into<Target>, options: RequestOptions) -> Result<Response, Error> {
        self.request(target, options.method(Method::PATCH)).await
    }

    pub async fn head(&self, target: impl Into<Target>, options: RequestOptions) -> Result<Response, Error> {
        self.request(target, options.method(Method::HEAD)).await
    }

    pub async fn delete(&self, target: impl Into<Target>, options: RequestOptions) -> Result<Response, Error> {
        self.request(target, options.method(Method::DELETE)).await
    }

    pub fn metrics_snapshot(&self) -> ClientMetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    async fn execute(&self, descriptor: RequestDescriptor) -> Result<Response, Error> {
        let metrics = &self.inner.metrics;
        metrics.record_request_started();
        let _in_flight = metrics.enter_in_flight();
        let started = Instant::now();

        let result = self.run(descriptor).await;
        let elapsed = started.elapsed();
        metrics.record_request_completed(&result, elapsed);
        match &result {
            Ok(response) => debug!(
                status = response.status_code(),
                redirects = response.redirect_count(),
                elapsed_ms = elapsed.as_millis() as u64,
                "request completed"
            ),
            Err(error) => debug!(
                error = %error,
                name = error.name(),
                elapsed_ms = elapsed.as_millis() as u64,
                "request failed"
            ),
        }
        result
    }

    async fn run(&self, descriptor: RequestDescriptor) -> Result<Response, Error> {
        let per_request;
        let transport = match descriptor.tls() {
            Some(tls) if tls != self.inner.config.tls() => {
                per_request = Transport::new(tls)?;
                &per_request
            }
            _ => &self.inner.transport,
        };
        let exchange = orchestrator::run(
            transport,
            descriptor,
            self.inner.config.max_redirects(),
            &self.inner.metrics,
        )
        .await?;
        resolver::resolve(exchange)
    }
}
