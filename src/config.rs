use crate::tls::TlsOptions;

pub const DEFAULT_RETRIES: usize = 5;
pub const DEFAULT_MAX_REDIRECTS: usize = 10;
pub const DEFAULT_ACCEPT_ENCODING: &str = "gzip,deflate";

pub fn default_user_agent() -> String {
    format!(
        "{}/{} (https://github.com/fetchr-rs/fetchr)",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )
}

/// Client-wide defaults applied to every request descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    pub(crate) user_agent: String,
    pub(crate) accept_encoding: String,
    pub(crate) default_retries: usize,
    pub(crate) max_redirects: usize,
    pub(crate) tls: TlsOptions,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            accept_encoding: DEFAULT_ACCEPT_ENCODING.to_owned(),
            default_retries: DEFAULT_RETRIES,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            tls: TlsOptions::default(),
        }
    }
}

impl ClientConfig {
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_accept_encoding(mut self, accept_encoding: impl Into<String>) -> Self {
        self.accept_encoding = accept_encoding.into();
        self
    }

    pub fn with_default_retries(mut self, default_retries: usize) -> Self {
        self.default_retries = default_retries;
        self
    }

    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    pub fn with_tls(mut self, tls: TlsOptions) -> Self {
        self.tls = tls;
        self
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn accept_encoding(&self) -> &str {
        &self.accept_encoding
    }

    pub fn default_retries(&self) -> usize {
        self.default_retries
    }

    pub fn max_redirects(&self) -> usize {
        self.max_redirects
    }

    pub fn tls(&self) -> &TlsOptions {
        &self.tls
    }
}
