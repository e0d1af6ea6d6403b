use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use http::header::{
    ACCEPT, ACCEPT_ENCODING, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, HeaderValue,
    TRANSFER_ENCODING, USER_AGENT,
};
use http::{HeaderMap, Method, Uri};

use crate::body::StreamBody;
use crate::config::ClientConfig;
use crate::error::{Error, ErrorContext};
use crate::options::{Body, Encoding, Query, RequestOptions, Scheme, Target};
use crate::retry::{ExponentialBackoff, RetryStrategy};
use crate::tls::TlsOptions;
use crate::util::{parse_header_name, parse_header_value, parse_url_lax};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_ACCEPT: &str = "application/json";

/// A request body after normalization.
#[derive(Clone, Debug)]
pub enum PreparedBody {
    Buffered(Bytes),
    Streaming(StreamBody),
}

impl PreparedBody {
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming(_))
    }
}

/// The canonical form of one request hop.
///
/// Built once by [`normalize`] and replaced wholesale when a redirect is
/// followed; nothing mutates it while an attempt is in flight.
#[derive(Clone)]
pub struct RequestDescriptor {
    method: Method,
    scheme: Scheme,
    hostname: String,
    port: Option<u16>,
    path: String,
    headers: HeaderMap,
    body: Option<PreparedBody>,
    retry_strategy: Arc<dyn RetryStrategy>,
    timeout: Option<Duration>,
    follow_redirect: bool,
    json: bool,
    encoding: Encoding,
    tls: Option<TlsOptions>,
    href: String,
}

impl RequestDescriptor {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// `hostname[:port]`; the port is omitted when none was given.
    pub fn host(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{port}", self.hostname),
            None => self.hostname.clone(),
        }
    }

    /// Path including the serialized query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&PreparedBody> {
        self.body.as_ref()
    }

    pub fn retry_strategy(&self) -> &dyn RetryStrategy {
        self.retry_strategy.as_ref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn follow_redirect(&self) -> bool {
        self.follow_redirect
    }

    pub fn json(&self) -> bool {
        self.json
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn tls(&self) -> Option<&TlsOptions> {
        self.tls.as_ref()
    }

    /// The url this logical request was first aimed at.
    pub fn href(&self) -> &str {
        &self.href
    }

    /// The formatted url of this hop.
    pub fn url(&self) -> String {
        format!("{}://{}{}", self.scheme, self.host(), self.path)
    }

    pub(crate) fn uri(&self) -> Result<Uri, Error> {
        let url = self.url();
        url.parse::<Uri>()
            .map_err(|source| Error::invalid_options(format!("invalid url {url}: {source}")))
    }

    pub(crate) fn context(&self) -> ErrorContext {
        ErrorContext {
            host: self.host(),
            hostname: self.hostname.clone(),
            method: self.method.clone(),
            path: self.path.clone(),
            url: self.url(),
        }
    }

    /// The descriptor for the next redirect hop: same options and headers,
    /// aimed at `target`.
    ///
    /// A streaming body has already been sent and is dropped.
    pub(crate) fn redirected_to(&self, target: &url::Url) -> Result<Self, Error> {
        let mut next = self.clone();
        next.apply_url(target)?;
        if next.body.as_ref().is_some_and(PreparedBody::is_streaming) {
            next.body = None;
        }
        Ok(next)
    }

    fn apply_url(&mut self, url: &url::Url) -> Result<(), Error> {
        self.scheme = Scheme::parse(url.scheme())?;
        self.hostname = url
            .host_str()
            .ok_or_else(|| Error::invalid_options(format!("url {url} has no host")))?
            .to_owned();
        self.port = url.port();
        self.path = match url.query() {
            Some(query) => format!("{}?{query}", url.path()),
            None => url.path().to_owned(),
        };
        Ok(())
    }
}

impl fmt::Debug for RequestDescriptor {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RequestDescriptor")
            .field("method", &self.method)
            .field("url", &self.url())
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("timeout", &self.timeout)
            .field("follow_redirect", &self.follow_redirect)
            .field("json", &self.json)
            .field("encoding", &self.encoding)
            .field("tls", &self.tls)
            .field("href", &self.href)
            .finish_non_exhaustive()
    }
}

struct Seed {
    method: Option<Method>,
    scheme: Scheme,
    hostname: String,
    port: Option<u16>,
    path: String,
    headers: HeaderMap,
    body: Option<PreparedBody>,
    retry_strategy: Option<Arc<dyn RetryStrategy>>,
    timeout: Option<Duration>,
    follow_redirect: Option<bool>,
    json: bool,
    encoding: Encoding,
    tls: Option<TlsOptions>,
    href: Option<String>,
}

impl Seed {
    fn from_target(target: Target) -> Result<Self, Error> {
        match target {
            Target::Url(url) => Self::from_url(&url),
            Target::Parts(parts) => {
                let mut headers = HeaderMap::new();
                for (name, value) in &parts.headers {
                    insert_header(&mut headers, name, value)?;
                }
                Ok(Self {
                    scheme: parts.scheme.unwrap_or_default(),
                    hostname: parts.hostname,
                    port: parts.port,
                    path: parts.path,
                    headers,
                    ..Self::empty()
                })
            }
            Target::Descriptor(descriptor) => {
                let descriptor = *descriptor;
                Ok(Self {
                    method: Some(descriptor.method),
                    scheme: descriptor.scheme,
                    hostname: descriptor.hostname,
                    port: descriptor.port,
                    path: descriptor.path,
                    headers: descriptor.headers,
                    body: descriptor.body,
                    retry_strategy: Some(descriptor.retry_strategy),
                    timeout: descriptor.timeout,
                    follow_redirect: Some(descriptor.follow_redirect),
                    json: descriptor.json,
                    encoding: descriptor.encoding,
                    tls: descriptor.tls,
                    href: Some(descriptor.href),
                })
            }
        }
    }

    fn from_url(text: &str) -> Result<Self, Error> {
        let url = parse_url_lax(text)?;
        if !url.username().is_empty() || url.password().is_some() {
            return Err(Error::invalid_options(
                "Basic authentication must be done with auth option",
            ));
        }
        let mut seed = Self::empty();
        seed.scheme = Scheme::parse(url.scheme())?;
        seed.hostname = url
            .host_str()
            .ok_or_else(|| Error::invalid_options(format!("url {text} has no host")))?
            .to_owned();
        seed.port = url.port();
        seed.path = match url.query() {
            Some(query) => format!("{}?{query}", url.path()),
            None => url.path().to_owned(),
        };
        Ok(seed)
    }

    fn empty() -> Self {
        Self {
            method: None,
            scheme: Scheme::default(),
            hostname: String::new(),
            port: None,
            path: String::new(),
            headers: HeaderMap::new(),
            body: None,
            retry_strategy: None,
            timeout: None,
            follow_redirect: None,
            json: false,
            encoding: Encoding::default(),
            tls: None,
            href: None,
        }
    }
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) -> Result<(), Error> {
    let name = parse_header_name(name)?;
    let value = parse_header_value(name.as_str(), value)?;
    headers.insert(name, value);
    Ok(())
}

fn encode_form(value: &serde_json::Value, what: &str) -> Result<String, Error> {
    serde_urlencoded::to_string(value)
        .map_err(|source| Error::invalid_options(format!("failed to encode {what}: {source}")))
}

fn apply_query(path: &str, query: &str) -> String {
    let base = path.split('?').next().unwrap_or_default();
    format!("{base}?{query}")
}

fn invalid_body() -> Error {
    Error::invalid_options("options.body must be a ReadableStream, string, Buffer or plain Object")
}

/// Turns a target and per-call options into a canonical request descriptor.
///
/// Pure and synchronous: nothing touches the network. Options win over the
/// target, and the target wins over `config`. Feeding a descriptor back in
/// with empty options yields an equivalent descriptor.
pub fn normalize(
    target: impl Into<Target>,
    options: RequestOptions,
    config: &ClientConfig,
) -> Result<RequestDescriptor, Error> {
    let mut seed = Seed::from_target(target.into())?;
    if seed.hostname.is_empty() {
        return Err(Error::invalid_options("request target has no hostname"));
    }

    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, parse_header_value("user-agent", &config.user_agent)?);
    headers.insert(
        ACCEPT_ENCODING,
        parse_header_value("accept-encoding", &config.accept_encoding)?,
    );
    for name in seed.headers.keys() {
        let mut values = seed.headers.get_all(name).iter();
        if let Some(first) = values.next() {
            headers.insert(name.clone(), first.clone());
        }
        for value in values {
            headers.append(name.clone(), value.clone());
        }
    }
    for (name, value) in &options.headers {
        insert_header(&mut headers, name, value)?;
    }

    if let Some(credentials) = &options.auth {
        let encoded = BASE64.encode(credentials.as_bytes());
        let mut value = parse_header_value("authorization", &format!("Basic {encoded}"))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    let mut path = if seed.path.is_empty() {
        "/".to_owned()
    } else if seed.path.starts_with('/') {
        seed.path
    } else {
        format!("/{}", seed.path)
    };
    let query = match &options.query {
        Some(Query::Raw(query)) => Some(query.clone()),
        Some(Query::Params(params)) => Some(encode_form(params, "query")?),
        None => None,
    };
    if let Some(query) = query.filter(|query| !query.is_empty()) {
        path = apply_query(&path, &query);
    }

    let json = options.json.unwrap_or(seed.json);
    if json && !headers.contains_key(ACCEPT) {
        headers.insert(ACCEPT, HeaderValue::from_static(JSON_ACCEPT));
    }

    let body = match options.body {
        Some(body) => prepare_body(body, &mut headers)?,
        None => seed.body,
    };

    let method = options.method.or(seed.method).unwrap_or_else(|| {
        if body.is_some() {
            Method::POST
        } else {
            Method::GET
        }
    });

    if let Some(PreparedBody::Buffered(bytes)) = &body
        && !headers.contains_key(CONTENT_LENGTH)
        && !headers.contains_key(TRANSFER_ENCODING)
    {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(bytes.len()));
    }

    let retry_strategy = options
        .retry_strategy
        .or(seed.retry_strategy)
        .unwrap_or_else(|| Arc::new(ExponentialBackoff::new(config.default_retries)));

    let mut descriptor = RequestDescriptor {
        method,
        scheme: seed.scheme,
        hostname: seed.hostname,
        port: seed.port,
        path,
        headers,
        body,
        retry_strategy,
        timeout: options.timeout.or(seed.timeout),
        follow_redirect: options.follow_redirect.or(seed.follow_redirect).unwrap_or(true),
        json,
        encoding: options.encoding.unwrap_or(seed.encoding),
        tls: options.tls.or(seed.tls),
        href: String::new(),
    };
    descriptor.uri()?;
    descriptor.href = seed.href.unwrap_or_else(|| descriptor.url());
    Ok(descriptor)
}

fn prepare_body(body: Body, headers: &mut HeaderMap) -> Result<Option<PreparedBody>, Error> {
    let prepared = match body {
        Body::Text(text) if text.is_empty() => return Ok(None),
        Body::Text(text) => PreparedBody::Buffered(Bytes::from(text)),
        Body::Bytes(bytes) => PreparedBody::Buffered(bytes),
        Body::Object(serde_json::Value::Null) => return Ok(None),
        Body::Object(value @ serde_json::Value::Object(_)) => {
            if !headers.contains_key(CONTENT_TYPE) {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
            }
            PreparedBody::Buffered(Bytes::from(encode_form(&value, "form body")?))
        }
        Body::Object(_) => return Err(invalid_body()),
        Body::Stream(stream) => {
            if let Some(boundary) = stream.boundary()
                && !headers.contains_key(CONTENT_TYPE)
            {
                headers.insert(
                    CONTENT_TYPE,
                    parse_header_value(
                        "content-type",
                        &format!("multipart/form-data; boundary={boundary}"),
                    )?,
                );
            }
            PreparedBody::Streaming(stream)
        }
    };
    Ok(Some(prepared))
}
