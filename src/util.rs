use std::error::Error as StdError;
use std::sync::Mutex;

use http::header::{HeaderName, HeaderValue, LOCATION};
use http::{HeaderMap, StatusCode};

use crate::error::{Error, TransportErrorKind};

pub(crate) const BODY_EXCERPT_LEN: usize = 77;

pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub(crate) fn parse_header_name(name: &str) -> Result<HeaderName, Error> {
    HeaderName::from_bytes(name.trim().as_bytes())
        .map_err(|source| Error::invalid_options(format!("invalid header name {name}: {source}")))
}

pub(crate) fn parse_header_value(name: &str, value: &str) -> Result<HeaderValue, Error> {
    HeaderValue::from_str(value).map_err(|source| {
        Error::invalid_options(format!("invalid header value for {name}: {source}"))
    })
}

pub(crate) fn status_message(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("Unknown")
}

/// Parses a url the lenient way: a missing scheme means `http`.
pub(crate) fn parse_url_lax(text: &str) -> Result<url::Url, Error> {
    let trimmed = text.trim();
    let parsed = match url::Url::parse(trimmed) {
        Ok(parsed) if parsed.has_host() => Ok(parsed),
        Ok(_) | Err(url::ParseError::RelativeUrlWithoutBase) => {
            let without_slashes = trimmed.trim_start_matches('/');
            url::Url::parse(&format!("http://{without_slashes}"))
        }
        Err(error) => Err(error),
    };
    parsed.map_err(|source| Error::invalid_options(format!("invalid url {text}: {source}")))
}

pub(crate) fn is_redirect_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 300 | 301 | 302 | 303 | 305 | 307 | 308)
}

/// Reads the `location` header as UTF-8, whatever bytes the server sent.
pub(crate) fn redirect_location(headers: &HeaderMap) -> Option<String> {
    headers
        .get(LOCATION)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
}

pub(crate) fn resolve_redirect_url(current_url: &str, location: &str) -> Option<url::Url> {
    let base = url::Url::parse(current_url).ok()?;
    let joined = base.join(location).ok()?;
    matches!(joined.scheme(), "http" | "https").then_some(joined)
}

pub(crate) fn truncate_excerpt(text: &str) -> &str {
    match text.char_indices().nth(BODY_EXCERPT_LEN) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

fn error_chain_text(error: &(dyn StdError + 'static)) -> String {
    let mut text = error.to_string();
    let mut cause = error.source();
    while let Some(inner) = cause {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        cause = inner.source();
    }
    text.to_ascii_lowercase()
}

pub(crate) fn classify_transport_error(
    error: &hyper_util::client::legacy::Error,
) -> TransportErrorKind {
    let text = error_chain_text(error);
    if error.is_connect() {
        if text.contains("dns")
            || text.contains("name or service not known")
            || text.contains("failed to lookup address")
        {
            return TransportErrorKind::Dns;
        }
        if text.contains("tls") || text.contains("certificate") || text.contains("handshake") {
            return TransportErrorKind::Tls;
        }
        return TransportErrorKind::Connect;
    }

    if text.contains("read")
        || text.contains("connection reset")
        || text.contains("connection closed")
        || text.contains("broken pipe")
        || text.contains("unexpected eof")
        || text.contains("incomplete message")
    {
        return TransportErrorKind::Read;
    }

    TransportErrorKind::Other
}

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::{
        is_redirect_status, parse_url_lax, resolve_redirect_url, status_message,
        truncate_excerpt,
    };

    #[test]
    fn lax_url_defaults_to_http_scheme() {
        let parsed = parse_url_lax("localhost:3000/items?x=1").expect("lax url should parse");
        assert_eq!(parsed.scheme(), "http");
        assert_eq!(parsed.host_str(), Some("localhost"));
        assert_eq!(parsed.port(), Some(3000));
        assert_eq!(parsed.path(), "/items");
        assert_eq!(parsed.query(), Some("x=1"));
    }

    #[test]
    fn lax_url_keeps_explicit_scheme() {
        let parsed = parse_url_lax("https://example.com/a").expect("url should parse");
        assert_eq!(parsed.scheme(), "https");
        assert_eq!(parsed.port_or_known_default(), Some(443));
    }

    #[test]
    fn redirect_statuses_follow_the_classic_set() {
        for code in [300_u16, 301, 302, 303, 305, 307, 308] {
            let status = StatusCode::from_u16(code).expect("valid status");
            assert!(is_redirect_status(status), "{code} should redirect");
        }
        assert!(!is_redirect_status(StatusCode::NOT_MODIFIED));
        assert!(!is_redirect_status(StatusCode::OK));
    }

    #[test]
    fn relative_redirects_resolve_against_current_url() {
        let next = resolve_redirect_url("http://localhost:8080/a/b?x=1", "../c")
            .expect("relative location should resolve");
        assert_eq!(next.as_str(), "http://localhost:8080/c");

        let absolute = resolve_redirect_url("http://localhost/a", "https://example.com/z")
            .expect("absolute location should resolve");
        assert_eq!(absolute.as_str(), "https://example.com/z");
    }

    #[test]
    fn redirects_to_non_http_schemes_are_rejected() {
        assert!(resolve_redirect_url("http://localhost/a", "ftp://example.com/file").is_none());
    }

    #[test]
    fn excerpt_is_capped_on_char_boundaries() {
        let text = "é".repeat(100);
        assert_eq!(truncate_excerpt(&text).chars().count(), 77);
        assert_eq!(truncate_excerpt("short"), "short");
    }

    #[test]
    fn unknown_status_has_fallback_message() {
        assert_eq!(status_message(StatusCode::NOT_FOUND), "Not Found");
        let custom = StatusCode::from_u16(599).expect("valid status");
        assert_eq!(status_message(custom), "Unknown");
    }
}
