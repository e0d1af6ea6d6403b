use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, StatusCode};

use crate::content_encoding::{decode_content_encoded_body, should_decode_content_encoded_body};
use crate::error::Error;
use crate::options::Encoding;
use crate::orchestrator::Exchange;
use crate::response::{Response, ResponseBody};
use crate::util::truncate_excerpt;

fn success_limit(follow_redirect: bool) -> u16 {
    if follow_redirect { 299 } else { 399 }
}

/// The text encoding named by the `charset` parameter of `content-type`,
/// UTF-8 when absent or unknown.
fn declared_charset(headers: &HeaderMap) -> &'static encoding_rs::Encoding {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<mime::Mime>().ok())
        .and_then(|mime| {
            mime.get_param(mime::CHARSET)
                .and_then(|charset| encoding_rs::Encoding::for_label(charset.as_str().as_bytes()))
        })
        .unwrap_or(encoding_rs::UTF_8)
}

fn materialize(encoding: Encoding, headers: &HeaderMap, body: &Bytes) -> ResponseBody {
    match encoding {
        Encoding::Text => {
            let (text, _, _) = declared_charset(headers).decode(body);
            ResponseBody::Text(text.into_owned())
        }
        Encoding::Raw => ResponseBody::Bytes(body.clone()),
    }
}

/// Decodes and classifies a terminal response whose body has been read.
///
/// Every error raised here carries the response as far as it got.
pub(crate) fn resolve(exchange: Exchange) -> Result<Response, Error> {
    let Exchange {
        head,
        body,
        descriptor,
        state,
    } = exchange;
    let status = head.status;
    let url = state
        .last_redirect_url
        .unwrap_or_else(|| descriptor.url());
    let mut resolved = Response::new(
        status,
        head.headers,
        url,
        descriptor.href().to_owned(),
        state.redirect_count,
    );

    let received = match body {
        Ok(received) => received,
        Err(source) => {
            return Err(Error::Read {
                context: descriptor.context(),
                source: Box::new(source),
                response: Some(Box::new(resolved)),
            });
        }
    };

    let body = if should_decode_content_encoded_body(descriptor.method(), status, received.len()) {
        match decode_content_encoded_body(received.clone(), resolved.headers()) {
            Ok(decoded) => decoded,
            Err(source) => {
                resolved.set_body(ResponseBody::Bytes(received.clone()), received);
                return Err(Error::Read {
                    context: descriptor.context(),
                    source: Box::new(source),
                    response: Some(Box::new(resolved)),
                });
            }
        }
    } else {
        received
    };
    let materialized = materialize(descriptor.encoding(), resolved.headers(), &body);
    resolved.set_body(materialized, body.clone());

    if descriptor.json() && !body.is_empty() {
        match serde_json::from_slice::<serde_json::Value>(&body) {
            Ok(value) => resolved.set_body(ResponseBody::Json(value), body),
            Err(source) => {
                let text = String::from_utf8_lossy(&body);
                let message = format!(
                    "{source} in \"{}\": \n{}...",
                    descriptor.url(),
                    truncate_excerpt(&text)
                );
                return Err(Error::Parse {
                    context: descriptor.context(),
                    status,
                    message,
                    source,
                    response: Box::new(resolved),
                });
            }
        }
    }

    if !is_success(status, descriptor.follow_redirect()) {
        return Err(Error::Http {
            context: descriptor.context(),
            status,
            response: Box::new(resolved),
        });
    }
    Ok(resolved)
}

fn is_success(status: StatusCode, follow_redirect: bool) -> bool {
    (200..=success_limit(follow_redirect)).contains(&status.as_u16())
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::header::{CONTENT_TYPE, HeaderValue};
    use http::{HeaderMap, StatusCode};

    use super::{is_success, materialize};
    use crate::options::Encoding;
    use crate::response::ResponseBody;

    fn content_type(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn text_follows_declared_charset() {
        let latin1 = Bytes::from_static(b"caf\xe9");
        assert_eq!(
            materialize(Encoding::Text, &content_type("text/plain; charset=ISO-8859-1"), &latin1),
            ResponseBody::Text("caf\u{e9}".to_owned())
        );
        assert_eq!(
            materialize(Encoding::Text, &HeaderMap::new(), &latin1),
            ResponseBody::Text("caf\u{fffd}".to_owned())
        );
        assert_eq!(
            materialize(
                Encoding::Text,
                &content_type("text/plain; charset=bogus"),
                &Bytes::from_static(b"ok"),
            ),
            ResponseBody::Text("ok".to_owned())
        );
    }

    #[test]
    fn raw_mode_ignores_charset() {
        let body = Bytes::from_static(b"\xff\x00");
        assert_eq!(
            materialize(Encoding::Raw, &content_type("text/plain; charset=utf-8"), &body),
            ResponseBody::Bytes(body.clone())
        );
    }

    #[test]
    fn redirects_count_as_success_only_when_not_followed() {
        assert!(is_success(StatusCode::OK, true));
        assert!(!is_success(StatusCode::FOUND, true));
        assert!(is_success(StatusCode::FOUND, false));
        assert!(is_success(StatusCode::NOT_MODIFIED, false));
        assert!(!is_success(StatusCode::BAD_REQUEST, false));
        assert!(!is_success(StatusCode::CONTINUE, true));
    }
}
