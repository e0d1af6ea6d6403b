use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;

use crate::util::status_message;

/// The materialized response body.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseBody {
    Text(String),
    Bytes(Bytes),
    Json(serde_json::Value),
}

impl ResponseBody {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }
}

/// The terminal response of a logical request.
#[derive(Clone, Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: ResponseBody,
    raw_body: Bytes,
    url: String,
    request_url: String,
    redirect_count: usize,
}

impl Response {
    pub(crate) fn new(
        status: StatusCode,
        headers: HeaderMap,
        url: String,
        request_url: String,
        redirect_count: usize,
    ) -> Self {
        Self {
            status,
            headers,
            body: ResponseBody::Text(String::new()),
            raw_body: Bytes::new(),
            url,
            request_url,
            redirect_count,
        }
    }

    pub(crate) fn set_body(&mut self, body: ResponseBody, raw_body: Bytes) {
        self.body = body;
        self.raw_body = raw_body;
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    pub fn status_message(&self) -> &'static str {
        status_message(self.status)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    pub fn into_body(self) -> ResponseBody {
        self.body
    }

    /// The body as text; empty unless the request was made in text mode.
    pub fn text(&self) -> &str {
        self.body.as_text().unwrap_or_default()
    }

    /// The body bytes after content decoding, whatever mode was requested.
    pub fn raw_body(&self) -> &Bytes {
        &self.raw_body
    }

    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: DeserializeOwned,
    {
        match &self.body {
            ResponseBody::Json(value) => serde_json::from_value(value.clone()),
            _ => serde_json::from_slice(&self.raw_body),
        }
    }

    /// The url that produced this response, after redirects.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The url the logical request was first sent to.
    pub fn request_url(&self) -> &str {
        &self.request_url
    }

    pub fn redirect_count(&self) -> usize {
        self.redirect_count
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::{HeaderMap, StatusCode};
    use serde::Deserialize;
    use serde_json::json;

    use super::{Response, ResponseBody};

    fn response(body: ResponseBody, raw: &'static [u8]) -> Response {
        let mut response = Response::new(
            StatusCode::OK,
            HeaderMap::new(),
            "http://localhost/b".to_owned(),
            "http://localhost/a".to_owned(),
            1,
        );
        response.set_body(body, Bytes::from_static(raw));
        response
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: u32,
    }

    #[test]
    fn json_reads_parsed_body_or_raw_bytes() {
        let parsed = response(ResponseBody::Json(json!({"id": 7})), br#"{"id":7}"#);
        assert_eq!(parsed.json::<Item>().expect("parsed json"), Item { id: 7 });

        let text = response(ResponseBody::Text(r#"{"id":8}"#.to_owned()), br#"{"id":8}"#);
        assert_eq!(text.json::<Item>().expect("raw json"), Item { id: 8 });
        assert_eq!(text.text(), r#"{"id":8}"#);
    }

    #[test]
    fn exposes_urls_and_status_text() {
        let response = response(ResponseBody::Text("ok".to_owned()), b"ok");
        assert_eq!(response.status_code(), 200);
        assert_eq!(response.status_message(), "OK");
        assert_eq!(response.url(), "http://localhost/b");
        assert_eq!(response.request_url(), "http://localhost/a");
        assert_eq!(response.redirect_count(), 1);
    }
}
