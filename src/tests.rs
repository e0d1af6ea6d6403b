use std::collections::BTreeSet;

use http::{HeaderMap, Method, StatusCode};

use crate::client::Client;
use crate::config::ClientConfig;
use crate::descriptor::normalize;
use crate::error::{Error, ErrorCode, TransportError, TransportErrorKind};
use crate::options::{RequestOptions, RequestParts};
use crate::response::{Response, ResponseBody};
use crate::retry::RetryStrategy;

fn response(status: StatusCode, body: &'static str) -> Response {
    let mut response = Response::new(
        status,
        HeaderMap::new(),
        "http://localhost/a".to_owned(),
        "http://localhost/a".to_owned(),
        0,
    );
    response.set_body(
        ResponseBody::Text(body.to_owned()),
        bytes::Bytes::from_static(body.as_bytes()),
    );
    response
}

#[test]
fn error_code_contract_table_is_stable() {
    let names: Vec<&str> = ErrorCode::all().iter().map(|code| code.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "invalid_options",
            "tls_config",
            "request",
            "read",
            "parse",
            "http_status",
            "max_redirects",
        ]
    );

    let unique: BTreeSet<&str> = names.iter().copied().collect();
    assert_eq!(unique.len(), names.len());
}

#[test]
fn http_error_carries_context_status_and_response() {
    let descriptor = normalize(
        "http://localhost:8080/missing",
        RequestOptions::new(),
        &ClientConfig::default(),
    )
    .expect("descriptor");
    let error = Error::Http {
        context: descriptor.context(),
        status: StatusCode::NOT_FOUND,
        response: Box::new(response(StatusCode::NOT_FOUND, "not here")),
    };

    assert_eq!(error.to_string(), "Response code 404 (Not Found)");
    assert_eq!(error.name(), "HTTPError");
    assert_eq!(error.code(), ErrorCode::HttpStatus);
    assert_eq!(error.host(), Some("localhost:8080"));
    assert_eq!(error.hostname(), Some("localhost"));
    assert_eq!(error.method(), Some(&Method::GET));
    assert_eq!(error.path(), Some("/missing"));
    assert_eq!(error.status_message(), Some("Not Found"));
    let response = error.into_response().expect("http error keeps its response");
    assert_eq!(response.text(), "not here");
}

#[test]
fn unknown_status_code_still_formats() {
    let descriptor = normalize("http://localhost/", RequestOptions::new(), &ClientConfig::default())
        .expect("descriptor");
    let status = StatusCode::from_u16(599).expect("valid status");
    let error = Error::Http {
        context: descriptor.context(),
        status,
        response: Box::new(response(status, "")),
    };
    assert_eq!(error.to_string(), "Response code 599 (Unknown)");
}

#[test]
fn invalid_options_have_no_request_context() {
    let error = normalize("http://a:b@localhost/", RequestOptions::new(), &ClientConfig::default())
        .expect_err("credentials must be rejected");
    assert_eq!(error.code(), ErrorCode::InvalidOptions);
    assert!(error.context().is_none());
    assert!(error.status().is_none());
}

#[test]
fn client_normalize_applies_injected_configuration() {
    let client = Client::builder()
        .user_agent("injected/0.0")
        .default_retries(1)
        .try_build()
        .expect("client should build");
    let descriptor = client
        .normalize(RequestParts::new("localhost").path("items"), RequestOptions::new())
        .expect("descriptor");

    assert_eq!(descriptor.url(), "http://localhost/items");
    assert_eq!(
        descriptor
            .headers()
            .get("user-agent")
            .and_then(|value| value.to_str().ok()),
        Some("injected/0.0")
    );
    let error = TransportError::new(TransportErrorKind::Read, "reset");
    assert!(descriptor.retry_strategy().decide(1, &error).is_some());
    assert!(descriptor.retry_strategy().decide(2, &error).is_none());
}

#[test]
fn client_rejects_unparseable_root_certificates() {
    let error = Client::builder()
        .tls_root_ca_pem(b"-----BEGIN CERTIFICATE-----\nnot base64\n-----END CERTIFICATE-----\n".to_vec())
        .try_build()
        .expect_err("bad pem must fail the build");
    assert_eq!(error.code(), ErrorCode::TlsConfig);
}

#[test]
fn fresh_client_reports_empty_metrics() {
    let client = Client::builder().try_build().expect("client should build");
    let snapshot = client.clone().metrics_snapshot();
    assert_eq!(snapshot.requests_started, 0);
    assert_eq!(snapshot.in_flight, 0);
    assert!(snapshot.error_counts.is_empty());
}
