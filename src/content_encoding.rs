use std::io::{self, Read};

use bytes::Bytes;
use http::header::CONTENT_ENCODING;
use http::{HeaderMap, Method, StatusCode};

#[derive(Debug)]
pub(crate) struct DecodeContentEncodingError {
    pub(crate) encoding: String,
    pub(crate) source: io::Error,
}

impl std::fmt::Display for DecodeContentEncodingError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{} ({})", self.source, self.encoding)
    }
}

impl std::error::Error for DecodeContentEncodingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

fn read_to_end<R: Read>(reader: &mut R, encoding: &str) -> Result<Vec<u8>, DecodeContentEncodingError> {
    let mut decoded = Vec::new();
    reader
        .read_to_end(&mut decoded)
        .map_err(|source| DecodeContentEncodingError {
            encoding: encoding.to_owned(),
            source,
        })?;
    Ok(decoded)
}

pub(crate) fn should_decode_content_encoded_body(
    method: &Method,
    status: StatusCode,
    body_len: usize,
) -> bool {
    if body_len == 0 {
        return false;
    }
    if *method == Method::HEAD {
        return false;
    }
    if status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
    {
        return false;
    }
    true
}

/// Undoes `gzip`/`deflate` content codings, outermost first.
///
/// Codings this client never advertises are left in place and the body is
/// returned as received.
pub(crate) fn decode_content_encoded_body(
    mut body: Bytes,
    headers: &HeaderMap,
) -> Result<Bytes, DecodeContentEncodingError> {
    let Some(content_encoding) = headers.get(CONTENT_ENCODING) else {
        return Ok(body);
    };
    let Ok(content_encoding) = content_encoding.to_str() else {
        return Ok(body);
    };
    let mut encodings = content_encoding
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .collect::<Vec<_>>();

    while let Some(encoding) = encodings.pop() {
        let decoded = match encoding.to_ascii_lowercase().as_str() {
            "identity" => continue,
            "gzip" | "x-gzip" => {
                let mut decoder = flate2::read::GzDecoder::new(body.as_ref());
                read_to_end(&mut decoder, encoding)?
            }
            "deflate" => {
                let mut decoder = flate2::read::ZlibDecoder::new(body.as_ref());
                read_to_end(&mut decoder, encoding)?
            }
            _ => return Ok(body),
        };
        body = Bytes::from(decoded);
    }

    Ok(body)
}
