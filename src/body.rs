use std::convert::Infallible;
use std::error::Error as StdError;
use std::fmt;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures_core::Stream;
use futures_util::StreamExt;
use http::{HeaderMap, Method, Request, Uri};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full, StreamBody as HttpStreamBody};
use hyper::body::{Frame, Incoming};
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

use crate::util::lock_unpoisoned;

type BoxBodyError = Box<dyn StdError + Send + Sync>;
pub(crate) type ReqBody = BoxBody<Bytes, BoxBodyError>;

/// A single-use streaming request body.
///
/// Clones share the same underlying stream: whichever attempt takes it first
/// sends it, and it cannot be sent again.
#[derive(Clone)]
pub struct StreamBody {
    inner: Arc<Mutex<Option<ReqBody>>>,
    boundary: Option<String>,
}

impl StreamBody {
    pub fn new<S, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + Sync + 'static,
        E: StdError + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Mutex::new(Some(stream_req_body(stream)))),
            boundary: None,
        }
    }

    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Sync + 'static,
    {
        Self::new(ReaderStream::new(reader))
    }

    /// A multipart form stream; the boundary becomes part of the
    /// `content-type` header unless the caller sets one.
    pub fn multipart<S, E>(boundary: impl Into<String>, stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + Sync + 'static,
        E: StdError + Send + Sync + 'static,
    {
        Self {
            boundary: Some(boundary.into()),
            ..Self::new(stream)
        }
    }

    pub fn boundary(&self) -> Option<&str> {
        self.boundary.as_deref()
    }

    pub fn is_consumed(&self) -> bool {
        lock_unpoisoned(&self.inner).is_none()
    }

    pub(crate) fn take(&self) -> Option<ReqBody> {
        lock_unpoisoned(&self.inner).take()
    }
}

impl fmt::Debug for StreamBody {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("StreamBody")
            .field("boundary", &self.boundary)
            .field("consumed", &self.is_consumed())
            .finish()
    }
}

fn map_infallible_to_box_error(never: Infallible) -> BoxBodyError {
    match never {}
}

pub(crate) fn empty_req_body() -> ReqBody {
    Full::new(Bytes::new())
        .map_err(map_infallible_to_box_error)
        .boxed()
}

pub(crate) fn buffered_req_body(body: Bytes) -> ReqBody {
    Full::new(body).map_err(map_infallible_to_box_error).boxed()
}

pub(crate) fn stream_req_body<S, E>(stream: S) -> ReqBody
where
    S: Stream<Item = Result<Bytes, E>> + Send + Sync + 'static,
    E: StdError + Send + Sync + 'static,
{
    BodyExt::boxed(HttpStreamBody::new(stream.map(|item| {
        item.map(Frame::data)
            .map_err(|error| Box::new(error) as BoxBodyError)
    })))
}

pub(crate) fn build_http_request(
    method: Method,
    uri: Uri,
    headers: &HeaderMap,
    body: ReqBody,
) -> Result<Request<ReqBody>, http::Error> {
    let mut request_builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        request_builder = request_builder.header(name, value);
    }
    request_builder.body(body)
}

pub(crate) async fn read_all_body(mut body: Incoming) -> Result<Bytes, hyper::Error> {
    let mut collected = Vec::new();

    while let Some(frame) = body.frame().await {
        let frame = frame?;
        if let Some(data) = frame.data_ref() {
            collected.extend_from_slice(data);
        }
    }

    Ok(Bytes::from(collected))
}
