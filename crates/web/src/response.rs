//! Response type and builders.
//!
//! Responses are plain `http::Response<Bytes>` values; the helpers here
//! cover what handlers and interceptors reach for day to day.

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, StatusCode};
use serde::Serialize;

pub type Response = http::Response<Bytes>;

/// An empty response with the given status.
pub fn status(status: StatusCode) -> Response {
    let mut response = Response::new(Bytes::new());
    *response.status_mut() = status;
    response
}

/// A `200 OK` plain-text response.
pub fn text(body: impl Into<Bytes>) -> Response {
    let mut response = Response::new(body.into());
    response.headers_mut().insert(CONTENT_TYPE, content_type(&mime::TEXT_PLAIN_UTF_8));
    response
}

/// A `200 OK` JSON response serialized from `value`.
pub fn json<T: Serialize>(value: &T) -> Result<Response, serde_json::Error> {
    let body = serde_json::to_vec(value)?;
    let mut response = Response::new(Bytes::from(body));
    response.headers_mut().insert(CONTENT_TYPE, content_type(&mime::APPLICATION_JSON));
    Ok(response)
}

/// The stock not-found response, sent when no route matched and by handlers
/// declining a request.
pub fn not_found() -> Response {
    let mut response = text("404 Not Found");
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}

/// The stock response for a handler that failed.
pub fn internal_error() -> Response {
    let mut response = text("500 Internal Server Error");
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

fn content_type(mime: &mime::Mime) -> HeaderValue {
    HeaderValue::from_str(mime.as_ref()).expect("mime type is a valid header value")
}
