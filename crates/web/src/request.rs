//! The request abstraction handed over by the transport layer.

use bytes::Bytes;
use http::{HeaderMap, Method};
use serde::de::DeserializeOwned;

use crate::router::PathParams;

/// A single framed request.
///
/// Produced by the transport collaborator: the path is expected to be
/// pre-normalized (no query string), and the body — if any — is complete.
/// Path parameters are attached by the dispatcher once a route has matched.
#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Bytes,
    params: PathParams,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            params: PathParams::empty(),
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Parameters captured from the path by the matched route; empty until
    /// dispatch has resolved a route.
    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub(crate) fn set_params(&mut self, params: PathParams) {
        self.params = params;
    }

    /// Deserializes the request body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, Debug, PartialEq)]
    struct User {
        name: String,
        zip: String,
    }

    #[test]
    fn test_json_body() {
        let request = Request::new(Method::POST, "/users")
            .with_body(r#"{"name":"hello","zip":"world"}"#);

        let user: User = request.json().unwrap();
        assert_eq!(user, User { name: "hello".to_owned(), zip: "world".to_owned() });
    }

    #[test]
    fn test_json_empty_body_fails() {
        let request = Request::new(Method::POST, "/users");
        assert!(request.json::<User>().is_err());
    }
}
