use std::error::Error;
use std::future::Future;

use async_trait::async_trait;

use crate::request::Request;
use crate::response::Response;

pub type BoxError = Box<dyn Error + Send + Sync>;

/// A route callback.
///
/// Receives the request — with captured path parameters attached — and is
/// expected to produce the complete response. Errors are logged by the
/// dispatcher and turned into a 500; a handler that wants to decline a
/// request it matched answers with [`response::not_found`](crate::response::not_found)
/// itself.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, request: Request) -> Result<Response, BoxError>;
}

/// Holder turning an async `Fn(Request)` into a [`Handler`].
#[derive(Debug)]
pub struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, BoxError>> + Send,
{
    async fn handle(&self, request: Request) -> Result<Response, BoxError> {
        (self.f)(request).await
    }
}

pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, BoxError>> + Send,
{
    FnHandler { f }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response;
    use http::Method;

    fn assert_is_handler<H: Handler>(_handler: &H) {
        // no op
    }

    #[tokio::test]
    async fn test_fn_handler_invokes_closure() {
        let handler = handler_fn(|request: Request| async move {
            Ok(response::text(format!("saw {}", request.path())))
        });
        assert_is_handler(&handler);

        let response = handler.handle(Request::new(Method::GET, "/echo")).await.unwrap();
        assert_eq!(&response.body()[..], b"saw /echo");
    }
}
