//! The pre-dispatch interceptor chain.
//!
//! Interceptors run in registration order before routing. Each one settles
//! on a [`Flow`]: continuing hands the request to the next interceptor (or
//! the dispatcher once the chain is finished), halting stops the chain on
//! the spot and sends the interceptor's own response — the remaining
//! interceptors and the route dispatch are skipped entirely.

use std::future::Future;

use async_trait::async_trait;

use crate::request::Request;
use crate::response::Response;

/// Outcome of one interceptor.
///
/// Halting obliges the interceptor to supply the complete response, which is
/// why the variant carries one; there is no way to stop the chain and leave
/// the client hanging.
#[derive(Debug)]
pub enum Flow {
    /// Hand the request on.
    Continue,
    /// Stop the chain; this response is sent as-is.
    Halt(Response),
}

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, request: &mut Request) -> Flow;
}

/// Holder turning a closure into a [`Middleware`].
///
/// The closure inspects the request synchronously and returns an owned
/// future settling on the [`Flow`]; interceptors that need to borrow the
/// request across an await implement [`Middleware`] directly.
#[derive(Debug)]
pub struct FnMiddleware<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(&mut Request) -> Fut + Send + Sync,
    Fut: Future<Output = Flow> + Send + 'static,
{
    async fn handle(&self, request: &mut Request) -> Flow {
        (self.f)(request).await
    }
}

pub fn middleware_fn<F, Fut>(f: F) -> FnMiddleware<F>
where
    F: Fn(&mut Request) -> Fut + Send + Sync,
    Fut: Future<Output = Flow> + Send + 'static,
{
    FnMiddleware { f }
}

/// The registered interceptors, in call order. Immutable once the server is
/// built.
#[derive(Default)]
pub struct MiddlewareChain {
    entries: Vec<Box<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an interceptor; interceptors run in the order they were
    /// pushed.
    pub fn push(&mut self, middleware: impl Middleware + 'static) {
        self.entries.push(Box::new(middleware));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Runs the chain over `request`.
    ///
    /// `Some(response)` means an interceptor halted and the chain did not
    /// finish — the caller must send that response and skip dispatch. `None`
    /// means every interceptor continued.
    pub async fn run(&self, request: &mut Request) -> Option<Response> {
        for entry in &self.entries {
            if let Flow::Halt(response) = entry.handle(request).await {
                return Some(response);
            }
        }
        None
    }
}

impl std::fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareChain").field("len", &self.entries.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response;
    use http::{Method, StatusCode};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: Arc<AtomicUsize>) -> impl Middleware + 'static {
        middleware_fn(move |_request: &mut Request| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Flow::Continue
            }
        })
    }

    #[tokio::test]
    async fn test_chain_runs_in_registration_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut chain = MiddlewareChain::new();
        for label in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            chain.push(middleware_fn(move |_request: &mut Request| {
                order.lock().unwrap().push(label);
                async { Flow::Continue }
            }));
        }

        let mut request = Request::new(Method::GET, "/");
        assert!(chain.run(&mut request).await.is_none());
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_halt_short_circuits_rest_of_chain() {
        let reached = Arc::new(AtomicUsize::new(0));
        let mut chain = MiddlewareChain::new();
        chain.push(middleware_fn(|_request: &mut Request| async {
            Flow::Halt(response::status(StatusCode::UNAUTHORIZED))
        }));
        chain.push(counting(Arc::clone(&reached)));

        let mut request = Request::new(Method::GET, "/");
        let response = chain.run(&mut request).await.expect("chain should halt");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(reached.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_chain_finishes() {
        let chain = MiddlewareChain::new();
        let mut request = Request::new(Method::GET, "/");
        assert!(chain.run(&mut request).await.is_none());
    }

    #[tokio::test]
    async fn test_middleware_sees_request_state() {
        let mut chain = MiddlewareChain::new();
        chain.push(middleware_fn(|request: &mut Request| {
            let halt = request.path().starts_with("/admin");
            async move {
                if halt { Flow::Halt(response::status(StatusCode::FORBIDDEN)) } else { Flow::Continue }
            }
        }));

        let mut admin = Request::new(Method::GET, "/admin/panel");
        assert!(chain.run(&mut admin).await.is_some());

        let mut public = Request::new(Method::GET, "/public");
        assert!(chain.run(&mut public).await.is_none());
    }
}
