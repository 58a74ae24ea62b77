//! Server assembly: builder, accept loop and dispatch.
//!
//! The builder is the only writer the router and middleware chain ever see;
//! `build` consumes it, and `serve`/`listen` consume the server, so by the
//! time connections arrive the whole configuration sits behind an `Arc` and
//! is shared lock-free across connection tasks.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::Method;
use thiserror::Error;
use tokio::net::ToSocketAddrs;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use nova_listener::{GracefulListener, Listener, ShutdownError, TcpAcceptor, TlsAcceptor};

use crate::handler::{BoxError, Handler};
use crate::middleware::{Middleware, MiddlewareChain};
use crate::request::Request;
use crate::response::{self, Response};
use crate::router::{RouteError, Router};
use crate::transport::{Connection, Transport, TransportError};

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("invalid route registration: {source}")]
    InvalidRoute {
        #[from]
        source: RouteError,
    },
}

/// Configures a [`Server`].
///
/// Route and middleware registration happen here and only here. Pattern
/// errors are remembered and surfaced by [`build`](Self::build), so
/// registration calls keep chaining; users driving [`Router`] directly get
/// the fail-fast variant instead.
pub struct ServerBuilder<T> {
    transport: T,
    router: Router,
    middleware: MiddlewareChain,
    default_handler: Box<dyn Handler>,
    route_error: Option<RouteError>,
}

impl<T: Transport> ServerBuilder<T> {
    fn new(transport: T) -> Self {
        Self {
            transport,
            router: Router::new(),
            middleware: MiddlewareChain::new(),
            default_handler: Box::new(NotFound),
            route_error: None,
        }
    }

    fn route(mut self, method: Option<Method>, pattern: &str, handler: impl Handler + 'static) -> Self {
        if self.route_error.is_none() {
            if let Err(e) = self.router.insert(method, pattern, handler) {
                self.route_error = Some(e);
            }
        }
        self
    }

    /// Registers a handler for `GET` requests on `pattern`.
    pub fn get(self, pattern: &str, handler: impl Handler + 'static) -> Self {
        self.route(Some(Method::GET), pattern, handler)
    }

    /// Registers a handler for `POST` requests on `pattern`.
    pub fn post(self, pattern: &str, handler: impl Handler + 'static) -> Self {
        self.route(Some(Method::POST), pattern, handler)
    }

    /// Registers a handler for `PUT` requests on `pattern`.
    pub fn put(self, pattern: &str, handler: impl Handler + 'static) -> Self {
        self.route(Some(Method::PUT), pattern, handler)
    }

    /// Registers a handler for `DELETE` requests on `pattern`.
    pub fn delete(self, pattern: &str, handler: impl Handler + 'static) -> Self {
        self.route(Some(Method::DELETE), pattern, handler)
    }

    /// Registers a handler in the method-agnostic fallback bucket: it
    /// answers any method for which no method-specific route matches.
    pub fn all(self, pattern: &str, handler: impl Handler + 'static) -> Self {
        self.route(None, pattern, handler)
    }

    /// Registers a handler restricted to an arbitrary method, including
    /// extension methods built via [`Method::from_bytes`].
    pub fn restricted(self, method: Method, pattern: &str, handler: impl Handler + 'static) -> Self {
        self.route(Some(method), pattern, handler)
    }

    /// Appends an interceptor to the middleware chain; interceptors run in
    /// registration order before dispatch.
    pub fn middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Replaces the handler that answers requests no route matched. The
    /// default sends a plain-text `404 Not Found`.
    pub fn default_handler(mut self, handler: impl Handler + 'static) -> Self {
        self.default_handler = Box::new(handler);
        self
    }

    pub fn build(self) -> Result<Server<T>, BuildError> {
        if let Some(source) = self.route_error {
            return Err(BuildError::InvalidRoute { source });
        }
        Ok(Server {
            engine: Engine {
                transport: self.transport,
                router: self.router,
                middleware: self.middleware,
                default_handler: self.default_handler,
            },
        })
    }
}

struct NotFound;

#[async_trait]
impl Handler for NotFound {
    async fn handle(&self, _request: Request) -> Result<Response, BoxError> {
        Ok(response::not_found())
    }
}

/// A fully configured server, ready to be bound to a listener.
pub struct Server<T> {
    engine: Engine<T>,
}

impl<T: Transport> Server<T> {
    pub fn builder(transport: T) -> ServerBuilder<T> {
        ServerBuilder::new(transport)
    }

    /// Binds a TCP listener on `addr` and begins serving.
    pub async fn listen<A: ToSocketAddrs>(self, addr: A) -> io::Result<ServerHandle> {
        let acceptor = TcpAcceptor::bind(addr).await?;
        Ok(self.serve(acceptor))
    }

    /// Binds a TLS-terminating listener on `addr`, with the certificate
    /// chain and private key loaded from PEM files, and begins serving.
    pub async fn listen_tls<A: ToSocketAddrs>(self, addr: A, cert: &Path, key: &Path) -> io::Result<ServerHandle> {
        let acceptor = TlsAcceptor::bind(addr, cert, key).await?;
        Ok(self.serve(acceptor))
    }

    /// Begins serving on a caller-supplied listener.
    ///
    /// The listener is wrapped for graceful draining and the accept loop is
    /// spawned; the returned handle is the only way to shut the server down
    /// — the library installs no signal handlers, the embedding application
    /// wires [`ServerHandle::close`] to whatever event it chooses.
    pub fn serve<L: Listener>(self, listener: L) -> ServerHandle {
        let listener = Arc::new(GracefulListener::new(listener));
        let engine = Arc::new(self.engine);

        info!(local_addr = ?listener.local_addr().ok(), "server listening");
        tokio::spawn(accept_loop(engine, Arc::clone(&listener)));

        ServerHandle { control: listener }
    }
}

async fn accept_loop<T: Transport, L: Listener>(engine: Arc<Engine<T>>, listener: Arc<GracefulListener<L>>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                if listener.is_shutting_down() || e.kind() == io::ErrorKind::NotConnected {
                    debug!("listener closed, accept loop finished");
                    break;
                }
                warn!(cause = %e, "failed to accept connection");
                continue;
            }
        };

        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            let connection = engine.transport.bind(stream);
            match engine.serve_connection(connection).await {
                Ok(()) => debug!(%peer, "connection finished"),
                Err(e) => warn!(%peer, cause = %e, "connection failed"),
            }
        });
    }
}

/// The immutable request-handling core shared by all connection tasks.
struct Engine<T> {
    transport: T,
    router: Router,
    middleware: MiddlewareChain,
    default_handler: Box<dyn Handler>,
}

impl<T: Transport> Engine<T> {
    /// Drives one connection: possibly many sequential requests, each run
    /// through the middleware chain and the dispatcher on this task alone.
    async fn serve_connection<C: Connection>(&self, mut connection: C) -> Result<(), TransportError> {
        while let Some(request) = connection.read_request().await? {
            let started = Instant::now();
            let method = request.method().clone();
            let path = request.path().to_owned();

            let response = self.dispatch(request).await;
            let status = response.status();
            connection.write_response(response).await?;

            debug!(%method, %path, %status, elapsed = ?started.elapsed(), "request handled");
        }
        Ok(())
    }

    async fn dispatch(&self, mut request: Request) -> Response {
        if let Some(response) = self.middleware.run(&mut request).await {
            // an interceptor halted; it owns the response and dispatch is skipped
            return response;
        }

        let matched = match self.router.at(request.method(), request.path()) {
            Some(matched) => matched,
            None => {
                return match self.default_handler.handle(request).await {
                    Ok(response) => response,
                    Err(e) => {
                        error!(cause = %e, "default handler failed");
                        response::internal_error()
                    }
                };
            }
        };

        let (route, params) = matched.into_parts();
        request.set_params(params);
        match route.handler().handle(request).await {
            Ok(response) => response,
            Err(e) => {
                error!(cause = %e, pattern = route.pattern(), "handler failed");
                response::internal_error()
            }
        }
    }
}

/// Object-safe view of a [`GracefulListener`], so handles do not carry the
/// listener's type parameter.
#[async_trait]
trait DrainControl: Send + Sync {
    async fn close(&self) -> Result<(), ShutdownError>;
    async fn close_timeout(&self, timeout: Duration) -> Result<(), ShutdownError>;
    fn local_addr(&self) -> io::Result<SocketAddr>;
    fn live_connections(&self) -> usize;
}

#[async_trait]
impl<L: Listener> DrainControl for GracefulListener<L> {
    async fn close(&self) -> Result<(), ShutdownError> {
        GracefulListener::close(self).await
    }

    async fn close_timeout(&self, timeout: Duration) -> Result<(), ShutdownError> {
        GracefulListener::close_timeout(self, timeout).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        GracefulListener::local_addr(self)
    }

    fn live_connections(&self) -> usize {
        GracefulListener::live_connections(self)
    }
}

/// Control handle for a running server.
///
/// Cloneable; every clone drives the same listener.
#[derive(Clone)]
pub struct ServerHandle {
    control: Arc<dyn DrainControl>,
}

impl ServerHandle {
    /// Stops accepting connections and waits until every in-flight
    /// connection has finished. See [`GracefulListener::close`].
    pub async fn close(&self) -> Result<(), ShutdownError> {
        self.control.close().await
    }

    /// Like [`close`](Self::close) with a bounded wait. On timeout the
    /// listener stays closed and the stragglers keep draining in the
    /// background.
    pub async fn close_timeout(&self, timeout: Duration) -> Result<(), ShutdownError> {
        self.control.close_timeout(timeout).await
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.control.local_addr()
    }

    pub fn live_connections(&self) -> usize {
        self.control.live_connections()
    }
}

impl fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerHandle")
            .field("local_addr", &self.control.local_addr().ok())
            .field("live_connections", &self.control.live_connections())
            .finish()
    }
}
