mod handler;
mod middleware;
mod request;
mod server;
mod transport;

pub mod response;
pub mod router;

pub use handler::BoxError;
pub use handler::FnHandler;
pub use handler::Handler;
pub use handler::handler_fn;
pub use middleware::Flow;
pub use middleware::FnMiddleware;
pub use middleware::Middleware;
pub use middleware::MiddlewareChain;
pub use middleware::middleware_fn;
pub use request::Request;
pub use response::Response;
pub use router::PathParams;
pub use router::RouteError;
pub use router::Router;
pub use server::BuildError;
pub use server::Server;
pub use server::ServerBuilder;
pub use server::ServerHandle;
pub use transport::Connection;
pub use transport::Transport;
pub use transport::TransportError;

pub use nova_listener::Listener;
pub use nova_listener::ShutdownError;
pub use nova_listener::TcpAcceptor;
pub use nova_listener::TlsAcceptor;
