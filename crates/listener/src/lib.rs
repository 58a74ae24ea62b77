//! Graceful-draining stream listeners.
//!
//! This crate wraps a raw stream listener so that a server can stop accepting
//! new connections while letting the connections it already accepted finish
//! on their own time. It is the network-facing half of the nova router; the
//! routing half lives in `nova-web`.
//!
//! # Components
//!
//! - [`Listener`]: the raw listener boundary (`accept` / `close` /
//!   `local_addr`), implemented here for plain TCP ([`TcpAcceptor`]) and for
//!   rustls-terminated TLS ([`TlsAcceptor`])
//! - [`GracefulListener`]: wraps any [`Listener`], counts live connections,
//!   and exposes the [`close`](GracefulListener::close) /
//!   [`close_timeout`](GracefulListener::close_timeout) drain entry points
//! - [`GracefulStream`]: an accepted stream whose drop releases its slot in
//!   the live-connection count
//!
//! # Example
//!
//! ```no_run
//! use nova_listener::{GracefulListener, TcpAcceptor};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let acceptor = TcpAcceptor::bind("127.0.0.1:8080").await?;
//!     let listener = std::sync::Arc::new(GracefulListener::new(acceptor));
//!
//!     let accepting = std::sync::Arc::clone(&listener);
//!     tokio::spawn(async move {
//!         while let Ok((stream, peer)) = accepting.accept().await {
//!             tokio::spawn(async move {
//!                 // serve the connection; dropping `stream` releases it
//!                 let _ = (stream, peer);
//!             });
//!         }
//!     });
//!
//!     // wired by the embedding application, never by this library
//!     tokio::signal::ctrl_c().await?;
//!     listener.close_timeout(Duration::from_secs(5)).await?;
//!     Ok(())
//! }
//! ```
//!
//! The drain signal fires exactly once per listener lifetime, no matter how
//! many connections race their final close or how many tasks invoke the
//! close entry points concurrently.

mod acceptor;
mod graceful;
mod tls;

pub use acceptor::Listener;
pub use acceptor::TcpAcceptor;
pub use graceful::GracefulListener;
pub use graceful::GracefulStream;
pub use graceful::ShutdownError;
pub use tls::TlsAcceptor;
