//! The boundary to the transport collaborator.
//!
//! The router does not parse bytes off the wire; something else — an HTTP
//! codec, a test harness, any protocol that yields discrete request/response
//! pairs — owns framing. That something implements [`Transport`] to wrap
//! each accepted stream into a [`Connection`], and the server drives the
//! connection's read/dispatch/write loop.

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::request::Request;
use crate::response::Response;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("malformed request: {reason}")]
    Malformed { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl TransportError {
    pub fn malformed<S: ToString>(reason: S) -> Self {
        Self::Malformed { reason: reason.to_string() }
    }
}

/// Frames discrete request/response exchanges over accepted streams.
pub trait Transport: Send + Sync + 'static {
    type Connection<IO>: Connection + 'static
    where
        IO: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Wraps a freshly accepted stream into a framed connection.
    fn bind<IO>(&self, io: IO) -> Self::Connection<IO>
    where
        IO: AsyncRead + AsyncWrite + Send + Unpin + 'static;
}

/// One framed connection.
///
/// A connection may carry any number of sequential requests; `Ok(None)`
/// from [`read_request`](Self::read_request) means the peer is done and the
/// connection should wind down.
#[async_trait]
pub trait Connection: Send {
    async fn read_request(&mut self) -> Result<Option<Request>, TransportError>;

    async fn write_response(&mut self, response: Response) -> Result<(), TransportError>;
}
