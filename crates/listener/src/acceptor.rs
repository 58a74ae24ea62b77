//! The raw listener boundary and its TCP implementation.

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A raw stream listener.
///
/// This is the boundary [`GracefulListener`](crate::GracefulListener) wraps:
/// something that can hand out connected streams, report its local address,
/// and be closed so that no further streams are handed out. `close` only
/// stops acceptance; streams already handed out are unaffected.
///
/// After `close`, `accept` must keep returning the listener's closed error
/// rather than panicking, including for callers already parked in `accept`.
#[async_trait]
pub trait Listener: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    async fn accept(&self) -> io::Result<(Self::Stream, SocketAddr)>;

    fn close(&self) -> io::Result<()>;

    fn local_addr(&self) -> io::Result<SocketAddr>;
}

/// Plain TCP [`Listener`].
///
/// Closing cancels an internal token rather than tearing down the socket, so
/// every pending and future `accept` resolves to [`io::ErrorKind::NotConnected`]
/// deterministically; the socket itself is released when the acceptor drops.
#[derive(Debug)]
pub struct TcpAcceptor {
    inner: TcpListener,
    closed: CancellationToken,
}

impl TcpAcceptor {
    pub async fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let inner = TcpListener::bind(addr).await?;
        debug!(local_addr = ?inner.local_addr().ok(), "listener bound");
        Ok(Self { inner, closed: CancellationToken::new() })
    }
}

pub(crate) fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "listener closed")
}

#[async_trait]
impl Listener for TcpAcceptor {
    type Stream = TcpStream;

    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        select! {
            biased;
            _ = self.closed.cancelled() => Err(closed_error()),
            accepted = self.inner.accept() => accepted,
        }
    }

    fn close(&self) -> io::Result<()> {
        self.closed.cancel();
        Ok(())
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_accept_after_close_returns_closed_error() {
        let acceptor = TcpAcceptor::bind("127.0.0.1:0").await.unwrap();
        acceptor.close().unwrap();

        let err = acceptor.accept().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);

        // close is idempotent, and accept keeps failing the same way
        acceptor.close().unwrap();
        let err = acceptor.accept().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[tokio::test]
    async fn test_close_wakes_pending_accept() {
        let acceptor = std::sync::Arc::new(TcpAcceptor::bind("127.0.0.1:0").await.unwrap());

        let pending = {
            let acceptor = std::sync::Arc::clone(&acceptor);
            tokio::spawn(async move { acceptor.accept().await })
        };

        tokio::task::yield_now().await;
        acceptor.close().unwrap();

        let err = pending.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[tokio::test]
    async fn test_accept_hands_out_connected_streams() {
        let acceptor = TcpAcceptor::bind("127.0.0.1:0").await.unwrap();
        let addr = acceptor.local_addr().unwrap();

        let client = tokio::spawn(async move { TcpStream::connect(addr).await });
        let (_stream, peer) = acceptor.accept().await.unwrap();
        let client = client.await.unwrap().unwrap();

        assert_eq!(peer, client.local_addr().unwrap());
    }
}
