//! Graceful shutdown for stream listeners.
//!
//! [`GracefulListener`] wraps a raw [`Listener`] and keeps a live count of
//! the connections it handed out. Closing the listener stops acceptance
//! immediately and then waits — optionally with a bound — until every
//! outstanding connection is gone before reporting the listener drained.
//!
//! The count is maintained with lock-free atomics because accepts and
//! connection closes race freely across tasks, and the drained signal is
//! guarded by a compare-and-swap so it fires exactly once per listener
//! lifetime regardless of which decrement observes the zero crossing or how
//! many tasks invoke the close entry points.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use pin_project_lite::pin_project;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::acceptor::Listener;

#[derive(Error, Debug)]
pub enum ShutdownError {
    #[error("failed to close listener: {source}")]
    Close {
        #[from]
        source: io::Error,
    },

    #[error("drain timed out after {timeout:?}, {live} connections still open")]
    DrainTimeout { timeout: Duration, live: usize },
}

/// Accounting shared by the listener, its accepted streams and its closers.
#[derive(Debug, Default)]
struct DrainState {
    /// open connections handed out by the listener
    live: AtomicUsize,
    /// set once a close entry point has been invoked
    shutting_down: AtomicBool,
    /// fire-once guard for the drained signal
    fired: AtomicBool,
    drained: Notify,
}

impl DrainState {
    fn track_accept(&self) {
        self.live.fetch_add(1, Ordering::SeqCst);
    }

    fn release(&self) {
        let previous = self.live.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "released more connections than were accepted");
        if previous == 1 && self.shutting_down.load(Ordering::SeqCst) {
            self.fire();
        }
    }

    fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        if self.live.load(Ordering::SeqCst) == 0 {
            self.fire();
        }
    }

    /// Only the transition that wins the swap wakes the waiters; every other
    /// observer of the zero crossing is a no-op.
    fn fire(&self) {
        if self.fired.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_ok() {
            self.drained.notify_waiters();
        }
    }

    async fn wait_drained(&self) {
        // register interest before re-checking the flag, otherwise a fire
        // landing between the check and the await would be lost
        while !self.fired.load(Ordering::SeqCst) {
            let notified = self.drained.notified();
            if self.fired.load(Ordering::SeqCst) {
                break;
            }
            notified.await;
        }
    }
}

/// Wraps a raw [`Listener`] with live-connection tracking and draining.
///
/// Every stream handed out by [`accept`](Self::accept) increments the live
/// count; the stream's drop decrements it, whether the application or the
/// peer ended the connection. [`close`](Self::close) stops acceptance and
/// waits for the count to reach zero; [`close_timeout`](Self::close_timeout)
/// bounds that wait.
#[derive(Debug)]
pub struct GracefulListener<L> {
    inner: L,
    state: Arc<DrainState>,
}

impl<L: Listener> GracefulListener<L> {
    pub fn new(inner: L) -> Self {
        Self { inner, state: Arc::new(DrainState::default()) }
    }

    /// Accepts the next connection from the inner listener.
    ///
    /// Once a close entry point has run, this returns the inner listener's
    /// closed error for every subsequent call.
    pub async fn accept(&self) -> io::Result<(GracefulStream<L::Stream>, SocketAddr)> {
        let (stream, peer) = self.inner.accept().await?;
        self.state.track_accept();
        Ok((GracefulStream::new(stream, Arc::clone(&self.state)), peer))
    }

    /// Closes the inner listener and waits until every accepted connection
    /// has been dropped.
    ///
    /// The inner listener is closed before the shutdown flag is set, so no
    /// new connection can slip in after the drained signal fires. Errors are
    /// only those of the inner close; draining itself cannot fail. Safe to
    /// call more than once: later calls return as soon as the listener is
    /// drained.
    pub async fn close(&self) -> Result<(), ShutdownError> {
        self.inner.close()?;
        self.state.begin_shutdown();

        let live = self.live_connections();
        if live > 0 {
            info!(live, "listener closed, waiting for open connections to drain");
        }
        self.state.wait_drained().await;
        debug!("listener drained");
        Ok(())
    }

    /// Like [`close`](Self::close), but gives up waiting after `timeout`.
    ///
    /// On expiry the listener stays closed and the surviving connections
    /// keep draining in the background; the caller decides whether to
    /// force-terminate them.
    pub async fn close_timeout(&self, timeout: Duration) -> Result<(), ShutdownError> {
        self.inner.close()?;
        self.state.begin_shutdown();

        let live = self.live_connections();
        if live > 0 {
            info!(live, ?timeout, "listener closed, waiting for open connections to drain");
        }
        match tokio::time::timeout(timeout, self.state.wait_drained()).await {
            Ok(()) => {
                debug!("listener drained");
                Ok(())
            }
            Err(_) => Err(ShutdownError::DrainTimeout { timeout, live: self.live_connections() }),
        }
    }

    /// Number of accepted connections not yet dropped.
    pub fn live_connections(&self) -> usize {
        self.state.live.load(Ordering::SeqCst)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state.shutting_down.load(Ordering::SeqCst)
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    pub fn get_ref(&self) -> &L {
        &self.inner
    }
}

pin_project! {
    /// An accepted stream counted by a [`GracefulListener`].
    ///
    /// Reads and writes delegate to the wrapped stream; dropping the stream
    /// releases its slot in the listener's live count.
    #[derive(Debug)]
    pub struct GracefulStream<S> {
        #[pin]
        inner: S,
        guard: ConnGuard,
    }
}

impl<S> GracefulStream<S> {
    fn new(inner: S, state: Arc<DrainState>) -> Self {
        Self { inner, guard: ConnGuard { state } }
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}

#[derive(Debug)]
struct ConnGuard {
    state: Arc<DrainState>,
}

impl Drop for ConnGuard {
    fn drop(&mut self) {
        self.state.release();
    }
}

impl<S: AsyncRead> AsyncRead for GracefulStream<S> {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_read(cx, buf)
    }
}

impl<S: AsyncWrite> AsyncWrite for GracefulStream<S> {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.project().inner.poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_shutdown(cx)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        self.project().inner.poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acceptor::TcpAcceptor;
    use tokio::net::TcpStream;

    async fn bound_listener() -> (Arc<GracefulListener<TcpAcceptor>>, SocketAddr) {
        let acceptor = TcpAcceptor::bind("127.0.0.1:0").await.unwrap();
        let addr = acceptor.local_addr().unwrap();
        (Arc::new(GracefulListener::new(acceptor)), addr)
    }

    /// Accepts one connection, returning both ends.
    async fn connect_one(
        listener: &GracefulListener<TcpAcceptor>,
        addr: SocketAddr,
    ) -> (GracefulStream<TcpStream>, TcpStream) {
        let client = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let (stream, _peer) = listener.accept().await.unwrap();
        (stream, client.await.unwrap())
    }

    #[tokio::test]
    async fn test_close_with_no_connections_returns_immediately() {
        let (listener, _addr) = bound_listener().await;
        listener.close().await.unwrap();
        assert!(listener.is_shutting_down());
        assert_eq!(listener.live_connections(), 0);
    }

    #[tokio::test]
    async fn test_accept_tracks_and_drop_releases() {
        let (listener, addr) = bound_listener().await;

        let (s1, _c1) = connect_one(&listener, addr).await;
        let (s2, _c2) = connect_one(&listener, addr).await;
        assert_eq!(listener.live_connections(), 2);

        drop(s1);
        assert_eq!(listener.live_connections(), 1);
        drop(s2);
        assert_eq!(listener.live_connections(), 0);
    }

    #[tokio::test]
    async fn test_close_waits_for_drain() {
        let (listener, addr) = bound_listener().await;

        let mut streams = Vec::new();
        let mut clients = Vec::new();
        for _ in 0..4 {
            let (stream, client) = connect_one(&listener, addr).await;
            streams.push(stream);
            clients.push(client);
        }

        // release the connections from concurrent tasks while close waits
        let releaser = tokio::spawn(async move {
            for stream in streams {
                tokio::time::sleep(Duration::from_millis(10)).await;
                tokio::spawn(async move { drop(stream) });
            }
        });

        listener.close().await.unwrap();
        assert_eq!(listener.live_connections(), 0);
        releaser.await.unwrap();
    }

    #[tokio::test]
    async fn test_close_timeout_elapses_with_connection_held_open() {
        let (listener, addr) = bound_listener().await;
        let (stream, _client) = connect_one(&listener, addr).await;

        let timeout = Duration::from_millis(100);
        let started = tokio::time::Instant::now();
        let err = listener.close_timeout(timeout).await.unwrap_err();

        assert!(started.elapsed() >= timeout);
        match err {
            ShutdownError::DrainTimeout { live, .. } => assert_eq!(live, 1),
            other => panic!("expected DrainTimeout, got {other}"),
        }

        // the listener stays closed and the connection keeps draining;
        // a later close completes once the straggler is gone
        drop(stream);
        listener.close().await.unwrap();
        assert_eq!(listener.live_connections(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_closers_all_return() {
        let (listener, addr) = bound_listener().await;
        let (stream, _client) = connect_one(&listener, addr).await;

        let mut closers = Vec::new();
        for _ in 0..3 {
            let listener = Arc::clone(&listener);
            closers.push(tokio::spawn(async move { listener.close().await }));
        }
        let timed = {
            let listener = Arc::clone(&listener);
            tokio::spawn(async move { listener.close_timeout(Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(stream);

        for closer in closers {
            closer.await.unwrap().unwrap();
        }
        timed.await.unwrap().unwrap();
        assert_eq!(listener.live_connections(), 0);
    }

    #[tokio::test]
    async fn test_drain_signal_fires_once_under_racing_releases() {
        let state = Arc::new(DrainState::default());
        for _ in 0..32 {
            state.track_accept();
        }

        let mut tasks = Vec::new();
        for _ in 0..32 {
            let state = Arc::clone(&state);
            tasks.push(tokio::spawn(async move { state.release() }));
        }
        let closer = {
            let state = Arc::clone(&state);
            tokio::spawn(async move { state.begin_shutdown() })
        };

        for task in tasks {
            task.await.unwrap();
        }
        closer.await.unwrap();

        state.wait_drained().await;
        assert!(state.fired.load(Ordering::SeqCst));
        assert_eq!(state.live.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_accept_after_close_returns_closed_error() {
        let (listener, _addr) = bound_listener().await;
        listener.close().await.unwrap();

        let err = listener.accept().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[tokio::test]
    async fn test_inner_close_error_propagates() {
        struct FailingClose;

        #[async_trait::async_trait]
        impl Listener for FailingClose {
            type Stream = TcpStream;

            async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
                std::future::pending().await
            }

            fn close(&self) -> io::Result<()> {
                Err(io::Error::other("close failed"))
            }

            fn local_addr(&self) -> io::Result<SocketAddr> {
                Ok(([127, 0, 0, 1], 0).into())
            }
        }

        let listener = GracefulListener::new(FailingClose);
        match listener.close().await {
            Err(ShutdownError::Close { source }) => assert_eq!(source.to_string(), "close failed"),
            other => panic!("expected Close error, got {other:?}"),
        }
    }
}
