//! TLS-terminating listener built on rustls.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::server::TlsStream;
use tracing::debug;

use crate::acceptor::{Listener, TcpAcceptor};

/// A [`Listener`] that terminates TLS before handing out the stream.
///
/// The certificate chain and private key are loaded once from PEM files at
/// bind time; the per-connection handshake is delegated entirely to rustls.
/// A connection only counts as accepted after its handshake succeeds, so
/// failed handshakes never show up in a graceful listener's live count.
pub struct TlsAcceptor {
    tcp: TcpAcceptor,
    tls: tokio_rustls::TlsAcceptor,
}

impl TlsAcceptor {
    pub async fn bind<A: ToSocketAddrs>(addr: A, cert: &Path, key: &Path) -> io::Result<Self> {
        let config = load_server_config(cert, key)?;
        let tcp = TcpAcceptor::bind(addr).await?;
        Ok(Self { tcp, tls: tokio_rustls::TlsAcceptor::from(Arc::new(config)) })
    }
}

fn load_server_config(cert: &Path, key: &Path) -> io::Result<ServerConfig> {
    let mut cert_reader = BufReader::new(File::open(cert)?);
    let certs = rustls_pemfile::certs(&mut cert_reader).collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, format!("no certificates found in {}", cert.display())));
    }

    let mut key_reader = BufReader::new(File::open(key)?);
    let key = rustls_pemfile::private_key(&mut key_reader)?
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, format!("no private key found in {}", key.display())))?;

    ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

#[async_trait]
impl Listener for TlsAcceptor {
    type Stream = TlsStream<TcpStream>;

    async fn accept(&self) -> io::Result<(Self::Stream, SocketAddr)> {
        let (stream, peer) = self.tcp.accept().await?;
        // the handshake runs on the accept path; a slow client delays the
        // next accept. TODO: move the handshake into the per-connection task
        let stream = self.tls.accept(stream).await?;
        debug!(%peer, "tls handshake complete");
        Ok((stream, peer))
    }

    fn close(&self) -> io::Result<()> {
        self.tcp.close()
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.tcp.local_addr()
    }
}

impl fmt::Debug for TlsAcceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsAcceptor").field("tcp", &self.tcp).finish_non_exhaustive()
    }
}
