//! Minimal server over a newline-framed transport.
//!
//! Run it, then talk to it with netcat:
//!
//! ```text
//! $ echo "GET /hello/world" | nc 127.0.0.1 8080
//! 200 hello world
//! ```
//!
//! Requests are one line each (`METHOD path`), responses are
//! `status body`. The framing lives entirely in this file — the library
//! only routes.

use std::time::Duration;

use http::Method;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tracing::{Level, info};

use nova_web::{
    Connection, Flow, Request, Server, Transport, TransportError, handler_fn, middleware_fn, response,
};

struct LineTransport;

struct LineConnection<IO> {
    reader: BufReader<ReadHalf<IO>>,
    writer: WriteHalf<IO>,
}

impl Transport for LineTransport {
    type Connection<IO>
        = LineConnection<IO>
    where
        IO: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    fn bind<IO>(&self, io: IO) -> LineConnection<IO>
    where
        IO: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (read, write) = tokio::io::split(io);
        LineConnection { reader: BufReader::new(read), writer: write }
    }
}

#[async_trait::async_trait]
impl<IO: AsyncRead + AsyncWrite + Send + Unpin + 'static> Connection for LineConnection<IO> {
    async fn read_request(&mut self) -> Result<Option<Request>, TransportError> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        let line = line.trim_end();
        let (method, path) = line.split_once(' ').ok_or_else(|| TransportError::malformed("missing path"))?;
        let method = Method::from_bytes(method.as_bytes()).map_err(TransportError::malformed)?;
        Ok(Some(Request::new(method, path)))
    }

    async fn write_response(&mut self, response: nova_web::Response) -> Result<(), TransportError> {
        let status = response.status().as_u16();
        let body = String::from_utf8_lossy(response.body()).into_owned();
        self.writer.write_all(format!("{status} {body}\n").as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

async fn hello(request: Request) -> Result<nova_web::Response, nova_web::BoxError> {
    let name = request.params().get("name").unwrap_or("world").to_owned();
    Ok(response::text(format!("hello {name}")))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = tracing_subscriber::FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let server = Server::builder(LineTransport)
        .middleware(middleware_fn(|request: &mut Request| {
            let blocked = request.path().starts_with("/private");
            async move {
                if blocked {
                    Flow::Halt(response::status(http::StatusCode::FORBIDDEN))
                } else {
                    Flow::Continue
                }
            }
        }))
        .get("/hello/:name", handler_fn(hello))
        .all("/ping", handler_fn(|_request: Request| async move { Ok(response::text("pong")) }))
        .build()?;

    let handle = server.listen("127.0.0.1:8080").await?;
    info!(addr = ?handle.local_addr().ok(), "serving, press ctrl-c to drain and exit");

    // shutdown is the application's call to make; the library installs no
    // signal handlers of its own
    tokio::signal::ctrl_c().await?;
    handle.close_timeout(Duration::from_secs(5)).await?;
    Ok(())
}
