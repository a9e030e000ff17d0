//! Transport connectors
//!
//! The driver talks to GPSD through any stream implementing the
//! `futures-io` traits. A [`Connector`] opens such streams; [`TcpConnector`]
//! is the production implementation, tests substitute in-memory pipes.

use std::io;

use futures_util::future::BoxFuture;
use tokio::net::{TcpSocket, TcpStream};
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};

/// Opens transport streams to GPSD
pub trait Connector: Send + Sync + 'static {
    /// Stream type produced by a successful connect
    type Stream: futures_io::AsyncRead + futures_io::AsyncWrite + Unpin + Send + 'static;

    /// Starts a connect attempt
    ///
    /// The attempt is dropped, and must abort, when the client destroys it.
    fn connect(
        &self,
        host: String,
        port: u16,
        keep_alive: bool,
    ) -> BoxFuture<'static, io::Result<Self::Stream>>;
}

/// Connects over TCP
///
/// Every resolved address is tried in order; the last failure is reported
/// when none accepts.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Stream = Compat<TcpStream>;

    fn connect(
        &self,
        host: String,
        port: u16,
        keep_alive: bool,
    ) -> BoxFuture<'static, io::Result<Self::Stream>> {
        Box::pin(async move {
            let mut last_err = None;
            for addr in tokio::net::lookup_host((host.as_str(), port)).await? {
                let socket = if addr.is_ipv4() {
                    TcpSocket::new_v4()?
                } else {
                    TcpSocket::new_v6()?
                };
                if keep_alive {
                    socket.set_keepalive(true)?;
                }

                match socket.connect(addr).await {
                    Ok(stream) => {
                        tracing::debug!(%addr, "tcp connected");
                        return Ok(stream.compat());
                    }
                    Err(err) => {
                        tracing::trace!(%addr, error = %err, "tcp connect failed");
                        last_err = Some(err);
                    }
                }
            }

            Err(last_err.unwrap_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no address resolved for {host}:{port}"),
                )
            }))
        })
    }
}
