//! Async stream abstraction for tokio.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;

use crate::error::{Error, Result};
use crate::opts::Opts;

pub enum Stream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Stream {
    /// Open a socket to the server described by `opts`.
    ///
    /// A socket path wins over host and port. A socket path that is a
    /// directory gets the standard `.s.PGSQL.<port>` file name appended.
    pub async fn connect(opts: &Opts) -> Result<Self> {
        if let Some(socket) = &opts.socket {
            return Self::connect_unix(socket, opts.port).await;
        }
        if opts.host.is_empty() {
            return Err(Error::InvalidUsage("host is empty".into()));
        }
        let tcp = TcpStream::connect((opts.host.as_str(), opts.port)).await?;
        tcp.set_nodelay(true)?;
        Ok(Stream::Tcp(tcp))
    }

    #[cfg(unix)]
    async fn connect_unix(socket: &str, port: u16) -> Result<Self> {
        let path = if std::path::Path::new(socket).is_dir() {
            format!("{}/.s.PGSQL.{}", socket.trim_end_matches('/'), port)
        } else {
            socket.to_string()
        };
        Ok(Stream::Unix(UnixStream::connect(path).await?))
    }

    #[cfg(not(unix))]
    async fn connect_unix(_socket: &str, _port: u16) -> Result<Self> {
        Err(Error::Unsupported(
            "Unix sockets are not available on this platform".into(),
        ))
    }
}

impl AsyncRead for Stream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            #[cfg(unix)]
            Stream::Unix(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Stream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Stream::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            #[cfg(unix)]
            Stream::Unix(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Tcp(s) => Pin::new(s).poll_flush(cx),
            #[cfg(unix)]
            Stream::Unix(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            #[cfg(unix)]
            Stream::Unix(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}
