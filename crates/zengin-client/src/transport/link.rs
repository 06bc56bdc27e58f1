//! Physical links: plain TCP or TLS over TCP.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use rustls::{ClientConfig, ClientConnection, ServerName, StreamOwned};
use zengin_core::config::TransportConfig;

use super::TransportError;

/// A byte stream the channel can close explicitly.
pub trait Link: Read + Write + Send {
    fn close(&mut self) -> io::Result<()>;
}

impl Link for TcpStream {
    fn close(&mut self) -> io::Result<()> {
        self.shutdown(Shutdown::Both)
    }
}

impl Link for StreamOwned<ClientConnection, TcpStream> {
    fn close(&mut self) -> io::Result<()> {
        self.conn.send_close_notify();
        self.flush()?;
        self.sock.shutdown(Shutdown::Both)
    }
}

/// Opens links to a host. One call per `TransportChannel::connect`.
pub trait Connector: Send {
    fn open(&self, host: &str, port: u16) -> Result<Box<dyn Link>, TransportError>;
}

/// Connects over TCP, optionally wrapping the socket in TLS.
pub struct TcpConnector {
    tls: Option<Arc<ClientConfig>>,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
}

impl TcpConnector {
    /// Plain TCP, for closed networks and tests.
    pub fn plain(config: &TransportConfig) -> Self {
        Self {
            tls: None,
            connect_timeout: config.connect_timeout(),
            read_timeout: config.read_timeout(),
        }
    }

    pub fn tls(config: &TransportConfig, tls: Arc<ClientConfig>) -> Self {
        Self {
            tls: Some(tls),
            ..Self::plain(config)
        }
    }

    fn open_tcp(&self, host: &str, port: u16) -> Result<TcpStream, TransportError> {
        let addr = format!("{host}:{port}");
        let connect_err = |source| TransportError::Connect {
            addr: addr.clone(),
            source,
        };

        let stream = match self.connect_timeout {
            None => TcpStream::connect((host, port)).map_err(connect_err)?,
            Some(timeout) => {
                let mut last_err = io::Error::new(io::ErrorKind::NotFound, "no addresses resolved");
                let mut connected = None;
                for candidate in (host, port).to_socket_addrs().map_err(connect_err)? {
                    match TcpStream::connect_timeout(&candidate, timeout) {
                        Ok(s) => {
                            connected = Some(s);
                            break;
                        }
                        Err(e) => last_err = e,
                    }
                }
                connected.ok_or_else(|| connect_err(last_err))?
            }
        };

        stream.set_read_timeout(self.read_timeout).map_err(connect_err)?;
        stream.set_nodelay(true).map_err(connect_err)?;
        Ok(stream)
    }
}

impl Connector for TcpConnector {
    fn open(&self, host: &str, port: u16) -> Result<Box<dyn Link>, TransportError> {
        let tcp = self.open_tcp(host, port)?;

        let Some(config) = &self.tls else {
            tracing::debug!(host, port, "plain TCP link open");
            return Ok(Box::new(tcp));
        };

        let server_name = ServerName::try_from(host)
            .map_err(|e| {
                TransportError::TlsInitialization(format!("invalid server name {host}: {e}"))
            })?;
        let conn = ClientConnection::new(config.clone(), server_name)
            .map_err(|e| TransportError::TlsInitialization(e.to_string()))?;
        let mut stream = StreamOwned::new(conn, tcp);

        while stream.conn.is_handshaking() {
            stream
                .conn
                .complete_io(&mut stream.sock)
                .map_err(|source| TransportError::Connect {
                    addr: format!("{host}:{port}"),
                    source,
                })?;
        }

        tracing::debug!(
            host,
            port,
            version = ?stream.conn.protocol_version(),
            suite = ?stream.conn.negotiated_cipher_suite().map(|s| s.suite()),
            "TLS link open"
        );
        Ok(Box::new(stream))
    }
}
