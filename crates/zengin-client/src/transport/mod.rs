//! Transport layer: one physical connection to the bank host.

mod channel;
mod link;
pub mod tls;

pub use channel::TransportChannel;
pub use link::{Connector, Link, TcpConnector};

use std::io;

use bytes::Bytes;

/// Connection state of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    /// Link being opened or handshake in flight.
    Connecting,
    Connected,
}

/// The control-byte protocol as seen by the communication flows.
///
/// Every call performs exactly one control-frame exchange and blocks until
/// it completes. Implementations never retry.
pub trait Transport: Send {
    fn state(&self) -> ChannelState;

    /// Open the connection and perform the ENQ/ACK handshake.
    fn connect(&mut self, host: &str, port: u16) -> Result<(), TransportError>;

    /// Send `STX‖payload‖ETX` and wait for the acknowledgement.
    fn send(&mut self, payload: &[u8]) -> Result<bool, TransportError>;

    /// Read one `STX…ETX` frame, acknowledge it and return its payload.
    fn receive(&mut self) -> Result<Bytes, TransportError>;

    /// Send EOT and close. A no-op when already disconnected.
    fn disconnect(&mut self) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool {
        self.state() == ChannelState::Connected
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("handshake rejected: expected ACK, got 0x{reply:02x}")]
    Handshake { reply: u8 },

    #[error("frame rejected: expected ACK, got 0x{reply:02x}")]
    Rejected { reply: u8 },

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("channel is not connected")]
    NotConnected,

    #[error("TLS initialization failed: {0}")]
    TlsInitialization(String),

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error during {op}: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("error while disconnecting: {0}")]
    Disconnect(#[source] io::Error),
}

impl TransportError {
    /// Stable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Handshake { .. } => "E001",
            Self::Connect { .. } => "E002",
            Self::Disconnect(_) => "E003",
            Self::Rejected { .. } => "E004",
            Self::Io { .. } => "E005",
            Self::ConnectionClosed => "E006",
            Self::NotConnected => "E009",
            Self::TlsInitialization(_) => "E010",
        }
    }

    /// Whether the link is unusable after this error.
    pub(crate) fn breaks_link(&self) -> bool {
        matches!(self, Self::ConnectionClosed | Self::Io { .. })
    }
}
