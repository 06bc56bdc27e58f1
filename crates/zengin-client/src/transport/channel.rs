//! Control-byte protocol over a single link.
//!
//! ```text
//!   connect:     client ── ENQ ──▶ bank
//!                client ◀── ACK ── bank
//!   send:        client ── STX payload ETX ──▶ bank
//!                client ◀── ACK | NAK ── bank
//!   receive:     client ◀── (noise) STX payload ETX ── bank
//!                client ── ACK ──▶ bank
//!   disconnect:  client ── EOT ──▶ bank, close
//! ```
//!
//! Every read goes through `read_ahead`, so bytes that arrive past a frame
//! boundary stay with the channel for the next call.

use std::io::{ErrorKind, Read, Write};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use zengin_core::ControlByte;

use super::{ChannelState, Connector, Link, Transport, TransportError};

/// Bytes pulled from the link per read call.
const READ_CHUNK: usize = 4096;

const STX: u8 = ControlByte::Stx as u8;
const ETX: u8 = ControlByte::Etx as u8;
const ACK: u8 = ControlByte::Ack as u8;
const ENQ: u8 = ControlByte::Enq as u8;
const EOT: u8 = ControlByte::Eot as u8;

/// One session with the bank host. Not shared between threads.
pub struct TransportChannel {
    connector: Box<dyn Connector>,
    link: Option<Box<dyn Link>>,
    state: ChannelState,
    read_ahead: BytesMut,
}

impl TransportChannel {
    pub fn new(connector: Box<dyn Connector>) -> Self {
        Self {
            connector,
            link: None,
            state: ChannelState::Disconnected,
            read_ahead: BytesMut::new(),
        }
    }

    fn require_connected(&self) -> Result<(), TransportError> {
        if self.state == ChannelState::Connected && self.link.is_some() {
            Ok(())
        } else {
            Err(TransportError::NotConnected)
        }
    }

    /// Drop the link without the EOT exchange.
    fn abandon_link(&mut self) {
        if let Some(mut link) = self.link.take() {
            let _ = link.close();
        }
        self.read_ahead.clear();
        self.state = ChannelState::Disconnected;
    }

    /// Pass `result` through, tearing the link down if the error left it unusable.
    fn settle<R>(&mut self, result: Result<R, TransportError>) -> Result<R, TransportError> {
        if let Err(e) = &result {
            if e.breaks_link() {
                tracing::debug!(error = %e, "link lost");
                self.abandon_link();
            }
        }
        result
    }

    fn write_all(&mut self, bytes: &[u8], op: &'static str) -> Result<(), TransportError> {
        let link = self.link.as_mut().ok_or(TransportError::NotConnected)?;
        link.write_all(bytes)
            .and_then(|()| link.flush())
            .map_err(|source| TransportError::Io { op, source })
    }

    /// Pull at least one more byte into `read_ahead`.
    fn fill(&mut self, op: &'static str) -> Result<(), TransportError> {
        let link = self.link.as_mut().ok_or(TransportError::NotConnected)?;
        let mut scratch = [0u8; READ_CHUNK];
        let n = loop {
            match link.read(&mut scratch) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(source) => return Err(TransportError::Io { op, source }),
            }
        };
        if n == 0 {
            return Err(TransportError::ConnectionClosed);
        }
        self.read_ahead.extend_from_slice(&scratch[..n]);
        Ok(())
    }

    fn read_byte(&mut self, op: &'static str) -> Result<u8, TransportError> {
        if !self.read_ahead.has_remaining() {
            self.fill(op)?;
        }
        Ok(self.read_ahead.get_u8())
    }

    fn open_and_handshake(&mut self, host: &str, port: u16) -> Result<(), TransportError> {
        self.link = Some(self.connector.open(host, port)?);
        self.read_ahead.clear();

        self.write_all(&[ENQ], "handshake")?;
        tracing::trace!("→ ENQ");
        let reply = self.read_byte("handshake")?;
        tracing::trace!(reply = format_args!("0x{reply:02x}"), "← handshake reply");
        if reply != ACK {
            return Err(TransportError::Handshake { reply });
        }
        Ok(())
    }

    fn exchange_frame(&mut self, payload: &[u8]) -> Result<bool, TransportError> {
        let mut frame = BytesMut::with_capacity(payload.len() + 2);
        frame.put_u8(STX);
        frame.put_slice(payload);
        frame.put_u8(ETX);
        self.write_all(&frame, "send")?;
        tracing::trace!(len = payload.len(), "→ STX…ETX");

        let reply = self.read_byte("send")?;
        tracing::trace!(reply = format_args!("0x{reply:02x}"), "← frame reply");
        if reply != ACK {
            return Err(TransportError::Rejected { reply });
        }
        Ok(true)
    }

    fn read_frame(&mut self) -> Result<Bytes, TransportError> {
        // Skip everything up to and including STX.
        let mut discarded = 0usize;
        loop {
            if let Some(pos) = self.read_ahead.iter().position(|&b| b == STX) {
                discarded += pos;
                self.read_ahead.advance(pos + 1);
                break;
            }
            discarded += self.read_ahead.len();
            self.read_ahead.clear();
            self.fill("receive")?;
        }
        if discarded > 0 {
            tracing::debug!(discarded, "skipped bytes before STX");
        }

        let mut payload = BytesMut::new();
        loop {
            if let Some(pos) = self.read_ahead.iter().position(|&b| b == ETX) {
                payload.extend_from_slice(&self.read_ahead.split_to(pos));
                self.read_ahead.advance(1);
                break;
            }
            payload.extend_from_slice(&self.read_ahead.split());
            self.fill("receive")?;
        }
        tracing::trace!(len = payload.len(), "← STX…ETX");

        self.write_all(&[ACK], "receive")?;
        tracing::trace!("→ ACK");
        Ok(payload.freeze())
    }
}

impl Transport for TransportChannel {
    fn state(&self) -> ChannelState {
        self.state
    }

    fn connect(&mut self, host: &str, port: u16) -> Result<(), TransportError> {
        if self.state == ChannelState::Connected {
            return Ok(());
        }

        self.state = ChannelState::Connecting;
        match self.open_and_handshake(host, port) {
            Ok(()) => {
                self.state = ChannelState::Connected;
                tracing::info!(host, port, "connected to bank host");
                Ok(())
            }
            Err(e) => {
                self.abandon_link();
                Err(e)
            }
        }
    }

    fn send(&mut self, payload: &[u8]) -> Result<bool, TransportError> {
        self.require_connected()?;
        let result = self.exchange_frame(payload);
        self.settle(result)
    }

    fn receive(&mut self) -> Result<Bytes, TransportError> {
        self.require_connected()?;
        let result = self.read_frame();
        self.settle(result)
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        self.state = ChannelState::Disconnected;
        self.read_ahead.clear();
        let Some(mut link) = self.link.take() else {
            return Ok(());
        };

        tracing::trace!("→ EOT");
        link.write_all(&[EOT])
            .and_then(|()| link.flush())
            .and_then(|()| link.close())
            .map_err(TransportError::Disconnect)?;
        tracing::info!("disconnected from bank host");
        Ok(())
    }
}

impl Drop for TransportChannel {
    fn drop(&mut self) {
        if self.link.is_some() {
            let _ = self.disconnect();
        }
    }
}
