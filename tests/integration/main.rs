//! Zengin integration test harness.
//!
//! Each test starts a scripted mock bank host on a loopback port and drives
//! a real `CommunicationService<TransportChannel>` against it over plain
//! TCP. The bank thread returns what it saw so tests can assert on both
//! sides of the conversation.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{bail, Context, Result};

use zengin_client::{CommunicationService, TcpConnector, TransportChannel};
use zengin_core::config::ZenginConfig;
use zengin_core::{DataRecord, Message, MessageType};
use zengin_services::{AmountField, IntegrityGuard, IntegrityStore, MemoryIntegrityStore};

mod failures;
mod inquiry;
mod notification;
mod transfer;

// ── Protocol bytes ────────────────────────────────────────────────────────────

pub const STX: u8 = 0x02;
pub const ETX: u8 = 0x03;
pub const EOT: u8 = 0x04;
pub const ENQ: u8 = 0x05;
pub const ACK: u8 = 0x06;
pub const NAK: u8 = 0x15;

pub const SENDER_ID: &str = "SENDER0001";
pub const BANK_ID: &str = "BANK000001";

/// How long the bank waits on the client before giving up.
const BANK_READ_TIMEOUT: Duration = Duration::from_secs(10);

// ── Mock bank ─────────────────────────────────────────────────────────────────

/// One thing the bank does, in order, on a connection.
pub enum BankStep {
    /// Read ENQ, answer with the given byte.
    Handshake(u8),
    /// Read one frame, answer with the given byte.
    Receive(u8),
    /// Read one frame, then close the connection without answering.
    ReceiveAndHangUp,
    /// Write `noise ‖ STX ‖ payload ‖ ETX`, then read the client's ACK.
    Push { noise: Vec<u8>, payload: Vec<u8> },
    /// Read the client's EOT.
    Eot,
}

/// What the bank observed.
#[derive(Debug, Default)]
pub struct BankLog {
    /// Payloads of every frame the client sent, across all connections.
    pub frames: Vec<Vec<u8>>,
    pub connections: usize,
    pub eots: usize,
}

pub struct MockBank {
    port: u16,
    handle: JoinHandle<Result<BankLog>>,
}

impl MockBank {
    /// Serve one scripted session per accepted connection.
    pub fn spawn(sessions: Vec<Vec<BankStep>>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
        let port = listener.local_addr().expect("local addr").port();
        let handle = thread::spawn(move || {
            let mut log = BankLog::default();
            for steps in sessions {
                let (sock, _) = listener.accept().context("accept")?;
                sock.set_read_timeout(Some(BANK_READ_TIMEOUT))?;
                log.connections += 1;
                serve(sock, steps, &mut log)?;
            }
            Ok(log)
        });
        Self { port, handle }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Wait for the script to finish and return the log.
    pub fn finish(self) -> BankLog {
        self.handle
            .join()
            .expect("bank thread panicked")
            .expect("bank script failed")
    }
}

fn serve(mut sock: TcpStream, steps: Vec<BankStep>, log: &mut BankLog) -> Result<()> {
    for step in steps {
        match step {
            BankStep::Handshake(reply) => {
                expect_byte(&mut sock, ENQ)?;
                sock.write_all(&[reply])?;
            }
            BankStep::Receive(reply) => {
                log.frames.push(read_frame(&mut sock)?);
                sock.write_all(&[reply])?;
            }
            BankStep::ReceiveAndHangUp => {
                log.frames.push(read_frame(&mut sock)?);
                return Ok(());
            }
            BankStep::Push { noise, payload } => {
                let mut out = noise;
                out.push(STX);
                out.extend_from_slice(&payload);
                out.push(ETX);
                sock.write_all(&out)?;
                expect_byte(&mut sock, ACK)?;
            }
            BankStep::Eot => {
                expect_byte(&mut sock, EOT)?;
                log.eots += 1;
            }
        }
    }
    Ok(())
}

fn read_byte(sock: &mut TcpStream) -> Result<u8> {
    let mut byte = [0u8; 1];
    sock.read_exact(&mut byte).context("bank read")?;
    Ok(byte[0])
}

fn expect_byte(sock: &mut TcpStream, expected: u8) -> Result<()> {
    let got = read_byte(sock)?;
    if got != expected {
        bail!("bank expected 0x{expected:02x}, got 0x{got:02x}");
    }
    Ok(())
}

fn read_frame(sock: &mut TcpStream) -> Result<Vec<u8>> {
    expect_byte(sock, STX)?;
    let mut payload = Vec::new();
    loop {
        match read_byte(sock)? {
            ETX => return Ok(payload),
            b => payload.push(b),
        }
    }
}

// ── Client side ───────────────────────────────────────────────────────────────

/// Default configuration pointed at the mock bank, TLS off.
pub fn config_for(port: u16) -> ZenginConfig {
    let mut config = ZenginConfig::default();
    config.bank.host = "127.0.0.1".to_string();
    config.bank.port = port;
    config.sender.id = SENDER_ID.to_string();
    config.tls.enabled = false;
    config.transport.read_timeout_ms = 10_000;
    config
}

pub fn service_with_store(
    config: &ZenginConfig,
    store: Arc<dyn IntegrityStore>,
) -> CommunicationService<TransportChannel> {
    let channel = TransportChannel::new(Box::new(TcpConnector::plain(&config.transport)));
    let guard = IntegrityGuard::new(store, AmountField::from(&config.integrity));
    CommunicationService::new(channel, guard, config.into())
}

pub fn service_for(
    bank: &MockBank,
) -> (CommunicationService<TransportChannel>, MemoryIntegrityStore) {
    let store = MemoryIntegrityStore::new();
    let service = service_with_store(&config_for(bank.port()), Arc::new(store.clone()));
    (service, store)
}

// ── Fixtures ──────────────────────────────────────────────────────────────────

/// A record with `amount` in the amount subfield (offset 30, width 12).
pub fn record(name: &str, amount: u64) -> DataRecord {
    let mut record = DataRecord::from_text(name);
    let digits = format!("{amount:012}");
    record.as_bytes_mut()[30..42].copy_from_slice(digits.as_bytes());
    record
}

pub fn sample_records() -> Vec<DataRecord> {
    vec![
        record("PAYEE ONE", 10_000),
        record("PAYEE TWO", 20_000),
        record("PAYEE THREE", 30_000),
    ]
}

/// A bank-originated message with a fixed file id.
pub fn bank_message(message_type: MessageType, file_id: &str, records: Vec<DataRecord>) -> Vec<u8> {
    Message::new(message_type, BANK_ID, SENDER_ID)
        .with_data_records(records)
        .with_file_id(file_id)
        .encode()
}
