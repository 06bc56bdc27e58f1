use crate::*;

use zengin_client::{ChannelState, FlowState, Transport};

// ══════════════════════════════════════════════════════════════════════════════
//  Handshake & Link Failures
// ══════════════════════════════════════════════════════════════════════════════

/// NAK to ENQ fails the flow before anything is stamped or sent.
#[test]
fn test_handshake_refused() {
    let bank = MockBank::spawn(vec![vec![BankStep::Handshake(NAK)]]);
    let (mut service, store) = service_for(&bank);

    let err = service.send_transfer(BANK_ID, sample_records()).unwrap_err();
    assert_eq!(err.code(), "E001");
    assert_eq!(service.flow_state(), FlowState::Failed);
    assert_eq!(service.transport().state(), ChannelState::Disconnected);
    assert!(store.is_empty());

    // Already disconnected: nothing to send.
    service.close().unwrap();
    assert!(bank.finish().frames.is_empty());
}

/// NAK to a frame is reported, and the session stays usable.
#[test]
fn test_frame_rejected_keeps_session() {
    let bank = MockBank::spawn(vec![vec![
        BankStep::Handshake(ACK),
        BankStep::Receive(NAK),
        BankStep::Receive(ACK),
        BankStep::Eot,
    ]]);
    let (mut service, _store) = service_for(&bank);

    let err = service.send_transfer(BANK_ID, sample_records()).unwrap_err();
    assert_eq!(err.code(), "E004");
    assert!(service.transport().is_connected());
    assert!(service.send_transfer(BANK_ID, sample_records()).unwrap());
    service.close().unwrap();

    let log = bank.finish();
    assert_eq!(log.connections, 1);
    assert_eq!(log.frames.len(), 2);
}

/// A bank that hangs up mid-exchange drops the session; the next flow
/// reconnects on its own.
#[test]
fn test_hang_up_then_reconnect() {
    let bank = MockBank::spawn(vec![
        vec![BankStep::Handshake(ACK), BankStep::ReceiveAndHangUp],
        vec![BankStep::Handshake(ACK), BankStep::Receive(ACK), BankStep::Eot],
    ]);
    let (mut service, _store) = service_for(&bank);

    let err = service.send_transfer(BANK_ID, sample_records()).unwrap_err();
    assert!(matches!(err.code(), "E006" | "E005"), "{err}");
    assert_eq!(service.transport().state(), ChannelState::Disconnected);

    assert!(service.send_transfer(BANK_ID, sample_records()).unwrap());
    service.close().unwrap();

    let log = bank.finish();
    assert_eq!(log.connections, 2);
    assert_eq!(log.frames.len(), 2);
    assert_eq!(log.eots, 1);
}

/// Nothing listening: connect error, no stored record.
#[test]
fn test_bank_unreachable() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let store = MemoryIntegrityStore::new();
    let mut service = service_with_store(&config_for(port), Arc::new(store.clone()));

    let err = service.send_transfer(BANK_ID, sample_records()).unwrap_err();
    assert_eq!(err.code(), "E002");
    assert!(store.is_empty());
}
