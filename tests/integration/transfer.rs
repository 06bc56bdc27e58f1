use std::collections::HashSet;

use crate::*;

use zengin_client::{ChannelState, FlowState, Transport};
use zengin_services::SqliteIntegrityStore;

/// Transfer acknowledged by the bank leaves exactly one integrity record,
/// and the bytes the bank received verify against it.
#[test]
fn test_transfer_acknowledged_end_to_end() {
    let bank = MockBank::spawn(vec![vec![
        BankStep::Handshake(ACK),
        BankStep::Receive(ACK),
        BankStep::Eot,
    ]]);
    let (mut service, store) = service_for(&bank);

    assert!(service.send_transfer(BANK_ID, sample_records()).unwrap());
    assert_eq!(service.flow_state(), FlowState::Done);
    service.close().unwrap();
    assert_eq!(service.transport().state(), ChannelState::Disconnected);

    let log = bank.finish();
    assert_eq!(log.frames.len(), 1);
    assert_eq!(log.eots, 1);

    let received = Message::decode(&log.frames[0]).unwrap();
    assert_eq!(received.message_type(), MessageType::Transfer);
    assert_eq!(received.sender_id(), SENDER_ID);
    assert_eq!(received.receiver_id(), BANK_ID);
    assert_eq!(received.data_records(), &sample_records()[..]);

    assert_eq!(store.len(), 1);
    let stored = store.get_by_message_id(received.file_id()).unwrap().unwrap();
    assert_eq!(stored.record_count, 3);
    assert_eq!(stored.total_amount, 60_000);
    assert!(service.guard().verify(&received).unwrap());
}

/// Several transfers share one connection and get distinct file ids.
#[test]
fn test_transfers_reuse_connection() {
    let bank = MockBank::spawn(vec![vec![
        BankStep::Handshake(ACK),
        BankStep::Receive(ACK),
        BankStep::Receive(ACK),
        BankStep::Receive(ACK),
        BankStep::Eot,
    ]]);
    let (mut service, store) = service_for(&bank);

    for _ in 0..3 {
        assert!(service.send_transfer(BANK_ID, sample_records()).unwrap());
    }
    service.close().unwrap();

    let log = bank.finish();
    assert_eq!(log.connections, 1);
    let ids: HashSet<String> = log
        .frames
        .iter()
        .map(|f| Message::decode(f).unwrap().file_id().to_string())
        .collect();
    assert_eq!(ids.len(), 3);
    assert_eq!(store.len(), 3);
}

/// Integrity records written by one run are visible to the next.
#[test]
fn test_transfer_with_sqlite_store() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("integrity.db");

    let bank = MockBank::spawn(vec![vec![
        BankStep::Handshake(ACK),
        BankStep::Receive(ACK),
        BankStep::Eot,
    ]]);
    let config = config_for(bank.port());
    {
        let store = SqliteIntegrityStore::open(&db).unwrap();
        let mut service = service_with_store(&config, Arc::new(store));
        assert!(service.send_transfer(BANK_ID, sample_records()).unwrap());
        service.close().unwrap();
    }
    let log = bank.finish();
    let file_id = Message::decode(&log.frames[0]).unwrap().file_id().to_string();

    let reopened = SqliteIntegrityStore::open(&db).unwrap();
    let recent = reopened.list_recent(1).unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].message_id, file_id);
    assert_eq!(recent[0].total_amount, 60_000);
}
