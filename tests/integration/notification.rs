use crate::*;

use zengin_core::wire::TRAILER_LEN;

/// A pushed notification is decoded, stamped and checked against its trailer.
#[test]
fn test_notification_received() {
    let note = bank_message(MessageType::Notification, "N000000002", sample_records());
    let bank = MockBank::spawn(vec![vec![
        BankStep::Handshake(ACK),
        BankStep::Push {
            noise: Vec::new(),
            payload: note,
        },
        BankStep::Eot,
    ]]);
    let (mut service, store) = service_for(&bank);

    let message = service.receive_notification().unwrap();
    service.close().unwrap();
    let log = bank.finish();

    assert_eq!(message.message_type(), MessageType::Notification);
    assert_eq!(message.sender_id(), BANK_ID);
    assert_eq!(message.data_records().len(), 3);
    assert!(log.frames.is_empty());

    let stamped = store.get_by_message_id("N000000002").unwrap().unwrap();
    assert_eq!(stamped.record_count, 3);
    assert_eq!(stamped.total_amount, 60_000);
}

/// A trailer that announces more records than were sent is an integrity failure.
#[test]
fn test_notification_trailer_mismatch() {
    let mut note = bank_message(MessageType::Notification, "N000000003", sample_records());
    let count_at = note.len() - TRAILER_LEN + 6;
    note[count_at..count_at + 8].copy_from_slice(b"00000004");

    let bank = MockBank::spawn(vec![vec![
        BankStep::Handshake(ACK),
        BankStep::Push {
            noise: Vec::new(),
            payload: note,
        },
        BankStep::Eot,
    ]]);
    let (mut service, _store) = service_for(&bank);

    let err = service.receive_notification().unwrap_err();
    assert_eq!(err.code(), "E013");
    service.close().unwrap();
    bank.finish();
}
