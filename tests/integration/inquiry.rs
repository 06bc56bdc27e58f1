use crate::*;

use zengin_client::CommunicationError;

/// Inquiry answered with a Response; noise before STX is skipped.
#[test]
fn test_inquiry_response_round_trip() {
    let response = bank_message(
        MessageType::Response,
        "R000000001",
        vec![record("BALANCE", 123_456)],
    );
    let bank = MockBank::spawn(vec![vec![
        BankStep::Handshake(ACK),
        BankStep::Receive(ACK),
        BankStep::Push {
            noise: b"\r\n".to_vec(),
            payload: response.clone(),
        },
        BankStep::Eot,
    ]]);
    let (mut service, store) = service_for(&bank);

    let reply = service.send_inquiry(BANK_ID, sample_records()).unwrap();
    service.close().unwrap();
    let log = bank.finish();

    assert_eq!(reply.message_type(), MessageType::Response);
    assert_eq!(reply.file_id(), "R000000001");
    assert_eq!(reply.encode(), response);

    let inquiry = Message::decode(&log.frames[0]).unwrap();
    assert_eq!(inquiry.message_type(), MessageType::Inquiry);

    // Outbound inquiry and inbound response are both on record.
    assert_eq!(store.len(), 2);
    let stamped = store.get_by_message_id("R000000001").unwrap().unwrap();
    assert_eq!(stamped.record_count, 1);
    assert_eq!(stamped.total_amount, 123_456);
}

/// A response whose file id was already seen is refused.
#[test]
fn test_inquiry_duplicate_response() {
    let response = bank_message(MessageType::Response, "R000000002", sample_records());
    let bank = MockBank::spawn(vec![vec![
        BankStep::Handshake(ACK),
        BankStep::Receive(ACK),
        BankStep::Push {
            noise: Vec::new(),
            payload: response.clone(),
        },
        BankStep::Receive(ACK),
        BankStep::Push {
            noise: Vec::new(),
            payload: response,
        },
        BankStep::Eot,
    ]]);
    let (mut service, _store) = service_for(&bank);

    service.send_inquiry(BANK_ID, sample_records()).unwrap();
    let err = service.send_inquiry(BANK_ID, sample_records()).unwrap_err();
    assert!(matches!(err, CommunicationError::DuplicateMessage { .. }), "{err}");
    assert_eq!(err.code(), "E014");

    service.close().unwrap();
    assert_eq!(bank.finish().frames.len(), 2);
}

/// Anything but a Response to an inquiry is a protocol violation.
#[test]
fn test_inquiry_unexpected_reply_type() {
    let notification = bank_message(MessageType::Notification, "N000000001", sample_records());
    let bank = MockBank::spawn(vec![vec![
        BankStep::Handshake(ACK),
        BankStep::Receive(ACK),
        BankStep::Push {
            noise: Vec::new(),
            payload: notification,
        },
        BankStep::Eot,
    ]]);
    let (mut service, _store) = service_for(&bank);

    let err = service.send_inquiry(BANK_ID, sample_records()).unwrap_err();
    assert_eq!(err.code(), "E015");
    service.close().unwrap();
    bank.finish();
}
