//! Communication flows: transfer, inquiry/response and notification.
//!
//! Each flow builds or reads exactly one message, runs it past the
//! integrity guard when checking is enabled, and returns one success value
//! or one `CommunicationError`. The transport is connected on demand before
//! every exchange; nothing is retried.

use zengin_core::config::ZenginConfig;
use zengin_core::{DataRecord, Message, MessageType};
use zengin_services::{IntegrityGuard, Verification};

use crate::error::CommunicationError;
use crate::transport::Transport;

/// Where a flow currently is. `Done` and `Failed` are terminal until the
/// next flow starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    Sending,
    AwaitingResponse,
    Done,
    Failed,
}

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub host: String,
    pub port: u16,
    /// Written into the header of every outbound message.
    pub sender_id: String,
    pub integrity_check_enabled: bool,
}

impl From<&ZenginConfig> for ServiceSettings {
    fn from(config: &ZenginConfig) -> Self {
        Self {
            host: config.bank.host.clone(),
            port: config.bank.port,
            sender_id: config.sender.id.clone(),
            integrity_check_enabled: config.integrity.check_enabled,
        }
    }
}

pub struct CommunicationService<T: Transport> {
    transport: T,
    guard: IntegrityGuard,
    settings: ServiceSettings,
    flow: FlowState,
}

impl<T: Transport> CommunicationService<T> {
    pub fn new(transport: T, guard: IntegrityGuard, settings: ServiceSettings) -> Self {
        Self {
            transport,
            guard,
            settings,
            flow: FlowState::Idle,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn guard(&self) -> &IntegrityGuard {
        &self.guard
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    pub fn flow_state(&self) -> FlowState {
        self.flow
    }

    /// Send a transfer and report whether the bank acknowledged it.
    pub fn send_transfer(
        &mut self,
        receiver_id: &str,
        records: Vec<DataRecord>,
    ) -> Result<bool, CommunicationError> {
        let message = self.outbound(MessageType::Transfer, receiver_id, records);
        tracing::info!(
            file_id = message.file_id(),
            receiver_id,
            records = message.data_records().len(),
            "transfer: start"
        );

        let result = self.send_message(&message);
        self.finish("transfer", result).inspect(|acked| {
            if *acked {
                tracing::info!(file_id = message.file_id(), "transfer: acknowledged");
            } else {
                tracing::warn!(file_id = message.file_id(), "transfer: not acknowledged");
            }
        })
    }

    /// Send an inquiry and wait for the bank's `Response`.
    pub fn send_inquiry(
        &mut self,
        receiver_id: &str,
        records: Vec<DataRecord>,
    ) -> Result<Message, CommunicationError> {
        let message = self.outbound(MessageType::Inquiry, receiver_id, records);
        tracing::info!(
            file_id = message.file_id(),
            receiver_id,
            records = message.data_records().len(),
            "inquiry: start"
        );

        let result = self.send_message(&message).and_then(|acked| {
            if !acked {
                return Err(CommunicationError::SendNotAcknowledged(MessageType::Inquiry));
            }
            self.receive_checked(MessageType::Response)
        });
        self.finish("inquiry", result).inspect(|reply| {
            tracing::info!(
                file_id = reply.file_id(),
                records = reply.data_records().len(),
                "inquiry: response received"
            );
        })
    }

    /// Block until the bank pushes a `Notification`.
    pub fn receive_notification(&mut self) -> Result<Message, CommunicationError> {
        tracing::info!("notification: waiting");
        let result = self.receive_checked(MessageType::Notification);
        self.finish("notification", result).inspect(|message| {
            tracing::info!(
                file_id = message.file_id(),
                records = message.data_records().len(),
                "notification: received"
            );
        })
    }

    /// Disconnect the transport. Safe to call when already disconnected.
    pub fn close(&mut self) -> Result<(), CommunicationError> {
        self.flow = FlowState::Idle;
        Ok(self.transport.disconnect()?)
    }

    fn outbound(
        &self,
        message_type: MessageType,
        receiver_id: &str,
        records: Vec<DataRecord>,
    ) -> Message {
        Message::new(message_type, self.settings.sender_id.as_str(), receiver_id)
            .with_data_records(records)
    }

    fn ensure_connected(&mut self) -> Result<(), CommunicationError> {
        if !self.transport.is_connected() {
            self.transport.connect(&self.settings.host, self.settings.port)?;
        }
        Ok(())
    }

    fn send_message(&mut self, message: &Message) -> Result<bool, CommunicationError> {
        self.flow = FlowState::Sending;
        self.ensure_connected()?;
        if self.settings.integrity_check_enabled {
            let record = self.guard.generate_and_store(message)?;
            tracing::debug!(
                file_id = %record.message_id,
                hash = %record.hash_value,
                "outbound integrity record stored"
            );
        }
        Ok(self.transport.send(&message.encode())?)
    }

    fn receive_checked(&mut self, expected: MessageType) -> Result<Message, CommunicationError> {
        self.flow = FlowState::AwaitingResponse;
        self.ensure_connected()?;
        let payload = self.transport.receive()?;
        let message = Message::decode(&payload)?;

        if message.message_type() != expected {
            return Err(CommunicationError::ProtocolViolation {
                expected,
                actual: message.message_type(),
            });
        }
        if self.settings.integrity_check_enabled {
            self.check_inbound(&message)?;
        }
        Ok(message)
    }

    /// Duplicate check, then stamp, then compare the body against the trailer.
    fn check_inbound(&self, message: &Message) -> Result<(), CommunicationError> {
        let file_id = message.file_id();
        if self.guard.is_duplicate(file_id)? {
            return Err(CommunicationError::DuplicateMessage {
                file_id: file_id.to_string(),
            });
        }

        let record = self.guard.generate_and_store(message)?;
        let announced = message.trailer_record_count()?;
        match self.guard.trailer_consistency(message, announced, record.total_amount) {
            Verification::Verified => Ok(()),
            mismatch => Err(CommunicationError::IntegrityMismatch {
                file_id: file_id.to_string(),
                detail: mismatch.to_string(),
            }),
        }
    }

    fn finish<R>(
        &mut self,
        flow: &'static str,
        result: Result<R, CommunicationError>,
    ) -> Result<R, CommunicationError> {
        match &result {
            Ok(_) => self.flow = FlowState::Done,
            Err(e) => {
                self.flow = FlowState::Failed;
                tracing::warn!(flow, code = e.code(), error = %e, "flow failed");
            }
        }
        result
    }
}
