use zengin_core::{MessageType, WireError};
use zengin_services::IntegrityError;

use crate::transport::TransportError;

/// The one error a communication flow can fail with.
#[derive(Debug, thiserror::Error)]
pub enum CommunicationError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("integrity check failed: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("duplicate message {file_id}")]
    DuplicateMessage { file_id: String },

    #[error("integrity mismatch for {file_id}: {detail}")]
    IntegrityMismatch { file_id: String, detail: String },

    #[error("expected a {expected:?} message, received {actual:?}")]
    ProtocolViolation {
        expected: MessageType,
        actual: MessageType,
    },

    #[error("{0:?} message was not acknowledged")]
    SendNotAcknowledged(MessageType),
}

impl CommunicationError {
    /// Stable error code for operators and exit status reporting.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transport(e) => e.code(),
            Self::Wire(WireError::UnknownMessageType(_)) => "E012",
            Self::Wire(_) => "E011",
            Self::IntegrityMismatch { .. } => "E013",
            Self::DuplicateMessage { .. } => "E014",
            Self::ProtocolViolation { .. } => "E015",
            Self::SendNotAcknowledged(_) => "E016",
            Self::Integrity(_) => "E017",
        }
    }
}
