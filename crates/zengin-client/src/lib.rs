//! zengin-client: transport channel and the three communication flows.
//!
//! `TransportChannel` speaks the control-byte protocol over one TCP or TLS
//! connection. `CommunicationService` composes it with the codec and the
//! integrity guard into transfer, inquiry/response and notification flows.

pub mod communication_service;
pub mod error;
pub mod transport;

pub use communication_service::{CommunicationService, FlowState, ServiceSettings};
pub use error::CommunicationError;
pub use transport::tls::{ClientIdentity, TlsMaterial};
pub use transport::{ChannelState, TcpConnector, Transport, TransportChannel, TransportError};
