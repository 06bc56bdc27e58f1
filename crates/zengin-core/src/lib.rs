//! zengin-core: wire format, message codec, digests and configuration.
//! All other Zengin crates depend on this one.

pub mod config;
pub mod crypto;
pub mod message;
pub mod wire;

pub use message::{DataRecord, Message, MessageType};
pub use wire::{ControlByte, WireError};
