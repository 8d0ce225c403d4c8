//! Networking: envelope, lanes, and packet builders

pub mod broadcast;
pub mod connection;
pub mod inbound;
pub mod outbox;
pub mod protocol;
pub mod transport;

pub use connection::ConnectionTable;
pub use inbound::{InboundPacket, InboundQueue};
pub use outbox::{OutboundPacket, Outbox};
pub use protocol::{ClientMessage, OpCode};
