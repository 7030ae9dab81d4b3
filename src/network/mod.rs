//! Networking layer
//!
//! Low-level connection management: the accept loop and the
//! per-connection task trio (supervisor, inbound parser, outbound
//! serializer).

pub mod connection;
pub mod listener;

pub use connection::{ConnId, DropCause, DropLatch, OutboundItem, SessionEvent};
