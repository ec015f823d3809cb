//! Multicast DNS transport for linkdns.
//!
//! This crate owns the network side: one UDP socket per address family,
//! joined to the mDNS group on every capable interface, a receive task per
//! socket decoding datagrams (via `hickory-proto`) onto a bounded inbound
//! queue, and a send path that fans a message out to every joined
//! interface.

pub mod error;
#[cfg(feature = "mock")]
pub mod mock;
pub mod queue;
mod receiver;
pub mod sender;
mod socket;
pub mod transport;
pub mod wire;

pub use error::ProtocolError;
pub use hickory_proto;
pub use hickory_proto::op::{Message, Query};
pub use hickory_proto::rr::Record;
pub use sender::MessageSender;
pub use transport::{
    FamilyReport, Member, Membership, MulticastTransport, SendReport, Transport, TransportConfig,
};
