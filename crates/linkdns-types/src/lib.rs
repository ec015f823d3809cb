//! Shared types for linkdns.
//!
//! This crate contains the types shared across the linkdns workspace:
//! address families, bind strategies, interface descriptors with their
//! derived capability, and the mDNS wire-level constants every transport
//! must match for interoperability.

pub mod bind;
pub mod family;
pub mod interface;
pub mod mdns;

pub use bind::BindStrategy;
pub use family::{AddressFamilies, Family, ParseError};
pub use interface::{Capability, InterfaceDescriptor, InterfaceFlags};
pub use mdns::{
    DEFAULT_QUEUE_DEPTH, MDNS_IPV4_GROUP, MDNS_IPV6_GROUP, MDNS_PORT, MIN_RECV_BUFFER_SIZE,
    MULTICAST_HOP_LIMIT,
};
