//! mDNS wire-level constants (RFC 6762).

use std::net::{Ipv4Addr, Ipv6Addr};

/// The well-known mDNS UDP port.
pub const MDNS_PORT: u16 = 5353;

/// IPv4 link-local multicast group for mDNS.
pub const MDNS_IPV4_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);

/// IPv6 link-local multicast group for mDNS (`ff02::fb`).
pub const MDNS_IPV6_GROUP: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 0xfb);

/// Multicast TTL / hop limit. Receivers use 255 to detect packets that
/// crossed a router.
pub const MULTICAST_HOP_LIMIT: u32 = 255;

/// Smallest per-read receive buffer; one Ethernet MTU.
pub const MIN_RECV_BUFFER_SIZE: usize = 1500;

/// Default depth of the inbound and per-subscriber queues.
pub const DEFAULT_QUEUE_DEPTH: usize = 16;
