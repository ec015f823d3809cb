//! Transport and codec errors.

use linkdns_discovery::DiscoveryError;
use linkdns_types::Family;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encode(String),

    #[error("decoding error: {0}")]
    Decode(String),

    #[error("no transport could be opened (IPv4: {ipv4}; IPv6: {ipv6})")]
    NoTransport { ipv4: String, ipv6: String },

    #[error("no {0} socket available")]
    FamilyUnavailable(Family),

    #[error("message not sent on any interface ({attempted} attempted)")]
    NothingSent { attempted: usize },

    #[error("transport closed")]
    Closed,

    #[error("discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
