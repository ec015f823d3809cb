//! Address families and the set of families a transport opens.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mdns::{MDNS_IPV4_GROUP, MDNS_IPV6_GROUP, MDNS_PORT};

/// Error parsing a family, family set or bind strategy from text.
#[derive(Debug, Error)]
#[error("invalid {kind}: {value:?}")]
pub struct ParseError {
    pub kind: &'static str,
    pub value: String,
}

/// A single IP address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Family {
    V4,
    V6,
}

impl Family {
    /// Both families, IPv4 first.
    pub const ALL: [Family; 2] = [Family::V4, Family::V6];

    /// The mDNS multicast group for this family.
    pub fn group(self) -> IpAddr {
        match self {
            Self::V4 => IpAddr::V4(MDNS_IPV4_GROUP),
            Self::V6 => IpAddr::V6(MDNS_IPV6_GROUP),
        }
    }

    /// The mDNS multicast group and port for this family.
    pub fn group_addr(self) -> SocketAddr {
        SocketAddr::new(self.group(), MDNS_PORT)
    }

    /// The wildcard address of this family.
    pub fn unspecified(self) -> IpAddr {
        match self {
            Self::V4 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            Self::V6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        }
    }

    /// The family of an IP address. IPv4-mapped IPv6 addresses count as IPv4.
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => Self::V4,
            IpAddr::V6(v6) if v6.to_ipv4_mapped().is_some() => Self::V4,
            IpAddr::V6(_) => Self::V6,
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V4 => write!(f, "IPv4"),
            Self::V6 => write!(f, "IPv6"),
        }
    }
}

/// Which address families a transport opens sockets for.
///
/// The empty set is not representable: a transport always asks for at
/// least one family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressFamilies {
    Ipv4,
    Ipv6,
    #[default]
    Both,
}

impl AddressFamilies {
    /// Whether this set includes `family`.
    pub fn contains(self, family: Family) -> bool {
        matches!(
            (self, family),
            (Self::Both, _) | (Self::Ipv4, Family::V4) | (Self::Ipv6, Family::V6)
        )
    }

    /// The families in this set, IPv4 first.
    pub fn iter(self) -> impl Iterator<Item = Family> {
        Family::ALL.into_iter().filter(move |f| self.contains(*f))
    }
}

impl fmt::Display for AddressFamilies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ipv4 => write!(f, "ipv4"),
            Self::Ipv6 => write!(f, "ipv6"),
            Self::Both => write!(f, "both"),
        }
    }
}

impl FromStr for AddressFamilies {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ipv4" | "v4" | "4" => Ok(Self::Ipv4),
            "ipv6" | "v6" | "6" => Ok(Self::Ipv6),
            "both" | "all" | "ipv4+ipv6" => Ok(Self::Both),
            _ => Err(ParseError {
                kind: "address family set",
                value: s.to_string(),
            }),
        }
    }
}
