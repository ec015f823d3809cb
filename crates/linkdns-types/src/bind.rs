//! Local bind policy for transport sockets.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::family::{Family, ParseError};
use crate::mdns::MDNS_PORT;

/// Where a transport socket binds locally, independent of which multicast
/// group it later joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BindStrategy {
    /// Wildcard address, ephemeral port. Simple-resolver mode: responses
    /// addressed to the querier arrive, but other hosts' queries to 5353 do not.
    #[default]
    ZeroAddress,
    /// Wildcard address on the mDNS port (responder mode).
    FixedServicePort,
    /// The multicast group address itself on the mDNS port. Sockets bind
    /// the IPv6 wildcard instead, as `ff02::fb` needs a scope id.
    GroupAddress,
}

impl BindStrategy {
    /// The local address a socket of `family` binds to.
    pub fn bind_addr(self, family: Family) -> SocketAddr {
        match self {
            Self::ZeroAddress => SocketAddr::new(family.unspecified(), 0),
            Self::FixedServicePort => SocketAddr::new(family.unspecified(), MDNS_PORT),
            Self::GroupAddress => family.group_addr(),
        }
    }

    /// Whether the bind shares the mDNS port with other processes, which
    /// needs address/port reuse enabled before binding.
    pub fn shares_port(self) -> bool {
        !matches!(self, Self::ZeroAddress)
    }
}

impl fmt::Display for BindStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroAddress => write!(f, "zero-address"),
            Self::FixedServicePort => write!(f, "fixed-service-port"),
            Self::GroupAddress => write!(f, "group-address"),
        }
    }
}

impl FromStr for BindStrategy {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "zero-address" | "zero" => Ok(Self::ZeroAddress),
            "fixed-service-port" | "service-port" | "port" => Ok(Self::FixedServicePort),
            "group-address" | "group" => Ok(Self::GroupAddress),
            _ => Err(ParseError {
                kind: "bind strategy",
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_address_is_ephemeral_wildcard() {
        assert_eq!(
            BindStrategy::ZeroAddress.bind_addr(Family::V4).to_string(),
            "0.0.0.0:0"
        );
        assert_eq!(
            BindStrategy::ZeroAddress.bind_addr(Family::V6).to_string(),
            "[::]:0"
        );
    }

    #[test]
    fn fixed_port_binds_wildcard_5353() {
        assert_eq!(
            BindStrategy::FixedServicePort
                .bind_addr(Family::V4)
                .to_string(),
            "0.0.0.0:5353"
        );
    }

    #[test]
    fn group_address_binds_group() {
        assert_eq!(
            BindStrategy::GroupAddress.bind_addr(Family::V6).to_string(),
            "[ff02::fb]:5353"
        );
    }

    #[test]
    fn display_parses_back() {
        for strategy in [
            BindStrategy::ZeroAddress,
            BindStrategy::FixedServicePort,
            BindStrategy::GroupAddress,
        ] {
            assert_eq!(strategy.to_string().parse::<BindStrategy>().unwrap(), strategy);
        }
    }
}
