//! Network interface descriptors and their per-family capability.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::family::Family;

/// Operational flags of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InterfaceFlags {
    pub up: bool,
    pub multicast: bool,
    pub loopback: bool,
}

/// Which address families an interface carries a usable address for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capability {
    pub ipv4: bool,
    pub ipv6: bool,
}

impl Capability {
    /// Neither family.
    pub const NONE: Capability = Capability {
        ipv4: false,
        ipv6: false,
    };

    pub fn supports(self, family: Family) -> bool {
        match family {
            Family::V4 => self.ipv4,
            Family::V6 => self.ipv6,
        }
    }

    pub fn is_none(self) -> bool {
        !self.ipv4 && !self.ipv6
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.ipv4, self.ipv6) {
            (true, true) => write!(f, "IPv4+IPv6"),
            (true, false) => write!(f, "IPv4"),
            (false, true) => write!(f, "IPv6"),
            (false, false) => write!(f, "none"),
        }
    }
}

/// A host network interface.
///
/// Addresses are kept alongside the flags: IPv4 group membership and
/// outgoing-interface selection are addressed by interface address, IPv6
/// by interface index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    pub name: String,
    pub index: u32,
    pub flags: InterfaceFlags,
    pub ipv4: Vec<Ipv4Addr>,
    pub ipv6: Vec<Ipv6Addr>,
}

impl InterfaceDescriptor {
    pub fn new(name: impl Into<String>, index: u32) -> Self {
        Self {
            name: name.into(),
            index,
            flags: InterfaceFlags::default(),
            ipv4: Vec::new(),
            ipv6: Vec::new(),
        }
    }

    /// Up and flagged multicast-capable.
    pub fn is_multicast_capable(&self) -> bool {
        self.flags.up && self.flags.multicast
    }

    /// The families this interface has an address for.
    pub fn capability(&self) -> Capability {
        Capability {
            ipv4: !self.ipv4.is_empty(),
            ipv6: !self.ipv6.is_empty(),
        }
    }

    /// The address used to select this interface for IPv4 multicast.
    pub fn primary_ipv4(&self) -> Option<Ipv4Addr> {
        self.ipv4.first().copied()
    }
}

impl fmt::Display for InterfaceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (#{})", self.name, self.index)
    }
}
