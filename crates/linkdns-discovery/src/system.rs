//! Host interface table.

use linkdns_types::{Capability, InterfaceDescriptor};

use crate::error::DiscoveryError;
use crate::InterfaceSource;

/// Reads interfaces from the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemInterfaces;

impl InterfaceSource for SystemInterfaces {
    fn interfaces(&self) -> Result<Vec<InterfaceDescriptor>, DiscoveryError> {
        imp::interfaces()
    }

    fn probe(&self, iface: &InterfaceDescriptor) -> Result<Capability, DiscoveryError> {
        let current = imp::interfaces()?;
        current
            .iter()
            .find(|candidate| candidate.name == iface.name)
            .map(InterfaceDescriptor::capability)
            .ok_or_else(|| DiscoveryError::UnknownInterface(iface.name.clone()))
    }
}

#[cfg(unix)]
mod imp {
    use std::net::{SocketAddrV4, SocketAddrV6};

    use linkdns_types::{InterfaceDescriptor, InterfaceFlags};
    use nix::ifaddrs::getifaddrs;
    use nix::net::if_::{if_nametoindex, InterfaceFlags as Iff};
    use tracing::debug;

    use crate::error::DiscoveryError;

    /// One entry per interface, in first-seen order. `getifaddrs` yields one
    /// row per address, so rows are merged by name.
    pub(super) fn interfaces() -> Result<Vec<InterfaceDescriptor>, DiscoveryError> {
        let rows = getifaddrs().map_err(|e| DiscoveryError::Enumeration(e.to_string()))?;

        let mut out: Vec<InterfaceDescriptor> = Vec::new();
        for row in rows {
            let pos = match out.iter().position(|i| i.name == row.interface_name) {
                Some(pos) => pos,
                None => {
                    let index = match if_nametoindex(row.interface_name.as_str()) {
                        Ok(index) => index,
                        Err(e) => {
                            debug!(interface = %row.interface_name, error = %e, "no interface index; skipping");
                            continue;
                        }
                    };
                    let mut iface = InterfaceDescriptor::new(row.interface_name.clone(), index);
                    iface.flags = InterfaceFlags {
                        up: row.flags.contains(Iff::IFF_UP),
                        multicast: row.flags.contains(Iff::IFF_MULTICAST),
                        loopback: row.flags.contains(Iff::IFF_LOOPBACK),
                    };
                    out.push(iface);
                    out.len() - 1
                }
            };

            let Some(addr) = row.address else { continue };
            let iface = &mut out[pos];
            if let Some(sin) = addr.as_sockaddr_in() {
                let ip = *SocketAddrV4::from(*sin).ip();
                if !iface.ipv4.contains(&ip) {
                    iface.ipv4.push(ip);
                }
            } else if let Some(sin6) = addr.as_sockaddr_in6() {
                let ip = *SocketAddrV6::from(*sin6).ip();
                if !iface.ipv6.contains(&ip) {
                    iface.ipv6.push(ip);
                }
            }
        }

        Ok(out)
    }
}

#[cfg(not(unix))]
mod imp {
    use linkdns_types::InterfaceDescriptor;

    use crate::error::DiscoveryError;

    pub(super) fn interfaces() -> Result<Vec<InterfaceDescriptor>, DiscoveryError> {
        Err(DiscoveryError::Unavailable)
    }
}
