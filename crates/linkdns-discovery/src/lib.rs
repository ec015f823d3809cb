//! Network interface discovery for linkdns.
//!
//! Defines the [`InterfaceSource`] trait for enumerating host interfaces and
//! probing which address families each one carries. [`SystemInterfaces`]
//! reads the host table; [`StaticInterfaces`] serves a fixed list.

use linkdns_types::{Capability, InterfaceDescriptor};
use tracing::debug;

pub mod error;
mod system;

pub use error::DiscoveryError;
pub use system::SystemInterfaces;

/// A source of network interfaces.
pub trait InterfaceSource: Send + Sync {
    /// Every interface the source knows about, unfiltered.
    fn interfaces(&self) -> Result<Vec<InterfaceDescriptor>, DiscoveryError>;

    /// Which families `iface` currently has a usable address for.
    fn probe(&self, iface: &InterfaceDescriptor) -> Result<Capability, DiscoveryError> {
        Ok(iface.capability())
    }
}

/// A fixed interface list, served as-is.
#[derive(Debug, Clone, Default)]
pub struct StaticInterfaces(pub Vec<InterfaceDescriptor>);

impl InterfaceSource for StaticInterfaces {
    fn interfaces(&self) -> Result<Vec<InterfaceDescriptor>, DiscoveryError> {
        Ok(self.0.clone())
    }
}

/// Enumerate the host's interfaces that are up and multicast-capable.
pub fn discover() -> Result<Vec<InterfaceDescriptor>, DiscoveryError> {
    discover_from(&SystemInterfaces)
}

/// Filter `source` down to interfaces that are up and multicast-capable.
///
/// Interfaces with no address in either family stay in the list; they are
/// skipped wherever capability is checked.
pub fn discover_from(source: &dyn InterfaceSource) -> Result<Vec<InterfaceDescriptor>, DiscoveryError> {
    let all = source.interfaces()?;
    let total = all.len();
    let found: Vec<_> = all
        .into_iter()
        .filter(InterfaceDescriptor::is_multicast_capable)
        .collect();
    debug!(total, multicast = found.len(), "enumerated interfaces");
    Ok(found)
}

/// Probe an interface's capability on the host.
pub fn probe(iface: &InterfaceDescriptor) -> Result<Capability, DiscoveryError> {
    SystemInterfaces.probe(iface)
}

/// Look up interfaces by name, preserving the order of `names`.
pub fn find_by_name(
    source: &dyn InterfaceSource,
    names: &[String],
) -> Result<Vec<InterfaceDescriptor>, DiscoveryError> {
    let all = source.interfaces()?;
    names
        .iter()
        .map(|name| {
            all.iter()
                .find(|iface| &iface.name == name)
                .cloned()
                .ok_or_else(|| DiscoveryError::UnknownInterface(name.clone()))
        })
        .collect()
}
