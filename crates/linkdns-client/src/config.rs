//! Client configuration loaded from TOML.

use linkdns_discovery::{InterfaceSource, StaticInterfaces, SystemInterfaces};
use linkdns_protocol::TransportConfig;
use linkdns_types::{AddressFamilies, BindStrategy, DEFAULT_QUEUE_DEPTH, MIN_RECV_BUFFER_SIZE};
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub transport: TransportSection,
    #[serde(default)]
    pub client: ClientSection,
}

/// Socket and interface settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportSection {
    #[serde(default)]
    pub families: AddressFamilies,
    #[serde(default)]
    pub bind: BindStrategy,
    /// Interface names to join on. Empty means every multicast-capable
    /// interface.
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default = "default_recv_buffer_size")]
    pub recv_buffer_size: usize,
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            families: AddressFamilies::default(),
            bind: BindStrategy::default(),
            interfaces: Vec::new(),
            recv_buffer_size: default_recv_buffer_size(),
            queue_depth: default_queue_depth(),
        }
    }
}

/// Subscriber settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSection {
    #[serde(default = "default_queue_depth")]
    pub subscriber_depth: usize,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            subscriber_depth: default_queue_depth(),
        }
    }
}

impl Config {
    /// The transport parameters, with interface names resolved on the host.
    pub fn transport_config(&self) -> Result<TransportConfig, ClientError> {
        self.transport_config_with(&SystemInterfaces)
    }

    /// The transport parameters, with interface names resolved against the
    /// up, multicast-capable interfaces of `source`.
    pub fn transport_config_with(
        &self,
        source: &dyn InterfaceSource,
    ) -> Result<TransportConfig, ClientError> {
        let interfaces = if self.transport.interfaces.is_empty() {
            Vec::new()
        } else {
            let capable = linkdns_discovery::discover_from(source)
                .map_err(|e| ClientError::Config(e.to_string()))?;
            linkdns_discovery::find_by_name(&StaticInterfaces(capable), &self.transport.interfaces)
                .map_err(|e| {
                    ClientError::Config(format!(
                        "{e}; only interfaces that are up and multicast-capable can be named"
                    ))
                })?
        };
        Ok(TransportConfig {
            families: self.transport.families,
            bind: self.transport.bind,
            interfaces,
            recv_buffer_size: self.transport.recv_buffer_size,
            queue_depth: self.transport.queue_depth,
        })
    }
}

fn default_recv_buffer_size() -> usize {
    MIN_RECV_BUFFER_SIZE
}

fn default_queue_depth() -> usize {
    DEFAULT_QUEUE_DEPTH
}
