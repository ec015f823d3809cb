//! Discovery subsystem errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("interface enumeration failed: {0}")]
    Enumeration(String),

    #[error("unknown interface: {0}")]
    UnknownInterface(String),

    #[error("backend not available on this platform")]
    Unavailable,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
