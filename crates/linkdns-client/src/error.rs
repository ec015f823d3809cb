//! Client errors.

use linkdns_protocol::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("client closed")]
    Closed,

    #[error("deadline exceeded waiting for an answer")]
    DeadlineExceeded,

    #[error("query cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
