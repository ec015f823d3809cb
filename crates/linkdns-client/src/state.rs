//! Client lifecycle state.

use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Accepting queries and subscriptions.
    Open,
    /// `close()` is tearing down the transport and joining tasks.
    Closing,
    /// Everything joined. Terminal.
    Closed,
}

impl ClientState {
    /// Whether new queries may be sent.
    pub fn is_open(self) -> bool {
        self == Self::Open
    }

    fn to_u8(self) -> u8 {
        match self {
            Self::Open => 0,
            Self::Closing => 1,
            Self::Closed => 2,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Open,
            1 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

impl std::fmt::Display for ClientState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "Open"),
            Self::Closing => write!(f, "Closing"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

/// A [`ClientState`] shared across tasks.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new(state: ClientState) -> Self {
        Self(AtomicU8::new(state.to_u8()))
    }

    pub(crate) fn get(&self) -> ClientState {
        ClientState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub(crate) fn set(&self, state: ClientState) {
        self.0.store(state.to_u8(), Ordering::SeqCst);
    }
}
