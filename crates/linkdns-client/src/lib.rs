//! mDNS client for linkdns.
//!
//! [`Client`] composes a transport with a [`Broadcaster`] into three
//! operations: fire-and-forget `query`, continuous `subscribe`, and a
//! cancellable `query_first` that waits for the first matching answer.

pub mod broadcaster;
pub mod client;
pub mod config;
pub mod error;
pub mod setup;
pub mod state;

pub use broadcaster::{Broadcaster, Subscription};
pub use client::Client;
pub use config::Config;
pub use error::ClientError;
pub use state::ClientState;
