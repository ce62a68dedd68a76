//! HTTP peer transport.
//!
//! Groups stay transport-agnostic through two small traits: a
//! [`PeerPicker`] elects the node owning a key, and a [`PeerFetcher`]
//! retrieves a value from that node. The provided implementation speaks
//! plain HTTP: every node serves its cached values under a well-known
//! path prefix and fetches from its peers with a retrying client. Any
//! other protocol satisfying the two traits plugs in the same way.

pub mod client;
pub mod protocol;
pub mod server;

pub use client::{HttpFetcher, HttpPeerPool};
pub use server::peer_router;

use anyhow::Result;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + 'a>>;

/// Elects the peer owning `key`. `None` means the key belongs to the
/// local node and should be loaded here.
pub trait PeerPicker: Send + Sync {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerFetcher>>;
}

/// Client side of one remote peer: fetch the value stored under
/// `group`/`key` there.
pub trait PeerFetcher: Send + Sync {
    fn fetch<'a>(&'a self, group: &'a str, key: &'a str) -> FetchFuture<'a>;
}

#[cfg(test)]
mod tests;
