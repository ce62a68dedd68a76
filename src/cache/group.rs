//! Named cache groups.
//!
//! A [`Group`] is the public face of one cache namespace: reads check the
//! local shard, then an elected peer, then the group's loader, with
//! concurrent misses for the same key collapsed into a single load by the
//! flight group. Groups register themselves in a process-wide map so the
//! HTTP peer handler can resolve them by name.

use super::byteview::ByteView;
use super::shard::CacheShard;
use super::singleflight::FlightGroup;
use crate::peers::{PeerFetcher, PeerPicker};

use anyhow::{anyhow, bail, Result};
use dashmap::DashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, LazyLock, OnceLock};

pub type LoadFuture = Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send>>;

/// Source of record consulted on a cache miss.
///
/// Blanket-implemented for async closures, so a plain function can be
/// supplied wherever a loader is required:
///
/// ```ignore
/// let group = Group::new("scores", 1 << 20, |key: &str| {
///     let key = key.to_string();
///     async move { Ok(format!("value for {key}").into_bytes()) }
/// });
/// ```
pub trait Loader: Send + Sync {
    fn load(&self, key: &str) -> LoadFuture;
}

impl<F, Fut> Loader for F
where
    F: Fn(&str) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<u8>>> + Send + 'static,
{
    fn load(&self, key: &str) -> LoadFuture {
        Box::pin(self(key))
    }
}

static GROUPS: LazyLock<DashMap<String, Arc<Group>>> = LazyLock::new(DashMap::new);

pub struct Group {
    name: String,
    loader: Arc<dyn Loader>,
    shard: CacheShard,
    peers: OnceLock<Arc<dyn PeerPicker>>,
    flights: FlightGroup<ByteView>,
}

impl Group {
    /// Creates the group and registers it under `name`, replacing any
    /// previous registration.
    pub fn new(name: &str, cache_bytes: u64, loader: impl Loader + 'static) -> Arc<Group> {
        let group = Arc::new(Group {
            name: name.to_string(),
            loader: Arc::new(loader),
            shard: CacheShard::new(cache_bytes),
            peers: OnceLock::new(),
            flights: FlightGroup::new(),
        });
        GROUPS.insert(name.to_string(), group.clone());
        group
    }

    /// Registry lookup; the registry lock covers only this call, never a
    /// load.
    pub fn lookup(name: &str) -> Option<Arc<Group>> {
        GROUPS.get(name).map(|entry| entry.value().clone())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wires the peer picker in. Calling this twice is a configuration
    /// bug and panics.
    pub fn register_peers(&self, picker: Arc<dyn PeerPicker>) {
        if self.peers.set(picker).is_err() {
            panic!("register_peers called more than once for group {}", self.name);
        }
    }

    pub async fn get(&self, key: &str) -> Result<ByteView> {
        if key.is_empty() {
            bail!("key is required");
        }
        if let Some(view) = self.shard.get(key) {
            tracing::debug!("[{}] cache hit for {}", self.name, key);
            return Ok(view);
        }
        self.load(key).await
    }

    /// Miss path, deduplicated per key: consult the elected peer when one
    /// exists, fall back to the local loader, and populate the shard with
    /// whatever came back.
    async fn load(&self, key: &str) -> Result<ByteView> {
        let result = self
            .flights
            .run(key, || async {
                if let Some(picker) = self.peers.get() {
                    if let Some(peer) = picker.pick_peer(key) {
                        match self.fetch_from_peer(peer.as_ref(), key).await {
                            Ok(view) => {
                                self.shard.add(key, view.clone());
                                return Ok(view);
                            }
                            Err(e) => {
                                tracing::warn!(
                                    "[{}] peer fetch for {} failed, falling back to loader: {:#}",
                                    self.name,
                                    key,
                                    e
                                );
                            }
                        }
                    }
                }
                self.load_locally(key).await
            })
            .await;
        result.map_err(|e| anyhow!("{e:#}"))
    }

    async fn load_locally(&self, key: &str) -> Result<ByteView> {
        let bytes = self.loader.load(key).await?;
        let view = ByteView::new(bytes);
        self.shard.add(key, view.clone());
        Ok(view)
    }

    async fn fetch_from_peer(&self, peer: &dyn PeerFetcher, key: &str) -> Result<ByteView> {
        let bytes = peer.fetch(&self.name, key).await?;
        Ok(ByteView::new(bytes))
    }
}
