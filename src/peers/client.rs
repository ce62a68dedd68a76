//! Client side of the peer transport.
//!
//! [`HttpFetcher`] retrieves one peer's values with a bounded
//! retry-with-jitter loop; [`HttpPeerPool`] owns the routing ring plus one
//! fetcher per peer and implements [`PeerPicker`] for the groups.

use super::protocol::{DEFAULT_BASE_PATH, DEFAULT_REPLICAS};
use super::{FetchFuture, PeerFetcher, PeerPicker};
use crate::routing::HashRing;

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const FETCH_TIMEOUT: Duration = Duration::from_millis(500);
const FETCH_ATTEMPTS: usize = 3;

pub struct HttpFetcher {
    /// Peer base URL including the path prefix, e.g.
    /// `http://10.0.0.2:9001/_meshcache`.
    base_url: String,
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(base_url: &str, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    async fn get_with_retry(&self, url: &str) -> Result<reqwest::Response> {
        let mut delay_ms = 150u64;

        for attempt in 0..FETCH_ATTEMPTS {
            let response = self
                .client
                .get(url)
                .timeout(FETCH_TIMEOUT)
                .send()
                .await;

            match response {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    if attempt + 1 == FETCH_ATTEMPTS {
                        return Err(anyhow!(e));
                    }
                    let jitter = rand::random::<u64>() % 50;
                    tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                    delay_ms = (delay_ms * 2).min(1200);
                }
            }
        }

        Err(anyhow!("retry attempts exhausted"))
    }
}

impl PeerFetcher for HttpFetcher {
    fn fetch<'a>(&'a self, group: &'a str, key: &'a str) -> FetchFuture<'a> {
        Box::pin(async move {
            let url = format!(
                "{}/{}/{}",
                self.base_url,
                urlencoding::encode(group),
                urlencoding::encode(key)
            );

            let response = self.get_with_retry(&url).await?;
            if !response.status().is_success() {
                return Err(anyhow!("peer returned {}", response.status()));
            }

            let bytes = response.bytes().await?;
            Ok(bytes.to_vec())
        })
    }
}

struct PoolState {
    ring: HashRing,
    fetchers: HashMap<String, Arc<HttpFetcher>>,
}

/// Peer picker backed by the hash ring and one [`HttpFetcher`] per peer.
///
/// Peers are identified by their base URL (scheme, host and port); the
/// node's own URL must appear in the peer set so the ring can elect it.
pub struct HttpPeerPool {
    self_url: String,
    base_path: String,
    replicas: usize,
    client: reqwest::Client,
    state: Mutex<PoolState>,
}

impl HttpPeerPool {
    pub fn new(self_url: &str) -> Self {
        Self::with_config(self_url, DEFAULT_BASE_PATH, DEFAULT_REPLICAS)
    }

    pub fn with_config(self_url: &str, base_path: &str, replicas: usize) -> Self {
        Self {
            self_url: self_url.trim_end_matches('/').to_string(),
            base_path: base_path.to_string(),
            replicas,
            client: reqwest::Client::new(),
            state: Mutex::new(PoolState {
                ring: HashRing::new(replicas, None),
                fetchers: HashMap::new(),
            }),
        }
    }

    /// Replaces the peer set, rebuilding the ring and the fetcher map
    /// atomically.
    pub fn set_peers<I, S>(&self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let peers: Vec<String> = peers
            .into_iter()
            .map(|p| p.as_ref().trim_end_matches('/').to_string())
            .collect();

        let mut ring = HashRing::new(self.replicas, None);
        ring.add(&peers);
        let fetchers = peers
            .iter()
            .map(|peer| {
                let base_url = format!("{}{}", peer, self.base_path);
                (
                    peer.clone(),
                    Arc::new(HttpFetcher::new(&base_url, self.client.clone())),
                )
            })
            .collect();

        let mut state = self.state.lock().expect("peer pool lock");
        state.ring = ring;
        state.fetchers = fetchers;
        tracing::info!("peer set replaced: {} peers", peers.len());
    }
}

impl PeerPicker for HttpPeerPool {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerFetcher>> {
        let state = self.state.lock().expect("peer pool lock");
        let peer = state.ring.get(key)?;
        if peer == self.self_url {
            return None;
        }
        tracing::debug!("[{}] picked peer {} for {}", self.self_url, peer, key);
        let fetcher: Arc<dyn PeerFetcher> = state.fetchers.get(peer)?.clone();
        Some(fetcher)
    }
}
