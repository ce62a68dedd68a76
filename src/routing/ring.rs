//! Consistent-hash ring with virtual nodes.
//!
//! Every real peer contributes `replicas` virtual nodes, hashed from the
//! replica index concatenated with the peer name. Key lookup walks
//! clockwise to the first virtual node at or past the key's hash, wrapping
//! at the top of the ring. More virtual nodes smooth the key distribution
//! and shrink the share of keys that move when the peer set changes.

use std::collections::HashMap;

/// Hash function mapping bytes onto the ring. Replaceable so tests can
/// pin node positions.
pub type HashFn = fn(&[u8]) -> u32;

fn crc32(bytes: &[u8]) -> u32 {
    crc32fast::hash(bytes)
}

pub struct HashRing {
    replicas: usize,
    hash: HashFn,
    /// Sorted virtual-node hashes.
    ring: Vec<u32>,
    /// Virtual-node hash -> real peer.
    peers: HashMap<u32, String>,
}

impl HashRing {
    /// `hash` defaults to CRC32 (IEEE) when `None`.
    pub fn new(replicas: usize, hash: Option<HashFn>) -> Self {
        Self {
            replicas,
            hash: hash.unwrap_or(crc32),
            ring: Vec::new(),
            peers: HashMap::new(),
        }
    }

    /// Adds real peers, inserting `replicas` virtual nodes for each.
    pub fn add<I, S>(&mut self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for peer in peers {
            let peer = peer.as_ref();
            for i in 0..self.replicas {
                let vnode = (self.hash)(format!("{i}{peer}").as_bytes());
                self.ring.push(vnode);
                self.peers.insert(vnode, peer.to_string());
            }
        }
        self.ring.sort_unstable();
    }

    /// Real peer owning `key`, or `None` on an empty ring.
    pub fn get(&self, key: &str) -> Option<&str> {
        if self.ring.is_empty() {
            return None;
        }
        let h = (self.hash)(key.as_bytes());
        let idx = self.ring.partition_point(|&vnode| vnode < h) % self.ring.len();
        self.peers.get(&self.ring[idx]).map(String::as_str)
    }

    /// Number of virtual nodes on the ring.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}
