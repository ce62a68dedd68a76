//! Distributed In-Memory Cache Library
//!
//! This library crate defines the subsystems of a read-mostly cache mesh:
//! a set of peer nodes sharding keys between themselves, each node serving
//! hits from a local byte-bounded store and filling misses from the owning
//! peer or a user-supplied loader. It is the foundation for the node
//! binary (`main.rs`).
//!
//! ## Architecture Modules
//!
//! - **`cache`**: The cache engine. LRU stores with byte accounting,
//!   mutex-guarded shards, single-flight request coalescing, and the named
//!   `Group` facade applications interact with.
//! - **`routing`**: Consistent hashing. Maps every key onto the peer that
//!   owns it, using virtual nodes for an even spread, with no coordination
//!   between nodes.
//! - **`peers`**: The peer transport. HTTP server handler and retrying
//!   client used for cross-node cache fetches, behind picker/fetcher
//!   traits the cache engine depends on.
//! - **`rpc`**: A minimal framed RPC runtime. One TCP connection
//!   multiplexes concurrent calls, correlated by sequence number, with
//!   pluggable body codecs.

pub mod cache;
pub mod peers;
pub mod routing;
pub mod rpc;
