//! In-memory cache engine.
//!
//! Layered bottom-up:
//! - **`lru`**: byte-bounded LRU store with an eviction callback.
//! - **`byteview`**: the immutable byte value every group stores.
//! - **`shard`**: mutex-guarded, lazily-built LRU owned by a group.
//! - **`singleflight`**: collapses concurrent loads for one key into a
//!   single execution.
//! - **`group`**: the public facade (local shard, then peers, then the
//!   user-supplied loader) plus the process-wide group registry.

pub mod byteview;
pub mod group;
pub mod lru;
pub mod shard;
pub mod singleflight;

pub use byteview::{ByteView, CacheValue};
pub use group::{Group, LoadFuture, Loader};
