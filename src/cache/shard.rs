use super::byteview::ByteView;
use super::lru::LruStore;
use std::sync::Mutex;

/// Mutex-guarded LRU shard owned by a [`super::group::Group`].
///
/// The inner store is built lazily on the first write so an idle group
/// costs nothing. A plain exclusive lock is enough here: `get` promotes
/// the entry, so every operation mutates the store.
pub struct CacheShard {
    cache_bytes: u64,
    store: Mutex<Option<LruStore<ByteView>>>,
}

impl CacheShard {
    pub fn new(cache_bytes: u64) -> Self {
        Self {
            cache_bytes,
            store: Mutex::new(None),
        }
    }

    pub fn get(&self, key: &str) -> Option<ByteView> {
        let mut guard = self.store.lock().expect("shard lock");
        guard.as_mut()?.get(key).cloned()
    }

    pub fn add(&self, key: &str, value: ByteView) {
        let mut guard = self.store.lock().expect("shard lock");
        guard
            .get_or_insert_with(|| LruStore::new(self.cache_bytes, None))
            .add(key, value);
    }

    pub fn len(&self) -> usize {
        let guard = self.store.lock().expect("shard lock");
        guard.as_ref().map(LruStore::len).unwrap_or(0)
    }
}
