//! Byte-bounded LRU store.
//!
//! Entries live in a slot arena linked into a recency list (front = most
//! recently used, back = next eviction candidate) with a key index on the
//! side, so `get`, `add` and `remove_oldest` are all O(1). Capacity is
//! counted in bytes: every resident entry contributes its key length plus
//! the value's `byte_len`.

use super::byteview::CacheValue;
use std::collections::HashMap;

/// Invoked with the evicted key and value after an entry leaves the store.
pub type EvictCallback<V> = Box<dyn FnMut(&str, &V) + Send>;

struct Slot<V> {
    key: String,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

pub struct LruStore<V: CacheValue> {
    /// Byte budget; 0 disables eviction entirely.
    max_bytes: u64,
    used_bytes: u64,
    slots: Vec<Option<Slot<V>>>,
    free: Vec<usize>,
    index: HashMap<String, usize>,
    head: Option<usize>,
    tail: Option<usize>,
    on_evict: Option<EvictCallback<V>>,
}

impl<V: CacheValue> LruStore<V> {
    pub fn new(max_bytes: u64, on_evict: Option<EvictCallback<V>>) -> Self {
        Self {
            max_bytes,
            used_bytes: 0,
            slots: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            head: None,
            tail: None,
            on_evict,
        }
    }

    /// Looks a key up and promotes the entry to the recency front.
    pub fn get(&mut self, key: &str) -> Option<&V> {
        let idx = *self.index.get(key)?;
        self.unlink(idx);
        self.push_front(idx);
        self.slots[idx].as_ref().map(|slot| &slot.value)
    }

    /// Inserts or updates an entry, then evicts from the back until the
    /// store fits its byte budget again.
    ///
    /// A single entry larger than `max_bytes` evicts everything else but
    /// stays resident itself; the sweep never removes the last entry.
    pub fn add(&mut self, key: &str, value: V) {
        match self.index.get(key).copied() {
            Some(idx) => {
                self.unlink(idx);
                self.push_front(idx);
                let slot = self.slots[idx].as_mut().expect("indexed slot is live");
                let old_len = slot.value.byte_len() as u64;
                self.used_bytes = self.used_bytes - old_len + value.byte_len() as u64;
                slot.value = value;
            }
            None => {
                self.used_bytes += key.len() as u64 + value.byte_len() as u64;
                let slot = Slot {
                    key: key.to_string(),
                    value,
                    prev: None,
                    next: None,
                };
                let idx = match self.free.pop() {
                    Some(idx) => {
                        self.slots[idx] = Some(slot);
                        idx
                    }
                    None => {
                        self.slots.push(Some(slot));
                        self.slots.len() - 1
                    }
                };
                self.index.insert(key.to_string(), idx);
                self.push_front(idx);
            }
        }

        while self.max_bytes != 0 && self.used_bytes > self.max_bytes && self.len() > 1 {
            self.remove_oldest();
        }
    }

    /// Evicts the least recently used entry and fires the eviction
    /// callback when one is configured.
    pub fn remove_oldest(&mut self) {
        let Some(idx) = self.tail else {
            return;
        };
        self.unlink(idx);
        let slot = self.slots[idx].take().expect("tail slot is live");
        self.free.push(idx);
        self.index.remove(&slot.key);
        self.used_bytes -= slot.key.len() as u64 + slot.value.byte_len() as u64;
        if let Some(cb) = self.on_evict.as_mut() {
            cb(&slot.key, &slot.value);
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn used_bytes(&self) -> u64 {
        self.used_bytes
    }

    /// Key of the current eviction candidate, if any.
    pub fn oldest_key(&self) -> Option<&str> {
        let idx = self.tail?;
        self.slots[idx].as_ref().map(|slot| slot.key.as_str())
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = {
            let slot = self.slots[idx].as_ref().expect("unlinking a live slot");
            (slot.prev, slot.next)
        };
        match prev {
            Some(p) => self.slots[p].as_mut().expect("live prev").next = next,
            None if self.head == Some(idx) => self.head = next,
            None => {}
        }
        match next {
            Some(n) => self.slots[n].as_mut().expect("live next").prev = prev,
            None if self.tail == Some(idx) => self.tail = prev,
            None => {}
        }
        let slot = self.slots[idx].as_mut().expect("unlinking a live slot");
        slot.prev = None;
        slot.next = None;
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let slot = self.slots[idx].as_mut().expect("pushing a live slot");
            slot.prev = None;
            slot.next = old_head;
        }
        if let Some(h) = old_head {
            self.slots[h].as_mut().expect("live head").prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }
}
