use std::fmt;
use std::sync::Arc;

/// Capability required of anything stored in the LRU: report a stable
/// byte size so the store can do byte-level accounting.
pub trait CacheValue {
    fn byte_len(&self) -> usize;
}

/// Immutable view over a cached byte value.
///
/// The bytes are shared behind an `Arc`, so cloning a view is a refcount
/// bump and nothing handed out can mutate the stored data. Callers that
/// need an owned buffer go through [`ByteView::to_vec`].
#[derive(Clone, PartialEq, Eq)]
pub struct ByteView {
    bytes: Arc<[u8]>,
}

impl ByteView {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Independent copy of the underlying bytes.
    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }
}

impl CacheValue for ByteView {
    fn byte_len(&self) -> usize {
        self.bytes.len()
    }
}

impl From<&[u8]> for ByteView {
    fn from(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

impl From<&str> for ByteView {
    fn from(s: &str) -> Self {
        Self {
            bytes: s.as_bytes().into(),
        }
    }
}

impl fmt::Display for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.bytes))
    }
}

impl fmt::Debug for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteView({} bytes)", self.bytes.len())
    }
}
