//! Peer fetch wire contract.
//!
//! Cross-node cache reads are plain HTTP GETs:
//!
//! ```text
//! GET <base>/<group>/<key>
//! ```
//!
//! with group and key percent-encoded. A hit answers `200` with the raw
//! value bytes as `application/octet-stream`; a path that does not
//! decompose into exactly group and key answers `400`; an unknown group
//! `404`; a failing group load `500`.

/// Path prefix every node serves its peer endpoint under.
pub const DEFAULT_BASE_PATH: &str = "/_meshcache";

/// Virtual-node multiplier for the routing ring.
pub const DEFAULT_REPLICAS: usize = 50;

/// Content type of a successful peer fetch response.
pub const CONTENT_TYPE_BYTES: &str = "application/octet-stream";
