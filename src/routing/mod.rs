//! Key-to-peer routing.
//!
//! The hash ring decides which node in the mesh owns a key. Placement is
//! deterministic: every node computes the same owner from the same peer
//! set, with no coordination.

pub mod ring;

pub use ring::{HashFn, HashRing};

#[cfg(test)]
mod tests;
