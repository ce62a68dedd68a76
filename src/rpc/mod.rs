//! Minimal framed RPC runtime.
//!
//! The transport pattern used between nodes: independent calls
//! multiplexed over one TCP connection, correlated by client-assigned
//! sequence numbers, with the body encoding negotiated once per
//! connection.
//!
//! - **`protocol`**: magic number, handshake, header, codec registry.
//! - **`codec`**: length-prefixed framing and the bincode/json encodings.
//! - **`server`**: accept loop, handshake validation, per-request fan-out
//!   behind a per-connection send lock.
//! - **`client`**: pending-call registry, sync (`call`) and async
//!   (`dispatch`) invocation, the receive loop, and shutdown delivery.

pub mod client;
pub mod codec;
pub mod protocol;
pub mod server;

pub use client::{CallHandle, ClientOptions, RpcClient, RpcError};
pub use protocol::{CodecKind, Handshake, Header, MAGIC_NUMBER};
pub use server::RpcServer;

#[cfg(test)]
mod tests;
