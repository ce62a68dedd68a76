//! RPC wire contract.
//!
//! A connection opens with one JSON-encoded [`Handshake`] frame naming the
//! magic number and the body codec; everything after it is a stream of
//! messages, each a [`Header`] frame followed by a body frame in the
//! negotiated codec. Frames are length-prefixed (`u32`, big endian).
//! Responses mirror the request sequence number; a non-empty
//! `Header::error` marks failure and is authoritative regardless of the
//! body.

use serde::{Deserialize, Serialize};

/// Sanity constant; a connection whose handshake carries anything else is
/// dropped without a reply.
pub const MAGIC_NUMBER: u32 = 0x3bef5c;

/// Codec type strings accepted in the handshake.
pub const BINCODE_TYPE: &str = "application/bincode";
pub const JSON_TYPE: &str = "application/json";

/// Body encodings the runtime knows how to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecKind {
    Bincode,
    Json,
}

impl CodecKind {
    /// Resolves a handshake type string; unknown strings are a handshake
    /// failure.
    pub fn from_type(s: &str) -> Option<Self> {
        match s {
            BINCODE_TYPE => Some(Self::Bincode),
            JSON_TYPE => Some(Self::Json),
            _ => None,
        }
    }

    pub fn type_str(&self) -> &'static str {
        match self {
            Self::Bincode => BINCODE_TYPE,
            Self::Json => JSON_TYPE,
        }
    }
}

impl Default for CodecKind {
    fn default() -> Self {
        Self::Bincode
    }
}

/// One-shot connection preamble, always JSON regardless of the body codec.
#[derive(Debug, Serialize, Deserialize)]
pub struct Handshake {
    pub magic_number: u32,
    pub codec_type: String,
}

impl Handshake {
    pub fn new(codec: CodecKind) -> Self {
        Self {
            magic_number: MAGIC_NUMBER,
            codec_type: codec.type_str().to_string(),
        }
    }
}

/// Frame preceding every request and response body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Header {
    /// `<service>.<method>` the call addresses.
    pub service_method: String,
    /// Client-assigned sequence number correlating request and response.
    pub seq: u64,
    /// Empty on success; the failure message otherwise.
    pub error: String,
}
