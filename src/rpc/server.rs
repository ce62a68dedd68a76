//! RPC server: accept loop and per-connection serving.
//!
//! The server itself is stateless. Each connection gets its own task; the
//! handshake is validated once, then the serve loop fans every request out
//! into its own task while a shared writer lock keeps responses whole on
//! the wire. Only header-level read failures end a connection; a bad body
//! is answered with an error header and the stream keeps going.

use super::codec::{self, RpcWriter};
use super::protocol::{CodecKind, Header, MAGIC_NUMBER};

use anyhow::Result;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinSet;

pub struct RpcServer;

impl RpcServer {
    pub fn new() -> Self {
        Self
    }

    /// Accepts connections forever, one task per connection.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        loop {
            let (stream, addr) = listener.accept().await?;
            tracing::debug!("rpc connection from {}", addr);
            tokio::spawn(async move {
                if let Err(e) = serve_conn(stream).await {
                    tracing::warn!("rpc connection from {} ended: {:#}", addr, e);
                }
            });
        }
    }
}

impl Default for RpcServer {
    fn default() -> Self {
        Self::new()
    }
}

async fn serve_conn(mut stream: TcpStream) -> Result<()> {
    let handshake = codec::read_handshake(&mut stream).await?;
    if handshake.magic_number != MAGIC_NUMBER {
        tracing::warn!("rpc: invalid magic number {:#x}", handshake.magic_number);
        return Ok(());
    }
    let Some(kind) = CodecKind::from_type(&handshake.codec_type) else {
        tracing::warn!("rpc: unknown codec type {}", handshake.codec_type);
        return Ok(());
    };

    let (mut reader, writer) = codec::split(stream, kind);
    let writer = Arc::new(Mutex::new(writer));
    let mut inflight = JoinSet::new();

    loop {
        // A header that cannot be read leaves nothing to correlate a
        // response with; the connection is done.
        let header = match reader.read_header().await {
            Ok(header) => header,
            Err(_) => break,
        };

        match reader.read_body::<String>().await {
            Ok(args) => {
                let writer = writer.clone();
                inflight.spawn(async move {
                    handle_request(writer, header, args).await;
                });
            }
            Err(e) => {
                let mut reply = header;
                reply.error = format!("invalid request body: {e:#}");
                send_response(&writer, &reply, &String::new()).await;
            }
        }
    }

    // Drain in-flight handlers before tearing the connection down.
    while inflight.join_next().await.is_some() {}
    let _ = writer.lock().await.shutdown().await;
    Ok(())
}

/// Core dispatch: echo the sequence number back. Service registration
/// lives outside this runtime.
async fn handle_request(writer: Arc<Mutex<RpcWriter>>, header: Header, args: String) {
    tracing::debug!(
        "rpc request {} seq={} args={}",
        header.service_method,
        header.seq,
        args
    );
    let reply = format!("meshcache resp {}", header.seq);
    send_response(&writer, &header, &reply).await;
}

async fn send_response(writer: &Mutex<RpcWriter>, header: &Header, body: &String) {
    let mut writer = writer.lock().await;
    if let Err(e) = writer.write_message(header, body).await {
        tracing::error!("rpc: failed to write response: {:#}", e);
    }
}
