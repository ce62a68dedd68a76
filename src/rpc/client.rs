//! RPC client: call registry, sender and receive loop.
//!
//! One client multiplexes any number of concurrent calls over a single
//! connection. A call is registered under a fresh sequence number, written
//! out under the send lock, and completed by the receive loop when the
//! response with that sequence arrives. When the loop dies (peer gone,
//! stream broken, or [`RpcClient::close`]), every call still pending is
//! failed exactly once and the client refuses further work.

use super::codec::{self, RpcReader, RpcWriter};
use super::protocol::{CodecKind, Handshake, Header};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::oneshot;

#[derive(Debug, Error, Clone)]
pub enum RpcError {
    /// The client is closing or has shut down; no new calls are accepted.
    #[error("connection is shut down")]
    Shutdown,
    /// The transport failed underneath the call.
    #[error("connection error: {0}")]
    Connection(String),
    /// The response arrived but its body could not be handled.
    #[error("codec error: {0}")]
    Codec(String),
    /// The server answered with a non-empty error header.
    #[error("remote error: {0}")]
    Remote(String),
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub codec: CodecKind,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            codec: CodecKind::default(),
        }
    }
}

type ReplyBytes = Result<Vec<u8>, RpcError>;

struct ClientState {
    /// Next sequence number; starts at 1 and only grows.
    seq: u64,
    pending: HashMap<u64, oneshot::Sender<ReplyBytes>>,
    /// User asked to close.
    closing: bool,
    /// The receive loop died.
    shutdown: bool,
}

/// In-flight call handed back by [`RpcClient::dispatch`]. Await
/// [`CallHandle::recv`] for the decoded reply.
pub struct CallHandle {
    pub seq: u64,
    pub service_method: String,
    codec: CodecKind,
    rx: oneshot::Receiver<ReplyBytes>,
}

impl CallHandle {
    pub async fn recv<R: DeserializeOwned>(self) -> Result<R, RpcError> {
        match self.rx.await {
            Ok(Ok(bytes)) => {
                codec::decode(self.codec, &bytes).map_err(|e| RpcError::Codec(format!("{e:#}")))
            }
            Ok(Err(e)) => Err(e),
            // Sender dropped without a verdict; only possible once the
            // client is gone.
            Err(_) => Err(RpcError::Shutdown),
        }
    }
}

pub struct RpcClient {
    codec: CodecKind,
    /// Send lock: the register-then-write sequence runs under it, so
    /// header/body pairs from concurrent calls never interleave.
    writer: tokio::sync::Mutex<RpcWriter>,
    state: Mutex<ClientState>,
}

impl RpcClient {
    /// Connects, sends the handshake and starts the receive loop.
    pub async fn dial(addr: impl ToSocketAddrs, options: ClientOptions) -> anyhow::Result<Arc<Self>> {
        let mut stream = TcpStream::connect(addr).await?;
        codec::write_handshake(&mut stream, &Handshake::new(options.codec)).await?;
        let (reader, writer) = codec::split(stream, options.codec);

        let client = Arc::new(Self {
            codec: options.codec,
            writer: tokio::sync::Mutex::new(writer),
            state: Mutex::new(ClientState {
                seq: 1,
                pending: HashMap::new(),
                closing: false,
                shutdown: false,
            }),
        });

        tokio::spawn(client.clone().receive_loop(reader));
        Ok(client)
    }

    /// Asynchronous invocation: registers and writes the call, then
    /// returns. The reply (or failure) arrives through the handle.
    pub async fn dispatch<A: Serialize>(
        &self,
        service_method: &str,
        args: &A,
    ) -> Result<CallHandle, RpcError> {
        let mut writer = self.writer.lock().await;

        let (seq, rx) = self.register_call()?;
        let header = Header {
            service_method: service_method.to_string(),
            seq,
            error: String::new(),
        };

        if let Err(e) = writer.write_message(&header, args).await {
            // The call never hit the wire; fail it through its own handle.
            if let Some(tx) = self.remove_call(seq) {
                let _ = tx.send(Err(RpcError::Connection(format!("{e:#}"))));
            }
        }

        Ok(CallHandle {
            seq,
            service_method: service_method.to_string(),
            codec: self.codec,
            rx,
        })
    }

    /// Synchronous invocation: dispatch and wait for the reply.
    pub async fn call<A: Serialize, R: DeserializeOwned>(
        &self,
        service_method: &str,
        args: &A,
    ) -> Result<R, RpcError> {
        self.dispatch(service_method, args).await?.recv().await
    }

    /// Closes the write half. In-flight calls are not cut short here; the
    /// receive loop winds them down when the connection drains. A second
    /// close is an error.
    pub async fn close(&self) -> Result<(), RpcError> {
        {
            let mut state = self.lock_state();
            if state.closing {
                return Err(RpcError::Shutdown);
            }
            state.closing = true;
        }
        let mut writer = self.writer.lock().await;
        writer
            .shutdown()
            .await
            .map_err(|e| RpcError::Connection(format!("{e:#}")))
    }

    pub fn is_available(&self) -> bool {
        let state = self.lock_state();
        !state.closing && !state.shutdown
    }

    fn register_call(&self) -> Result<(u64, oneshot::Receiver<ReplyBytes>), RpcError> {
        let mut state = self.lock_state();
        if state.closing || state.shutdown {
            return Err(RpcError::Shutdown);
        }
        let seq = state.seq;
        state.seq += 1;
        let (tx, rx) = oneshot::channel();
        state.pending.insert(seq, tx);
        Ok((seq, rx))
    }

    fn remove_call(&self, seq: u64) -> Option<oneshot::Sender<ReplyBytes>> {
        self.lock_state().pending.remove(&seq)
    }

    /// Marks the client dead and fails every pending call with the
    /// terminating error, each exactly once.
    fn terminate_calls(&self, err: RpcError) {
        let mut state = self.lock_state();
        state.shutdown = true;
        for (_, tx) in state.pending.drain() {
            let _ = tx.send(Err(err.clone()));
        }
    }

    async fn receive_loop(self: Arc<Self>, mut reader: RpcReader) {
        let err = loop {
            let header = match reader.read_header().await {
                Ok(header) => header,
                Err(e) => break RpcError::Connection(format!("{e:#}")),
            };

            match self.remove_call(header.seq) {
                // Nobody waits for this sequence (failed send, stray
                // response); keep the stream aligned and move on.
                None => {
                    if let Err(e) = reader.discard_body().await {
                        break RpcError::Connection(format!("{e:#}"));
                    }
                }
                Some(tx) if !header.error.is_empty() => {
                    let _ = tx.send(Err(RpcError::Remote(header.error)));
                    if let Err(e) = reader.discard_body().await {
                        break RpcError::Connection(format!("{e:#}"));
                    }
                }
                Some(tx) => match reader.read_body_bytes().await {
                    Ok(bytes) => {
                        let _ = tx.send(Ok(bytes));
                    }
                    Err(e) => {
                        let msg = format!("{e:#}");
                        let _ = tx.send(Err(RpcError::Codec(msg.clone())));
                        break RpcError::Connection(msg);
                    }
                },
            }
        };

        tracing::debug!("rpc receive loop ended: {}", err);
        self.terminate_calls(err);
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ClientState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
