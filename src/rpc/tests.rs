use super::client::{ClientOptions, RpcClient, RpcError};
use super::codec;
use super::protocol::{CodecKind, Handshake, Header, BINCODE_TYPE, MAGIC_NUMBER};
use super::server::RpcServer;

use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

async fn spawn_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = RpcServer::new().serve(listener).await;
    });
    addr
}

// ============================================================
// ROUND TRIP
// ============================================================

#[tokio::test]
async fn concurrent_calls_get_their_own_replies() {
    let addr = spawn_server().await;
    let client = RpcClient::dial(addr, ClientOptions::default()).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..5 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            let call = client
                .dispatch("Foo.Sum", &format!("req {i}"))
                .await
                .unwrap();
            let seq = call.seq;
            let reply: String = call.recv().await.unwrap();
            (seq, reply)
        }));
    }

    let mut seqs = HashSet::new();
    for handle in handles {
        let (seq, reply) = handle.await.unwrap();
        assert_eq!(reply, format!("meshcache resp {seq}"));
        seqs.insert(seq);
    }
    // Sequences start at 1 and are assigned monotonically.
    assert_eq!(seqs, (1..=5).collect::<HashSet<u64>>());
}

#[tokio::test]
async fn sync_call_roundtrip() {
    let addr = spawn_server().await;
    let client = RpcClient::dial(addr, ClientOptions::default()).await.unwrap();

    let reply: String = client.call("Foo.Sum", &"hello".to_string()).await.unwrap();
    assert_eq!(reply, "meshcache resp 1");

    let reply: String = client.call("Foo.Sum", &"again".to_string()).await.unwrap();
    assert_eq!(reply, "meshcache resp 2");
}

#[tokio::test]
async fn json_codec_roundtrip() {
    let addr = spawn_server().await;
    let client = RpcClient::dial(
        addr,
        ClientOptions {
            codec: CodecKind::Json,
        },
    )
    .await
    .unwrap();

    let reply: String = client.call("Foo.Sum", &"payload".to_string()).await.unwrap();
    assert_eq!(reply, "meshcache resp 1");
}

// ============================================================
// HANDSHAKE
// ============================================================

#[tokio::test]
async fn server_drops_wrong_magic() {
    let addr = spawn_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    codec::write_handshake(
        &mut stream,
        &Handshake {
            magic_number: 0x123456,
            codec_type: BINCODE_TYPE.to_string(),
        },
    )
    .await
    .unwrap();

    let mut buf = [0u8; 1];
    let n = stream.read(&mut buf).await.unwrap();
    assert_eq!(n, 0, "server should close the connection");
}

#[tokio::test]
async fn server_drops_unknown_codec() {
    let addr = spawn_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    codec::write_handshake(
        &mut stream,
        &Handshake {
            magic_number: MAGIC_NUMBER,
            codec_type: "application/xml".to_string(),
        },
    )
    .await
    .unwrap();

    let mut buf = [0u8; 1];
    let n = stream.read(&mut buf).await.unwrap();
    assert_eq!(n, 0, "server should close the connection");
}

#[test]
fn codec_registry_resolves_type_strings() {
    assert_eq!(CodecKind::from_type(BINCODE_TYPE), Some(CodecKind::Bincode));
    assert_eq!(
        CodecKind::from_type("application/json"),
        Some(CodecKind::Json)
    );
    assert_eq!(CodecKind::from_type("application/msgpack"), None);
}

// ============================================================
// ERROR PATHS
// ============================================================

async fn read_frame(stream: &mut TcpStream) -> Vec<u8> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await.unwrap();
    let mut payload = vec![0u8; u32::from_be_bytes(len_buf) as usize];
    stream.read_exact(&mut payload).await.unwrap();
    payload
}

#[tokio::test]
async fn bad_body_answers_error_and_keeps_connection() {
    let addr = spawn_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    codec::write_handshake(&mut stream, &Handshake::new(CodecKind::Bincode))
        .await
        .unwrap();

    // Valid header, garbage body frame.
    let header = Header {
        service_method: "Foo.Sum".to_string(),
        seq: 7,
        error: String::new(),
    };
    let header_bytes = codec::encode(CodecKind::Bincode, &header).unwrap();
    let mut msg = Vec::new();
    msg.extend_from_slice(&(header_bytes.len() as u32).to_be_bytes());
    msg.extend_from_slice(&header_bytes);
    msg.extend_from_slice(&3u32.to_be_bytes());
    msg.extend_from_slice(&[0xff, 0xff, 0xff]);
    stream.write_all(&msg).await.unwrap();
    stream.flush().await.unwrap();

    let reply: Header = codec::decode(CodecKind::Bincode, &read_frame(&mut stream).await).unwrap();
    assert_eq!(reply.seq, 7);
    assert!(!reply.error.is_empty());
    let _body = read_frame(&mut stream).await;

    // The connection is still serviceable after the bad request.
    let header = Header {
        service_method: "Foo.Sum".to_string(),
        seq: 8,
        error: String::new(),
    };
    let header_bytes = codec::encode(CodecKind::Bincode, &header).unwrap();
    let body_bytes = codec::encode(CodecKind::Bincode, &"ok".to_string()).unwrap();
    let mut msg = Vec::new();
    msg.extend_from_slice(&(header_bytes.len() as u32).to_be_bytes());
    msg.extend_from_slice(&header_bytes);
    msg.extend_from_slice(&(body_bytes.len() as u32).to_be_bytes());
    msg.extend_from_slice(&body_bytes);
    stream.write_all(&msg).await.unwrap();
    stream.flush().await.unwrap();

    let reply: Header = codec::decode(CodecKind::Bincode, &read_frame(&mut stream).await).unwrap();
    assert_eq!(reply.seq, 8);
    assert!(reply.error.is_empty());
    let body: String =
        codec::decode(CodecKind::Bincode, &read_frame(&mut stream).await).unwrap();
    assert_eq!(body, "meshcache resp 8");
}

// ============================================================
// SHUTDOWN
// ============================================================

#[tokio::test]
async fn dead_server_fails_all_pending_calls() {
    // A "server" that completes the accept and then goes silent until we
    // drop it.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (hold_tx, hold_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let _ = hold_rx.await;
        drop(stream);
    });

    let client = RpcClient::dial(addr, ClientOptions::default()).await.unwrap();
    let mut handles = Vec::new();
    for i in 0..3 {
        handles.push(
            client
                .dispatch("Foo.Sum", &format!("req {i}"))
                .await
                .unwrap(),
        );
    }

    // Kill the server; every pending call must be failed.
    hold_tx.send(()).unwrap();
    for handle in handles {
        let result = tokio::time::timeout(Duration::from_secs(5), handle.recv::<String>())
            .await
            .expect("pending call must be delivered after the peer dies");
        assert!(result.is_err());
    }

    // The client is poisoned from here on.
    let err = client
        .call::<_, String>("Foo.Sum", &"late".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::Shutdown));
    assert!(!client.is_available());
}

#[tokio::test]
async fn close_is_rejected_the_second_time() {
    let addr = spawn_server().await;
    let client = RpcClient::dial(addr, ClientOptions::default()).await.unwrap();

    let reply: String = client.call("Foo.Sum", &"x".to_string()).await.unwrap();
    assert_eq!(reply, "meshcache resp 1");

    client.close().await.unwrap();
    assert!(matches!(client.close().await, Err(RpcError::Shutdown)));

    let err = client
        .call::<_, String>("Foo.Sum", &"y".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::Shutdown));
}
