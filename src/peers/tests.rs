use super::client::{HttpFetcher, HttpPeerPool};
use super::protocol::DEFAULT_BASE_PATH;
use super::server::peer_router;
use super::{PeerFetcher, PeerPicker};
use crate::cache::Group;

use std::net::SocketAddr;

async fn serve_peer_endpoint() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = peer_router(DEFAULT_BASE_PATH);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn fetcher_roundtrip_against_live_node() {
    let _group = Group::new("peer-e2e", 1 << 20, |key: &str| {
        let key = key.to_string();
        async move { Ok(format!("value:{key}").into_bytes()) }
    });
    let addr = serve_peer_endpoint().await;

    let fetcher = HttpFetcher::new(
        &format!("http://{addr}{DEFAULT_BASE_PATH}"),
        reqwest::Client::new(),
    );

    let bytes = fetcher.fetch("peer-e2e", "Tom").await.unwrap();
    assert_eq!(bytes, b"value:Tom");

    // Keys with separators survive the percent-encoding.
    let bytes = fetcher.fetch("peer-e2e", "a/b c").await.unwrap();
    assert_eq!(bytes, b"value:a/b c");
}

#[tokio::test]
async fn fetcher_surfaces_http_errors() {
    let addr = serve_peer_endpoint().await;
    let client = reqwest::Client::new();

    // Unknown group -> 404 -> error.
    let fetcher = HttpFetcher::new(
        &format!("http://{addr}{DEFAULT_BASE_PATH}"),
        client.clone(),
    );
    let err = fetcher.fetch("no-such-group", "k").await.unwrap_err();
    assert!(err.to_string().contains("404"), "{err}");

    // A failing loader -> 500 -> error.
    let _group = Group::new("peer-failing", 1 << 20, |_key: &str| async move {
        Err::<Vec<u8>, _>(anyhow::anyhow!("backend down"))
    });
    let err = fetcher.fetch("peer-failing", "k").await.unwrap_err();
    assert!(err.to_string().contains("500"), "{err}");
}

#[tokio::test]
async fn malformed_peer_paths_are_bad_requests() {
    let addr = serve_peer_endpoint().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("http://{addr}{DEFAULT_BASE_PATH}/only-a-group"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

    let resp = client
        .get(format!("http://{addr}{DEFAULT_BASE_PATH}/a/b/c"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn pool_never_picks_self() {
    let pool = HttpPeerPool::new("http://127.0.0.1:9001");
    // Empty ring: everything is local.
    assert!(pool.pick_peer("anything").is_none());

    pool.set_peers(["http://127.0.0.1:9001"]);
    for i in 0..50 {
        assert!(pool.pick_peer(&format!("key-{i}")).is_none());
    }
}

#[tokio::test]
async fn pool_routes_some_keys_to_remote_peers() {
    let pool = HttpPeerPool::new("http://127.0.0.1:9001");
    pool.set_peers(["http://127.0.0.1:9001", "http://127.0.0.1:9002"]);

    let mut local = 0;
    let mut remote = 0;
    for i in 0..200 {
        match pool.pick_peer(&format!("key-{i}")) {
            Some(_) => remote += 1,
            None => local += 1,
        }
    }
    // With 50 virtual nodes per peer both sides of the ring get traffic.
    assert!(local > 0, "no keys stayed local");
    assert!(remote > 0, "no keys routed remotely");
}

#[tokio::test]
async fn group_falls_back_to_loader_when_peer_is_down() {
    let group = Group::new("peer-fallback", 1 << 20, |key: &str| {
        let key = key.to_string();
        async move { Ok(format!("local:{key}").into_bytes()) }
    });

    // Peer set that routes everything to an unreachable remote.
    let pool = HttpPeerPool::new("http://127.0.0.1:9801");
    pool.set_peers(["http://127.0.0.1:59999"]);
    group.register_peers(std::sync::Arc::new(pool));

    let view = group.get("some-key").await.unwrap();
    assert_eq!(view.to_string(), "local:some-key");
}
