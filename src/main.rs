use meshcache::cache::Group;
use meshcache::peers::protocol::{DEFAULT_BASE_PATH, DEFAULT_REPLICAS};
use meshcache::peers::{peer_router, HttpPeerPool};
use meshcache::rpc::RpcServer;

use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("MESHCACHE_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!(
            "Usage: {} --bind <addr:port> [--peer <base-url>]... [--self <base-url>] \
             [--api <addr:port>] [--rpc <addr:port>] [--cache-bytes <n>]",
            args[0]
        );
        eprintln!("Example: {} --bind 127.0.0.1:9001", args[0]);
        eprintln!(
            "Example: {} --bind 127.0.0.1:9002 --self http://127.0.0.1:9002 \
             --peer http://127.0.0.1:9001 --peer http://127.0.0.1:9002",
            args[0]
        );
        std::process::exit(1);
    }

    let mut bind_addr: Option<SocketAddr> = None;
    let mut api_addr: Option<SocketAddr> = None;
    let mut rpc_addr: Option<SocketAddr> = None;
    let mut self_url: Option<String> = None;
    let mut peer_urls: Vec<String> = vec![];
    let mut cache_bytes: u64 = 2 << 20;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" => {
                bind_addr = Some(args[i + 1].parse()?);
                i += 2;
            }
            "--api" => {
                api_addr = Some(args[i + 1].parse()?);
                i += 2;
            }
            "--rpc" => {
                rpc_addr = Some(args[i + 1].parse()?);
                i += 2;
            }
            "--self" => {
                self_url = Some(args[i + 1].clone());
                i += 2;
            }
            "--peer" => {
                peer_urls.push(args[i + 1].clone());
                i += 2;
            }
            "--cache-bytes" => {
                cache_bytes = args[i + 1].parse()?;
                i += 2;
            }
            _ => {
                i += 1;
            }
        }
    }

    let bind_addr = bind_addr.expect("--bind is required");
    let self_url = self_url.unwrap_or_else(|| format!("http://{}", bind_addr));

    tracing::info!("Starting cache node on {} ({})", bind_addr, self_url);

    // 1. Demo group backed by an in-process slow source:
    let source: Arc<HashMap<String, String>> = Arc::new(HashMap::from([
        ("ada".to_string(), "1815".to_string()),
        ("grace".to_string(), "1906".to_string()),
        ("linus".to_string(), "1969".to_string()),
    ]));
    let group = Group::new("birthyears", cache_bytes, move |key: &str| {
        let source = source.clone();
        let key = key.to_string();
        async move {
            tracing::info!("[SlowSource] looking up {}", key);
            match source.get(&key) {
                Some(v) => Ok(v.clone().into_bytes()),
                None => Err(anyhow::anyhow!("{} does not exist", key)),
            }
        }
    });

    // 2. Peer pool over the static peer set:
    let replicas = std::env::var("MESHCACHE_REPLICAS")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(DEFAULT_REPLICAS);
    let pool = Arc::new(HttpPeerPool::with_config(
        &self_url,
        DEFAULT_BASE_PATH,
        replicas,
    ));
    if peer_urls.is_empty() {
        pool.set_peers([self_url.as_str()]);
    } else {
        pool.set_peers(&peer_urls);
    }
    group.register_peers(pool);

    // 3. Optional public API server:
    if let Some(api_addr) = api_addr {
        tracing::info!("API server listening on {}", api_addr);
        let app = Router::new().route("/api/:key", get(handle_api_get));
        let listener = tokio::net::TcpListener::bind(api_addr).await?;
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("API server failed: {:#}", e);
            }
        });
    }

    // 4. Optional RPC listener:
    if let Some(rpc_addr) = rpc_addr {
        tracing::info!("RPC server listening on {}", rpc_addr);
        let listener = tokio::net::TcpListener::bind(rpc_addr).await?;
        tokio::spawn(async move {
            if let Err(e) = RpcServer::new().serve(listener).await {
                tracing::error!("RPC server failed: {:#}", e);
            }
        });
    }

    // 5. Peer endpoint, the node's main listener:
    tracing::info!("Peer endpoint listening on {}{}", bind_addr, DEFAULT_BASE_PATH);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, peer_router(DEFAULT_BASE_PATH)).await?;

    Ok(())
}

async fn handle_api_get(Path(key): Path<String>) -> Response {
    let Some(group) = Group::lookup("birthyears") else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "group not wired").into_response();
    };
    match group.get(&key).await {
        Ok(view) => (
            [(header::CONTENT_TYPE, "application/octet-stream")],
            view.to_vec(),
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
