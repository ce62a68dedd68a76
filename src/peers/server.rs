//! Server side of the peer transport.
//!
//! Translates peer fetch requests into [`Group`] reads. Mounted by every
//! node next to whatever public API it serves.

use super::protocol::CONTENT_TYPE_BYTES;
use crate::cache::Group;

use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

/// Router serving `GET <base_path>/{group}/{key}` from the group
/// registry. Anything else under the base path is a bad request.
pub fn peer_router(base_path: &str) -> Router {
    Router::new().nest(
        base_path,
        Router::new()
            .route("/:group/:key", get(handle_peer_fetch))
            .fallback(handle_bad_path),
    )
}

async fn handle_peer_fetch(Path((group_name, key)): Path<(String, String)>) -> Response {
    tracing::debug!("peer fetch: group={} key={}", group_name, key);

    let Some(group) = Group::lookup(&group_name) else {
        return (
            StatusCode::NOT_FOUND,
            format!("no such group: {group_name}"),
        )
            .into_response();
    };

    match group.get(&key).await {
        Ok(view) => (
            [(header::CONTENT_TYPE, CONTENT_TYPE_BYTES)],
            view.to_vec(),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("peer fetch for {}/{} failed: {:#}", group_name, key, e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn handle_bad_path() -> (StatusCode, &'static str) {
    (StatusCode::BAD_REQUEST, "bad request")
}
