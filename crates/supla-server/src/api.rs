//! Read-only HTTPS API.
//!
//! A thin JSON adapter over the world state. The only resource is the
//! user-icon listing clients fetch after seeing a `user_icon` id in a
//! channel or scene pack.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use serde_json::json;

use crate::ServerInner;

/// Build the API router.
pub fn router(inner: Arc<ServerInner>) -> Router {
    Router::new()
        .route("/api/{version}/user-icons", get(user_icons))
        .fallback(not_found)
        .with_state(inner)
}

#[derive(Debug, Deserialize)]
struct IconQuery {
    /// Comma-separated icon ids; all icons when absent.
    ids: Option<String>,
    /// Comma-separated extras; `images` attaches the image data.
    include: Option<String>,
}

/// `GET /api/{version}/user-icons`
async fn user_icons(
    State(inner): State<Arc<ServerInner>>,
    Path(_version): Path<String>,
    Query(query): Query<IconQuery>,
) -> Response {
    let state = inner.state.lock().await;

    let ids: Vec<i32> = match &query.ids {
        Some(csv) => csv.split(',').filter_map(|id| id.trim().parse().ok()).collect(),
        None => state.get_icons().iter().map(|icon| icon.id).collect(),
    };
    let include_images = query
        .include
        .as_deref()
        .is_some_and(|include| include.split(',').any(|part| part == "images"));

    let mut body = Vec::with_capacity(ids.len());
    for id in ids {
        let Ok(icon) = state.get_icon(id) else {
            continue;
        };
        let mut entry = json!({ "id": id });
        if include_images {
            let images: Vec<String> =
                icon.images.iter().map(|image| BASE64.encode(image)).collect();
            entry["images"] = json!(images);
            entry["imagesDark"] = json!(images);
        }
        body.push(entry);
    }

    Json(body).into_response()
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "message": "Not found" }))).into_response()
}
