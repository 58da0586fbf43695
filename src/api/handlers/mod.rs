use std::path::{Component, Path as FsPath, PathBuf};

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

use super::AssetTree;
use crate::indexer;
use crate::models::Manifest;

// ============================================================
// Error Handling
// ============================================================

/// Log an internal error and return a sanitized response to the client.
fn internal_error(e: impl std::fmt::Display) -> (StatusCode, String) {
    tracing::error!("Internal error: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Assets
// ============================================================

pub async fn get_manifest(
    State(tree): State<AssetTree>,
) -> Result<Json<Manifest>, (StatusCode, String)> {
    let root = tree.root().to_path_buf();
    tokio::task::spawn_blocking(move || indexer::build_manifest(&root))
        .await
        .map_err(internal_error)?
        .map(Json)
        .map_err(internal_error)
}

pub async fn get_resource(
    State(tree): State<AssetTree>,
    Path(path): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let file = resolve_within(tree.root(), &path)
        .ok_or((StatusCode::BAD_REQUEST, format!("Invalid asset path: {}", path)))?;

    let not_found = || (StatusCode::NOT_FOUND, format!("Asset not found: {}", path));
    match tokio::fs::metadata(&file).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return Err(not_found()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        Err(e) => return Err(internal_error(e)),
    }

    let bytes = tokio::fs::read(&file).await.map_err(internal_error)?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], bytes))
}

/// Join a request path onto the root, refusing anything that could escape it.
/// Both separators are accepted since manifests may carry either.
fn resolve_within(root: &FsPath, request: &str) -> Option<PathBuf> {
    let mut resolved = root.to_path_buf();
    let mut parts = 0;
    for part in request.split(&['/', '\\'][..]).filter(|p| !p.is_empty()) {
        let mut components = FsPath::new(part).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => resolved.push(name),
            _ => return None,
        }
        parts += 1;
    }
    (parts > 0).then_some(resolved)
}
