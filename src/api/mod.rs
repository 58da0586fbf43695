mod handlers;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// The asset tree a server hosts.
#[derive(Debug, Clone)]
pub struct AssetTree {
    root: Arc<PathBuf>,
}

impl AssetTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Arc::new(root.into()),
        }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

pub fn create_router(tree: AssetTree) -> Router {
    let assets = Router::new()
        // Manifest, regenerated from the tree on every request
        .route("/index.json", get(handlers::get_manifest))
        // Raw resource bytes
        .route("/{*path}", get(handlers::get_resource));

    Router::new()
        .nest("/assets", assets)
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(tree)
}
