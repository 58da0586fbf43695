use std::fs;

use axum::http::StatusCode;
use axum_test::TestServer;
use asset_preloader::api::{create_router, AssetTree};
use asset_preloader::models::Manifest;
use tempfile::TempDir;

fn setup() -> (TestServer, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let root = dir.path();
    fs::create_dir_all(root.join("textures")).unwrap();
    fs::create_dir_all(root.join("server")).unwrap();
    fs::write(root.join("textures/a.png"), b"aaa").unwrap();
    fs::write(root.join("textures/b.png"), b"bbb").unwrap();
    fs::write(root.join("server/secret.ron"), b"s").unwrap();

    let app = create_router(AssetTree::new(root));
    let server = TestServer::new(app).expect("Failed to create test server");
    (server, dir)
}

mod health {
    use super::*;

    #[tokio::test]
    async fn reports_ok() {
        let (server, _dir) = setup();

        let response = server.get("/health").await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["status"], "ok");
    }
}

mod manifest {
    use super::*;

    #[tokio::test]
    async fn lists_the_tree() {
        let (server, _dir) = setup();

        let response = server.get("/assets/index.json").await;

        response.assert_status_ok();
        let manifest: Manifest = response.json();
        assert_eq!(manifest.directories, vec!["textures"]);
        assert_eq!(manifest.files, vec!["textures/a.png", "textures/b.png"]);
    }

    #[tokio::test]
    async fn uses_wire_field_names() {
        let (server, _dir) = setup();

        let body: serde_json::Value = server.get("/assets/index.json").await.json();

        assert!(body["dirs"].is_array());
        assert!(body["files"].is_array());
    }

    #[tokio::test]
    async fn reflects_files_added_later() {
        let (server, dir) = setup();
        fs::write(dir.path().join("textures/c.png"), b"ccc").unwrap();

        let manifest: Manifest = server.get("/assets/index.json").await.json();

        assert_eq!(manifest.files.len(), 3);
    }
}

mod resources {
    use super::*;

    #[tokio::test]
    async fn serves_raw_bytes() {
        let (server, _dir) = setup();

        let response = server.get("/assets/textures/a.png").await;

        response.assert_status_ok();
        assert_eq!(response.text(), "aaa");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let (server, _dir) = setup();

        let response = server.get("/assets/textures/missing.png").await;

        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn directory_is_not_found() {
        let (server, _dir) = setup();

        let response = server.get("/assets/textures").await;

        response.assert_status(StatusCode::NOT_FOUND);
    }
}
