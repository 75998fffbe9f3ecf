//! Test helpers: build AppState and router for integration tests.
//!
//! Run from workspace root: `cargo test -p stowage-api`. Records are kept in memory, so no
//! database is needed.

#![allow(dead_code)]

use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use stowage_api::constants;
use stowage_api::setup::{routes, services};
use stowage_api::state::AppState;
use stowage_core::{Config, StowageConfig};
use tempfile::TempDir;

pub const MAX_FILE_SIZE: u64 = 1024;

/// API path prefix for tests (e.g. `/api/v0`).
pub fn api_path(path: &str) -> String {
    format!("{}{}", constants::API_PREFIX, path)
}

/// Test application: server, state, and owned resources.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub final_dir: PathBuf,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Open a session and return its id.
    pub async fn open_upload(&self, file_name: &str, file_size: u64) -> String {
        let response = self
            .server
            .post(&api_path("/uploads"))
            .json(&serde_json::json!({
                "file_name": file_name,
                "file_size": file_size,
                "mime_type": "application/octet-stream",
            }))
            .await;
        assert_eq!(response.status_code(), 201, "open upload");
        response.json::<Value>()["upload_id"]
            .as_str()
            .expect("upload_id")
            .to_string()
    }

    /// Send one chunk with the given Content-Range.
    pub async fn send_chunk(
        &self,
        upload_id: &str,
        content_range: &str,
        data: &'static [u8],
    ) -> axum_test::TestResponse {
        self.server
            .post(&api_path(&format!("/uploads/{}/chunks", upload_id)))
            .add_header("Content-Range", content_range)
            .bytes(axum::body::Bytes::from_static(data))
            .await
    }

    /// Send one chunk as the `file` field of a multipart form.
    pub async fn send_multipart_chunk(
        &self,
        upload_id: &str,
        content_range: &str,
        data: &[u8],
    ) -> axum_test::TestResponse {
        let form = MultipartForm::new().add_part(
            "file",
            Part::bytes(data.to_vec())
                .file_name("blob")
                .mime_type("application/octet-stream"),
        );
        self.server
            .post(&api_path(&format!("/uploads/{}/chunks", upload_id)))
            .add_header("Content-Range", content_range)
            .multipart(form)
            .await
    }
}

/// Setup test app with the in-memory record store and local storage in a temp directory.
pub async fn setup_test_app() -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let final_dir = temp_dir.path().join("files");

    let config = Config::from(StowageConfig {
        upload_temp_dir: temp_dir.path().join("temp"),
        upload_final_dir: final_dir.clone(),
        max_file_size_bytes: MAX_FILE_SIZE,
        ..StowageConfig::default()
    });

    let state = services::initialize_services(&config, None)
        .await
        .expect("Failed to initialize services");
    let app = routes::setup_routes(&config, state.clone())
        .await
        .expect("Failed to setup routes");
    let server = TestServer::new(app).expect("Failed to create test server");

    TestApp {
        server,
        state,
        final_dir,
        _temp_dir: temp_dir,
    }
}
