//! Video feed listing service.
//!
//! A single endpoint, `GET /videos`, returning `{ "keys": [...] }` with every
//! object-store key whose name ends in `.mp4` (case-insensitive). Store
//! failures surface as a bare 500 with the detail logged server-side only.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use walkdir::WalkDir;

use crate::error::{ReelError, Result};

/// Read-only listing of an object store's keys.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn list_keys(&self) -> Result<Vec<String>>;
}

/// An object store backed by a local directory; each file's path relative to
/// the root, with `/` separators, is its key.
pub struct LocalDirStore {
    root: PathBuf,
}

impl LocalDirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ObjectStore for LocalDirStore {
    async fn list_keys(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Err(ReelError::NotFound(format!(
                "store directory not found: {}",
                self.root.display()
            )));
        }

        let mut keys = Vec::new();
        for entry in WalkDir::new(&self.root) {
            let entry = entry.map_err(|e| ReelError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&self.root) {
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                keys.push(key);
            }
        }

        keys.sort();
        Ok(keys)
    }
}

/// Case-insensitive `.mp4` suffix match; everything else is excluded from
/// the feed.
pub fn is_video_key(key: &str) -> bool {
    key.to_ascii_lowercase().ends_with(".mp4")
}

#[derive(Debug, Serialize)]
pub struct KeysResponse {
    pub keys: Vec<String>,
}

pub fn router(store: Arc<dyn ObjectStore>) -> Router {
    Router::new()
        .route("/videos", get(list_videos))
        .with_state(store)
}

async fn list_videos(State(store): State<Arc<dyn ObjectStore>>) -> Response {
    match store.list_keys().await {
        Ok(keys) => {
            let keys: Vec<String> = keys.into_iter().filter(|key| is_video_key(key)).collect();
            Json(KeysResponse { keys }).into_response()
        }
        Err(e) => {
            log::error!("object store listing failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Bind and serve the listing endpoint until the process exits.
pub async fn serve(addr: SocketAddr, store: Arc<dyn ObjectStore>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("feed listing service on http://{}", addr);
    axum::serve(listener, router(store)).await?;
    Ok(())
}

/// Map a key to its public object-store URL (what the feed client plays).
pub fn public_url(base_url: &str, key: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[test]
    fn video_key_filter_is_case_insensitive() {
        assert!(is_video_key("videos/a.mp4"));
        assert!(is_video_key("videos/b.MP4"));
        assert!(!is_video_key("videos/notes.txt"));
        assert!(!is_video_key("clip.mp3"));
        // A bare suffix still matches; the filter is suffix-only.
        assert!(is_video_key(".mp4"));
    }

    #[test]
    fn public_url_joins_base_and_key() {
        assert_eq!(
            public_url("https://store.example.com/", "videos/a.mp4"),
            "https://store.example.com/videos/a.mp4"
        );
    }

    #[tokio::test]
    async fn local_store_lists_relative_keys() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("videos")).unwrap();
        std::fs::write(dir.path().join("videos/a.mp4"), b"v").unwrap();
        std::fs::write(dir.path().join("top.mp4"), b"v").unwrap();

        let store = LocalDirStore::new(dir.path());
        let keys = store.list_keys().await.unwrap();
        assert_eq!(keys, vec!["top.mp4".to_string(), "videos/a.mp4".to_string()]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unreadable_subdirectory_is_an_io_error() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join("locked");
        std::fs::create_dir(&locked).unwrap();
        std::fs::write(locked.join("a.mp4"), b"v").unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

        let result = LocalDirStore::new(dir.path()).list_keys().await;
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

        // A privileged user can read the directory anyway; only the error
        // kind is under test.
        if let Err(e) = result {
            assert!(matches!(e, ReelError::Io(_)));
        }
    }

    struct StaticStore(Vec<String>);

    #[async_trait]
    impl ObjectStore for StaticStore {
        async fn list_keys(&self) -> Result<Vec<String>> {
            Ok(self.0.clone())
        }
    }

    struct FailingStore;

    #[async_trait]
    impl ObjectStore for FailingStore {
        async fn list_keys(&self) -> Result<Vec<String>> {
            Err(ReelError::NotFound("bucket gone".to_string()))
        }
    }

    #[tokio::test]
    async fn listing_endpoint_returns_only_mp4_keys() {
        let store = Arc::new(StaticStore(vec![
            "videos/a.mp4".to_string(),
            "videos/b.MP4".to_string(),
            "videos/notes.txt".to_string(),
        ]));
        let response = router(store)
            .oneshot(Request::builder().uri("/videos").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            parsed,
            serde_json::json!({ "keys": ["videos/a.mp4", "videos/b.MP4"] })
        );
    }

    #[tokio::test]
    async fn store_failure_is_a_bare_500() {
        let response = router(Arc::new(FailingStore))
            .oneshot(Request::builder().uri("/videos").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
