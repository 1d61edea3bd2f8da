//! Shared router state.

use crate::{config::AppConfig, services::storage_service::StorageService};
use axum::{
    extract::FromRef,
    http::{HeaderMap, header},
};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

/// Characters escaped inside one URL path segment (RFC 3986 `pchar`
/// complement, plus `%` itself).
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

#[derive(Clone)]
pub struct AppState {
    pub storage: StorageService,

    /// Configured base for download links, without a trailing slash.
    pub public_url: Option<String>,

    /// Used when neither a public URL nor a `Host` header is available.
    pub fallback_base: String,
}

impl AppState {
    pub fn new(storage: StorageService, cfg: &AppConfig) -> Self {
        let host = match cfg.host.as_str() {
            "0.0.0.0" | "::" => "localhost",
            other => other,
        };

        Self {
            storage,
            public_url: cfg.public_url.clone(),
            fallback_base: format!("http://{}:{}", host, cfg.port),
        }
    }

    /// Base URL for `/files/...` links returned to the client.
    pub fn download_base(&self, headers: &HeaderMap) -> String {
        if let Some(url) = &self.public_url {
            return url.clone();
        }

        headers
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .filter(|host| !host.is_empty())
            .map(|host| format!("http://{}", host))
            .unwrap_or_else(|| self.fallback_base.clone())
    }

    /// Download link for a stored object, with each path segment
    /// percent-encoded.
    pub fn download_url(&self, headers: &HeaderMap, relative_path: &str) -> String {
        let encoded = relative_path
            .split('/')
            .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/files/{}", self.download_base(headers), encoded)
    }
}

impl FromRef<AppState> for StorageService {
    fn from_ref(state: &AppState) -> Self {
        state.storage.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage_service::DEFAULT_ALLOWED_EXTENSIONS;
    use axum::http::HeaderValue;
    use tempfile::TempDir;

    async fn state_with(public_url: Option<&str>, host: &str) -> (TempDir, AppState) {
        let temp = TempDir::new().unwrap();
        let storage = StorageService::new(temp.path(), DEFAULT_ALLOWED_EXTENSIONS)
            .await
            .unwrap();
        let cfg = AppConfig {
            host: host.into(),
            port: 5000,
            storage_dir: temp.path().display().to_string(),
            max_request_bytes: 1024,
            allowed_extensions: vec!["txt".into()],
            public_url: public_url.map(str::to_string),
        };
        (temp, AppState::new(storage, &cfg))
    }

    #[tokio::test]
    async fn public_url_wins_over_host_header() {
        let (_temp, state) = state_with(Some("https://cdn.example"), "0.0.0.0").await;
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("internal:5000"));

        assert_eq!(state.download_base(&headers), "https://cdn.example");
    }

    #[tokio::test]
    async fn host_header_is_used_when_present() {
        let (_temp, state) = state_with(None, "0.0.0.0").await;
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("files.local:8080"));

        assert_eq!(state.download_base(&headers), "http://files.local:8080");
    }

    #[tokio::test]
    async fn unspecified_bind_address_falls_back_to_localhost() {
        let (_temp, state) = state_with(None, "0.0.0.0").await;
        assert_eq!(state.download_base(&HeaderMap::new()), "http://localhost:5000");

        let (_temp, state) = state_with(None, "10.0.0.7").await;
        assert_eq!(state.download_base(&HeaderMap::new()), "http://10.0.0.7:5000");
    }

    #[tokio::test]
    async fn download_url_escapes_each_segment() {
        let (_temp, state) = state_with(None, "0.0.0.0").await;

        assert_eq!(
            state.download_url(&HeaderMap::new(), "my docs/q?x/100%/a.txt"),
            "http://localhost:5000/files/my%20docs/q%3Fx/100%25/a.txt"
        );
        assert_eq!(
            state.download_url(&HeaderMap::new(), "naïve/a.txt"),
            "http://localhost:5000/files/na%C3%AFve/a.txt"
        );
    }
}
