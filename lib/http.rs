//! HTTP access for template downloads, feed lookups and CDN indexes.

use crate::error::{BuildError, BuildResult};
use crate::fs::write_file;
use indicatif::{ProgressBar, ProgressStyle};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A fully-read HTTP response.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,

    /// Response body.
    pub body: Vec<u8>,
}

/// Blocking GET access.
pub trait HttpClient {
    /// Fetch `url`. Non-2xx statuses are returned, not raised.
    fn get(&self, url: &str) -> BuildResult<HttpResponse>;
}

/// [`HttpClient`] backed by a blocking reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const USER_AGENT: &str = concat!("bundle-build/", env!("CARGO_PKG_VERSION"));

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl HttpResponse {
    /// 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl ReqwestClient {
    /// Client without a request timeout. Downloads block until complete.
    pub fn new() -> BuildResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(None::<Duration>)
            .build()?;
        Ok(Self { client })
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str) -> BuildResult<HttpResponse> {
        tracing::debug!("GET {}", redact(url));
        let response = self.client.get(url).send()?;
        let status = response.status().as_u16();
        let body = response.bytes()?.to_vec();
        tracing::debug!(status, bytes = body.len(), "GET {} done", redact(url));
        Ok(HttpResponse { status, body })
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Download `url` into `dest`, failing with [`BuildError::DownloadFailure`] on a non-2xx status.
pub fn download_to_file(http: &dyn HttpClient, url: &str, dest: &Path) -> BuildResult<u64> {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(format!("Downloading {}", file_label(url)));
    pb.enable_steady_tick(Duration::from_millis(100));

    let response = http.get(url);
    pb.finish_and_clear();
    let response = response?;

    if !response.is_success() {
        return Err(BuildError::DownloadFailure {
            url: redact(url),
            status: response.status,
        });
    }

    write_file(dest, &response.body)?;
    Ok(response.body.len() as u64)
}

/// Fetch and parse a JSON document. A 404 yields `None`; other failures are errors.
pub fn fetch_json<T: DeserializeOwned>(http: &dyn HttpClient, url: &str) -> BuildResult<Option<T>> {
    let response = http.get(url)?;
    if response.status == 404 {
        tracing::debug!("{} not found", redact(url));
        return Ok(None);
    }
    if !response.is_success() {
        return Err(BuildError::DownloadFailure {
            url: redact(url),
            status: response.status,
        });
    }
    Ok(Some(serde_json::from_slice(&response.body)?))
}

/// Like [`fetch_json`], with a missing document read as the default value.
pub fn fetch_json_or_default<T: DeserializeOwned + Default>(
    http: &dyn HttpClient,
    url: &str,
) -> BuildResult<T> {
    Ok(fetch_json(http, url)?.unwrap_or_default())
}

/// Drop the query string so SAS tokens never reach logs or error messages.
pub fn redact(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => format!("{}?<redacted>", base),
        None => url.to_string(),
    }
}

fn file_label(url: &str) -> &str {
    let path = url.split('?').next().unwrap_or(url);
    path.rsplit('/').next().filter(|s| !s.is_empty()).unwrap_or(path)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHttp;
    use tempfile::TempDir;

    #[test]
    fn test_download_writes_body() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("nested/file.zip");
        let http = FakeHttp::new();
        http.serve("https://cdn/file.zip", 200, b"data".to_vec());

        let size = download_to_file(&http, "https://cdn/file.zip", &dest).unwrap();
        assert_eq!(size, 4);
        assert_eq!(std::fs::read(&dest).unwrap(), b"data");
    }

    #[test]
    fn test_download_non_success_fails() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("file.zip");
        let http = FakeHttp::new();
        http.serve("https://cdn/file.zip?sig=secret", 403, Vec::new());

        let err = download_to_file(&http, "https://cdn/file.zip?sig=secret", &dest).unwrap_err();
        match err {
            BuildError::DownloadFailure { url, status } => {
                assert_eq!(status, 403);
                assert!(!url.contains("secret"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!dest.exists());
    }

    #[test]
    fn test_fetch_json_missing_is_default() {
        let http = FakeHttp::new();
        let versions: Vec<String> = fetch_json_or_default(&http, "https://cdn/index.json").unwrap();
        assert!(versions.is_empty());
    }

    #[test]
    fn test_fetch_json_server_error_fails() {
        let http = FakeHttp::new();
        http.serve("https://cdn/index.json", 500, Vec::new());
        let result: BuildResult<Vec<String>> = fetch_json_or_default(&http, "https://cdn/index.json");
        assert!(matches!(result, Err(BuildError::DownloadFailure { status: 500, .. })));
    }

    #[test]
    fn test_file_label() {
        assert_eq!(file_label("https://a/b/c.zip?x=1"), "c.zip");
        assert_eq!(file_label("https://a/b/"), "https://a/b/");
    }
}
