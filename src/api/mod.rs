//! Thin wrapper around the upload service's HTTP API.
//!
//! Every call is a single request: no retries, no auth, no backoff. Non-2xx
//! statuses become errors carrying the route and status code.

mod types;

pub use types::{DownloadedFile, FileId, ServerMessage, ServerProgress, UploadedFileRecord};

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use futures_util::{Stream, TryStreamExt};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::{multipart, Body, Client, Response};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'.')
    .remove(b'-')
    .remove(b'_')
    .remove(b'~');

/// Multipart field name the server collects uploads from.
pub const UPLOAD_FIELD: &str = "files";

#[derive(Clone, Debug)]
pub struct ApiClient {
    base_url: String,
    http: Client,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn item_path(route: &str, id: &str) -> String {
        format!("/{}/{}", route, utf8_percent_encode(id, PATH_SEGMENT))
    }

    async fn get(&self, path: &str) -> Result<Response> {
        let response = self
            .http
            .get(self.url(path))
            .send()
            .await
            .with_context(|| format!("GET {} failed", path))?;
        ensure_success(path, response)
    }

    /// Greeting served at the API root.
    pub async fn server_message(&self) -> Result<String> {
        let body: ServerMessage = self
            .get("/")
            .await?
            .json()
            .await
            .context("Failed to decode GET / response")?;
        Ok(body.message)
    }

    pub async fn list_files(&self) -> Result<Vec<UploadedFileRecord>> {
        self.get("/files")
            .await?
            .json()
            .await
            .context("Failed to decode GET /files response")
    }

    /// Preview lines exactly as the server returned them; callers bound the count.
    pub async fn preview(&self, id: &FileId) -> Result<Vec<String>> {
        let path = Self::item_path("preview", id.as_str());
        self.get(&path)
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to decode GET {} response", path))
    }

    pub async fn download(&self, id: &FileId) -> Result<DownloadedFile> {
        let path = Self::item_path("download", id.as_str());
        let response = self.get(&path).await?;

        let disposition_name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(disposition_filename);

        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read GET {} body", path))?;

        Ok(DownloadedFile {
            disposition_name,
            bytes,
        })
    }

    pub async fn progress(&self, id: &str) -> Result<ServerProgress> {
        let path = Self::item_path("progress", id);
        self.get(&path)
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to decode GET {} response", path))
    }

    /// Streams one file to `POST /upload` as the multipart field `files`.
    ///
    /// `on_progress` receives cumulative `(sent, total)` bytes each time a
    /// chunk of the body is handed to the transport.
    pub async fn upload<S, F>(
        &self,
        filename: &str,
        body: S,
        total: u64,
        on_progress: F,
    ) -> Result<()>
    where
        S: Stream<Item = io::Result<Bytes>> + Send + Sync + 'static,
        F: Fn(u64, u64) + Send + Sync + 'static,
    {
        // An empty body yields no chunks, so report it as complete up front.
        if total == 0 {
            on_progress(0, 0);
        }

        let sent = AtomicU64::new(0);
        let counted = body.inspect_ok(move |chunk| {
            let len = chunk.len() as u64;
            let so_far = sent.fetch_add(len, Ordering::Relaxed) + len;
            on_progress(so_far, total);
        });

        let part = multipart::Part::stream_with_length(Body::wrap_stream(counted), total)
            .file_name(filename.to_string())
            .mime_str("text/csv")?;
        let form = multipart::Form::new().part(UPLOAD_FIELD, part);

        let response = self
            .http
            .post(self.url("/upload"))
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("Failed to send upload request for {}", filename))?;
        ensure_success("/upload", response)?;
        Ok(())
    }
}

fn ensure_success(path: &str, response: Response) -> Result<Response> {
    let status = response.status();
    match status.as_u16() {
        404 => bail!("{} not found on server (404)", path),
        _ if !status.is_success() => bail!("{} returned {}", path, status),
        _ => Ok(response),
    }
}

/// Extracts the filename from a `Content-Disposition` header value,
/// preferring the RFC 5987 `filename*` form when both are present.
pub fn disposition_filename(value: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for param in value.split(';').map(str::trim) {
        let Some((key, raw)) = param.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let raw = raw.trim();

        if key.eq_ignore_ascii_case("filename*") {
            let encoded = raw.split_once("''").map_or(raw, |(_, rest)| rest);
            let decoded = percent_decode_str(encoded).decode_utf8_lossy().into_owned();
            if !decoded.is_empty() {
                extended = Some(decoded);
            }
        } else if key.eq_ignore_ascii_case("filename") {
            let name = raw.trim_matches('"');
            if !name.is_empty() {
                plain = Some(name.to_string());
            }
        }
    }

    extended.or(plain)
}
