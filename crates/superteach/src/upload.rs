//! url → ipfs upload
//!
//! two steps: fetch the url as bytes and wrap them as a named file, then hand
//! a one-file batch to the uploader and keep the first returned url.
//! progress is a single status line overwritten at each step.

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

use crate::config::UploadConfig;
use crate::error::{Result, StarterError};

/// name given to fetched content
pub const UPLOAD_FILE_NAME: &str = "image.png";

pub const STATUS_FETCHING: &str = "Converting URL to blob...";
pub const STATUS_UPLOADING: &str = "Uploading file to IPFS...";
pub const STATUS_DONE_PREFIX: &str = "Your file's IPFS url: ";
pub const STATUS_FAILED: &str = "Upload failed";

const IPFS_SCHEME: &str = "ipfs://";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("upload request failed: {0}")]
    Request(String),
    #[error("uploader returned no urls")]
    EmptyResult,
    #[error("cannot upload {0} files without a directory")]
    TooManyFiles(usize),
    #[error("upload already in progress")]
    Busy,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadRequest {
    pub source_url: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadResult {
    pub content_url: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UploadOptions {
    /// resolve `ipfs://` uris to the gateway
    pub upload_with_gateway_url: bool,
    /// address each file by its own cid instead of wrapping in a directory
    pub upload_without_directory: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            upload_with_gateway_url: true,
            upload_without_directory: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchedContent {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

#[async_trait(?Send)]
pub trait ContentSource {
    async fn fetch(&self, url: &str) -> std::result::Result<FetchedContent, UploadError>;
}

/// batch upload; returned urls are in file order
#[async_trait(?Send)]
pub trait Uploader {
    async fn upload(
        &self,
        files: Vec<UploadFile>,
        options: UploadOptions,
    ) -> std::result::Result<Vec<String>, UploadError>;
}

/// plain http(s) GET
#[derive(Clone, Default)]
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait(?Send)]
impl ContentSource for HttpSource {
    async fn fetch(&self, url: &str) -> std::result::Result<FetchedContent, UploadError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| UploadError::Fetch(e.to_string()))?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| UploadError::Fetch(e.to_string()))?;

        Ok(FetchedContent {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

/// multipart pinning endpoint (thirdweb storage api shape)
#[derive(Clone)]
pub struct StorageUploader {
    client: Client,
    endpoint: String,
    gateway_url: String,
    secret_key: String,
}

impl StorageUploader {
    pub fn new(config: &UploadConfig, secret_key: String) -> Self {
        Self {
            client: Client::new(),
            endpoint: config.endpoint.clone(),
            gateway_url: config.gateway_url.clone(),
            secret_key,
        }
    }

    /// secret read from the configured environment variable
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_env(config: &UploadConfig) -> Result<Self> {
        Ok(Self::new(config, config.resolve_secret()?))
    }
}

/// uris for an uploaded batch under `cid`
pub fn content_uris(cid: &str, names: &[&str], options: UploadOptions, gateway_url: &str) -> Vec<String> {
    let uris: Vec<String> = if options.upload_without_directory {
        vec![format!("{}{}", IPFS_SCHEME, cid)]
    } else {
        names
            .iter()
            .map(|name| format!("{}{}/{}", IPFS_SCHEME, cid, name))
            .collect()
    };

    if !options.upload_with_gateway_url {
        return uris;
    }
    uris.into_iter()
        .map(|uri| resolve_gateway(&uri, gateway_url))
        .collect()
}

/// `ipfs://cid/path` → `{gateway}cid/path`
pub fn resolve_gateway(uri: &str, gateway_url: &str) -> String {
    match uri.strip_prefix(IPFS_SCHEME) {
        Some(path) => format!("{}/{}", gateway_url.trim_end_matches('/'), path),
        None => uri.to_string(),
    }
}

#[async_trait(?Send)]
impl Uploader for StorageUploader {
    async fn upload(
        &self,
        files: Vec<UploadFile>,
        options: UploadOptions,
    ) -> std::result::Result<Vec<String>, UploadError> {
        if files.is_empty() {
            return Ok(Vec::new());
        }
        if options.upload_without_directory && files.len() > 1 {
            return Err(UploadError::TooManyFiles(files.len()));
        }

        let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
        let mut form = Form::new();
        for file in files {
            let part = Part::bytes(file.bytes)
                .file_name(file.name)
                .mime_str(&file.mime_type)
                .map_err(|e| UploadError::Request(e.to_string()))?;
            form = form.part("file", part);
        }
        form = form.text(
            "pinataOptions",
            json!({ "wrapWithDirectory": !options.upload_without_directory }).to_string(),
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-secret-key", &self.secret_key)
            .multipart(form)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| UploadError::Request(e.to_string()))?;

        let pinned: PinResponse = response
            .json()
            .await
            .map_err(|e| UploadError::Request(e.to_string()))?;

        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        Ok(content_uris(&pinned.ipfs_hash, &names, options, &self.gateway_url))
    }
}

pub struct UploadExecutor {
    source: Arc<dyn ContentSource>,
    uploader: Arc<dyn Uploader>,
    busy: Arc<Mutex<bool>>,
}

/// clears the busy flag on drop
struct UploadSlot(Arc<Mutex<bool>>);

impl Drop for UploadSlot {
    fn drop(&mut self) {
        *self.0.lock() = false;
    }
}

impl UploadExecutor {
    pub fn new(source: Arc<dyn ContentSource>, uploader: Arc<dyn Uploader>) -> Self {
        Self {
            source,
            uploader,
            busy: Arc::new(Mutex::new(false)),
        }
    }

    pub fn is_busy(&self) -> bool {
        *self.busy.lock()
    }

    fn claim(&self) -> Option<UploadSlot> {
        let mut busy = self.busy.lock();
        if *busy {
            return None;
        }
        *busy = true;
        Some(UploadSlot(self.busy.clone()))
    }

    /// fetch `request.source_url` and upload it, reporting progress through `status`
    pub async fn upload_from_url(&self, request: &UploadRequest, status: &dyn Fn(&str)) -> Result<UploadResult> {
        let _slot = self
            .claim()
            .ok_or_else(|| StarterError::UploadFailed(UploadError::Busy.to_string()))?;

        match self.run(request, status).await {
            Ok(result) => {
                status(&format!("{}{}", STATUS_DONE_PREFIX, result.content_url));
                info!(url = %result.content_url, "file uploaded");
                Ok(result)
            }
            Err(e) => {
                error!(source = %request.source_url, error = %e, "upload failed");
                status(STATUS_FAILED);
                Err(StarterError::UploadFailed(e.to_string()))
            }
        }
    }

    async fn run(
        &self,
        request: &UploadRequest,
        status: &dyn Fn(&str),
    ) -> std::result::Result<UploadResult, UploadError> {
        status(STATUS_FETCHING);
        let content = self.source.fetch(&request.source_url).await?;
        let file = UploadFile {
            name: UPLOAD_FILE_NAME.to_string(),
            mime_type: content
                .content_type
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            bytes: content.bytes,
        };

        status(STATUS_UPLOADING);
        let urls = self
            .uploader
            .upload(vec![file], UploadOptions::default())
            .await?;

        let content_url = urls.into_iter().next().ok_or(UploadError::EmptyResult)?;
        Ok(UploadResult { content_url })
    }
}
