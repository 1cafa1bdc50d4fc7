//! Immutable file storage.
//!
//! Uploaded bytes are addressed by content: the returned URL always serves
//! exactly the bytes that were uploaded. Production uses Pinata (IPFS);
//! development falls back to a local content-addressed directory served
//! under `/files`.

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{AppConfig, PinataConfig};
use crate::error::AppError;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Upload request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Upload rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("Upload response missing content hash")]
    MissingHash,
    #[error("Failed to store file: {0}")]
    Io(#[from] std::io::Error),
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        AppError::Upstream(err.to_string())
    }
}

/// Location of a stored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub url: String,
}

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait UploadService: Send + Sync {
    async fn upload(&self, bytes: Vec<u8>, file_name: &str) -> Result<UploadedFile, UploadError>;
}

#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: Option<String>,
}

pub struct PinataUploadService {
    client: reqwest::Client,
    config: PinataConfig,
}

impl PinataUploadService {
    pub fn new(config: PinataConfig, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client, config }
    }

    fn pin_endpoint(&self) -> String {
        format!(
            "{}/pinning/pinFileToIPFS",
            self.config.api_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl UploadService for PinataUploadService {
    async fn upload(&self, bytes: Vec<u8>, file_name: &str) -> Result<UploadedFile, UploadError> {
        let size = bytes.len();
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(content_type_for(file_name))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.pin_endpoint())
            .bearer_auth(&self.config.jwt)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let pinned: PinResponse = response.json().await?;
        let hash = pinned
            .ipfs_hash
            .filter(|hash| !hash.is_empty())
            .ok_or(UploadError::MissingHash)?;

        tracing::info!(file_name, size, hash = %hash, "Pinned file to IPFS");

        Ok(UploadedFile {
            url: format!("{}{}", self.config.gateway_url, hash),
        })
    }
}

/// Stores files as `<sha256>.<ext>` under a local directory.
pub struct LocalUploadService {
    upload_dir: PathBuf,
    public_base_url: String,
}

impl LocalUploadService {
    pub fn new(upload_dir: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            public_base_url: public_base_url.into(),
        }
    }
}

#[async_trait]
impl UploadService for LocalUploadService {
    async fn upload(&self, bytes: Vec<u8>, file_name: &str) -> Result<UploadedFile, UploadError> {
        let hash = hex::encode(Sha256::digest(&bytes));
        let stored_name = match extension_of(file_name) {
            Some(ext) => format!("{}.{}", hash, ext),
            None => hash.clone(),
        };

        tokio::fs::create_dir_all(&self.upload_dir).await?;
        let target = self.upload_dir.join(&stored_name);
        if stored_hash(&target).await.as_deref() != Some(hash.as_str()) {
            persist_atomically(self.upload_dir.clone(), target, bytes).await?;
        }

        tracing::debug!(file_name, stored = %stored_name, "Stored file locally");

        Ok(UploadedFile {
            url: format!(
                "{}/files/{}",
                self.public_base_url.trim_end_matches('/'),
                stored_name
            ),
        })
    }
}

async fn stored_hash(path: &Path) -> Option<String> {
    let existing = tokio::fs::read(path).await.ok()?;
    Some(hex::encode(Sha256::digest(&existing)))
}

/// Writes `bytes` next to `target` and renames it into place, so `target`
/// never holds a partial file.
async fn persist_atomically(dir: PathBuf, target: PathBuf, bytes: Vec<u8>) -> std::io::Result<()> {
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let mut temp = tempfile::Builder::new()
            .prefix(".upload-")
            .tempfile_in(&dir)?;
        temp.write_all(&bytes)?;
        temp.as_file().sync_all()?;
        temp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?
}

fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
}

fn content_type_for(file_name: &str) -> &'static str {
    match extension_of(file_name).as_deref() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

pub fn create_upload_service(config: &AppConfig) -> Box<dyn UploadService> {
    match &config.pinata {
        Some(pinata) => {
            tracing::info!("Using Pinata upload service at {}", pinata.api_url);
            Box::new(PinataUploadService::new(
                pinata.clone(),
                config.outbound_timeout,
            ))
        }
        None => {
            tracing::info!(
                "PINATA_JWT not configured. Storing uploads under {}",
                config.upload_dir.display()
            );
            Box::new(LocalUploadService::new(
                config.upload_dir.clone(),
                config.public_base_url.clone(),
            ))
        }
    }
}
