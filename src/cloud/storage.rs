use anyhow::{Context, Result, bail};
use log::info;
use reqwest::blocking::Client;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::cloud::metadata::ServiceTokenSource;

pub const GCS_UPLOAD_BASE: &str = "https://storage.googleapis.com/upload/storage/v1";
pub const GCS_PUBLIC_BASE: &str = "https://storage.googleapis.com";

/// Flat object storage for generated audio.
pub trait ObjectStore {
    /// Upload `local` under `key`, replacing any existing object.
    fn upload(&self, local: &Path, key: &str) -> Result<()>;
    fn public_url(&self, key: &str) -> String;
}

/// Deterministic object key for an identity's podcast.
pub fn artifact_key(identity: &str) -> String {
    let local = identity.split('@').next().unwrap_or(identity);
    format!("static/{local}_podcast.mp3")
}

pub struct GcsObjectStore {
    http: Client,
    bucket: String,
    tokens: ServiceTokenSource,
    upload_base: String,
}

impl GcsObjectStore {
    pub fn new(bucket: impl Into<String>, tokens: ServiceTokenSource, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: Client::builder().timeout(timeout).build()?,
            bucket: bucket.into(),
            tokens,
            upload_base: GCS_UPLOAD_BASE.to_string(),
        })
    }

    pub fn with_upload_base(mut self, base: impl Into<String>) -> Self {
        self.upload_base = base.into();
        self
    }
}

impl ObjectStore for GcsObjectStore {
    fn upload(&self, local: &Path, key: &str) -> Result<()> {
        let data = fs::read(local).with_context(|| format!("failed to read {}", local.display()))?;
        let url = format!("{}/b/{}/o", self.upload_base, self.bucket);
        let token = self.tokens.token(&self.http)?;

        let resp = self
            .http
            .post(&url)
            .bearer_auth(token)
            .query(&[("uploadType", "media"), ("name", key)])
            .header(reqwest::header::CONTENT_TYPE, "audio/mpeg")
            .body(data)
            .send()
            .with_context(|| format!("upload of {key} failed"))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            bail!("storage upload of {key} returned {status}: {body}");
        }

        info!("File {} uploaded to {}.", local.display(), key);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{GCS_PUBLIC_BASE}/{}/{key}", self.bucket)
    }
}
