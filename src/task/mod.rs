use anyhow::{Context, Result};
use chrono::Local;
use log::{error, info, warn};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::auth::oauth::TokenRefresher;
use crate::auth::token_manager::CredentialManager;
use crate::cloud::storage::{ObjectStore, artifact_key};
use crate::digest::{DigestAssembler, midnight_epoch};
use crate::mail::gmail_client::MailConnector;
use crate::podcast::PodcastGenerator;
use crate::store::repo::CredentialStore;

/// Locations under the static directory.
pub const TRANSCRIPT_FILE: &str = "transcripts/transcript.txt";
pub const AUDIO_FILE: &str = "audio/podcast.mp3";

/// Runs the daily digest for every stored identity.
pub trait DigestRunner {
    fn run_batch(&self) -> Result<BatchReport>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub published: Vec<Published>,
    pub no_content: Vec<String>,
    pub failed: Vec<Failure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Published {
    pub identity: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub identity: String,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct DigestSettings {
    pub sender_domain: String,
    /// Side artifact holding the assembled newsletter text.
    pub text_path: PathBuf,
    /// Where generated audio lands before upload.
    pub audio_path: PathBuf,
}

enum Outcome {
    Published(String),
    NoContent,
}

pub struct DigestTask {
    store: Arc<dyn CredentialStore>,
    refresher: Box<dyn TokenRefresher>,
    mail: Box<dyn MailConnector>,
    podcast: Box<dyn PodcastGenerator>,
    objects: Arc<dyn ObjectStore>,
    settings: DigestSettings,
}

impl DigestTask {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        refresher: Box<dyn TokenRefresher>,
        mail: Box<dyn MailConnector>,
        podcast: Box<dyn PodcastGenerator>,
        objects: Arc<dyn ObjectStore>,
        settings: DigestSettings,
    ) -> Self {
        Self {
            store,
            refresher,
            mail,
            podcast,
            objects,
            settings,
        }
    }

    /// Digest every identity's mail received after `after_epoch`.
    ///
    /// A failing identity is logged and reported; the rest still run.
    pub fn run_batch_since(&self, after_epoch: i64) -> Result<BatchReport> {
        let identities = self.store.identities()?;
        info!("digest batch for {} identities", identities.len());

        for path in [&self.settings.text_path, &self.settings.audio_path] {
            ensure_parent(path)?;
        }

        let mut report = BatchReport::default();
        for identity in identities {
            match self.run_identity(&identity, after_epoch) {
                Ok(Outcome::Published(url)) => {
                    info!("published digest for {identity}: {url}");
                    report.published.push(Published { identity, url });
                }
                Ok(Outcome::NoContent) => {
                    info!("no digest content for {identity}");
                    report.no_content.push(identity);
                }
                Err(e) => {
                    error!("digest for {identity} failed: {e:#}");
                    report.failed.push(Failure {
                        identity,
                        error: format!("{e:#}"),
                    });
                }
            }
        }

        if !report.failed.is_empty() {
            warn!("{} of the batch failed", report.failed.len());
        }
        Ok(report)
    }

    fn run_identity(&self, identity: &str, after_epoch: i64) -> Result<Outcome> {
        let credential = CredentialManager::new(self.store.as_ref(), self.refresher.as_ref())
            .authorized(identity)?;
        let mailbox = self.mail.connect(&credential)?;

        let assembler = DigestAssembler::new(
            mailbox.as_ref(),
            &self.settings.sender_domain,
            &self.settings.text_path,
        );
        let Some(digest) = assembler.assemble(after_epoch)? else {
            return Ok(Outcome::NoContent);
        };

        self.podcast
            .generate(&digest.text, &self.settings.audio_path)
            .context("podcast generation failed")?;

        let key = artifact_key(identity);
        self.objects.upload(&self.settings.audio_path, &key)?;
        Ok(Outcome::Published(self.objects.public_url(&key)))
    }
}

impl DigestRunner for DigestTask {
    fn run_batch(&self) -> Result<BatchReport> {
        self.run_batch_since(midnight_epoch(&Local::now()))
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display())),
        _ => Ok(()),
    }
}
