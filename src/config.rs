use anyhow::{Context, Result};
use log::{info, warn};
use oauth2::CsrfToken;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::auth::token_store;
use crate::digest::DEFAULT_SENDER_DOMAIN;
use crate::podcast::{DEFAULT_LLM_MODEL, DEFAULT_TTS_MODEL};
use crate::task::{AUDIO_FILE, DigestSettings, TRANSCRIPT_FILE};

pub const DEFAULT_REDIRECT_URI: &str = "https://127.0.0.1:5000/oauth2callback";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BUCKET: &str = "newsletter_content";
pub const DEFAULT_TASKS_QUEUE: &str =
    "projects/quiknews-470023/locations/us-central1/queues/newsletter-digest";
pub const DEFAULT_PODCAST_ENDPOINT: &str = "http://127.0.0.1:8001/generate";
pub const TASK_HANDLER_PATH: &str = "/tasks/newsletter-digest";

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;
const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub session_secret: Option<String>,
    pub port: Option<u16>,
    pub db_path: Option<String>,
    pub static_dir: Option<String>,
    pub sender_domain: Option<String>,
    pub bucket: Option<String>,
    pub podcast_endpoint: Option<String>,
    pub llm_model: Option<String>,
    pub tts_model: Option<String>,
    pub tasks_queue: Option<String>,
    pub task_handler_url: Option<String>,
    /// Bearer token for storage and task calls; metadata server when unset.
    pub service_token: Option<String>,
    pub http_timeout_secs: Option<u64>,
    pub generation_timeout_secs: Option<u64>,
}

fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("no config dir available"))?
        .join("quiknews"))
}

pub fn config_path() -> Result<PathBuf> {
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push("config.toml");
    Ok(p)
}

pub fn default_db_path() -> Result<PathBuf> {
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push("quiknews.db");
    Ok(p)
}

fn template() -> Config {
    Config {
        client_id: Some("YOUR_CLIENT_ID.apps.googleusercontent.com".to_string()),
        redirect_uri: Some(DEFAULT_REDIRECT_URI.to_string()),
        port: Some(DEFAULT_PORT),
        sender_domain: Some(DEFAULT_SENDER_DOMAIN.to_string()),
        bucket: Some(DEFAULT_BUCKET.to_string()),
        podcast_endpoint: Some(DEFAULT_PODCAST_ENDPOINT.to_string()),
        llm_model: Some(DEFAULT_LLM_MODEL.to_string()),
        tts_model: Some(DEFAULT_TTS_MODEL.to_string()),
        ..Config::default()
    }
}

/// Read the config file, writing a template for the user to edit if there
/// is none. A missing file yields an empty config so the environment alone
/// can drive a deployment.
pub fn load_config() -> Result<Config> {
    let path = config_path()?;
    if !path.exists() {
        let tom = toml::to_string_pretty(&template())?;
        match fs::write(&path, tom) {
            Ok(()) => info!("created template config at {}", path.display()),
            Err(e) => warn!("could not write template config {}: {e}", path.display()),
        }
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&path)?;
    let cfg: Config =
        toml::from_str(&s).with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// File config with environment overrides applied.
pub fn load() -> Result<Config> {
    let mut cfg = load_config()?;
    cfg.apply_env(|key| std::env::var(key).ok())?;
    Ok(cfg)
}

impl Config {
    /// Overlay values from `lookup`, normally the process environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let strings = [
            ("GOOGLE_CLIENT_ID", &mut self.client_id),
            ("GOOGLE_CLIENT_SECRET", &mut self.client_secret),
            ("OAUTH_REDIRECT_URI", &mut self.redirect_uri),
            ("SESSION_SECRET", &mut self.session_secret),
            ("QUIKNEWS_DB_PATH", &mut self.db_path),
            ("QUIKNEWS_STATIC_DIR", &mut self.static_dir),
            ("QUIKNEWS_SENDER_DOMAIN", &mut self.sender_domain),
            ("QUIKNEWS_BUCKET", &mut self.bucket),
            ("QUIKNEWS_PODCAST_ENDPOINT", &mut self.podcast_endpoint),
            ("QUIKNEWS_LLM_MODEL", &mut self.llm_model),
            ("QUIKNEWS_TTS_MODEL", &mut self.tts_model),
            ("QUIKNEWS_TASKS_QUEUE", &mut self.tasks_queue),
            ("QUIKNEWS_TASK_HANDLER_URL", &mut self.task_handler_url),
            ("QUIKNEWS_SERVICE_TOKEN", &mut self.service_token),
        ];
        for (key, slot) in strings {
            if let Some(v) = get(key) {
                *slot = Some(v);
            }
        }

        if let Some(port) = get("PORT") {
            self.port = Some(port.trim().parse().with_context(|| format!("invalid PORT {port:?}"))?);
        }
        let numbers = [
            ("QUIKNEWS_HTTP_TIMEOUT_SECS", &mut self.http_timeout_secs),
            ("QUIKNEWS_GENERATION_TIMEOUT_SECS", &mut self.generation_timeout_secs),
        ];
        for (key, slot) in numbers {
            if let Some(v) = get(key) {
                *slot = Some(v.trim().parse().with_context(|| format!("invalid {key} {v:?}"))?);
            }
        }
        Ok(())
    }

    /// Client id and secret, the secret falling back to the OS keyring.
    pub fn oauth_client(&self) -> Option<(String, String)> {
        let client_id = self.client_id.clone().filter(|id| !id.is_empty())?;
        let secret = match self.client_secret.clone().filter(|s| !s.is_empty()) {
            Some(secret) => Some(secret),
            None => match token_store::load_client_secret(&client_id) {
                Ok(secret) => secret,
                Err(e) => {
                    warn!("could not read client secret from keyring: {e}");
                    None
                }
            },
        }?;
        Some((client_id, secret))
    }

    pub fn redirect_uri(&self) -> &str {
        self.redirect_uri.as_deref().unwrap_or(DEFAULT_REDIRECT_URI)
    }

    /// Cookies get `Secure` when the app is reached over https.
    pub fn secure_cookies(&self) -> bool {
        self.redirect_uri().starts_with("https://")
    }

    /// Configured signing secret, else a random one for this process only.
    pub fn session_secret(&self) -> String {
        match self.session_secret.as_deref() {
            Some(secret) if !secret.is_empty() => secret.to_string(),
            _ => {
                warn!("SESSION_SECRET not set; sessions will not survive a restart");
                CsrfToken::new_random_len(32).secret().clone()
            }
        }
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.db_path {
            Some(p) => Ok(PathBuf::from(p)),
            None => default_db_path(),
        }
    }

    pub fn static_dir(&self) -> PathBuf {
        PathBuf::from(self.static_dir.as_deref().unwrap_or("static"))
    }

    pub fn sender_domain(&self) -> &str {
        self.sender_domain.as_deref().unwrap_or(DEFAULT_SENDER_DOMAIN)
    }

    pub fn bucket(&self) -> &str {
        self.bucket.as_deref().unwrap_or(DEFAULT_BUCKET)
    }

    pub fn podcast_endpoint(&self) -> &str {
        self.podcast_endpoint.as_deref().unwrap_or(DEFAULT_PODCAST_ENDPOINT)
    }

    pub fn llm_model(&self) -> &str {
        self.llm_model.as_deref().unwrap_or(DEFAULT_LLM_MODEL)
    }

    pub fn tts_model(&self) -> &str {
        self.tts_model.as_deref().unwrap_or(DEFAULT_TTS_MODEL)
    }

    pub fn tasks_queue(&self) -> &str {
        self.tasks_queue.as_deref().unwrap_or(DEFAULT_TASKS_QUEUE)
    }

    /// Where queued tasks are delivered; defaults to this app's own origin.
    pub fn task_handler_url(&self) -> Result<String> {
        if let Some(url) = &self.task_handler_url {
            return Ok(url.clone());
        }
        let redirect = Url::parse(self.redirect_uri())
            .with_context(|| format!("invalid redirect uri {}", self.redirect_uri()))?;
        Ok(redirect.join(TASK_HANDLER_PATH)?.to_string())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS))
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(
            self.generation_timeout_secs
                .unwrap_or(DEFAULT_GENERATION_TIMEOUT_SECS),
        )
    }

    pub fn digest_settings(&self) -> DigestSettings {
        let dir = self.static_dir();
        DigestSettings {
            sender_domain: self.sender_domain().to_string(),
            text_path: dir.join(TRANSCRIPT_FILE),
            audio_path: dir.join(AUDIO_FILE),
        }
    }
}
