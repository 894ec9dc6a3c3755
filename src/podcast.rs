use anyhow::{Context, Result, bail};
use log::info;
use reqwest::blocking::Client;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_LLM_MODEL: &str = "gemini-2.5-pro";
pub const DEFAULT_TTS_MODEL: &str = "gemini";

/// Turns digest text into an MP3 at `output`.
pub trait PodcastGenerator {
    fn generate(&self, text: &str, output: &Path) -> Result<()>;
}

/// Shape of the two-host conversation the generator writes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationConfig {
    pub roles_person1: Vec<String>,
    pub roles_person2: Vec<String>,
    pub dialogue_structure: Vec<String>,
    pub user_instructions: Vec<String>,
    pub creativity: f32,
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ConversationConfig {
    fn default() -> Self {
        let roles = ["Economist", "Thought Leader", "Businessman", "Technologist"];
        Self {
            roles_person1: owned(&roles),
            roles_person2: owned(&roles),
            dialogue_structure: owned(&[
                "Topic Introduction",
                "Summary of Key Points",
                "Discussions/Conclusions",
            ]),
            user_instructions: owned(&[
                "Summarizes information by breaking it down into themes and key points",
                "No Filler",
            ]),
            creativity: 0.5,
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    text: &'a str,
    llm_model_name: &'a str,
    tts_model: &'a str,
    conversation_config: &'a ConversationConfig,
}

/// Client for an HTTP podcast-generation service that answers with MP3 bytes.
pub struct HttpPodcastGenerator {
    http: Client,
    endpoint: String,
    llm_model_name: String,
    tts_model: String,
    conversation: ConversationConfig,
}

impl HttpPodcastGenerator {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: Client::builder().timeout(timeout).build()?,
            endpoint: endpoint.into(),
            llm_model_name: DEFAULT_LLM_MODEL.to_string(),
            tts_model: DEFAULT_TTS_MODEL.to_string(),
            conversation: ConversationConfig::default(),
        })
    }

    pub fn with_models(mut self, llm_model_name: &str, tts_model: &str) -> Self {
        self.llm_model_name = llm_model_name.to_string();
        self.tts_model = tts_model.to_string();
        self
    }
}

impl PodcastGenerator for HttpPodcastGenerator {
    fn generate(&self, text: &str, output: &Path) -> Result<()> {
        let request = GenerateRequest {
            text,
            llm_model_name: &self.llm_model_name,
            tts_model: &self.tts_model,
            conversation_config: &self.conversation,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .with_context(|| format!("podcast service at {} unreachable", self.endpoint))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            bail!("podcast service returned {status}: {body}");
        }

        let audio = resp.bytes()?;
        if audio.is_empty() {
            bail!("podcast service returned no audio");
        }
        if let Some(dir) = output.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(output, &audio)
            .with_context(|| format!("failed to write {}", output.display()))?;
        info!("wrote {} bytes of audio to {}", audio.len(), output.display());
        Ok(())
    }
}
