use anyhow::Result;
use quiknews::podcast::PodcastGenerator;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct MockPodcastGenerator {
    /// Digest text of every generation request.
    pub calls: Arc<Mutex<Vec<String>>>,
    /// Fail when the text contains this marker.
    pub fail_on: Option<String>,
}

impl MockPodcastGenerator {
    pub fn failing_on(marker: &str) -> Self {
        Self {
            fail_on: Some(marker.to_string()),
            ..Self::default()
        }
    }
}

impl PodcastGenerator for MockPodcastGenerator {
    fn generate(&self, text: &str, output: &Path) -> Result<()> {
        self.calls.lock().unwrap().push(text.to_string());
        if let Some(marker) = &self.fail_on {
            if text.contains(marker.as_str()) {
                anyhow::bail!("tts quota exceeded");
            }
        }
        fs::write(output, format!("mp3:{}", text.len()))?;
        Ok(())
    }
}
