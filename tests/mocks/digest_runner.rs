use anyhow::Result;
use quiknews::task::{BatchReport, DigestRunner, Published};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct MockDigestRunner {
    pub runs: Arc<Mutex<u32>>,
}

impl DigestRunner for MockDigestRunner {
    fn run_batch(&self) -> Result<BatchReport> {
        *self.runs.lock().unwrap() += 1;
        Ok(BatchReport {
            published: vec![Published {
                identity: "alice@example.com".into(),
                url: "https://storage.test/bucket/static/alice_podcast.mp3".into(),
            }],
            ..BatchReport::default()
        })
    }
}
