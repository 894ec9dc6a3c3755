use anyhow::{Context, Result, bail};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use log::info;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::cloud::metadata::ServiceTokenSource;

pub const CLOUD_TASKS_BASE: &str = "https://cloudtasks.googleapis.com/v2";

/// Header Cloud Tasks sets on every task delivery.
pub const QUEUE_HEADER: &str = "X-CloudTasks-QueueName";

/// Queues a run of the newsletter digest task.
pub trait TaskQueue {
    /// Returns the created task's name.
    fn enqueue_digest(&self) -> Result<String>;
}

pub struct CloudTasksQueue {
    http: Client,
    base_url: String,
    /// `projects/<p>/locations/<l>/queues/<q>`
    queue_path: String,
    handler_url: String,
    tokens: ServiceTokenSource,
}

#[derive(Deserialize)]
struct CreatedTask {
    name: String,
}

impl CloudTasksQueue {
    pub fn new(
        queue_path: impl Into<String>,
        handler_url: impl Into<String>,
        tokens: ServiceTokenSource,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            http: Client::builder().timeout(timeout).build()?,
            base_url: CLOUD_TASKS_BASE.to_string(),
            queue_path: queue_path.into(),
            handler_url: handler_url.into(),
            tokens,
        })
    }

    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = base.into();
        self
    }
}

impl TaskQueue for CloudTasksQueue {
    fn enqueue_digest(&self) -> Result<String> {
        let url = format!("{}/{}/tasks", self.base_url, self.queue_path);
        let task = json!({
            "task": {
                "httpRequest": {
                    "httpMethod": "POST",
                    "url": self.handler_url,
                    "headers": { "Content-Type": "application/json" },
                    "body": STANDARD.encode(b"{}"),
                }
            }
        });

        let resp = self
            .http
            .post(&url)
            .bearer_auth(self.tokens.token(&self.http)?)
            .json(&task)
            .send()
            .context("task enqueue request failed")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            bail!("Cloud Tasks returned {status}: {body}");
        }

        let created: CreatedTask = resp.json()?;
        info!("enqueued digest task {}", created.name);
        Ok(created.name)
    }
}
