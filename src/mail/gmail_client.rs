use anyhow::{Context, Result, anyhow, bail};
use log::debug;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::domain::credential::Credential;
use crate::domain::message::{Message, MessageId};

pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Read access to one authenticated mailbox.
pub trait MailApi {
    /// Ids of every message matching a Gmail search expression.
    fn list_matching(&self, query: &str) -> Result<Vec<MessageId>>;
    /// Headers and full part tree of one message.
    fn fetch_full(&self, id: &str) -> Result<Message>;
}

/// Builds a mailbox client from a usable credential.
pub trait MailConnector {
    fn connect(&self, credential: &Credential) -> Result<Box<dyn MailApi>>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

pub struct GmailClient {
    http: Client,
    base_url: String,
    access_token: String,
}

impl GmailClient {
    pub fn new(http: Client, access_token: impl Into<String>) -> Self {
        Self::with_base_url(http, access_token, GMAIL_API_BASE)
    }

    pub fn with_base_url(
        http: Client,
        access_token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .with_context(|| format!("request to {url} failed"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            bail!("Gmail API {url} returned {status}: {body}");
        }
        Ok(resp.json()?)
    }
}

impl MailApi for GmailClient {
    fn list_matching(&self, query: &str) -> Result<Vec<MessageId>> {
        let url = format!("{}/messages", self.base_url);
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params = vec![("q", query)];
            if let Some(token) = page_token.as_deref() {
                params.push(("pageToken", token));
            }
            let page: ListResponse = self.get_json(&url, &params)?;
            ids.extend(page.messages.into_iter().map(|m| m.id));

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        debug!("query {query:?} matched {} messages", ids.len());
        Ok(ids)
    }

    fn fetch_full(&self, id: &str) -> Result<Message> {
        if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
            return Err(anyhow!("invalid message id: {id:?}"));
        }
        let url = format!("{}/messages/{}", self.base_url, id);
        self.get_json(&url, &[("format", "full")])
    }
}

/// Connects to the real Gmail API with the credential's access token.
pub struct GmailConnector {
    http: Client,
    base_url: String,
}

impl GmailConnector {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: Client::builder().timeout(timeout).build()?,
            base_url: GMAIL_API_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl MailConnector for GmailConnector {
    fn connect(&self, credential: &Credential) -> Result<Box<dyn MailApi>> {
        Ok(Box::new(GmailClient::with_base_url(
            self.http.clone(),
            credential.token.clone(),
            self.base_url.clone(),
        )))
    }
}
