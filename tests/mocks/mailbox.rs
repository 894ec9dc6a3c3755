use anyhow::{Result, anyhow};
use base64::Engine as _;
use quiknews::domain::credential::Credential;
use quiknews::domain::message::Message;
use quiknews::mail::gmail_client::{MailApi, MailConnector};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A single-part HTML newsletter as the Gmail API would return it.
pub fn newsletter(id: &str, subject: &str, html: &str) -> Message {
    let data = base64::engine::general_purpose::URL_SAFE.encode(html);
    serde_json::from_value(serde_json::json!({
        "id": id,
        "threadId": id,
        "payload": {
            "mimeType": "text/html",
            "headers": [
                {"name": "Subject", "value": subject},
                {"name": "From", "value": "Axios <news@axios.com>"}
            ],
            "body": {"data": data, "size": html.len()}
        }
    }))
    .unwrap()
}

/// Hands out a mailbox per access token; tokens it does not know fail to connect.
#[derive(Clone, Default)]
pub struct MockMailConnector {
    pub mailboxes: HashMap<String, Vec<Message>>,
    /// Access tokens passed to `connect`, in order.
    pub connected: Arc<Mutex<Vec<String>>>,
    pub queries: Arc<Mutex<Vec<String>>>,
}

impl MockMailConnector {
    pub fn with_mailbox(mut self, token: &str, messages: Vec<Message>) -> Self {
        self.mailboxes.insert(token.to_string(), messages);
        self
    }
}

impl MailConnector for MockMailConnector {
    fn connect(&self, credential: &Credential) -> Result<Box<dyn MailApi>> {
        self.connected.lock().unwrap().push(credential.token.clone());
        let messages = self
            .mailboxes
            .get(&credential.token)
            .cloned()
            .ok_or_else(|| anyhow!("401 Unauthorized for token {}", credential.token))?;
        Ok(Box::new(MockMailbox {
            messages,
            queries: self.queries.clone(),
        }))
    }
}

pub struct MockMailbox {
    messages: Vec<Message>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl MailApi for MockMailbox {
    fn list_matching(&self, query: &str) -> Result<Vec<String>> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self.messages.iter().map(|m| m.id.clone()).collect())
    }

    fn fetch_full(&self, id: &str) -> Result<Message> {
        self.messages
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| anyhow!("404 message {id} not found"))
    }
}
