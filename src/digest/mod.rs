use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone};
use log::{debug, info};
use std::fs;
use std::path::PathBuf;

use crate::domain::digest::{Digest, DigestEntry};
use crate::mail::clean::clean_html_content;
use crate::mail::decoders::message_body;
use crate::mail::gmail_client::MailApi;

pub const DEFAULT_SENDER_DOMAIN: &str = "axios.com";

/// Gmail search selecting one sender domain's mail since `after_epoch`.
pub fn build_query(sender_domain: &str, after_epoch: i64) -> String {
    format!("from:@{sender_domain} after:{after_epoch}")
}

/// Unix timestamp of the most recent midnight in `now`'s timezone.
pub fn midnight_epoch<Tz: TimeZone>(now: &DateTime<Tz>) -> i64 {
    let midnight = now.date_naive().and_time(chrono::NaiveTime::MIN);
    match now.timezone().from_local_datetime(&midnight).earliest() {
        Some(local) => local.timestamp(),
        // midnight skipped by a DST jump; count back from now instead
        None => {
            let elapsed = now.naive_local() - midnight;
            now.timestamp() - elapsed.num_seconds()
        }
    }
}

/// Collects one day's newsletters from a mailbox.
pub struct DigestAssembler<'a> {
    mail: &'a dyn MailApi,
    sender_domain: &'a str,
    text_path: PathBuf,
}

impl<'a> DigestAssembler<'a> {
    pub fn new(mail: &'a dyn MailApi, sender_domain: &'a str, text_path: impl Into<PathBuf>) -> Self {
        Self {
            mail,
            sender_domain,
            text_path: text_path.into(),
        }
    }

    /// Fetch, extract and clean every matching message received after
    /// `after_epoch`. `None` when nothing matched; nothing is written then.
    pub fn assemble(&self, after_epoch: i64) -> Result<Option<Digest>> {
        let query = build_query(self.sender_domain, after_epoch);
        info!("collecting newsletters: {query}");

        let ids = self.mail.list_matching(&query)?;
        if ids.is_empty() {
            info!("no newsletters since {after_epoch}");
            return Ok(None);
        }

        let mut entries = Vec::with_capacity(ids.len());
        for id in &ids {
            let message = self.mail.fetch_full(id)?;
            let body = message_body(&message.payload)
                .with_context(|| format!("failed to extract body of message {id}"))?;
            debug!("message {id}: {} bytes of body text", body.len());

            entries.push(DigestEntry {
                subject: message.header("Subject").to_string(),
                sender: message.header("From").to_string(),
                body: clean_html_content(body.trim()),
            });
        }

        let digest = Digest::new(entries);
        fs::write(&self.text_path, &digest.text)
            .with_context(|| format!("failed to write {}", self.text_path.display()))?;
        Ok(Some(digest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message::{Header, Message, MessagePart, PartBody};
    use anyhow::anyhow;
    use base64::Engine as _;
    use chrono::{FixedOffset, Utc};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeMailbox {
        messages: Vec<Message>,
        queries: Mutex<Vec<String>>,
    }

    impl MailApi for FakeMailbox {
        fn list_matching(&self, query: &str) -> Result<Vec<String>> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(self.messages.iter().map(|m| m.id.clone()).collect())
        }

        fn fetch_full(&self, id: &str) -> Result<Message> {
            let by_id: HashMap<_, _> = self.messages.iter().map(|m| (m.id.as_str(), m)).collect();
            by_id
                .get(id)
                .map(|m| (*m).clone())
                .ok_or_else(|| anyhow!("no message {id}"))
        }
    }

    fn message(id: &str, subject: Option<&str>, html: &str) -> Message {
        let mut headers = vec![Header {
            name: "From".into(),
            value: "Axios AM <am@axios.com>".into(),
        }];
        if let Some(s) = subject {
            headers.push(Header {
                name: "Subject".into(),
                value: s.into(),
            });
        }
        Message {
            id: id.into(),
            thread_id: None,
            payload: MessagePart {
                mime_type: "text/html".into(),
                headers,
                body: Some(PartBody {
                    data: Some(base64::engine::general_purpose::URL_SAFE.encode(html)),
                    size: html.len() as u64,
                }),
                parts: vec![],
            },
        }
    }

    #[test]
    fn query_uses_domain_and_timestamp() {
        assert_eq!(build_query("axios.com", 1700000000), "from:@axios.com after:1700000000");
    }

    #[test]
    fn midnight_in_utc_and_offset_zones() {
        // 2023-11-14T22:13:20Z
        let utc = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_eq!(midnight_epoch(&utc), 1_699_920_000);

        // Same instant is already 2023-11-15T03:13:20 at +05:00.
        let plus5 = utc.with_timezone(&FixedOffset::east_opt(5 * 3600).unwrap());
        assert_eq!(midnight_epoch(&plus5), 1_699_988_400);
    }

    #[test]
    fn no_matches_means_no_digest_and_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.txt");
        let mailbox = FakeMailbox::default();

        let result = DigestAssembler::new(&mailbox, "axios.com", &path)
            .assemble(1_700_000_000)
            .unwrap();

        assert!(result.is_none());
        assert!(!path.exists());
        assert_eq!(
            mailbox.queries.lock().unwrap().as_slice(),
            ["from:@axios.com after:1700000000"]
        );
    }

    #[test]
    fn assembles_entries_in_order_and_writes_side_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.txt");
        let mailbox = FakeMailbox {
            messages: vec![
                message("m1", Some("Axios AM"), "<p>Good&nbsp;morning</p>\n\n\n\n<p>Markets</p>"),
                message("m2", None, "Second   issue"),
            ],
            ..Default::default()
        };

        let digest = DigestAssembler::new(&mailbox, "axios.com", &path)
            .assemble(0)
            .unwrap()
            .unwrap();

        assert_eq!(digest.entries.len(), 2);
        assert_eq!(digest.entries[0].subject, "Axios AM");
        assert_eq!(digest.entries[0].sender, "Axios AM <am@axios.com>");
        assert_eq!(digest.entries[0].body, "Good morning\n\nMarkets");
        assert_eq!(digest.entries[1].subject, "");
        assert_eq!(digest.entries[1].body, "Second issue");

        let expected = "NEWSLETTER 1\nGood morning\n\nMarketsNEWSLETTER 2\nSecond issue";
        assert_eq!(digest.text, expected);
        assert_eq!(fs::read_to_string(&path).unwrap(), expected);
    }

    #[test]
    fn fetch_errors_propagate() {
        struct Broken;
        impl MailApi for Broken {
            fn list_matching(&self, _: &str) -> Result<Vec<String>> {
                Ok(vec!["m1".into()])
            }
            fn fetch_full(&self, _: &str) -> Result<Message> {
                Err(anyhow!("503 backend error"))
            }
        }
        let dir = tempfile::tempdir().unwrap();
        let result = DigestAssembler::new(&Broken, "axios.com", dir.path().join("out.txt")).assemble(0);
        assert!(result.is_err());
    }
}
