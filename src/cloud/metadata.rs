use anyhow::{Context, Result, bail};
use reqwest::blocking::Client;
use serde::Deserialize;

pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Bearer token for calls made as the service itself (storage, tasks).
#[derive(Debug, Clone)]
pub enum ServiceTokenSource {
    /// Fixed token from configuration, for local runs.
    Static(String),
    /// The GCE/Cloud Run metadata server.
    Metadata { url: String },
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
}

impl ServiceTokenSource {
    pub fn metadata() -> Self {
        Self::Metadata {
            url: METADATA_TOKEN_URL.to_string(),
        }
    }

    pub fn from_config(static_token: Option<&str>) -> Self {
        match static_token {
            Some(token) if !token.is_empty() => Self::Static(token.to_string()),
            _ => Self::metadata(),
        }
    }

    pub fn token(&self, http: &Client) -> Result<String> {
        match self {
            Self::Static(token) => Ok(token.clone()),
            Self::Metadata { url } => {
                let resp = http
                    .get(url)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .context("metadata server unreachable")?;
                if !resp.status().is_success() {
                    bail!("metadata server returned {}", resp.status());
                }
                let token: MetadataToken = resp.json()?;
                Ok(token.access_token)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tiny_http::{Response, Server};

    #[test]
    fn empty_static_token_falls_back_to_metadata() {
        assert!(matches!(ServiceTokenSource::from_config(Some("")), ServiceTokenSource::Metadata { .. }));
        assert!(matches!(ServiceTokenSource::from_config(None), ServiceTokenSource::Metadata { .. }));
        let source = ServiceTokenSource::from_config(Some("ya29.local"));
        assert_eq!(source.token(&Client::new()).unwrap(), "ya29.local");
    }

    #[test]
    fn metadata_request_carries_flavor_header() {
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let handle = thread::spawn(move || {
            let request = server.recv().unwrap();
            let flavor = request
                .headers()
                .iter()
                .find(|h| h.field.equiv("Metadata-Flavor"))
                .map(|h| h.value.as_str().to_string());
            request
                .respond(Response::from_string(
                    r#"{"access_token":"ya29.meta","expires_in":3599,"token_type":"Bearer"}"#,
                ))
                .unwrap();
            flavor
        });

        let source = ServiceTokenSource::Metadata {
            url: format!("http://{addr}/token"),
        };
        assert_eq!(source.token(&Client::new()).unwrap(), "ya29.meta");
        assert_eq!(handle.join().unwrap().as_deref(), Some("Google"));
    }
}
