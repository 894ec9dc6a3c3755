use anyhow::{Result, anyhow};
use quiknews::auth::oauth::{AuthorizationRequest, Grant, IdentityProvider, UserInfo};
use quiknews::domain::credential::Credential;
use std::sync::{Arc, Mutex};
use url::Url;

pub const AUTH_STATE: &str = "state-123";
pub const PKCE_VERIFIER: &str = "verifier-abc";

#[derive(Clone)]
pub struct MockIdentityProvider {
    pub credential: Credential,
    pub user: Option<UserInfo>,
    pub exchange_error: Option<String>,
    /// (code, pkce verifier) of every exchange.
    pub exchanges: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockIdentityProvider {
    pub fn new(credential: Credential, user: Option<UserInfo>) -> Self {
        Self {
            credential,
            user,
            exchange_error: None,
            exchanges: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl IdentityProvider for MockIdentityProvider {
    fn authorization_request(&self) -> Result<AuthorizationRequest> {
        Ok(AuthorizationRequest {
            url: Url::parse(&format!(
                "https://accounts.example/auth?state={AUTH_STATE}&access_type=offline&prompt=consent"
            ))?,
            state: AUTH_STATE.to_string(),
            pkce_verifier: PKCE_VERIFIER.to_string(),
        })
    }

    fn exchange_code(&self, code: &str, pkce_verifier: &str) -> Result<Grant> {
        self.exchanges
            .lock()
            .unwrap()
            .push((code.to_string(), pkce_verifier.to_string()));
        if let Some(msg) = &self.exchange_error {
            return Err(anyhow!("{msg}"));
        }
        Ok(Grant {
            credential: self.credential.clone(),
            id_token: Some("header.payload.sig".into()),
        })
    }

    fn user_info(&self, _grant: &Grant) -> Result<UserInfo> {
        self.user
            .clone()
            .ok_or_else(|| anyhow!("ID token audience mismatch"))
    }
}
