use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Google's token endpoint, the default `token_uri` for new credentials.
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens are treated as expired this long before the provider's deadline.
const EXPIRY_SKEW_SECS: i64 = 60;

/// OAuth2 token bundle for one identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
    pub refresh_token: Option<String>,
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    pub scopes: Vec<String>,
    pub expiry: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => now >= expiry - Duration::seconds(EXPIRY_SKEW_SECS),
            None => false,
        }
    }
}

/// Where a stored credential sits in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialState {
    Absent,
    Valid(Credential),
    ExpiredRefreshable(Credential),
    /// Expired with no refresh token: only a fresh interactive grant helps.
    ExpiredTerminal(Credential),
}

impl CredentialState {
    pub fn classify(stored: Option<Credential>, now: DateTime<Utc>) -> Self {
        match stored {
            None => Self::Absent,
            Some(c) if !c.is_expired(now) => Self::Valid(c),
            Some(c) if c.refresh_token.is_some() => Self::ExpiredRefreshable(c),
            Some(c) => Self::ExpiredTerminal(c),
        }
    }
}
