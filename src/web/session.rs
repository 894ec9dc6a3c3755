//! Login state carried in an HMAC-SHA256 signed cookie.
//!
//! The cookie value is `<payload>.<signature>`, both base64url without
//! padding; the payload is the JSON-encoded [`SessionData`]. Nothing is kept
//! server side, so each request decodes its own session.

use anyhow::{Result, anyhow};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::auth::oauth::UserInfo;

pub const SESSION_COOKIE: &str = "session";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pkce_verifier: Option<String>,
    #[serde(default)]
    pub has_gmail_scope: bool,
}

impl SessionData {
    pub fn logged_in(&self) -> bool {
        self.user.is_some()
    }
}

#[derive(Clone)]
pub struct SessionCodec {
    key: Vec<u8>,
    secure: bool,
}

impl SessionCodec {
    /// `secure` adds the `Secure` attribute; set it when served over https.
    pub fn new(secret: &[u8], secure: bool) -> Self {
        Self {
            key: secret.to_vec(),
            secure,
        }
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.key).map_err(|e| anyhow!("bad session key: {e}"))
    }

    pub fn encode(&self, data: &SessionData) -> Result<String> {
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(data)?);
        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{payload}.{signature}"))
    }

    /// `None` for anything unsigned, tampered with or malformed.
    pub fn decode(&self, value: &str) -> Option<SessionData> {
        let (payload, signature) = value.split_once('.')?;
        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;
        let mut mac = self.mac().ok()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).ok()?;

        let json = URL_SAFE_NO_PAD.decode(payload).ok()?;
        serde_json::from_slice(&json).ok()
    }

    pub fn set_cookie(&self, data: &SessionData) -> Result<String> {
        Ok(format!(
            "{SESSION_COOKIE}={}; {}",
            self.encode(data)?,
            self.attributes()
        ))
    }

    pub fn clear_cookie(&self) -> String {
        format!("{SESSION_COOKIE}=; Max-Age=0; {}", self.attributes())
    }

    fn attributes(&self) -> &'static str {
        if self.secure {
            "Path=/; HttpOnly; SameSite=Lax; Secure"
        } else {
            "Path=/; HttpOnly; SameSite=Lax"
        }
    }
}
