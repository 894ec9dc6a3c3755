use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Duration, Utc};
use log::debug;
use oauth2::basic::{
    BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
    BasicTokenType,
};
use oauth2::reqwest::http_client;
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, Client, ClientId, ClientSecret, CsrfToken,
    ExtraTokenFields, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken, Scope,
    StandardRevocableToken, StandardTokenResponse, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::credential::{Credential, GOOGLE_TOKEN_URI};

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
pub const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";
pub const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

/// Identity scopes so we know who logged in, plus read-only Gmail.
pub const SCOPES: &[&str] = &[
    "openid",
    "https://www.googleapis.com/auth/userinfo.email",
    "https://www.googleapis.com/auth/userinfo.profile",
    GMAIL_READONLY_SCOPE,
];

/// Google returns an OpenID `id_token` next to the standard fields.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct IdTokenFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl ExtraTokenFields for IdTokenFields {}

pub type GoogleTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;

type GoogleClient = Client<
    BasicErrorResponse,
    GoogleTokenResponse,
    BasicTokenType,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
>;

/// Where to send the browser, plus what the callback must check.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: Url,
    pub state: String,
    pub pkce_verifier: String,
}

/// Result of a successful code exchange.
#[derive(Debug, Clone)]
pub struct Grant {
    pub credential: Credential,
    pub id_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Interactive authorization against the identity provider.
pub trait IdentityProvider {
    fn authorization_request(&self) -> Result<AuthorizationRequest>;
    fn exchange_code(&self, code: &str, pkce_verifier: &str) -> Result<Grant>;
    /// Who the grant belongs to: a verified ID token, else the userinfo endpoint.
    fn user_info(&self, grant: &Grant) -> Result<UserInfo>;
}

/// Exchanges a refresh token for a new access token.
pub trait TokenRefresher {
    fn refresh(&self, credential: &Credential) -> Result<Credential>;
}

#[derive(Debug, Clone)]
pub struct OAuthSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

pub struct GoogleOAuth {
    settings: OAuthSettings,
    http: reqwest::blocking::Client,
    tokeninfo_url: String,
    userinfo_url: String,
}

impl GoogleOAuth {
    pub fn new(settings: OAuthSettings, http: reqwest::blocking::Client) -> Self {
        Self {
            settings,
            http,
            tokeninfo_url: GOOGLE_TOKENINFO_URL.to_string(),
            userinfo_url: GOOGLE_USERINFO_URL.to_string(),
        }
    }

    pub fn with_identity_endpoints(
        mut self,
        tokeninfo_url: impl Into<String>,
        userinfo_url: impl Into<String>,
    ) -> Self {
        self.tokeninfo_url = tokeninfo_url.into();
        self.userinfo_url = userinfo_url.into();
        self
    }

    fn client(&self) -> Result<GoogleClient> {
        let client = build_client(
            &self.settings.client_id,
            &self.settings.client_secret,
            GOOGLE_TOKEN_URI,
        )?
        .set_redirect_uri(RedirectUrl::new(self.settings.redirect_uri.clone())?);
        Ok(client)
    }

    fn verify_id_token(&self, id_token: &str) -> Result<UserInfo> {
        #[derive(Deserialize)]
        struct TokenInfo {
            aud: String,
            #[serde(default)]
            email: Option<String>,
            #[serde(default)]
            name: Option<String>,
        }

        let resp = self
            .http
            .get(&self.tokeninfo_url)
            .query(&[("id_token", id_token)])
            .send()
            .context("tokeninfo request failed")?;
        if !resp.status().is_success() {
            bail!("ID token rejected ({})", resp.status());
        }
        let info: TokenInfo = resp.json()?;
        if info.aud != self.settings.client_id {
            bail!("ID token audience {} does not match this client", info.aud);
        }
        Ok(UserInfo {
            email: info.email,
            name: info.name,
        })
    }

    fn fetch_userinfo(&self, access_token: &str) -> Result<UserInfo> {
        let resp = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .context("userinfo request failed")?;
        if !resp.status().is_success() {
            bail!("userinfo endpoint returned {}", resp.status());
        }
        Ok(resp.json()?)
    }
}

fn build_client(client_id: &str, client_secret: &str, token_uri: &str) -> Result<GoogleClient> {
    Ok(GoogleClient::new(
        ClientId::new(client_id.to_string()),
        Some(ClientSecret::new(client_secret.to_string())),
        AuthUrl::new(GOOGLE_AUTH_URL.to_string())?,
        Some(TokenUrl::new(token_uri.to_string())?),
    )
    .set_auth_type(AuthType::RequestBody))
}

impl IdentityProvider for GoogleOAuth {
    fn authorization_request(&self) -> Result<AuthorizationRequest> {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let (url, state) = self
            .client()?
            .authorize_url(CsrfToken::new_random)
            .add_scopes(SCOPES.iter().map(|s| Scope::new(s.to_string())))
            .add_extra_param("access_type", "offline")
            .add_extra_param("include_granted_scopes", "true")
            // forces a refresh token on every consent
            .add_extra_param("prompt", "consent")
            .set_pkce_challenge(pkce_challenge)
            .url();

        Ok(AuthorizationRequest {
            url,
            state: state.secret().clone(),
            pkce_verifier: pkce_verifier.secret().clone(),
        })
    }

    fn exchange_code(&self, code: &str, pkce_verifier: &str) -> Result<Grant> {
        let token = self
            .client()?
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_string()))
            .request(http_client)
            .map_err(|e| anyhow!("token exchange failed: {e}"))?;

        let credential = credential_from_response(
            &token,
            &self.settings.client_id,
            &self.settings.client_secret,
            GOOGLE_TOKEN_URI,
            None,
            Utc::now(),
        );
        Ok(Grant {
            credential,
            id_token: token.extra_fields().id_token.clone(),
        })
    }

    fn user_info(&self, grant: &Grant) -> Result<UserInfo> {
        match &grant.id_token {
            Some(id_token) => self.verify_id_token(id_token),
            None => {
                debug!("no ID token in grant; asking the userinfo endpoint");
                self.fetch_userinfo(&grant.credential.token)
            }
        }
    }
}

/// Refreshes against the token endpoint recorded in the credential itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct OAuthRefresher;

impl TokenRefresher for OAuthRefresher {
    fn refresh(&self, credential: &Credential) -> Result<Credential> {
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .ok_or_else(|| anyhow!("credential has no refresh token"))?;

        let token = build_client(
            &credential.client_id,
            &credential.client_secret,
            &credential.token_uri,
        )?
        .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
        .request(http_client)
        .map_err(|e| anyhow!("token refresh failed: {e}"))?;

        Ok(credential_from_response(
            &token,
            &credential.client_id,
            &credential.client_secret,
            &credential.token_uri,
            Some(credential),
            Utc::now(),
        ))
    }
}

/// Build a credential from a token response. Fields the provider omitted
/// (refresh token, scopes) carry over from `previous` when there is one.
pub fn credential_from_response(
    token: &GoogleTokenResponse,
    client_id: &str,
    client_secret: &str,
    token_uri: &str,
    previous: Option<&Credential>,
    now: DateTime<Utc>,
) -> Credential {
    let refresh_token = token
        .refresh_token()
        .map(|r| r.secret().to_string())
        .or_else(|| previous.and_then(|p| p.refresh_token.clone()));

    let scopes = match (token.scopes(), previous) {
        (Some(granted), _) => granted.iter().map(|s| s.as_str().to_string()).collect(),
        (None, Some(p)) => p.scopes.clone(),
        (None, None) => SCOPES.iter().map(|s| s.to_string()).collect(),
    };

    let expiry = token
        .expires_in()
        .map(|d| now + Duration::seconds(d.as_secs() as i64));

    Credential {
        token: token.access_token().secret().to_string(),
        refresh_token,
        token_uri: token_uri.to_string(),
        client_id: client_id.to_string(),
        client_secret: client_secret.to_string(),
        scopes,
        expiry,
    }
}
