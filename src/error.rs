use thiserror::Error;

/// Failures the web layer and the digest task act on.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Missing GOOGLE_CLIENT_ID/SECRET. Set them in the environment or config.toml")]
    MissingClientCredentials,

    #[error("Missing OAuth state")]
    MissingOAuthState,

    #[error("Failed to fetch token: {0}")]
    TokenExchange(String),

    #[error("no stored credential for {0}")]
    NoCredential(String),

    #[error("credential for {0} expired and has no refresh token; sign in again")]
    ReauthorizationRequired(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// HTTP status used when this error ends a request.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::MissingOAuthState => 400,
            Error::TokenExchange(_) => 403,
            Error::NoCredential(_) | Error::ReauthorizationRequired(_) => 401,
            Error::MissingClientCredentials | Error::Other(_) => 500,
        }
    }
}
