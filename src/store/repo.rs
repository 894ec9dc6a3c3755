use anyhow::Result;

use crate::domain::credential::Credential;

/// Per-identity credential persistence, keyed by email address.
pub trait CredentialStore: Send + Sync {
    fn load(&self, identity: &str) -> Result<Option<Credential>>;
    /// Insert or overwrite the identity's credential.
    fn save(&self, identity: &str, credential: &Credential) -> Result<()>;
    /// Every identity with a stored credential, in email order.
    fn identities(&self) -> Result<Vec<String>>;
}
