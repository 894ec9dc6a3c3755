use anyhow::{Result, anyhow};
use keyring::{Entry, Error as KeyringError};

const SERVICE: &str = "quiknews";

/// Save the OAuth client secret into the OS keyring, keyed by client_id
pub fn save_client_secret(client_id: &str, client_secret: &str) -> Result<()> {
    Entry::new(SERVICE, client_id)?
        .set_password(client_secret)
        .map_err(|e| anyhow!(e.to_string()))?;
    Ok(())
}

/// Load the OAuth client secret for client_id, if one was stored
pub fn load_client_secret(client_id: &str) -> Result<Option<String>> {
    match Entry::new(SERVICE, client_id)?.get_password() {
        Ok(v) => Ok(Some(v)),
        Err(KeyringError::NoEntry) => Ok(None),
        Err(e) => Err(anyhow!(e.to_string())),
    }
}
