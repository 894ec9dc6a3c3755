use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::auth::oauth::TokenRefresher;
use crate::domain::credential::{Credential, CredentialState};
use crate::error::Error;
use crate::store::repo::CredentialStore;

/// Loads per-identity credentials and keeps them usable.
pub struct CredentialManager<'a> {
    store: &'a dyn CredentialStore,
    refresher: &'a dyn TokenRefresher,
}

impl<'a> CredentialManager<'a> {
    pub fn new(store: &'a dyn CredentialStore, refresher: &'a dyn TokenRefresher) -> Self {
        Self { store, refresher }
    }

    pub fn state(&self, identity: &str, now: DateTime<Utc>) -> Result<CredentialState, Error> {
        Ok(CredentialState::classify(self.store.load(identity)?, now))
    }

    /// Returns a valid credential, refreshing and writing back if it expired.
    pub fn authorized(&self, identity: &str) -> Result<Credential, Error> {
        self.authorized_at(identity, Utc::now())
    }

    pub fn authorized_at(&self, identity: &str, now: DateTime<Utc>) -> Result<Credential, Error> {
        match self.state(identity, now)? {
            CredentialState::Valid(credential) => Ok(credential),
            CredentialState::ExpiredRefreshable(stale) => {
                debug!("access token for {identity} expired; refreshing");
                let fresh = self.refresher.refresh(&stale)?;
                self.store.save(identity, &fresh)?;
                info!("refreshed credential for {identity}");
                Ok(fresh)
            }
            CredentialState::ExpiredTerminal(_) => {
                Err(Error::ReauthorizationRequired(identity.to_string()))
            }
            CredentialState::Absent => Err(Error::NoCredential(identity.to_string())),
        }
    }
}
