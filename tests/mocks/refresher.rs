use anyhow::{Result, anyhow};
use chrono::{Duration, SubsecRound, Utc};
use quiknews::auth::oauth::TokenRefresher;
use quiknews::domain::credential::Credential;
use std::sync::{Arc, Mutex};

/// Swaps the access token for `<old>-refreshed`.
#[derive(Clone, Default)]
pub struct MockRefresher {
    pub calls: Arc<Mutex<Vec<String>>>,
    pub fail: bool,
}

impl TokenRefresher for MockRefresher {
    fn refresh(&self, credential: &Credential) -> Result<Credential> {
        self.calls.lock().unwrap().push(credential.token.clone());
        if self.fail {
            return Err(anyhow!("invalid_grant"));
        }
        Ok(Credential {
            token: format!("{}-refreshed", credential.token),
            expiry: Some((Utc::now() + Duration::hours(1)).trunc_subsecs(0)),
            ..credential.clone()
        })
    }
}
