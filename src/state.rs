use std::sync::Arc;

use hmac::digest::InvalidLength;

use crate::auth::{CookieSigner, Credentials, UserRegistry};
use crate::traits::ItemStore;

/// Everything request handlers share
pub struct AppState {
    pub store: Arc<dyn ItemStore>,
    pub users: UserRegistry,
    pub signer: CookieSigner,
}

impl AppState {
    /// Build the shared state around any store.
    /// `secret` keys both the session cookies and the password digests
    pub fn new(store: Arc<dyn ItemStore>, secret: &[u8]) -> Result<Arc<Self>, InvalidLength> {
        Ok(Arc::new(Self {
            store,
            users: UserRegistry::new(secret)?,
            signer: CookieSigner::new(secret)?,
        }))
    }

    /// Same as [`AppState::new`], with an initial user
    pub fn with_user(store: Arc<dyn ItemStore>, secret: &[u8], user: &Credentials) -> Result<Arc<Self>, InvalidLength> {
        let state = Self::new(store, secret)?;
        if state.users.upsert(user, None) == false {
            log::warn!("Unable to register initial user {:?}", user.username);
        }
        Ok(state)
    }
}
