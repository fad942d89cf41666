use log::info;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::client::utils::session_store::SessionStore;
use crate::common::models::{AuthResponse, Role, UserSummary};
use crate::error::ClientError;

#[derive(Debug, Clone)]
struct Credentials {
    token: String,
    user: UserSummary,
}

/// The one place that knows who is logged in. Built once at startup and
/// handed to the API client and to every view that needs the user.
pub struct Session {
    store: Arc<dyn SessionStore>,
    current: RwLock<Option<Credentials>>,
}

pub type SharedSession = Arc<Session>;

impl Session {
    /// Loads whatever a previous run left in the store.
    pub fn init(store: Arc<dyn SessionStore>) -> SharedSession {
        let current = store.load().map(|(token, user)| Credentials { token, user });
        if let Some(c) = &current {
            info!("[SESSION] Restored session for user {} ({})", c.user.id, c.user.role.as_str());
        }
        Arc::new(Self { store, current: RwLock::new(current) })
    }

    /// Adopts a fresh login/signup answer and persists it.
    pub async fn establish(&self, auth: AuthResponse) -> Result<(), ClientError> {
        self.store.save(&auth.token, &auth.user)?;
        info!("[SESSION] Logged in as {} ({})", auth.user.id, auth.user.role.as_str());
        *self.current.write().await = Some(Credentials { token: auth.token, user: auth.user });
        Ok(())
    }

    /// Forgets the credentials in memory and in the store.
    pub async fn teardown(&self) -> Result<(), ClientError> {
        *self.current.write().await = None;
        self.store.clear()?;
        info!("[SESSION] Logged out");
        Ok(())
    }

    pub async fn token(&self) -> Option<String> {
        self.current.read().await.as_ref().map(|c| c.token.clone())
    }

    pub async fn user(&self) -> Option<UserSummary> {
        self.current.read().await.as_ref().map(|c| c.user.clone())
    }

    pub async fn role(&self) -> Option<Role> {
        self.current.read().await.as_ref().map(|c| c.user.role)
    }

    pub async fn require_user(&self) -> Result<UserSummary, ClientError> {
        self.user().await.ok_or(ClientError::NotAuthenticated)
    }
}
