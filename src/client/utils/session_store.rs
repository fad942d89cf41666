use keyring::Entry;
use log::{debug, warn};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::common::models::UserSummary;
use crate::error::ClientError;

const SERVICE: &str = "skilllink_client";
const TOKEN_KEY: &str = "session_token";
const USER_KEY: &str = "session_user";

/// Durable home of the auth token and user summary.
pub trait SessionStore: Send + Sync {
    fn save(&self, token: &str, user: &UserSummary) -> Result<(), ClientError>;
    fn load(&self) -> Option<(String, UserSummary)>;
    fn clear(&self) -> Result<(), ClientError>;
}

/// OS keyring, with an opt-in plain file fallback (`KEYRING_FALLBACK=true`)
/// for machines without a secret service.
pub struct KeyringStore {
    fallback_dir: Option<PathBuf>,
}

impl KeyringStore {
    pub fn new() -> Self {
        let allow_fallback = std::env::var("KEYRING_FALLBACK").unwrap_or_default() == "true";
        Self { fallback_dir: allow_fallback.then(|| PathBuf::from("data")) }
    }

    fn fallback_path(&self, key: &str) -> Option<PathBuf> {
        self.fallback_dir.as_ref().map(|dir| dir.join(format!("{}.txt", key)))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), ClientError> {
        match Entry::new(SERVICE, key).set_password(value) {
            Ok(()) => Ok(()),
            Err(e) => match self.fallback_path(key) {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        let _ = std::fs::create_dir_all(parent);
                    }
                    std::fs::write(&path, value).map_err(|e| ClientError::Session(e.to_string()))?;
                    warn!("[SESSION_STORE] Keyring unavailable, persisted {} to fallback file", key);
                    Ok(())
                }
                None => Err(ClientError::Session(format!("keyring unavailable and file fallback disabled: {}", e))),
            },
        }
    }

    fn read(&self, key: &str) -> Option<String> {
        let value = match Entry::new(SERVICE, key).get_password() {
            Ok(v) => Some(v),
            Err(_) => self
                .fallback_path(key)
                .filter(|p| p.exists())
                .and_then(|p| std::fs::read_to_string(p).ok()),
        };
        value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn remove(&self, key: &str) {
        let _ = Entry::new(SERVICE, key).delete_password();
        if let Some(path) = self.fallback_path(key).filter(|p| p.exists()) {
            let _ = std::fs::remove_file(path);
        }
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for KeyringStore {
    fn save(&self, token: &str, user: &UserSummary) -> Result<(), ClientError> {
        let user_json = serde_json::to_string(user).map_err(|e| ClientError::Session(e.to_string()))?;
        self.write(TOKEN_KEY, token)?;
        self.write(USER_KEY, &user_json)
    }

    fn load(&self) -> Option<(String, UserSummary)> {
        let token = self.read(TOKEN_KEY)?;
        let user = match self.read(USER_KEY).map(|raw| serde_json::from_str::<UserSummary>(&raw)) {
            Some(Ok(user)) => user,
            Some(Err(e)) => {
                debug!("[SESSION_STORE] Stored user summary unreadable: {}", e);
                return None;
            }
            None => return None,
        };
        Some((token, user))
    }

    fn clear(&self) -> Result<(), ClientError> {
        self.remove(TOKEN_KEY);
        self.remove(USER_KEY);
        Ok(())
    }
}

/// Process-local store, used by tests and by throwaway CLI sessions.
#[derive(Default)]
pub struct MemoryStore {
    slot: Mutex<Option<(String, UserSummary)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn save(&self, token: &str, user: &UserSummary) -> Result<(), ClientError> {
        let mut slot = self.slot.lock().map_err(|e| ClientError::Session(e.to_string()))?;
        *slot = Some((token.to_string(), user.clone()));
        Ok(())
    }

    fn load(&self) -> Option<(String, UserSummary)> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }

    fn clear(&self) -> Result<(), ClientError> {
        let mut slot = self.slot.lock().map_err(|e| ClientError::Session(e.to_string()))?;
        *slot = None;
        Ok(())
    }
}
