//! Session context: the single source of truth for "who is logged in".
//!
//! Memory and persisted storage are always updated under the same write lock, so
//! readers never observe a session that storage disagrees with.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::StorageConfig;
use crate::error::{ClientError, ClientResult};
use crate::models::session::Session;
use crate::models::user::User;
use crate::storage::SessionStore;

pub struct SessionContext {
    state: RwLock<Session>,
    store: Arc<dyn SessionStore>,
    token_key: String,
    user_key: String,
    login_generation: AtomicU64,
}

impl SessionContext {
    pub fn new(store: Arc<dyn SessionStore>, config: &StorageConfig) -> Self {
        Self {
            state: RwLock::new(Session::anonymous()),
            store,
            token_key: config.token_key.clone(),
            user_key: config.user_key.clone(),
            login_generation: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> Session {
        self.read().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.read().token().map(str::to_string)
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_authenticated()
    }

    /// Replace the session, persisting token and user together
    pub fn establish(&self, session: Session) -> ClientResult<()> {
        let mut state = self.write();
        self.persist(&session)?;
        *state = session;
        Ok(())
    }

    /// Replace the cached user of the current session
    pub fn update_user(&self, user: User) -> ClientResult<()> {
        let mut state = self.write();
        if !state.is_authenticated() {
            return Err(ClientError::Authentication("No active session".to_string()));
        }
        let mut next = state.clone();
        next.set_user(Some(user));
        self.persist(&next)?;
        *state = next;
        Ok(())
    }

    /// Swap the token after a refresh, keeping the cached user. Nothing changes and
    /// `false` is returned when the session no longer holds `expected`.
    pub fn replace_token(&self, expected: &str, token: String) -> ClientResult<bool> {
        let mut state = self.write();
        if state.token() != Some(expected) {
            return Ok(false);
        }
        let mut next = state.clone();
        next.set_token(token);
        if !next.is_authenticated() {
            return Err(ClientError::Authentication("Refreshed token is empty".to_string()));
        }
        self.persist(&next)?;
        *state = next;
        Ok(true)
    }

    /// Drop the session from memory and storage. Never fails; storage errors are logged.
    /// Returns whether a session was active.
    pub fn clear(&self) -> bool {
        let mut state = self.write();
        self.clear_locked(&mut state)
    }

    /// Clear only if the session still holds `expected` (`None` meaning anonymous).
    /// Returns `false` when a different session has been established since.
    pub fn clear_if_current(&self, expected: Option<&str>) -> bool {
        let mut state = self.write();
        if state.token() != expected {
            return false;
        }
        self.clear_locked(&mut state);
        true
    }

    fn clear_locked(&self, state: &mut Session) -> bool {
        let was_authenticated = state.is_authenticated();
        *state = Session::anonymous();
        for key in [&self.token_key, &self.user_key] {
            if let Err(e) = self.store.remove(key) {
                tracing::error!("Failed to remove '{}' from session storage: {}", key, e);
            }
        }
        was_authenticated
    }

    /// Load the persisted session into memory. Token and user are restored together:
    /// a user without a token is discarded.
    pub fn rehydrate(&self) -> ClientResult<Session> {
        let mut state = self.write();

        let token = self.store.get(&self.token_key)?;
        let user = match self.store.get(&self.user_key)? {
            Some(raw) => match serde_json::from_str::<User>(&raw) {
                Ok(user) => Some(user),
                Err(e) => {
                    tracing::warn!("Discarding unreadable cached user: {}", e);
                    None
                }
            },
            None => None,
        };

        let session = Session::new(token, user);
        if !session.is_authenticated() {
            // Leftovers from an interrupted logout
            self.store.remove(&self.token_key)?;
            self.store.remove(&self.user_key)?;
            *state = Session::anonymous();
            return Ok(Session::anonymous());
        }

        *state = session.clone();
        Ok(session)
    }

    /// Start a login attempt; later attempts supersede earlier ones
    pub fn begin_login(&self) -> u64 {
        self.login_generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Establish `session` only if `generation` is still the latest login attempt
    pub fn establish_login(&self, generation: u64, session: Session) -> ClientResult<()> {
        let mut state = self.write();
        if self.login_generation.load(Ordering::SeqCst) != generation {
            return Err(ClientError::Superseded);
        }
        self.persist(&session)?;
        *state = session;
        Ok(())
    }

    fn persist(&self, session: &Session) -> ClientResult<()> {
        match session.token() {
            Some(token) => self.store.set(&self.token_key, token)?,
            None => self.store.remove(&self.token_key)?,
        }
        match session.user() {
            Some(user) => {
                let raw = serde_json::to_string(user).map_err(|e| {
                    ClientError::Storage(format!("Failed to serialize user: {}", e))
                })?;
                self.store.set(&self.user_key, &raw)?
            }
            None => self.store.remove(&self.user_key)?,
        }
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, Session> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Session> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
