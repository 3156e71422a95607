//! Session
//!
//! Holds the signed-in identity for the lifetime of the process. The user is
//! persisted to `session.json` so the next start resumes where the last one
//! left off, and auth events raised by the provider are forwarded into the
//! session state by a background task.

use crate::config::SESSION_FILE;
use crate::database::{AppUser, ProfilePatch};
use crate::error::{AppError, Result};
use crate::services::auth::AuthProvider;
use crate::storage::write_atomic;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// On-disk layout of `session.json`; the field name matches `SESSION_USER_KEY`
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedSession {
    #[serde(default)]
    app_user: Option<AppUser>,
}

/// JSON file holding the last signed-in user
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(SESSION_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted user, if any
    pub async fn load(&self) -> Result<Option<AppUser>> {
        if !self.path.exists() {
            tracing::debug!("No session file at {:?}", self.path);
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).await?;
        let session: PersistedSession = serde_json::from_str(&content)
            .map_err(|e| AppError::Generic(format!("Failed to parse session: {}", e)))?;

        Ok(session.app_user)
    }

    /// Persist the user, or clear the file on sign-out
    pub async fn save(&self, user: Option<&AppUser>) -> Result<()> {
        let Some(user) = user else {
            return self.clear().await;
        };

        let session = PersistedSession {
            app_user: Some(user.clone()),
        };
        let content = serde_json::to_string_pretty(&session)?;

        // A crash mid-write must not leave a truncated session behind
        write_atomic(&self.path, content.as_bytes()).await?;
        tracing::debug!("Session saved to {:?}", self.path);

        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::debug!("Session file removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Snapshot published to subscribers
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub user: Option<AppUser>,
    pub loading: bool,
}

/// The current identity plus the operations that change it
pub struct Session {
    auth: Arc<dyn AuthProvider>,
    persistence: Option<SessionStore>,
    state: Arc<watch::Sender<SessionState>>,
    forwarder: JoinHandle<()>,
}

impl Session {
    /// Restore the persisted user and start following provider events.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start(
        auth: Arc<dyn AuthProvider>,
        persistence: Option<SessionStore>,
    ) -> Result<Self> {
        let (state, _) = watch::channel(SessionState {
            user: None,
            loading: true,
        });
        let state = Arc::new(state);

        // Restore the last signed-in user
        let restored = match &persistence {
            Some(store) => match store.load().await {
                Ok(user) => user,
                Err(e) => {
                    tracing::warn!("Ignoring unreadable session file: {}", e);
                    None
                }
            },
            None => None,
        };

        if let Some(user) = &restored {
            tracing::info!("Restored session for user: {}", user.id);
        }

        state.send_modify(|s| {
            s.user = restored;
            s.loading = false;
        });

        // Follow sign-ins and sign-outs raised by the provider
        let forwarder = tokio::spawn(forward_auth_events(
            auth.events(),
            Arc::clone(&state),
            persistence.clone(),
        ));

        Ok(Self {
            auth,
            persistence,
            state,
            forwarder,
        })
    }

    pub fn current_user(&self) -> Option<AppUser> {
        self.state.borrow().user.clone()
    }

    /// The signed-in user, or an auth error when nobody is signed in
    pub fn require_user(&self) -> Result<AppUser> {
        self.current_user()
            .ok_or_else(|| AppError::Auth("not signed in".to_string()))
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub async fn sign_in(&self, identifier: &str, password: &str) -> Result<AppUser> {
        let user = self.auth.sign_in(identifier, password).await?;
        self.set_user(Some(user.clone())).await?;
        Ok(user)
    }

    pub async fn sign_up(&self, identifier: &str, password: &str) -> Result<AppUser> {
        let user = self.auth.sign_up(identifier, password).await?;
        self.set_user(Some(user.clone())).await?;
        Ok(user)
    }

    pub async fn sign_out(&self) -> Result<()> {
        if let Err(e) = self.auth.sign_out().await {
            // The local session is dropped either way
            tracing::warn!("Provider sign-out failed: {}", e);
        }
        self.set_user(None).await
    }

    /// Edit the signed-in user's profile
    pub async fn update_profile(&self, patch: ProfilePatch) -> Result<AppUser> {
        let user = self.require_user()?;

        let updated = self
            .auth
            .update_profile(&user.id, &patch)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", user.id)))?;

        self.set_user(Some(updated.clone())).await?;
        Ok(updated)
    }

    /// Reload the signed-in user from the backend
    pub async fn refresh_profile(&self) -> Result<Option<AppUser>> {
        let Some(user) = self.current_user() else {
            return Ok(None);
        };

        let refreshed = self.auth.refresh(&user.id).await?;
        match &refreshed {
            Some(fresh) => self.set_user(Some(fresh.clone())).await?,
            None => {
                tracing::warn!("User {} no longer exists, signing out", user.id);
                self.set_user(None).await?;
            }
        }

        Ok(refreshed)
    }

    /// Stop following provider events and close the state channel
    pub async fn shutdown(self) {
        let forwarder = self.forwarder;
        forwarder.abort();
        if let Err(e) = forwarder.await {
            if !e.is_cancelled() {
                tracing::error!("Session event task failed: {}", e);
            }
        }
        tracing::debug!("Session shut down");
    }

    async fn set_user(&self, user: Option<AppUser>) -> Result<()> {
        if let Some(store) = &self.persistence {
            store.save(user.as_ref()).await?;
        }
        self.state.send_modify(|s| s.user = user);
        Ok(())
    }
}

async fn forward_auth_events(
    mut events: watch::Receiver<Option<AppUser>>,
    state: Arc<watch::Sender<SessionState>>,
    persistence: Option<SessionStore>,
) {
    while events.changed().await.is_ok() {
        let user = events.borrow_and_update().clone();

        // Already applied by the session itself
        if state.borrow().user == user {
            continue;
        }

        tracing::debug!(
            "Auth event: {}",
            user.as_ref().map(|u| u.id.as_str()).unwrap_or("signed out")
        );

        if let Some(store) = &persistence {
            if let Err(e) = store.save(user.as_ref()).await {
                tracing::warn!("Failed to persist session: {}", e);
            }
        }
        state.send_modify(|s| s.user = user);
    }
}
