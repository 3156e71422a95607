//! Email/password auth against the hosted `/auth/v1` endpoints
//!
//! The access token returned at sign-in is installed on the shared
//! [`SupabaseClient`] so row and storage requests run as the user. When a
//! token file is configured the token survives restarts.

use super::client::{check, SupabaseClient};
use crate::database::{AppUser, Profile, ProfilePatch, Store};
use crate::error::{AppError, Result};
use crate::services::auth::{validate_password, AuthProvider};
use crate::services::profile::validate_profile_patch;
use crate::storage::write_atomic;
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::watch;

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    email: Option<String>,
}

/// Body of `/signup` and `/token`. Sign-up without auto-confirm returns the
/// bare user instead of a session.
#[derive(Debug, Deserialize)]
struct AuthResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    user: Option<AuthUser>,
    id: Option<String>,
    email: Option<String>,
}

impl AuthResponse {
    fn into_parts(self) -> Result<(AuthUser, Option<StoredToken>)> {
        let token = self.access_token.map(|access_token| StoredToken {
            access_token,
            refresh_token: self.refresh_token,
        });

        let user = match (self.user, self.id) {
            (Some(user), _) => user,
            (None, Some(id)) => AuthUser {
                id,
                email: self.email,
            },
            (None, None) => {
                return Err(AppError::Auth("auth response contained no user".to_string()))
            }
        };

        Ok((user, token))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoredToken {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

fn validate_email(email: &str) -> Result<()> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(AppError::Validation(format!("invalid email address: {}", email))),
    }
}

/// Hosted email/password accounts with a `profiles` row per user
pub struct HostedAuth {
    client: SupabaseClient,
    token_file: Option<PathBuf>,
    events: watch::Sender<Option<AppUser>>,
}

impl HostedAuth {
    pub fn new(client: SupabaseClient, token_file: Option<PathBuf>) -> Self {
        let (events, _) = watch::channel(None);
        Self {
            client,
            token_file,
            events,
        }
    }

    /// Reinstall the token saved by a previous sign-in. Returns whether one
    /// was found.
    pub async fn restore_token(&self) -> Result<bool> {
        let Some(path) = self.token_file.as_ref().filter(|p| p.exists()) else {
            return Ok(false);
        };

        let content = fs::read_to_string(path).await?;
        let token: StoredToken = serde_json::from_str(&content)
            .map_err(|e| AppError::Generic(format!("Failed to parse auth token: {}", e)))?;

        self.client.set_access_token(Some(token.access_token)).await;
        tracing::debug!("Restored access token from {:?}", path);

        Ok(true)
    }

    async fn install_token(&self, token: Option<StoredToken>) -> Result<()> {
        self.client
            .set_access_token(token.as_ref().map(|t| t.access_token.clone()))
            .await;

        let Some(path) = &self.token_file else {
            return Ok(());
        };

        match token {
            Some(token) => {
                let content = serde_json::to_string_pretty(&token)?;
                write_atomic(path, content.as_bytes()).await?;
            }
            None => match fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            },
        }

        Ok(())
    }

    async fn post_credentials(
        &self,
        path: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse> {
        let response = self
            .client
            .request(Method::POST, &self.client.auth_url(path))
            .await
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let response = check(response).await.map_err(|e| match e {
            AppError::Backend { message, .. } => AppError::Auth(message),
            other => other,
        })?;

        Ok(response.json().await?)
    }

    /// Profile row of `user_id`, created on first sign-in
    async fn ensure_profile(&self, user_id: &str) -> Result<Profile> {
        if let Some(profile) = self.client.get_profile(user_id).await? {
            return Ok(profile);
        }

        tracing::info!("Creating profile for user: {}", user_id);
        self.client.insert_profile(user_id, None).await
    }

    fn current_email(&self) -> Option<String> {
        self.events.borrow().as_ref().and_then(|u| u.email.clone())
    }
}

#[async_trait]
impl AuthProvider for HostedAuth {
    async fn sign_up(&self, email: &str, password: &str) -> Result<AppUser> {
        let email = email.trim();
        validate_email(email)?;
        validate_password(password)?;

        let body = self.post_credentials("signup", email, password).await?;
        let (user, token) = body.into_parts()?;
        tracing::info!("Registered hosted user: {}", user.id);

        // Projects with email confirmation hand out no session yet
        if token.is_none() {
            return Err(AppError::Auth(format!(
                "account created; confirm {} before signing in",
                email
            )));
        }
        self.install_token(token).await?;

        let profile = self.ensure_profile(&user.id).await?;
        let app_user = AppUser::from_profile(profile, user.email.or(Some(email.to_string())));

        self.events.send_replace(Some(app_user.clone()));
        Ok(app_user)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AppUser> {
        let email = email.trim();

        let body = self
            .post_credentials("token?grant_type=password", email, password)
            .await?;
        let (user, token) = body.into_parts()?;

        if token.is_none() {
            return Err(AppError::Auth("sign-in returned no session".to_string()));
        }
        self.install_token(token).await?;

        // Load or create the profile row
        let profile = self.ensure_profile(&user.id).await?;
        let app_user = AppUser::from_profile(profile, user.email.or(Some(email.to_string())));
        tracing::info!("Signed in hosted user: {}", app_user.id);

        self.events.send_replace(Some(app_user.clone()));
        Ok(app_user)
    }

    async fn sign_out(&self) -> Result<()> {
        let had_token = self.client.access_token().await.is_some();

        let result = if had_token {
            match self
                .client
                .request(Method::POST, &self.client.auth_url("logout"))
                .await
                .send()
                .await
            {
                Ok(response) => check(response).await.map(|_| ()),
                Err(e) => Err(e.into()),
            }
        } else {
            Ok(())
        };

        // Forget the token even when the server call failed
        self.install_token(None).await?;
        self.events.send_replace(None);

        result
    }

    async fn refresh(&self, user_id: &str) -> Result<Option<AppUser>> {
        let profile = self.client.get_profile(user_id).await?;
        Ok(profile.map(|p| AppUser::from_profile(p, self.current_email())))
    }

    async fn update_profile(&self, user_id: &str, patch: &ProfilePatch) -> Result<Option<AppUser>> {
        validate_profile_patch(patch)?;

        let updated = self
            .client
            .update_profile(user_id, patch)
            .await?
            .map(|p| AppUser::from_profile(p, self.current_email()));

        if let Some(user) = &updated {
            self.events.send_replace(Some(user.clone()));
        }

        Ok(updated)
    }

    fn events(&self) -> watch::Receiver<Option<AppUser>> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_session_response() {
        let body: AuthResponse = serde_json::from_str(
            r#"{"access_token":"jwt","token_type":"bearer","refresh_token":"r1",
                "user":{"id":"u1","email":"a@b.co"}}"#,
        )
        .unwrap();

        let (user, token) = body.into_parts().unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(token.unwrap().refresh_token.as_deref(), Some("r1"));
    }

    #[test]
    fn test_unconfirmed_signup_response() {
        let body: AuthResponse =
            serde_json::from_str(r#"{"id":"u2","email":"c@d.co","confirmation_sent_at":"x"}"#)
                .unwrap();

        let (user, token) = body.into_parts().unwrap();
        assert_eq!(user.id, "u2");
        assert_eq!(user.email.as_deref(), Some("c@d.co"));
        assert!(token.is_none());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("ann@example.com").is_ok());
        assert!(validate_email("ann@localhost").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("ann").is_err());
    }

    #[tokio::test]
    async fn test_sign_up_validates_before_network() {
        let client = SupabaseClient::new("http://127.0.0.1:9", "anon").unwrap();
        let auth = HostedAuth::new(client, None);

        assert!(matches!(
            auth.sign_up("not-an-email", "secret1").await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            auth.sign_up("a@b.co", "123").await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_token_file_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state").join("auth_token.json");
        let client = SupabaseClient::new("http://127.0.0.1:9", "anon").unwrap();

        let auth = HostedAuth::new(client.clone(), Some(path.clone()));
        assert!(!auth.restore_token().await.unwrap());

        auth.install_token(Some(StoredToken {
            access_token: "jwt".to_string(),
            refresh_token: None,
        }))
        .await
        .unwrap();
        assert!(path.exists());
        assert_eq!(std::fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);

        client.set_access_token(None).await;
        let restored = HostedAuth::new(client.clone(), Some(path.clone()));
        assert!(restored.restore_token().await.unwrap());
        assert_eq!(client.access_token().await.as_deref(), Some("jwt"));

        restored.install_token(None).await.unwrap();
        assert!(!path.exists());
        assert!(client.access_token().await.is_none());
    }

    #[tokio::test]
    async fn test_sign_out_without_token_is_local() {
        let client = SupabaseClient::new("http://127.0.0.1:9", "anon").unwrap();
        let auth = HostedAuth::new(client, None);
        let events = auth.events();

        auth.sign_out().await.unwrap();
        assert!(events.borrow().is_none());
    }
}
