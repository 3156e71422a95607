//! Authentication
//!
//! [`AuthProvider`] is the seam between the session and whichever backend
//! verifies credentials. [`PhoneAuthService`] keeps accounts in the
//! `app_users` table; the hosted email variant lives in
//! [`crate::remote::HostedAuth`].

use crate::crypto;
use crate::database::{AppUser, NewAppUser, ProfilePatch, Store};
use crate::error::{AppError, Result};
use crate::services::profile::validate_profile_patch;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;

/// Minimum password length accepted at sign-up and sign-in
pub const MIN_PASSWORD_LENGTH: usize = 6;

const INVALID_CREDENTIALS: &str = "invalid phone number or password";

/// Credential checks and profile edits for the signed-in identity.
///
/// `events` publishes the current identity whenever the provider signs a
/// user in or out, including changes the session did not initiate.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_up(&self, identifier: &str, password: &str) -> Result<AppUser>;
    async fn sign_in(&self, identifier: &str, password: &str) -> Result<AppUser>;
    async fn sign_out(&self) -> Result<()>;
    /// Reload the identity from the backend
    async fn refresh(&self, user_id: &str) -> Result<Option<AppUser>>;
    async fn update_profile(&self, user_id: &str, patch: &ProfilePatch) -> Result<Option<AppUser>>;
    fn events(&self) -> watch::Receiver<Option<AppUser>>;
}

/// Mainland mobile numbers: 11 digits starting with 1, second digit 3-9
pub fn validate_phone(phone: &str) -> Result<()> {
    let bytes = phone.as_bytes();
    let valid = bytes.len() == 11
        && bytes[0] == b'1'
        && (b'3'..=b'9').contains(&bytes[1])
        && bytes.iter().all(u8::is_ascii_digit);

    if valid {
        Ok(())
    } else {
        Err(AppError::Validation(format!("invalid phone number: {}", phone)))
    }
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

/// Phone-number accounts stored in `app_users`
pub struct PhoneAuthService {
    store: Arc<dyn Store>,
    events: watch::Sender<Option<AppUser>>,
}

impl PhoneAuthService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        let (events, _) = watch::channel(None);
        Self { store, events }
    }

    fn publish(&self, user: Option<AppUser>) {
        self.events.send_replace(user);
    }
}

#[async_trait]
impl AuthProvider for PhoneAuthService {
    async fn sign_up(&self, phone: &str, password: &str) -> Result<AppUser> {
        let phone = phone.trim();
        validate_phone(phone)?;
        validate_password(password)?;

        if self.store.find_app_user_by_phone(phone).await?.is_some() {
            return Err(AppError::Auth("phone number already registered".to_string()));
        }

        let new_user = NewAppUser {
            phone: phone.to_string(),
            password_hash: crypto::hash_password(password)?,
            // The phone number doubles as the initial display name
            name: phone.to_string(),
        };

        let user = self.store.insert_app_user(&new_user).await?;
        tracing::info!("Registered user: {}", user.id);

        self.publish(Some(user.clone()));
        Ok(user)
    }

    async fn sign_in(&self, phone: &str, password: &str) -> Result<AppUser> {
        let phone = phone.trim();

        let Some(record) = self.store.find_app_user_by_phone(phone).await? else {
            tracing::debug!("Sign-in for unknown phone number");
            return Err(AppError::Auth(INVALID_CREDENTIALS.to_string()));
        };

        if !crypto::verify_password(password, &record.password_hash) {
            tracing::debug!("Wrong password for user: {}", record.user.id);
            return Err(AppError::Auth(INVALID_CREDENTIALS.to_string()));
        }

        if crypto::needs_rehash(&record.password_hash) {
            tracing::info!("User {} still has a legacy password hash", record.user.id);
        }

        tracing::info!("Signed in user: {}", record.user.id);
        self.publish(Some(record.user.clone()));

        Ok(record.user)
    }

    async fn sign_out(&self) -> Result<()> {
        self.publish(None);
        Ok(())
    }

    async fn refresh(&self, user_id: &str) -> Result<Option<AppUser>> {
        self.store.get_app_user(user_id).await
    }

    async fn update_profile(&self, user_id: &str, patch: &ProfilePatch) -> Result<Option<AppUser>> {
        validate_profile_patch(patch)?;

        let updated = self.store.update_app_user(user_id, patch).await?;
        if let Some(user) = &updated {
            tracing::info!("Updated profile of user: {}", user.id);
            self.publish(Some(user.clone()));
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
    use crate::database::{create_memory_pool, Repository};

    async fn create_test_service() -> PhoneAuthService {
        let pool = create_memory_pool().await.unwrap();
        PhoneAuthService::new(Arc::new(Repository::new(pool)))
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("13812345678").is_ok());
        assert!(validate_phone("12812345678").is_err());
        assert!(validate_phone("1381234567").is_err());
        assert!(validate_phone("1381234567a").is_err());
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let service = create_test_service().await;

        let registered = service.sign_up("13812345678", "secret1").await.unwrap();
        assert_eq!(registered.name.as_deref(), Some("13812345678"));
        assert_eq!(registered.phone.as_deref(), Some("13812345678"));

        let signed_in = service.sign_in("13812345678", "secret1").await.unwrap();
        assert_eq!(signed_in.id, registered.id);
    }

    #[tokio::test]
    async fn test_duplicate_phone_rejected() {
        let service = create_test_service().await;

        service.sign_up("13812345678", "secret1").await.unwrap();
        let result = service.sign_up("13812345678", "secret2").await;

        assert!(matches!(result, Err(AppError::Auth(_))));
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_phone_look_alike() {
        let service = create_test_service().await;
        service.sign_up("13812345678", "secret1").await.unwrap();

        let wrong = service.sign_in("13812345678", "nope-nope").await.unwrap_err();
        let unknown = service.sign_in("13900000000", "secret1").await.unwrap_err();

        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn test_short_password_rejected() {
        let service = create_test_service().await;
        assert!(matches!(
            service.sign_up("13812345678", "12345").await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_events_follow_sign_in_and_out() {
        let service = create_test_service().await;
        let events = service.events();

        let user = service.sign_up("13812345678", "secret1").await.unwrap();
        assert_eq!(events.borrow().as_ref().map(|u| u.id.clone()), Some(user.id));

        service.sign_out().await.unwrap();
        assert!(events.borrow().is_none());
    }

    #[tokio::test]
    async fn test_update_profile() {
        let service = create_test_service().await;
        let user = service.sign_up("13812345678", "secret1").await.unwrap();

        let patch = ProfilePatch {
            name: Some("Lin".to_string()),
            birthday: Some("1990-01-02".to_string()),
            ..Default::default()
        };
        let updated = service.update_profile(&user.id, &patch).await.unwrap().unwrap();

        assert_eq!(updated.name.as_deref(), Some("Lin"));
        assert_eq!(service.refresh(&user.id).await.unwrap(), Some(updated));
    }
}
