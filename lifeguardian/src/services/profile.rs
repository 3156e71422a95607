//! Profile service
//!
//! Reads and edits the signed-in user's profile and uploads avatars. Goes
//! through the [`AuthProvider`], so local phone accounts (`app_users`) and
//! hosted accounts (`profiles`) are handled the same way and the session
//! hears about every change.

use crate::config::AVATAR_BUCKET;
use crate::database::{AppUser, ProfilePatch};
use crate::error::{AppError, Result};
use crate::services::auth::AuthProvider;
use crate::stats;
use crate::storage::{object_key, ObjectStore};
use std::sync::Arc;

/// Service for user profiles
#[derive(Clone)]
pub struct ProfileService {
    auth: Arc<dyn AuthProvider>,
    objects: Arc<dyn ObjectStore>,
}

impl ProfileService {
    pub fn new(auth: Arc<dyn AuthProvider>, objects: Arc<dyn ObjectStore>) -> Self {
        Self { auth, objects }
    }

    pub async fn get(&self, user_id: &str) -> Result<Option<AppUser>> {
        self.auth.refresh(user_id).await
    }

    /// Apply a partial update; `None` when the user does not exist
    pub async fn update(&self, user_id: &str, patch: ProfilePatch) -> Result<Option<AppUser>> {
        tracing::debug!("Updating profile: {}", user_id);
        self.auth.update_profile(user_id, &patch).await
    }

    /// Upload a new avatar and store its URL on the profile
    pub async fn upload_avatar(
        &self,
        user_id: &str,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<String> {
        let key = object_key(user_id, "avatar", file_name)?;

        // Nothing to attach the avatar to
        if self.auth.refresh(user_id).await?.is_none() {
            return Err(AppError::NotFound(format!("profile {}", user_id)));
        }

        tracing::info!("Uploading avatar {} ({} bytes)", key, data.len());
        let url = self.objects.upload(AVATAR_BUCKET, &key, data, None).await?;

        // Record the URL; the user may have vanished since the check above
        let patch = ProfilePatch {
            avatar_url: Some(url.clone()),
            ..Default::default()
        };
        if self.auth.update_profile(user_id, &patch).await?.is_none() {
            tracing::warn!("Avatar uploaded but user {} no longer exists", user_id);
            return Err(AppError::NotFound(format!("profile {}", user_id)));
        }

        Ok(url)
    }
}

/// Reject birthdays that cannot be parsed before they reach the backend
pub(crate) fn validate_profile_patch(patch: &ProfilePatch) -> Result<()> {
    if let Some(birthday) = patch.birthday.as_deref().filter(|b| !b.trim().is_empty()) {
        stats::parse_birthday(birthday)?;
    }

    if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::Validation("name must not be empty".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{create_memory_pool, Repository};
    use crate::services::auth::PhoneAuthService;
    use crate::storage::LocalObjectStore;
    use tempfile::TempDir;

    async fn create_test_service() -> (ProfileService, Arc<PhoneAuthService>, TempDir) {
        let temp = TempDir::new().unwrap();
        let repo = Repository::new(create_memory_pool().await.unwrap());
        let auth = Arc::new(PhoneAuthService::new(Arc::new(repo)));
        let objects = LocalObjectStore::new(temp.path().to_path_buf());
        let service = ProfileService::new(auth.clone(), Arc::new(objects));
        (service, auth, temp)
    }

    #[tokio::test]
    async fn test_update_profile() {
        let (service, auth, _temp) = create_test_service().await;
        let user = auth.sign_up("13812345678", "secret1").await.unwrap();

        let patch = ProfilePatch {
            birthday: Some("1992-03-14".to_string()),
            hobbies: Some("Climbing".to_string()),
            ..Default::default()
        };
        let updated = service.update(&user.id, patch).await.unwrap().unwrap();

        assert_eq!(updated.name.as_deref(), Some("13812345678"));
        assert_eq!(updated.birthday.as_deref(), Some("1992-03-14"));
        assert_eq!(updated.membership, "free");

        let reloaded = service.get(&user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.hobbies.as_deref(), Some("Climbing"));
    }

    #[tokio::test]
    async fn test_invalid_birthday_rejected() {
        let (service, auth, _temp) = create_test_service().await;
        let user = auth.sign_up("13812345678", "secret1").await.unwrap();

        let patch = ProfilePatch {
            birthday: Some("14/03/1992".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            service.update(&user.id, patch).await,
            Err(AppError::InvalidDate(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_profile_is_none() {
        let (service, _auth, _temp) = create_test_service().await;

        assert!(service.get("ghost").await.unwrap().is_none());
        assert!(service
            .update("ghost", ProfilePatch::default())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_upload_avatar_sets_url() {
        let (service, auth, _temp) = create_test_service().await;
        let user = auth.sign_up("13812345678", "secret1").await.unwrap();

        let url = service
            .upload_avatar(&user.id, "selfie.jpg", b"jpeg".to_vec())
            .await
            .unwrap();

        assert!(url.ends_with(&format!("avatars/{}/avatar.jpg", user.id)));
        let profile = service.get(&user.id).await.unwrap().unwrap();
        assert_eq!(profile.avatar_url, Some(url));
    }

    #[tokio::test]
    async fn test_upload_avatar_for_unknown_user_fails() {
        let (service, _auth, temp) = create_test_service().await;

        let result = service.upload_avatar("ghost", "selfie.jpg", b"jpeg".to_vec()).await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert!(!temp.path().join("avatars/ghost").exists());
    }
}
