//! Contacts service
//!
//! Emergency contacts of a user: validation, role colours and the
//! per-user cap.

use crate::config::{DEFAULT_CONTACT_ROLE, MAX_CONTACTS};
use crate::database::{Contact, ContactInsert, ContactPatch, ContactRole, NewContact, Store};
use crate::error::{AppError, Result};
use std::sync::Arc;

/// Service for managing emergency contacts
#[derive(Clone)]
pub struct ContactService {
    store: Arc<dyn Store>,
}

impl ContactService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// All contacts of a user, oldest first
    pub async fn list(&self, user_id: &str) -> Result<Vec<Contact>> {
        self.store.list_contacts(user_id).await
    }

    pub async fn count(&self, user_id: &str) -> Result<usize> {
        self.store.count_contacts(user_id).await
    }

    /// Add a contact; fails once the user already has the maximum
    pub async fn create(&self, user_id: &str, contact: NewContact) -> Result<Contact> {
        // Validate input
        let name = required("name", &contact.name)?;
        let email = validate_email(&contact.email)?;

        // Enforce the per-user cap
        let existing = self.store.count_contacts(user_id).await?;
        if existing >= MAX_CONTACTS {
            tracing::warn!("User {} already has {} contacts", user_id, existing);
            return Err(AppError::ContactLimitReached(MAX_CONTACTS));
        }

        // Default role when none given
        let role = contact
            .role
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CONTACT_ROLE.to_string());

        let insert = ContactInsert {
            user_id: user_id.to_string(),
            name,
            role_color_class: ContactRole::from_label(&role).color_class().to_string(),
            role,
            email,
            avatar_url: contact.avatar_url,
            is_active: true,
        };

        tracing::info!("Creating contact for user: {}", user_id);
        let created = self.store.insert_contact(&insert).await?;
        tracing::info!("Contact created successfully: {}", created.id);

        Ok(created)
    }

    /// Apply a partial update; `None` when the contact does not exist.
    ///
    /// Changing the role also refreshes its colour class.
    pub async fn update(&self, id: &str, mut patch: ContactPatch) -> Result<Option<Contact>> {
        if let Some(name) = &patch.name {
            patch.name = Some(required("name", name)?);
        }
        if let Some(email) = &patch.email {
            patch.email = Some(validate_email(email)?);
        }
        if let Some(role) = &patch.role {
            patch.role_color_class = Some(ContactRole::from_label(role).color_class().to_string());
        }

        tracing::debug!("Updating contact: {}", id);
        self.store.update_contact(id, &patch).await
    }

    /// Delete a contact; `false` when it did not exist
    pub async fn delete(&self, id: &str) -> Result<bool> {
        tracing::info!("Deleting contact: {}", id);
        self.store.delete_contact(id).await
    }
}

fn required(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

fn validate_email(email: &str) -> Result<String> {
    let email = required("email", email)?;

    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());

    if !valid {
        return Err(AppError::Validation(format!("invalid email address: {}", email)));
    }

    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{create_memory_pool, Repository};

    async fn create_test_service() -> ContactService {
        let pool = create_memory_pool().await.unwrap();
        ContactService::new(Arc::new(Repository::new(pool)))
    }

    fn new_contact(name: &str) -> NewContact {
        NewContact {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_defaults_to_friend() {
        let service = create_test_service().await;

        let contact = service.create("u1", new_contact("Mia")).await.unwrap();

        assert_eq!(contact.role, "Friend");
        assert_eq!(
            contact.role_color_class.as_deref(),
            Some(ContactRole::Friend.color_class())
        );
        assert!(contact.is_active);
    }

    #[tokio::test]
    async fn test_create_rejects_missing_fields() {
        let service = create_test_service().await;

        let no_name = NewContact {
            email: "a@b.c".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            service.create("u1", no_name).await,
            Err(AppError::Validation(_))
        ));

        let bad_email = NewContact {
            name: "Mia".to_string(),
            email: "not-an-email".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            service.create("u1", bad_email).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_contact_cap() {
        let service = create_test_service().await;

        for i in 0..MAX_CONTACTS {
            service.create("u1", new_contact(&format!("C{}", i))).await.unwrap();
        }

        let result = service.create("u1", new_contact("Extra")).await;
        assert!(matches!(result, Err(AppError::ContactLimitReached(5))));

        // Other users are unaffected
        service.create("u2", new_contact("Other")).await.unwrap();
    }

    #[tokio::test]
    async fn test_role_change_updates_color() {
        let service = create_test_service().await;
        let contact = service.create("u1", new_contact("Lee")).await.unwrap();

        let patch = ContactPatch {
            role: Some("Spouse".to_string()),
            ..Default::default()
        };
        let updated = service.update(&contact.id, patch).await.unwrap().unwrap();

        assert_eq!(updated.role, "Spouse");
        assert_eq!(
            updated.role_color_class.as_deref(),
            Some(ContactRole::Spouse.color_class())
        );
    }

    #[tokio::test]
    async fn test_update_and_delete_missing() {
        let service = create_test_service().await;

        assert!(service
            .update("nope", ContactPatch::default())
            .await
            .unwrap()
            .is_none());
        assert!(!service.delete("nope").await.unwrap());
    }
}
