//! Backend table interface
//!
//! One method per table operation the services need. Implemented by the
//! local SQLite [`Repository`](super::Repository) and by the hosted
//! [`SupabaseClient`](crate::remote::SupabaseClient).
//!
//! Lookups that match nothing return `Ok(None)`; updates and deletes of a
//! missing row return `Ok(None)` / `Ok(false)`.

use super::models::*;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait Store: Send + Sync {
    // Profiles
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>>;
    async fn insert_profile(&self, user_id: &str, name: Option<&str>) -> Result<Profile>;
    async fn update_profile(&self, user_id: &str, patch: &ProfilePatch) -> Result<Option<Profile>>;

    // Phone-auth users
    async fn find_app_user_by_phone(&self, phone: &str) -> Result<Option<AppUserRecord>>;
    async fn get_app_user(&self, id: &str) -> Result<Option<AppUser>>;
    async fn insert_app_user(&self, user: &NewAppUser) -> Result<AppUser>;
    async fn update_app_user(&self, id: &str, patch: &ProfilePatch) -> Result<Option<AppUser>>;

    // Contacts, oldest first
    async fn list_contacts(&self, user_id: &str) -> Result<Vec<Contact>>;
    async fn insert_contact(&self, contact: &ContactInsert) -> Result<Contact>;
    async fn update_contact(&self, id: &str, patch: &ContactPatch) -> Result<Option<Contact>>;
    async fn delete_contact(&self, id: &str) -> Result<bool>;
    async fn count_contacts(&self, user_id: &str) -> Result<usize>;

    // Check-ins, newest first
    async fn insert_check_in(&self, user_id: &str) -> Result<CheckIn>;
    async fn list_check_ins_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<CheckIn>>;
    async fn last_check_in(&self, user_id: &str) -> Result<Option<CheckIn>>;

    // Moods, oldest first
    async fn insert_mood(&self, user_id: &str, mood: MoodKind) -> Result<Mood>;
    async fn list_moods_since(&self, user_id: &str, since: DateTime<Utc>) -> Result<Vec<Mood>>;

    // Will items, oldest first
    async fn list_will_items(&self, user_id: &str) -> Result<Vec<WillItemRecord>>;
    async fn insert_will_item(&self, item: &WillItemInsert) -> Result<WillItemRecord>;
    async fn update_will_item(
        &self,
        id: &str,
        patch: &WillItemRecordPatch,
    ) -> Result<Option<WillItemRecord>>;
    async fn delete_will_item(&self, id: &str) -> Result<bool>;

    // Email template, one per user
    async fn get_email_config(&self, user_id: &str) -> Result<Option<EmailConfig>>;
    async fn insert_email_config(
        &self,
        user_id: &str,
        subject: &str,
        body: &str,
    ) -> Result<EmailConfig>;
    async fn update_email_config(
        &self,
        user_id: &str,
        subject: &str,
        body: &str,
    ) -> Result<Option<EmailConfig>>;

    // Settings, one per user
    async fn get_settings(&self, user_id: &str) -> Result<Option<UserSettings>>;
    async fn insert_settings(&self, user_id: &str, values: &SettingsValues)
        -> Result<UserSettings>;
    async fn update_settings(
        &self,
        user_id: &str,
        patch: &SettingsPatch,
    ) -> Result<Option<UserSettings>>;
}
