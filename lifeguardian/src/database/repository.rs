//! Repository layer for database operations
//!
//! Local SQLite implementation of [`Store`]. Used when no hosted backend is
//! configured and by the test suites.

use super::models::*;
use super::store::Store;
use crate::config::DEFAULT_MEMBERSHIP;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a check-in at an explicit instant (imports and tests)
    pub async fn insert_check_in_at(&self, user_id: &str, at: DateTime<Utc>) -> Result<CheckIn> {
        let id = Uuid::new_v4().to_string();

        let check_in = sqlx::query_as::<_, CheckIn>(
            r#"
            INSERT INTO check_ins (id, user_id, checked_at)
            VALUES (?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(at)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created check-in: {} for user: {}", id, user_id);
        Ok(check_in)
    }

    /// Record a mood at an explicit instant (imports and tests)
    pub async fn insert_mood_at(
        &self,
        user_id: &str,
        mood: MoodKind,
        at: DateTime<Utc>,
    ) -> Result<Mood> {
        let id = Uuid::new_v4().to_string();

        let mood = sqlx::query_as::<_, Mood>(
            r#"
            INSERT INTO moods (id, user_id, mood, recorded_at)
            VALUES (?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(mood)
        .bind(at)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created mood: {} for user: {}", id, user_id);
        Ok(mood)
    }
}

/// Append `, col = ?` for every field present in a profile patch
fn push_profile_patch(query: &mut QueryBuilder<'_, Sqlite>, patch: &ProfilePatch) {
    let fields = [
        ("name", &patch.name),
        ("avatar_url", &patch.avatar_url),
        ("bio", &patch.bio),
        ("phone", &patch.phone),
        ("birthday", &patch.birthday),
        ("hobbies", &patch.hobbies),
    ];

    for (column, value) in fields {
        if let Some(value) = value {
            query.push(format!(", {} = ", column)).push_bind(value.clone());
        }
    }
}

#[async_trait]
impl Store for Repository {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(profile)
    }

    async fn insert_profile(&self, user_id: &str, name: Option<&str>) -> Result<Profile> {
        let now = Utc::now();

        let profile = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (id, name, membership, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(DEFAULT_MEMBERSHIP)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created profile: {}", user_id);
        Ok(profile)
    }

    async fn update_profile(&self, user_id: &str, patch: &ProfilePatch) -> Result<Option<Profile>> {
        // Build dynamic update query
        let mut query = QueryBuilder::<Sqlite>::new("UPDATE profiles SET updated_at = ");
        query.push_bind(Utc::now());
        push_profile_patch(&mut query, patch);
        query.push(" WHERE id = ").push_bind(user_id.to_string());
        query.push(" RETURNING *");

        // Execute update
        let profile = query
            .build_query_as::<Profile>()
            .fetch_optional(&self.pool)
            .await?;

        Ok(profile)
    }

    async fn find_app_user_by_phone(&self, phone: &str) -> Result<Option<AppUserRecord>> {
        let record = sqlx::query_as::<_, AppUserRecord>("SELECT * FROM app_users WHERE phone = ?")
            .bind(phone)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn get_app_user(&self, id: &str) -> Result<Option<AppUser>> {
        let user = sqlx::query_as::<_, AppUser>("SELECT * FROM app_users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn insert_app_user(&self, user: &NewAppUser) -> Result<AppUser> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let created = sqlx::query_as::<_, AppUser>(
            r#"
            INSERT INTO app_users (id, phone, password_hash, name, membership, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(DEFAULT_MEMBERSHIP)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created app user: {}", id);
        Ok(created)
    }

    async fn update_app_user(&self, id: &str, patch: &ProfilePatch) -> Result<Option<AppUser>> {
        // Build dynamic update query
        let mut query = QueryBuilder::<Sqlite>::new("UPDATE app_users SET updated_at = ");
        query.push_bind(Utc::now());
        push_profile_patch(&mut query, patch);
        query.push(" WHERE id = ").push_bind(id.to_string());
        query.push(" RETURNING *");

        // Execute update
        let user = query
            .build_query_as::<AppUser>()
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn list_contacts(&self, user_id: &str) -> Result<Vec<Contact>> {
        let contacts = sqlx::query_as::<_, Contact>(
            r#"
            SELECT * FROM contacts WHERE user_id = ? ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(contacts)
    }

    async fn insert_contact(&self, contact: &ContactInsert) -> Result<Contact> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let created = sqlx::query_as::<_, Contact>(
            r#"
            INSERT INTO contacts
                (id, user_id, name, role, role_color_class, email, avatar_url, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&contact.user_id)
        .bind(&contact.name)
        .bind(&contact.role)
        .bind(&contact.role_color_class)
        .bind(&contact.email)
        .bind(&contact.avatar_url)
        .bind(contact.is_active)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created contact: {} for user: {}", id, contact.user_id);
        Ok(created)
    }

    async fn update_contact(&self, id: &str, patch: &ContactPatch) -> Result<Option<Contact>> {
        // Build dynamic update query
        let mut query = QueryBuilder::<Sqlite>::new("UPDATE contacts SET updated_at = ");
        query.push_bind(Utc::now());

        let text_fields = [
            ("name", &patch.name),
            ("role", &patch.role),
            ("role_color_class", &patch.role_color_class),
            ("email", &patch.email),
            ("avatar_url", &patch.avatar_url),
        ];
        for (column, value) in text_fields {
            if let Some(value) = value {
                query.push(format!(", {} = ", column)).push_bind(value.clone());
            }
        }
        if let Some(active) = patch.is_active {
            query.push(", is_active = ").push_bind(active);
        }

        query.push(" WHERE id = ").push_bind(id.to_string());
        query.push(" RETURNING *");

        let contact = query
            .build_query_as::<Contact>()
            .fetch_optional(&self.pool)
            .await?;

        Ok(contact)
    }

    async fn delete_contact(&self, id: &str) -> Result<bool> {
        let rows = sqlx::query("DELETE FROM contacts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::debug!("Deleted contact: {} ({} rows)", id, rows);
        Ok(rows > 0)
    }

    async fn count_contacts(&self, user_id: &str) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM contacts WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count as usize)
    }

    async fn insert_check_in(&self, user_id: &str) -> Result<CheckIn> {
        self.insert_check_in_at(user_id, Utc::now()).await
    }

    async fn list_check_ins_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<CheckIn>> {
        let check_ins = sqlx::query_as::<_, CheckIn>(
            r#"
            SELECT * FROM check_ins
            WHERE user_id = ? AND checked_at >= ?
            ORDER BY checked_at DESC
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(check_ins)
    }

    async fn last_check_in(&self, user_id: &str) -> Result<Option<CheckIn>> {
        let check_in = sqlx::query_as::<_, CheckIn>(
            r#"
            SELECT * FROM check_ins WHERE user_id = ? ORDER BY checked_at DESC LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(check_in)
    }

    async fn insert_mood(&self, user_id: &str, mood: MoodKind) -> Result<Mood> {
        self.insert_mood_at(user_id, mood, Utc::now()).await
    }

    async fn list_moods_since(&self, user_id: &str, since: DateTime<Utc>) -> Result<Vec<Mood>> {
        let moods = sqlx::query_as::<_, Mood>(
            r#"
            SELECT * FROM moods
            WHERE user_id = ? AND recorded_at >= ?
            ORDER BY recorded_at ASC
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(moods)
    }

    async fn list_will_items(&self, user_id: &str) -> Result<Vec<WillItemRecord>> {
        let items = sqlx::query_as::<_, WillItemRecord>(
            r#"
            SELECT * FROM will_items WHERE user_id = ? ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    async fn insert_will_item(&self, item: &WillItemInsert) -> Result<WillItemRecord> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let created = sqlx::query_as::<_, WillItemRecord>(
            r#"
            INSERT INTO will_items
                (id, user_id, type, title, status, description, file_url, meta, meta_icon, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&item.user_id)
        .bind(item.kind)
        .bind(&item.title)
        .bind(item.status)
        .bind(&item.description)
        .bind(&item.file_url)
        .bind(&item.meta)
        .bind(&item.meta_icon)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created will item: {} for user: {}", id, item.user_id);
        Ok(created)
    }

    async fn update_will_item(
        &self,
        id: &str,
        patch: &WillItemRecordPatch,
    ) -> Result<Option<WillItemRecord>> {
        // Build dynamic update query
        let mut query = QueryBuilder::<Sqlite>::new("UPDATE will_items SET updated_at = ");
        query.push_bind(Utc::now());

        if let Some(title) = &patch.title {
            query.push(", title = ").push_bind(title.clone());
        }
        if let Some(status) = patch.status {
            query.push(", status = ").push_bind(status);
        }
        if let Some(kind) = patch.kind {
            query.push(", type = ").push_bind(kind);
        }
        if let Some(description) = &patch.description {
            query.push(", description = ").push_bind(description.clone());
        }
        if let Some(file_url) = &patch.file_url {
            query.push(", file_url = ").push_bind(file_url.clone());
        }
        if let Some(meta) = &patch.meta {
            query.push(", meta = ").push_bind(meta.clone());
        }
        if let Some(meta_icon) = &patch.meta_icon {
            query.push(", meta_icon = ").push_bind(meta_icon.clone());
        }

        query.push(" WHERE id = ").push_bind(id.to_string());
        query.push(" RETURNING *");

        let item = query
            .build_query_as::<WillItemRecord>()
            .fetch_optional(&self.pool)
            .await?;

        Ok(item)
    }

    async fn delete_will_item(&self, id: &str) -> Result<bool> {
        let rows = sqlx::query("DELETE FROM will_items WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::debug!("Deleted will item: {} ({} rows)", id, rows);
        Ok(rows > 0)
    }

    async fn get_email_config(&self, user_id: &str) -> Result<Option<EmailConfig>> {
        let config =
            sqlx::query_as::<_, EmailConfig>("SELECT * FROM email_configs WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(config)
    }

    async fn insert_email_config(
        &self,
        user_id: &str,
        subject: &str,
        body: &str,
    ) -> Result<EmailConfig> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let config = sqlx::query_as::<_, EmailConfig>(
            r#"
            INSERT INTO email_configs (id, user_id, subject, body, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(subject)
        .bind(body)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created email config for user: {}", user_id);
        Ok(config)
    }

    async fn update_email_config(
        &self,
        user_id: &str,
        subject: &str,
        body: &str,
    ) -> Result<Option<EmailConfig>> {
        let config = sqlx::query_as::<_, EmailConfig>(
            r#"
            UPDATE email_configs SET subject = ?, body = ?, updated_at = ?
            WHERE user_id = ?
            RETURNING *
            "#,
        )
        .bind(subject)
        .bind(body)
        .bind(Utc::now())
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(config)
    }

    async fn get_settings(&self, user_id: &str) -> Result<Option<UserSettings>> {
        let settings =
            sqlx::query_as::<_, UserSettings>("SELECT * FROM user_settings WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(settings)
    }

    async fn insert_settings(
        &self,
        user_id: &str,
        values: &SettingsValues,
    ) -> Result<UserSettings> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let settings = sqlx::query_as::<_, UserSettings>(
            r#"
            INSERT INTO user_settings
                (id, user_id, do_not_disturb, push_enabled, sound, vibration, detection_period_hours, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(values.do_not_disturb)
        .bind(values.push_enabled)
        .bind(&values.sound)
        .bind(&values.vibration)
        .bind(values.detection_period_hours)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created settings for user: {}", user_id);
        Ok(settings)
    }

    async fn update_settings(
        &self,
        user_id: &str,
        patch: &SettingsPatch,
    ) -> Result<Option<UserSettings>> {
        let mut query = QueryBuilder::<Sqlite>::new("UPDATE user_settings SET updated_at = ");
        query.push_bind(Utc::now());

        if let Some(v) = patch.do_not_disturb {
            query.push(", do_not_disturb = ").push_bind(v);
        }
        if let Some(v) = patch.push_enabled {
            query.push(", push_enabled = ").push_bind(v);
        }
        if let Some(v) = &patch.sound {
            query.push(", sound = ").push_bind(v.clone());
        }
        if let Some(v) = &patch.vibration {
            query.push(", vibration = ").push_bind(v.clone());
        }
        if let Some(v) = patch.detection_period_hours {
            query.push(", detection_period_hours = ").push_bind(v);
        }

        query.push(" WHERE user_id = ").push_bind(user_id.to_string());
        query.push(" RETURNING *");

        let settings = query
            .build_query_as::<UserSettings>()
            .fetch_optional(&self.pool)
            .await?;

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::create_memory_pool;

    async fn create_test_repo() -> Repository {
        Repository::new(create_memory_pool().await.unwrap())
    }

    fn contact(user_id: &str, name: &str) -> ContactInsert {
        ContactInsert {
            user_id: user_id.to_string(),
            name: name.to_string(),
            role: "Friend".to_string(),
            role_color_class: ContactRole::Friend.color_class().to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            avatar_url: None,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_contact_crud() {
        let repo = create_test_repo().await;

        let created = repo.insert_contact(&contact("u1", "Ada")).await.unwrap();
        assert!(created.is_active);
        assert_eq!(repo.count_contacts("u1").await.unwrap(), 1);

        let patch = ContactPatch {
            name: Some("Ada L.".to_string()),
            is_active: Some(false),
            ..Default::default()
        };
        let updated = repo.update_contact(&created.id, &patch).await.unwrap().unwrap();
        assert_eq!(updated.name, "Ada L.");
        assert!(!updated.is_active);
        assert_eq!(updated.email, "ada@example.com");

        assert!(repo.delete_contact(&created.id).await.unwrap());
        assert!(!repo.delete_contact(&created.id).await.unwrap());
        assert!(repo.list_contacts("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_contact_returns_none() {
        let repo = create_test_repo().await;

        let result = repo
            .update_contact("missing", &ContactPatch::default())
            .await
            .unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_contacts_are_scoped_by_user() {
        let repo = create_test_repo().await;

        repo.insert_contact(&contact("u1", "Ada")).await.unwrap();
        repo.insert_contact(&contact("u2", "Bob")).await.unwrap();

        let contacts = repo.list_contacts("u1").await.unwrap();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].name, "Ada");
    }

    #[tokio::test]
    async fn test_check_ins_since_are_newest_first() {
        let repo = create_test_repo().await;
        let now = Utc::now();

        repo.insert_check_in_at("u1", now - chrono::Duration::days(40)).await.unwrap();
        repo.insert_check_in_at("u1", now - chrono::Duration::days(2)).await.unwrap();
        repo.insert_check_in_at("u1", now - chrono::Duration::days(1)).await.unwrap();

        let recent = repo
            .list_check_ins_since("u1", now - chrono::Duration::days(30))
            .await
            .unwrap();

        assert_eq!(recent.len(), 2);
        assert!(recent[0].checked_at > recent[1].checked_at);

        let last = repo.last_check_in("u1").await.unwrap().unwrap();
        assert_eq!(last.id, recent[0].id);
    }

    #[tokio::test]
    async fn test_moods_since_are_oldest_first() {
        let repo = create_test_repo().await;
        let now = Utc::now();

        repo.insert_mood_at("u1", MoodKind::Sad, now - chrono::Duration::days(3))
            .await
            .unwrap();
        repo.insert_mood("u1", MoodKind::Happy).await.unwrap();

        let moods = repo
            .list_moods_since("u1", now - chrono::Duration::days(7))
            .await
            .unwrap();

        assert_eq!(moods.len(), 2);
        assert_eq!(moods[0].mood, MoodKind::Sad);
        assert_eq!(moods[1].mood, MoodKind::Happy);
    }

    #[tokio::test]
    async fn test_will_item_columns_round_trip() {
        let repo = create_test_repo().await;

        let created = repo
            .insert_will_item(&WillItemInsert {
                user_id: "u1".to_string(),
                kind: WillKind::Video,
                title: "Birthday message".to_string(),
                status: WillStatus::Draft,
                description: Some("For June".to_string()),
                file_url: Some("file:///v.mp4".to_string()),
                meta: None,
                meta_icon: Some("edit".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(created.kind, WillKind::Video);

        let patch = WillItemRecordPatch {
            status: Some(WillStatus::Ready),
            file_url: Some(None),
            ..Default::default()
        };
        let updated = repo.update_will_item(&created.id, &patch).await.unwrap().unwrap();
        assert_eq!(updated.status, WillStatus::Ready);
        assert!(updated.file_url.is_none());
        assert_eq!(updated.description.as_deref(), Some("For June"));
    }

    #[tokio::test]
    async fn test_settings_insert_then_patch() {
        let repo = create_test_repo().await;

        assert!(repo.get_settings("u1").await.unwrap().is_none());

        let created = repo
            .insert_settings("u1", &SettingsValues::default())
            .await
            .unwrap();
        assert_eq!(created.detection_period_hours, 72);
        assert!(created.push_enabled);

        let patch = SettingsPatch {
            do_not_disturb: Some(true),
            ..Default::default()
        };
        let updated = repo.update_settings("u1", &patch).await.unwrap().unwrap();
        assert!(updated.do_not_disturb);
        assert_eq!(updated.sound, created.sound);
    }

    #[tokio::test]
    async fn test_app_user_lookup_keeps_hash() {
        let repo = create_test_repo().await;

        let user = repo
            .insert_app_user(&NewAppUser {
                phone: "13800000000".to_string(),
                password_hash: "hash".to_string(),
                name: "13800000000".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(user.membership, "free");
        assert!(user.email.is_none());

        let record = repo.find_app_user_by_phone("13800000000").await.unwrap().unwrap();
        assert_eq!(record.user.id, user.id);
        assert_eq!(record.password_hash, "hash");
    }
}
