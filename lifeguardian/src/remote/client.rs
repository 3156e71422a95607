//! PostgREST and storage client for the hosted backend
//!
//! Rows are read and written through `/rest/v1/{table}` using PostgREST
//! filter syntax (`col=eq.value`). Writes ask for the affected rows back with
//! `Prefer: return=representation`. Counts use `Prefer: count=exact` and read
//! the total from the `Content-Range` header.

use crate::config::{DEFAULT_MEMBERSHIP, UPLOAD_CACHE_CONTROL};
use crate::database::models::*;
use crate::database::Store;
use crate::error::{AppError, Result};
use crate::storage::ObjectStore;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// `app_users` columns safe to hand out (everything but the password hash)
const APP_USER_COLUMNS: &str =
    "id,phone,name,avatar_url,bio,birthday,hobbies,membership,created_at,updated_at";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

type Query = Vec<(&'static str, String)>;

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

fn gte(at: DateTime<Utc>) -> String {
    format!("gte.{}", at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Client for one hosted project. Clones share the access token.
#[derive(Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    access_token: Arc<RwLock<Option<String>>>,
}

impl SupabaseClient {
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("lifeguardian/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Generic(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            access_token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Use `token` instead of the anon key for subsequent requests
    pub async fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write().await = token;
    }

    pub async fn access_token(&self) -> Option<String> {
        self.access_token.read().await.clone()
    }

    pub(crate) fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    pub(crate) fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    pub(crate) fn storage_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, key)
    }

    /// Request carrying the project key and the current bearer token
    pub(crate) async fn request(&self, method: Method, url: &str) -> RequestBuilder {
        // Signed-in requests run as the user, others as the anon role
        let bearer = self
            .access_token
            .read()
            .await
            .clone()
            .unwrap_or_else(|| self.anon_key.clone());

        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    async fn select<T: DeserializeOwned>(&self, table: &str, query: Query) -> Result<Vec<T>> {
        tracing::debug!("GET {} {:?}", table, query);

        let response = self
            .request(Method::GET, &self.rest_url(table))
            .await
            .query(&query)
            .send()
            .await?;

        Ok(check(response).await?.json().await?)
    }

    async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        mut query: Query,
    ) -> Result<Option<T>> {
        query.push(("limit", "1".to_string()));
        Ok(self.select(table, query).await?.into_iter().next())
    }

    async fn insert<B, T>(&self, table: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        tracing::debug!("POST {}", table);

        let response = self
            .request(Method::POST, &self.rest_url(table))
            .await
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;

        // PostgREST answers with an array even for a single row
        let rows: Vec<T> = check(response).await?.json().await?;
        rows.into_iter().next().ok_or_else(|| AppError::Backend {
            status: 200,
            message: format!("insert into {} returned no row", table),
        })
    }

    async fn update<B, T>(&self, table: &str, query: Query, body: &B) -> Result<Option<T>>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        tracing::debug!("PATCH {} {:?}", table, query);

        let response = self
            .request(Method::PATCH, &self.rest_url(table))
            .await
            .header("Prefer", "return=representation")
            .query(&query)
            .json(body)
            .send()
            .await?;

        let rows: Vec<T> = check(response).await?.json().await?;
        Ok(rows.into_iter().next())
    }

    async fn delete(&self, table: &str, query: Query) -> Result<bool> {
        tracing::debug!("DELETE {} {:?}", table, query);

        let response = self
            .request(Method::DELETE, &self.rest_url(table))
            .await
            .header("Prefer", "return=representation")
            .query(&query)
            .send()
            .await?;

        // Deleted rows come back, so an empty list means nothing matched
        let rows: Vec<Value> = check(response).await?.json().await?;
        Ok(!rows.is_empty())
    }

    async fn count(&self, table: &str, mut query: Query) -> Result<usize> {
        query.push(("select", "id".to_string()));

        let response = self
            .request(Method::HEAD, &self.rest_url(table))
            .await
            .header("Prefer", "count=exact")
            .query(&query)
            .send()
            .await?;

        // Count only, no body
        let response = check(response).await?;
        let range = response
            .headers()
            .get(reqwest::header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        content_range_total(range).ok_or_else(|| AppError::Backend {
            status: response.status().as_u16(),
            message: format!("missing count in Content-Range: {:?}", range),
        })
    }
}

/// Turn a non-2xx response into [`AppError::Backend`]
pub(crate) async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body);
    tracing::warn!("Backend request failed with {}: {}", status, message);

    Err(AppError::Backend {
        status: status.as_u16(),
        message,
    })
}

/// Best human-readable message from an error body
pub(crate) fn error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();

    parsed
        .as_ref()
        .and_then(|v| {
            ["message", "msg", "error_description", "error"]
                .iter()
                .find_map(|key| v.get(*key).and_then(Value::as_str))
        })
        .map(str::to_string)
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                "empty response".to_string()
            } else {
                body.trim().to_string()
            }
        })
}

/// Total from `Content-Range: 0-4/5` or `*/0`
pub(crate) fn content_range_total(header: &str) -> Option<usize> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}

/// Serialize `body` and stamp `updated_at`
fn touched<B: Serialize>(body: &B) -> Result<Value> {
    let mut value = serde_json::to_value(body)?;
    if let Value::Object(map) = &mut value {
        map.insert("updated_at".to_string(), json!(Utc::now()));
    }
    Ok(value)
}

#[async_trait]
impl Store for SupabaseClient {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        self.select_one("profiles", vec![("id", eq(user_id))]).await
    }

    async fn insert_profile(&self, user_id: &str, name: Option<&str>) -> Result<Profile> {
        let body = json!({
            "id": user_id,
            "name": name,
            "membership": DEFAULT_MEMBERSHIP,
        });
        self.insert("profiles", &body).await
    }

    async fn update_profile(&self, user_id: &str, patch: &ProfilePatch) -> Result<Option<Profile>> {
        self.update("profiles", vec![("id", eq(user_id))], &touched(patch)?)
            .await
    }

    async fn find_app_user_by_phone(&self, phone: &str) -> Result<Option<AppUserRecord>> {
        self.select_one("app_users", vec![("phone", eq(phone))]).await
    }

    async fn get_app_user(&self, id: &str) -> Result<Option<AppUser>> {
        self.select_one(
            "app_users",
            vec![("id", eq(id)), ("select", APP_USER_COLUMNS.to_string())],
        )
        .await
    }

    async fn insert_app_user(&self, user: &NewAppUser) -> Result<AppUser> {
        self.insert("app_users", user).await
    }

    async fn update_app_user(&self, id: &str, patch: &ProfilePatch) -> Result<Option<AppUser>> {
        self.update("app_users", vec![("id", eq(id))], &touched(patch)?)
            .await
    }

    async fn list_contacts(&self, user_id: &str) -> Result<Vec<Contact>> {
        self.select(
            "contacts",
            vec![
                ("user_id", eq(user_id)),
                ("order", "created_at.asc".to_string()),
            ],
        )
        .await
    }

    async fn insert_contact(&self, contact: &ContactInsert) -> Result<Contact> {
        self.insert("contacts", contact).await
    }

    async fn update_contact(&self, id: &str, patch: &ContactPatch) -> Result<Option<Contact>> {
        self.update("contacts", vec![("id", eq(id))], &touched(patch)?)
            .await
    }

    async fn delete_contact(&self, id: &str) -> Result<bool> {
        self.delete("contacts", vec![("id", eq(id))]).await
    }

    async fn count_contacts(&self, user_id: &str) -> Result<usize> {
        self.count("contacts", vec![("user_id", eq(user_id))]).await
    }

    async fn insert_check_in(&self, user_id: &str) -> Result<CheckIn> {
        self.insert("check_ins", &json!({ "user_id": user_id })).await
    }

    async fn list_check_ins_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<CheckIn>> {
        self.select(
            "check_ins",
            vec![
                ("user_id", eq(user_id)),
                ("checked_at", gte(since)),
                ("order", "checked_at.desc".to_string()),
            ],
        )
        .await
    }

    async fn last_check_in(&self, user_id: &str) -> Result<Option<CheckIn>> {
        self.select_one(
            "check_ins",
            vec![
                ("user_id", eq(user_id)),
                ("order", "checked_at.desc".to_string()),
            ],
        )
        .await
    }

    async fn insert_mood(&self, user_id: &str, mood: MoodKind) -> Result<Mood> {
        self.insert("moods", &json!({ "user_id": user_id, "mood": mood }))
            .await
    }

    async fn list_moods_since(&self, user_id: &str, since: DateTime<Utc>) -> Result<Vec<Mood>> {
        self.select(
            "moods",
            vec![
                ("user_id", eq(user_id)),
                ("recorded_at", gte(since)),
                ("order", "recorded_at.asc".to_string()),
            ],
        )
        .await
    }

    async fn list_will_items(&self, user_id: &str) -> Result<Vec<WillItemRecord>> {
        self.select(
            "will_items",
            vec![
                ("user_id", eq(user_id)),
                ("order", "created_at.asc".to_string()),
            ],
        )
        .await
    }

    async fn insert_will_item(&self, item: &WillItemInsert) -> Result<WillItemRecord> {
        self.insert("will_items", item).await
    }

    async fn update_will_item(
        &self,
        id: &str,
        patch: &WillItemRecordPatch,
    ) -> Result<Option<WillItemRecord>> {
        self.update("will_items", vec![("id", eq(id))], &touched(patch)?)
            .await
    }

    async fn delete_will_item(&self, id: &str) -> Result<bool> {
        self.delete("will_items", vec![("id", eq(id))]).await
    }

    async fn get_email_config(&self, user_id: &str) -> Result<Option<EmailConfig>> {
        self.select_one("email_configs", vec![("user_id", eq(user_id))])
            .await
    }

    async fn insert_email_config(
        &self,
        user_id: &str,
        subject: &str,
        body: &str,
    ) -> Result<EmailConfig> {
        let row = json!({ "user_id": user_id, "subject": subject, "body": body });
        self.insert("email_configs", &row).await
    }

    async fn update_email_config(
        &self,
        user_id: &str,
        subject: &str,
        body: &str,
    ) -> Result<Option<EmailConfig>> {
        let patch = touched(&json!({ "subject": subject, "body": body }))?;
        self.update("email_configs", vec![("user_id", eq(user_id))], &patch)
            .await
    }

    async fn get_settings(&self, user_id: &str) -> Result<Option<UserSettings>> {
        self.select_one("user_settings", vec![("user_id", eq(user_id))])
            .await
    }

    async fn insert_settings(
        &self,
        user_id: &str,
        values: &SettingsValues,
    ) -> Result<UserSettings> {
        let mut row = serde_json::to_value(values)?;
        if let Value::Object(map) = &mut row {
            map.insert("user_id".to_string(), json!(user_id));
        }
        self.insert("user_settings", &row).await
    }

    async fn update_settings(
        &self,
        user_id: &str,
        patch: &SettingsPatch,
    ) -> Result<Option<UserSettings>> {
        self.update("user_settings", vec![("user_id", eq(user_id))], &touched(patch)?)
            .await
    }
}

#[async_trait]
impl ObjectStore for SupabaseClient {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<String> {
        tracing::debug!("Uploading {}/{} ({} bytes)", bucket, key, data.len());

        // Overwrite any previous object at the same key
        let response = self
            .request(Method::POST, &self.storage_url(bucket, key))
            .await
            .header("x-upsert", "true")
            .header(reqwest::header::CACHE_CONTROL, UPLOAD_CACHE_CONTROL)
            .header(
                reqwest::header::CONTENT_TYPE,
                content_type.unwrap_or("application/octet-stream"),
            )
            .body(data)
            .send()
            .await?;

        check(response).await.map_err(|e| match e {
            AppError::Backend { status, message } => AppError::Storage(format!(
                "upload to {} failed ({}): {}",
                bucket, status, message
            )),
            other => other,
        })?;

        Ok(self.public_url(bucket, key))
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, bucket, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> SupabaseClient {
        SupabaseClient::new("https://demo.supabase.co/", "anon-key").unwrap()
    }

    #[test]
    fn test_urls() {
        let client = client();

        assert_eq!(client.base_url(), "https://demo.supabase.co");
        assert_eq!(
            client.rest_url("check_ins"),
            "https://demo.supabase.co/rest/v1/check_ins"
        );
        assert_eq!(
            client.storage_url("avatars", "u1/avatar.png"),
            "https://demo.supabase.co/storage/v1/object/avatars/u1/avatar.png"
        );
        assert_eq!(
            client.public_url("will-files", "u1/w1.mp4"),
            "https://demo.supabase.co/storage/v1/object/public/will-files/u1/w1.mp4"
        );
    }

    #[test]
    fn test_filters() {
        assert_eq!(eq("abc"), "eq.abc");

        let at = DateTime::parse_from_rfc3339("2024-05-01T08:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(gte(at), "gte.2024-05-01T08:30:00.000Z");
    }

    #[test]
    fn test_content_range_total() {
        assert_eq!(content_range_total("0-4/5"), Some(5));
        assert_eq!(content_range_total("*/0"), Some(0));
        assert_eq!(content_range_total("0-4/*"), None);
        assert_eq!(content_range_total(""), None);
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(r#"{"code":"23505","message":"duplicate key"}"#),
            "duplicate key"
        );
        assert_eq!(
            error_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            "Invalid login credentials"
        );
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
        assert_eq!(error_message(""), "empty response");
    }

    #[test]
    fn test_touched_adds_updated_at() {
        let patch = ProfilePatch {
            bio: Some("hi".to_string()),
            ..Default::default()
        };
        let value = touched(&patch).unwrap();

        assert_eq!(value["bio"], "hi");
        assert!(value.get("updated_at").is_some());
        assert!(value.get("name").is_none());
    }

    #[tokio::test]
    async fn test_access_token_is_shared_between_clones() {
        let client = client();
        let other = client.clone();

        client.set_access_token(Some("jwt".to_string())).await;
        assert_eq!(other.access_token().await.as_deref(), Some("jwt"));
    }
}
