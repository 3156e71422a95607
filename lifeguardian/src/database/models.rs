//! Database models
//!
//! Rust structs representing backend rows. Every model derives serde (the
//! hosted backend speaks JSON) and `FromRow` (the local SQLite store).
//! Patch types skip absent fields so they double as PATCH bodies.

use crate::config::{
    DEFAULT_CONTACT_ROLE, DEFAULT_DETECTION_PERIOD_HOURS, DEFAULT_SOUND, DEFAULT_VIBRATION,
};
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

// ===== Profiles & users =====

/// Profile row keyed by the auth user id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub phone: Option<String>,
    /// `YYYY-MM-DD`
    pub birthday: Option<String>,
    pub hobbies: Option<String>,
    pub membership: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The signed-in identity, shared by both auth variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AppUser {
    pub id: String,
    pub phone: Option<String>,
    #[sqlx(default)]
    #[serde(default)]
    pub email: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub birthday: Option<String>,
    pub hobbies: Option<String>,
    pub membership: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AppUser {
    /// Identity for a hosted-auth user, filled from their profile row
    pub fn from_profile(profile: Profile, email: Option<String>) -> Self {
        Self {
            id: profile.id,
            phone: profile.phone,
            email,
            name: profile.name,
            avatar_url: profile.avatar_url,
            bio: profile.bio,
            birthday: profile.birthday,
            hobbies: profile.hobbies,
            membership: profile.membership,
            created_at: profile.created_at,
            updated_at: profile.updated_at,
        }
    }

    /// Name to show, falling back to the phone number or email
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.phone.as_deref())
            .or(self.email.as_deref())
            .unwrap_or("Guardian")
    }
}

/// `app_users` row including the password hash; never leaves the auth layer
#[derive(Debug, Clone, Deserialize, FromRow)]
pub struct AppUserRecord {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub user: AppUser,
    pub password_hash: String,
}

/// Insert body for `app_users`
#[derive(Debug, Clone, Serialize)]
pub struct NewAppUser {
    pub phone: String,
    pub password_hash: String,
    pub name: String,
}

/// Partial update of a profile or app user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthday: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hobbies: Option<String>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ===== Contacts =====

/// Emergency contact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Contact {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub role: String,
    pub role_color_class: Option<String>,
    pub email: String,
    pub avatar_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Contact as entered by the user
#[derive(Debug, Clone, Default)]
pub struct NewContact {
    pub name: String,
    pub email: String,
    /// Relationship label; defaults to "Friend"
    pub role: Option<String>,
    pub avatar_url: Option<String>,
}

/// Insert body for `contacts`
#[derive(Debug, Clone, Serialize)]
pub struct ContactInsert {
    pub user_id: String,
    pub name: String,
    pub role: String,
    pub role_color_class: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub is_active: bool,
}

/// Partial update of a contact
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContactPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_color_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

/// Relationship of a contact to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactRole {
    Parent,
    Spouse,
    Child,
    Sibling,
    Friend,
}

impl ContactRole {
    pub const ALL: [ContactRole; 5] = [
        ContactRole::Parent,
        ContactRole::Spouse,
        ContactRole::Child,
        ContactRole::Sibling,
        ContactRole::Friend,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ContactRole::Parent => "Parent",
            ContactRole::Spouse => "Spouse",
            ContactRole::Child => "Child",
            ContactRole::Sibling => "Sibling",
            ContactRole::Friend => DEFAULT_CONTACT_ROLE,
        }
    }

    /// Badge colour classes used when displaying the role
    pub fn color_class(self) -> &'static str {
        match self {
            ContactRole::Parent => "bg-orange-500/20 text-orange-300 border-orange-500/10",
            ContactRole::Spouse => "bg-pink-500/20 text-pink-300 border-pink-500/10",
            ContactRole::Child => "bg-blue-500/20 text-blue-300 border-blue-500/10",
            ContactRole::Sibling => "bg-purple-500/20 text-purple-300 border-purple-500/10",
            ContactRole::Friend => "bg-primary/20 text-primary border-primary/10",
        }
    }

    /// Match a free-form label; unknown labels count as friends
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|role| role.label().eq_ignore_ascii_case(label))
            .unwrap_or(ContactRole::Friend)
    }
}

// ===== Check-ins & moods =====

/// "I'm alive" event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CheckIn {
    pub id: String,
    pub user_id: String,
    pub checked_at: DateTime<Utc>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MoodKind {
    Calm,
    Happy,
    Tired,
    Sad,
    Anxious,
}

impl MoodKind {
    pub const ALL: [MoodKind; 5] = [
        MoodKind::Calm,
        MoodKind::Happy,
        MoodKind::Tired,
        MoodKind::Sad,
        MoodKind::Anxious,
    ];

    /// Position on the 0-100 chart scale
    pub fn score(self) -> u8 {
        match self {
            MoodKind::Happy => 100,
            MoodKind::Calm => 75,
            MoodKind::Tired => 50,
            MoodKind::Anxious => 35,
            MoodKind::Sad => 25,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MoodKind::Calm => "calm",
            MoodKind::Happy => "happy",
            MoodKind::Tired => "tired",
            MoodKind::Sad => "sad",
            MoodKind::Anxious => "anxious",
        }
    }
}

impl fmt::Display for MoodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MoodKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| AppError::Validation(format!("unknown mood: {}", s)))
    }
}

/// Recorded mood
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Mood {
    pub id: String,
    pub user_id: String,
    pub mood: MoodKind,
    pub recorded_at: DateTime<Utc>,
}

// ===== Will items =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum WillKind {
    Letter,
    Video,
    Asset,
    Audio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum WillStatus {
    #[default]
    Draft,
    Ready,
    Unconfigured,
}

/// `will_items` row as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct WillItemRecord {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: WillKind,
    pub title: String,
    pub status: WillStatus,
    pub description: Option<String>,
    pub file_url: Option<String>,
    pub meta: Option<String>,
    pub meta_icon: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Disclosure of a financial or digital asset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Type-specific payload of a will item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WillContent {
    Letter {
        body: String,
    },
    Video {
        file_url: Option<String>,
        note: Option<String>,
    },
    Audio {
        file_url: Option<String>,
        note: Option<String>,
    },
    Asset(AssetDetails),
}

impl WillContent {
    pub fn kind(&self) -> WillKind {
        match self {
            WillContent::Letter { .. } => WillKind::Letter,
            WillContent::Video { .. } => WillKind::Video,
            WillContent::Audio { .. } => WillKind::Audio,
            WillContent::Asset(_) => WillKind::Asset,
        }
    }

    /// An empty payload of the given kind
    pub fn empty(kind: WillKind) -> Self {
        match kind {
            WillKind::Letter => WillContent::Letter {
                body: String::new(),
            },
            WillKind::Video => WillContent::Video {
                file_url: None,
                note: None,
            },
            WillKind::Audio => WillContent::Audio {
                file_url: None,
                note: None,
            },
            WillKind::Asset => WillContent::Asset(AssetDetails::default()),
        }
    }

    /// Encode into the `(description, file_url)` columns
    pub fn to_columns(&self) -> Result<(Option<String>, Option<String>)> {
        match self {
            WillContent::Letter { body } => Ok((Some(body.clone()), None)),
            WillContent::Video { file_url, note } | WillContent::Audio { file_url, note } => {
                Ok((note.clone(), file_url.clone()))
            }
            WillContent::Asset(details) => Ok((Some(serde_json::to_string(details)?), None)),
        }
    }

    /// Decode from stored columns.
    ///
    /// Asset descriptions are JSON objects. Plain text written before the
    /// structured format existed is kept as the asset's notes; text that
    /// looks like JSON but does not parse is rejected.
    pub fn from_columns(
        kind: WillKind,
        description: Option<&str>,
        file_url: Option<&str>,
    ) -> Result<Self> {
        let description = description.filter(|d| !d.trim().is_empty());
        let file_url = file_url.filter(|u| !u.is_empty()).map(str::to_string);

        let content = match kind {
            WillKind::Letter => WillContent::Letter {
                body: description.unwrap_or_default().to_string(),
            },
            WillKind::Video => WillContent::Video {
                file_url,
                note: description.map(str::to_string),
            },
            WillKind::Audio => WillContent::Audio {
                file_url,
                note: description.map(str::to_string),
            },
            WillKind::Asset => match description {
                None => WillContent::Asset(AssetDetails::default()),
                Some(text) if text.trim_start().starts_with('{') => {
                    let details = serde_json::from_str(text).map_err(|e| {
                        AppError::Validation(format!("malformed asset details: {}", e))
                    })?;
                    WillContent::Asset(details)
                }
                Some(text) => WillContent::Asset(AssetDetails {
                    notes: Some(text.to_string()),
                    ..AssetDetails::default()
                }),
            },
        };

        Ok(content)
    }

    /// Replace the attached file of a video or audio item
    pub fn with_file_url(self, url: String) -> Result<Self> {
        match self {
            WillContent::Video { note, .. } => Ok(WillContent::Video {
                file_url: Some(url),
                note,
            }),
            WillContent::Audio { note, .. } => Ok(WillContent::Audio {
                file_url: Some(url),
                note,
            }),
            other => Err(AppError::Validation(format!(
                "{:?} items do not carry a file",
                other.kind()
            ))),
        }
    }
}

/// A digital will entry with its typed payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WillItem {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub status: WillStatus,
    pub content: WillContent,
    pub meta: Option<String>,
    pub meta_icon: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WillItem {
    pub fn kind(&self) -> WillKind {
        self.content.kind()
    }
}

impl TryFrom<WillItemRecord> for WillItem {
    type Error = AppError;

    fn try_from(record: WillItemRecord) -> Result<Self> {
        let content = WillContent::from_columns(
            record.kind,
            record.description.as_deref(),
            record.file_url.as_deref(),
        )?;

        Ok(Self {
            id: record.id,
            user_id: record.user_id,
            title: record.title,
            status: record.status,
            content,
            meta: record.meta,
            meta_icon: record.meta_icon,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

/// Will item as entered by the user
#[derive(Debug, Clone)]
pub struct NewWillItem {
    pub title: String,
    pub content: WillContent,
    pub status: Option<WillStatus>,
    pub meta: Option<String>,
    pub meta_icon: Option<String>,
}

/// Insert body for `will_items`
#[derive(Debug, Clone, Serialize)]
pub struct WillItemInsert {
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: WillKind,
    pub title: String,
    pub status: WillStatus,
    pub description: Option<String>,
    pub file_url: Option<String>,
    pub meta: Option<String>,
    pub meta_icon: Option<String>,
}

/// Partial update of a will item
#[derive(Debug, Clone, Default)]
pub struct WillItemPatch {
    pub title: Option<String>,
    pub status: Option<WillStatus>,
    pub content: Option<WillContent>,
    pub meta: Option<String>,
    pub meta_icon: Option<String>,
}

/// Column-level update of a will item. `Some(None)` clears a column.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WillItemRecordPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<WillStatus>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<WillKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_icon: Option<String>,
}

impl TryFrom<WillItemPatch> for WillItemRecordPatch {
    type Error = AppError;

    fn try_from(patch: WillItemPatch) -> Result<Self> {
        let mut record = WillItemRecordPatch {
            title: patch.title,
            status: patch.status,
            meta: patch.meta,
            meta_icon: patch.meta_icon,
            ..Default::default()
        };

        if let Some(content) = patch.content {
            let (description, file_url) = content.to_columns()?;
            record.kind = Some(content.kind());
            record.description = Some(description);
            record.file_url = Some(file_url);
        }

        Ok(record)
    }
}

// ===== Email & settings =====

/// Alert email template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct EmailConfig {
    pub id: String,
    pub user_id: String,
    pub subject: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Notification and detection preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UserSettings {
    pub id: String,
    pub user_id: String,
    pub do_not_disturb: bool,
    pub push_enabled: bool,
    pub sound: String,
    pub vibration: String,
    /// Stored only; nothing evaluates it against check-ins
    pub detection_period_hours: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The editable part of [`UserSettings`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsValues {
    pub do_not_disturb: bool,
    pub push_enabled: bool,
    pub sound: String,
    pub vibration: String,
    pub detection_period_hours: i64,
}

impl Default for SettingsValues {
    fn default() -> Self {
        Self {
            do_not_disturb: false,
            push_enabled: true,
            sound: DEFAULT_SOUND.to_string(),
            vibration: DEFAULT_VIBRATION.to_string(),
            detection_period_hours: DEFAULT_DETECTION_PERIOD_HOURS,
        }
    }
}

impl SettingsValues {
    /// Overlay the fields present in `patch`
    pub fn merged(mut self, patch: &SettingsPatch) -> Self {
        if let Some(v) = patch.do_not_disturb {
            self.do_not_disturb = v;
        }
        if let Some(v) = patch.push_enabled {
            self.push_enabled = v;
        }
        if let Some(v) = &patch.sound {
            self.sound = v.clone();
        }
        if let Some(v) = &patch.vibration {
            self.vibration = v.clone();
        }
        if let Some(v) = patch.detection_period_hours {
            self.detection_period_hours = v;
        }
        self
    }
}

impl From<&UserSettings> for SettingsValues {
    fn from(settings: &UserSettings) -> Self {
        Self {
            do_not_disturb: settings.do_not_disturb,
            push_enabled: settings.push_enabled,
            sound: settings.sound.clone(),
            vibration: settings.vibration.clone(),
            detection_period_hours: settings.detection_period_hours,
        }
    }
}

/// Partial update of user settings
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub do_not_disturb: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vibration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection_period_hours: Option<i64>,
}
