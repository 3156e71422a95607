//! Application configuration
//!
//! Central location for configuration constants, validation boundaries and
//! the backend connection settings read from the environment.

use crate::error::{AppError, Result};
use std::path::PathBuf;

// ===== Life Statistics =====

/// Average life expectancy used for "remaining years"
pub const AVG_LIFE_EXPECTANCY_YEARS: f64 = 78.4;

/// Lifespan in days used by the life progress grid
pub const AVG_LIFESPAN_DAYS: i64 = 78 * 365;

/// Assumed age when the user has not entered a birthday
pub const DEFAULT_AGE_YEARS: i64 = 34;

/// Peer percentile shown when no birthday is known
pub const DEFAULT_PEER_PERCENTILE: u8 = 88;

/// Upper bound of the peer percentile
pub const MAX_PEER_PERCENTILE: u8 = 99;

/// Chart value for a day with no recorded mood
pub const NEUTRAL_MOOD_VALUE: u8 = 50;

// ===== History Windows =====

/// Default check-in history window in days
pub const CHECK_IN_HISTORY_DAYS: u32 = 30;

/// History fetched when computing a streak
pub const STREAK_LOOKBACK_DAYS: u32 = 365;

/// Default mood history / chart window in days
pub const MOOD_WINDOW_DAYS: u32 = 7;

// ===== Contacts =====

/// Maximum number of emergency contacts per user
pub const MAX_CONTACTS: usize = 5;

/// Relationship assigned when none is given
pub const DEFAULT_CONTACT_ROLE: &str = "Friend";

// ===== Settings =====

/// Default inactivity detection period in hours
pub const DEFAULT_DETECTION_PERIOD_HOURS: i64 = 72;

/// Shortest selectable detection period
pub const MIN_DETECTION_PERIOD_HOURS: i64 = 24;

/// Longest selectable detection period (one week)
pub const MAX_DETECTION_PERIOD_HOURS: i64 = 168;

pub const DEFAULT_SOUND: &str = "Default (Radar)";
pub const DEFAULT_VIBRATION: &str = "Heartbeat";

pub const DEFAULT_EMAIL_SUBJECT: &str = "[Urgent] Automatic alert from Life Guardian";
pub const DEFAULT_EMAIL_BODY: &str = "This is an automatic emergency message. If you are reading it, \
I have not confirmed that I am okay for more than 72 hours. Please try to reach me, \
or act on what we agreed beforehand.";

// ===== Profiles =====

pub const DEFAULT_MEMBERSHIP: &str = "free";

// ===== Will Items =====

pub const DEFAULT_WILL_META_ICON: &str = "edit";

// ===== Storage =====

pub const AVATAR_BUCKET: &str = "avatars";
pub const WILL_FILES_BUCKET: &str = "will-files";

/// Cache lifetime sent with uploads, in seconds
pub const UPLOAD_CACHE_CONTROL: &str = "3600";

/// File holding the signed-in user between runs
pub const SESSION_FILE: &str = "session.json";

/// Key under which the signed-in user is stored
pub const SESSION_USER_KEY: &str = "app_user";

/// Hosted-mode access token kept between runs
pub const AUTH_TOKEN_FILE: &str = "auth_token.json";

/// Local database file inside the data directory
pub const DATABASE_FILE: &str = "lifeguardian.db";

/// Local object store directory inside the data directory
pub const OBJECTS_DIR: &str = "files";

// ===== Environment =====

pub const ENV_BACKEND_URL: &str = "LIFE_GUARDIAN_URL";
pub const ENV_ANON_KEY: &str = "LIFE_GUARDIAN_ANON_KEY";
pub const ENV_DATA_DIR: &str = "LIFE_GUARDIAN_DATA_DIR";

/// Base URL of a static file server over the local object store
pub const ENV_FILES_URL: &str = "LIFE_GUARDIAN_FILES_URL";

/// Directory name under the platform data directory
pub const APP_DIR_NAME: &str = "lifeguardian";

/// Connection settings for the hosted backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedBackend {
    pub url: String,
    pub anon_key: String,
}

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// `None` selects the local SQLite backend
    pub hosted: Option<HostedBackend>,
    pub data_dir: PathBuf,
    /// Public base URL for local uploads; `file://` URLs when unset
    pub files_url: Option<String>,
}

impl BackendConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// Setting only one of the URL and the anon key is an error; setting
    /// neither selects local mode.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let hosted = match (non_empty(ENV_BACKEND_URL), non_empty(ENV_ANON_KEY)) {
            (Some(url), Some(anon_key)) => Some(HostedBackend {
                url: url.trim_end_matches('/').to_string(),
                anon_key,
            }),
            (None, None) => None,
            _ => {
                return Err(AppError::Config(format!(
                    "both {} and {} must be set to use the hosted backend",
                    ENV_BACKEND_URL, ENV_ANON_KEY
                )))
            }
        };

        // Explicit data directory wins over the platform default
        let data_dir = match non_empty(ENV_DATA_DIR) {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir()?,
        };

        let files_url = non_empty(ENV_FILES_URL).map(|url| url.trim_end_matches('/').to_string());

        Ok(Self {
            hosted,
            data_dir,
            files_url,
        })
    }
}

/// Platform data directory for the app
///
/// - Windows: %LOCALAPPDATA%\lifeguardian
/// - macOS: ~/Library/Application Support/lifeguardian
/// - Linux: ~/.local/share/lifeguardian
fn default_data_dir() -> Result<PathBuf> {
    dirs::data_local_dir()
        .or_else(dirs::data_dir)
        .map(|base| base.join(APP_DIR_NAME))
        .ok_or_else(|| {
            AppError::Config(format!(
                "no platform data directory found; set {} instead",
                ENV_DATA_DIR
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_local_mode_without_backend_vars() {
        let config = BackendConfig::from_lookup(lookup(&[(ENV_DATA_DIR, "/tmp/lg")])).unwrap();
        assert!(config.hosted.is_none());
        assert_eq!(config.data_dir, PathBuf::from("/tmp/lg"));
    }

    #[test]
    fn test_hosted_mode_trims_trailing_slash() {
        let config = BackendConfig::from_lookup(lookup(&[
            (ENV_BACKEND_URL, "https://example.supabase.co/"),
            (ENV_ANON_KEY, "anon"),
            (ENV_DATA_DIR, "/tmp/lg"),
        ]))
        .unwrap();

        let hosted = config.hosted.unwrap();
        assert_eq!(hosted.url, "https://example.supabase.co");
        assert_eq!(hosted.anon_key, "anon");
    }

    #[test]
    fn test_partial_backend_config_is_rejected() {
        let result = BackendConfig::from_lookup(lookup(&[(ENV_BACKEND_URL, "https://x.co")]));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_default_data_dir_is_platform_dir() {
        let Some(base) = dirs::data_local_dir().or_else(dirs::data_dir) else {
            return;
        };

        let config = BackendConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.data_dir, base.join(APP_DIR_NAME));
        assert!(config.data_dir.is_absolute());
    }

    #[test]
    fn test_files_url() {
        let config = BackendConfig::from_lookup(lookup(&[
            (ENV_DATA_DIR, "/tmp/lg"),
            (ENV_FILES_URL, "http://localhost:8080/files/"),
        ]))
        .unwrap();
        assert_eq!(config.files_url.as_deref(), Some("http://localhost:8080/files"));

        let config = BackendConfig::from_lookup(lookup(&[(ENV_DATA_DIR, "/tmp/lg")])).unwrap();
        assert!(config.files_url.is_none());
    }
}
