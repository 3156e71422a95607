//! Settings service
//!
//! Notification preferences, the detection period and the alert email
//! template. Each user has at most one row of each; writes insert the row
//! on first use.
//!
//! The detection period and the email template are stored only. Nothing in
//! this crate watches check-in recency or sends mail.

use crate::config::{
    DEFAULT_EMAIL_BODY, DEFAULT_EMAIL_SUBJECT, MAX_DETECTION_PERIOD_HOURS,
    MIN_DETECTION_PERIOD_HOURS,
};
use crate::database::{EmailConfig, SettingsPatch, SettingsValues, Store, UserSettings};
use crate::error::{AppError, Result};
use serde::Serialize;
use std::sync::Arc;

/// Alert email subject and body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailTemplate {
    pub subject: String,
    pub body: String,
}

impl Default for EmailTemplate {
    fn default() -> Self {
        Self {
            subject: DEFAULT_EMAIL_SUBJECT.to_string(),
            body: DEFAULT_EMAIL_BODY.to_string(),
        }
    }
}

impl From<EmailConfig> for EmailTemplate {
    fn from(config: EmailConfig) -> Self {
        Self {
            subject: config.subject,
            body: config.body,
        }
    }
}

/// Service for user settings and the email template
#[derive(Clone)]
pub struct SettingsService {
    store: Arc<dyn Store>,
}

impl SettingsService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Values used before the user changes anything
    pub fn defaults() -> SettingsValues {
        SettingsValues::default()
    }

    pub async fn get(&self, user_id: &str) -> Result<Option<UserSettings>> {
        self.store.get_settings(user_id).await
    }

    /// Stored values, or the defaults when nothing is stored yet
    pub async fn get_or_default(&self, user_id: &str) -> Result<SettingsValues> {
        Ok(self
            .get(user_id)
            .await?
            .map(|settings| SettingsValues::from(&settings))
            .unwrap_or_else(Self::defaults))
    }

    /// Update settings, creating the row from defaults if needed
    pub async fn update(&self, user_id: &str, patch: SettingsPatch) -> Result<UserSettings> {
        validate_patch(&patch)?;

        // Update existing
        if self.store.get_settings(user_id).await?.is_some() {
            if let Some(updated) = self.store.update_settings(user_id, &patch).await? {
                tracing::info!("Settings updated for user: {}", user_id);
                return Ok(updated);
            }
            tracing::warn!("Settings for user {} vanished during update", user_id);
        }

        // First write: start from the defaults
        let values = Self::defaults().merged(&patch);
        let created = self.store.insert_settings(user_id, &values).await?;
        tracing::info!("Settings created for user: {}", user_id);

        Ok(created)
    }

    pub async fn email_config(&self, user_id: &str) -> Result<Option<EmailConfig>> {
        self.store.get_email_config(user_id).await
    }

    /// Stored template, or the built-in one
    pub async fn email_config_or_default(&self, user_id: &str) -> Result<EmailTemplate> {
        Ok(self
            .email_config(user_id)
            .await?
            .map(EmailTemplate::from)
            .unwrap_or_default())
    }

    /// Save the template, creating it on first use
    pub async fn update_email_config(
        &self,
        user_id: &str,
        subject: &str,
        body: &str,
    ) -> Result<EmailConfig> {
        let subject = subject.trim();
        if subject.is_empty() {
            return Err(AppError::Validation("email subject is required".to_string()));
        }

        // Update existing
        if self.store.get_email_config(user_id).await?.is_some() {
            if let Some(updated) = self.store.update_email_config(user_id, subject, body).await? {
                tracing::info!("Email config updated for user: {}", user_id);
                return Ok(updated);
            }
        }

        let created = self.store.insert_email_config(user_id, subject, body).await?;
        tracing::info!("Email config created for user: {}", user_id);

        Ok(created)
    }
}

fn validate_patch(patch: &SettingsPatch) -> Result<()> {
    if let Some(hours) = patch.detection_period_hours {
        if !(MIN_DETECTION_PERIOD_HOURS..=MAX_DETECTION_PERIOD_HOURS).contains(&hours) {
            return Err(AppError::Validation(format!(
                "detection period must be between {} and {} hours, got {}",
                MIN_DETECTION_PERIOD_HOURS, MAX_DETECTION_PERIOD_HOURS, hours
            )));
        }
    }

    for (field, value) in [("sound", &patch.sound), ("vibration", &patch.vibration)] {
        if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
            return Err(AppError::Validation(format!("{} must not be empty", field)));
        }
    }

    Ok(())
}
