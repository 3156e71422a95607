//! Digital will service
//!
//! Letters, recorded messages and asset disclosures. Rows are converted to
//! [`WillItem`] on the way out, so malformed payloads surface as errors here
//! rather than in the caller.

use crate::config::{DEFAULT_WILL_META_ICON, WILL_FILES_BUCKET};
use crate::database::{
    NewWillItem, Store, WillItem, WillItemInsert, WillItemPatch, WillItemRecordPatch,
};
use crate::error::{AppError, Result};
use crate::stats::{self, WillSummary};
use crate::storage::{object_key, ObjectStore};
use std::sync::Arc;

/// Service for will items
#[derive(Clone)]
pub struct WillService {
    store: Arc<dyn Store>,
    objects: Arc<dyn ObjectStore>,
}

impl WillService {
    pub fn new(store: Arc<dyn Store>, objects: Arc<dyn ObjectStore>) -> Self {
        Self { store, objects }
    }

    /// All will items of a user, oldest first
    pub async fn list(&self, user_id: &str) -> Result<Vec<WillItem>> {
        self.store
            .list_will_items(user_id)
            .await?
            .into_iter()
            .map(WillItem::try_from)
            .collect()
    }

    pub async fn create(&self, user_id: &str, item: NewWillItem) -> Result<WillItem> {
        let title = item.title.trim();
        if title.is_empty() {
            return Err(AppError::Validation("title is required".to_string()));
        }

        // Flatten the typed content into columns
        let (description, file_url) = item.content.to_columns()?;
        let insert = WillItemInsert {
            user_id: user_id.to_string(),
            kind: item.content.kind(),
            title: title.to_string(),
            status: item.status.unwrap_or_default(),
            description,
            file_url,
            meta: item.meta,
            meta_icon: Some(
                item.meta_icon
                    .unwrap_or_else(|| DEFAULT_WILL_META_ICON.to_string()),
            ),
        };

        tracing::info!("Creating {:?} will item for user: {}", insert.kind, user_id);
        let record = self.store.insert_will_item(&insert).await?;
        tracing::info!("Will item created successfully: {}", record.id);

        WillItem::try_from(record)
    }

    /// Apply a partial update; `None` when the item does not exist
    pub async fn update(&self, id: &str, patch: WillItemPatch) -> Result<Option<WillItem>> {
        if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(AppError::Validation("title is required".to_string()));
        }

        let record_patch = WillItemRecordPatch::try_from(patch)?;

        tracing::debug!("Updating will item: {}", id);
        self.store
            .update_will_item(id, &record_patch)
            .await?
            .map(WillItem::try_from)
            .transpose()
    }

    /// Delete an item; `false` when it did not exist
    pub async fn delete(&self, id: &str) -> Result<bool> {
        tracing::info!("Deleting will item: {}", id);
        self.store.delete_will_item(id).await
    }

    /// Counts by status
    pub async fn summary(&self, user_id: &str) -> Result<WillSummary> {
        let items = self.list(user_id).await?;
        Ok(stats::will_summary(&items))
    }

    /// Upload media for an item to `will-files/{user}/{item}.{ext}`
    pub async fn upload_file(
        &self,
        user_id: &str,
        item_id: &str,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<String> {
        let key = object_key(user_id, item_id, file_name)?;

        tracing::info!("Uploading will file {} ({} bytes)", key, data.len());
        let url = self
            .objects
            .upload(WILL_FILES_BUCKET, &key, data, content_type_for(file_name))
            .await?;

        Ok(url)
    }

    /// Upload media and point a video or audio item at it
    pub async fn attach_file(
        &self,
        item: &WillItem,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<Option<WillItem>> {
        // Reject letters and assets before uploading anything
        let content = item.content.clone().with_file_url(String::new())?;

        // Write to object store
        let url = self.upload_file(&item.user_id, &item.id, file_name, data).await?;

        // Point the item at the uploaded file
        let patch = WillItemPatch {
            content: Some(content.with_file_url(url)?),
            ..Default::default()
        };
        self.update(&item.id, patch).await
    }
}

fn content_type_for(file_name: &str) -> Option<&'static str> {
    let ext = file_name.rsplit_once('.')?.1.to_ascii_lowercase();

    let mime = match ext.as_str() {
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "wav" => "audio/wav",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        _ => return None,
    };

    Some(mime)
}
