//! Mood service
//!
//! Records moods and builds the weekly mood chart.

use super::check_ins::start_of_day;
use crate::database::{Mood, MoodKind, Store};
use crate::error::Result;
use crate::stats::{self, MoodPoint};
use chrono::{Local, Utc};
use std::sync::Arc;

/// Service for moods
#[derive(Clone)]
pub struct MoodService {
    store: Arc<dyn Store>,
}

impl MoodService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Record a mood now
    pub async fn record(&self, user_id: &str, mood: MoodKind) -> Result<Mood> {
        tracing::info!("Recording mood {} for user: {}", mood, user_id);
        self.store.insert_mood(user_id, mood).await
    }

    /// Most recent mood since local midnight
    pub async fn today(&self, user_id: &str) -> Result<Option<Mood>> {
        let since = start_of_day(&Local::now());
        let moods = self.store.list_moods_since(user_id, since).await?;
        Ok(moods.into_iter().last())
    }

    /// Moods from the last `days` days, oldest first
    pub async fn history(&self, user_id: &str, days: u32) -> Result<Vec<Mood>> {
        let since = stats::window_start(Utc::now(), days)?;
        self.store.list_moods_since(user_id, since).await
    }

    /// Chart series for the last `days` days
    pub async fn stats(&self, user_id: &str, days: u32) -> Result<Vec<MoodPoint>> {
        let history = self.history(user_id, days).await?;
        stats::mood_stats(&history, days)
    }

    /// Most common mood over the last `days` days
    pub async fn dominant(&self, user_id: &str, days: u32) -> Result<Option<MoodKind>> {
        let history = self.history(user_id, days).await?;
        Ok(stats::dominant_mood(&history))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MOOD_WINDOW_DAYS;
    use crate::database::{create_memory_pool, Repository};
    use crate::error::AppError;
    use chrono::Duration;

    async fn create_test_service() -> (MoodService, Repository) {
        let repo = Repository::new(create_memory_pool().await.unwrap());
        (MoodService::new(Arc::new(repo.clone())), repo)
    }

    #[tokio::test]
    async fn test_today_returns_latest() {
        let (service, repo) = create_test_service().await;

        assert!(service.today("u1").await.unwrap().is_none());

        repo.insert_mood_at("u1", MoodKind::Tired, Utc::now() - Duration::seconds(1))
            .await
            .unwrap();
        service.record("u1", MoodKind::Calm).await.unwrap();

        let today = service.today("u1").await.unwrap().unwrap();
        assert_eq!(today.mood, MoodKind::Calm);
    }

    #[tokio::test]
    async fn test_stats_and_dominant_ignore_old_moods() {
        let (service, repo) = create_test_service().await;
        let now = Utc::now();

        repo.insert_mood_at("u1", MoodKind::Sad, now - Duration::days(20)).await.unwrap();
        repo.insert_mood_at("u1", MoodKind::Sad, now - Duration::days(21)).await.unwrap();
        repo.insert_mood_at("u1", MoodKind::Happy, now - Duration::hours(1)).await.unwrap();

        let points = service.stats("u1", MOOD_WINDOW_DAYS).await.unwrap();
        assert_eq!(points.len(), 7);

        let dominant = service.dominant("u1", MOOD_WINDOW_DAYS).await.unwrap();
        assert_eq!(dominant, Some(MoodKind::Happy));
    }

    #[tokio::test]
    async fn test_oversized_window_is_rejected() {
        let (service, _repo) = create_test_service().await;

        assert!(matches!(
            service.history("u1", u32::MAX).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            service.stats("u1", u32::MAX).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_dominant_without_history() {
        let (service, _repo) = create_test_service().await;
        assert_eq!(service.dominant("u1", 7).await.unwrap(), None);
    }
}
