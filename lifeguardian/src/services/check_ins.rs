//! Check-in service
//!
//! Records "I'm okay" events and answers today/last/streak questions.

use crate::config::{CHECK_IN_HISTORY_DAYS, STREAK_LOOKBACK_DAYS};
use crate::database::{CheckIn, Store};
use crate::error::Result;
use crate::stats;
use chrono::{DateTime, Local, TimeZone, Utc};
use std::sync::Arc;

/// Service for check-ins
#[derive(Clone)]
pub struct CheckInService {
    store: Arc<dyn Store>,
}

impl CheckInService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Record a check-in now
    pub async fn check_in(&self, user_id: &str) -> Result<CheckIn> {
        tracing::info!("Recording check-in for user: {}", user_id);
        let check_in = self.store.insert_check_in(user_id).await?;
        tracing::info!("Check-in recorded: {}", check_in.id);
        Ok(check_in)
    }

    /// Latest check-in since local midnight, if any
    pub async fn today(&self, user_id: &str) -> Result<Option<CheckIn>> {
        self.today_at(user_id, &Local::now()).await
    }

    pub async fn today_at<Tz: TimeZone>(
        &self,
        user_id: &str,
        now: &DateTime<Tz>,
    ) -> Result<Option<CheckIn>> {
        let since = start_of_day(now);
        let check_ins = self.store.list_check_ins_since(user_id, since).await?;
        Ok(check_ins.into_iter().next())
    }

    /// Check-ins from the last `days` days, newest first
    pub async fn history(&self, user_id: &str, days: u32) -> Result<Vec<CheckIn>> {
        let since = stats::window_start(Utc::now(), days)?;
        self.store.list_check_ins_since(user_id, since).await
    }

    /// The last 30 days
    pub async fn recent_history(&self, user_id: &str) -> Result<Vec<CheckIn>> {
        self.history(user_id, CHECK_IN_HISTORY_DAYS).await
    }

    pub async fn last(&self, user_id: &str) -> Result<Option<CheckIn>> {
        self.store.last_check_in(user_id).await
    }

    /// Consecutive days with a check-in ending today
    pub async fn streak(&self, user_id: &str) -> Result<u32> {
        let history = self.history(user_id, STREAK_LOOKBACK_DAYS).await?;
        Ok(stats::check_in_streak(&history))
    }
}

/// Midnight of `now`'s calendar day, as a UTC instant
pub(crate) fn start_of_day<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    let midnight = now.date_naive().and_time(chrono::NaiveTime::MIN);

    now.timezone()
        .from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        // Midnight skipped by a DST change: fall back to the instant itself
        .unwrap_or_else(|| now.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{create_memory_pool, Repository};
    use crate::error::AppError;
    use chrono::{Duration, FixedOffset};

    async fn create_test_service() -> (CheckInService, Repository) {
        let repo = Repository::new(create_memory_pool().await.unwrap());
        (CheckInService::new(Arc::new(repo.clone())), repo)
    }

    #[test]
    fn test_start_of_day_respects_offset() {
        let tz = FixedOffset::east_opt(8 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2026, 10, 18, 7, 0, 0).unwrap();

        let start = start_of_day(&now);
        assert_eq!(start.to_rfc3339(), "2026-10-17T16:00:00+00:00");
    }

    #[tokio::test]
    async fn test_check_in_shows_up_today() {
        let (service, _repo) = create_test_service().await;

        assert!(service.today("u1").await.unwrap().is_none());

        let created = service.check_in("u1").await.unwrap();
        let today = service.today("u1").await.unwrap().unwrap();

        assert_eq!(today.id, created.id);
        assert_eq!(service.last("u1").await.unwrap().unwrap().id, created.id);
    }

    #[tokio::test]
    async fn test_yesterday_is_not_today() {
        let (service, repo) = create_test_service().await;
        let now = Utc::now();

        repo.insert_check_in_at("u1", now - Duration::days(1) - Duration::hours(1))
            .await
            .unwrap();

        assert!(service.today_at("u1", &now).await.unwrap().is_none());
        assert!(service.last("u1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_streak_from_store() {
        let (service, repo) = create_test_service().await;
        let now = Utc::now();

        for days_ago in 0..4 {
            repo.insert_check_in_at("u1", now - Duration::days(days_ago))
                .await
                .unwrap();
        }

        assert_eq!(service.streak("u1").await.unwrap(), 4);
        assert_eq!(service.streak("u2").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_history_window() {
        let (service, repo) = create_test_service().await;
        let now = Utc::now();

        repo.insert_check_in_at("u1", now - Duration::days(45)).await.unwrap();
        repo.insert_check_in_at("u1", now - Duration::days(5)).await.unwrap();

        assert_eq!(service.recent_history("u1").await.unwrap().len(), 1);
        assert_eq!(service.history("u1", 60).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_oversized_history_window_is_rejected() {
        let (service, _repo) = create_test_service().await;

        let result = service.history("u1", u32::MAX).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
