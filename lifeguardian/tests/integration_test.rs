//! Integration tests for Life Guardian
//!
//! These tests verify end-to-end functionality including:
//! - Registration, sign-in and session persistence
//! - Check-in streaks and the mood chart
//! - Will items and contacts on a file-backed database

use chrono::{Duration, Utc};
use lifeguardian::app::AppState;
use lifeguardian::config::{MAX_CONTACTS, MOOD_WINDOW_DAYS};
use lifeguardian::database::{
    create_pool, AssetDetails, MoodKind, NewContact, NewWillItem, Repository, WillContent,
    WillStatus,
};
use lifeguardian::error::AppError;
use lifeguardian::services::{CheckInService, MoodService};
use lifeguardian::stats;
use std::sync::Arc;
use tempfile::TempDir;

/// Helper to create a file-backed database with schema
async fn create_test_db() -> (Repository, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let pool = create_pool(&db_path).await.unwrap();
    let repo = Repository::new(pool);

    (repo, temp_dir)
}

#[tokio::test]
async fn test_register_login_and_resume() {
    let temp = TempDir::new().unwrap();

    let state = AppState::local(temp.path(), None).await.unwrap();
    let user = state.session.sign_up("13912345678", "guardian").await.unwrap();
    state.session.sign_out().await.unwrap();
    assert!(state.session.current_user().is_none());

    let signed_in = state.session.sign_in("13912345678", "guardian").await.unwrap();
    assert_eq!(signed_in.id, user.id);
    state.shutdown().await;

    // A new process picks up the stored session
    let state = AppState::local(temp.path(), None).await.unwrap();
    assert_eq!(state.session.current_user().map(|u| u.id), Some(user.id));

    let wrong = state.session.sign_in("13912345678", "not-it").await;
    assert!(matches!(wrong, Err(AppError::Auth(_))));
    state.shutdown().await;
}

#[tokio::test]
async fn test_check_in_streak() {
    let (repo, _temp) = create_test_db().await;
    let service = CheckInService::new(Arc::new(repo.clone()));

    assert_eq!(service.streak("u1").await.unwrap(), 0);

    let now = Utc::now();
    repo.insert_check_in_at("u1", now - Duration::days(2)).await.unwrap();
    repo.insert_check_in_at("u1", now - Duration::days(1)).await.unwrap();

    // Yesterday's run does not count until today is checked in
    assert_eq!(service.streak("u1").await.unwrap(), 0);

    service.check_in("u1").await.unwrap();
    assert_eq!(service.streak("u1").await.unwrap(), 3);
    assert!(service.today("u1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_mood_chart_week() {
    let (repo, _temp) = create_test_db().await;
    let service = MoodService::new(Arc::new(repo.clone()));

    let now = Utc::now();
    repo.insert_mood_at("u1", MoodKind::Happy, now - Duration::days(2)).await.unwrap();
    repo.insert_mood_at("u1", MoodKind::Happy, now - Duration::days(1)).await.unwrap();
    service.record("u1", MoodKind::Sad).await.unwrap();

    let points = service.stats("u1", MOOD_WINDOW_DAYS).await.unwrap();
    assert_eq!(points.len(), 7);
    assert!(points.iter().all(|p| p.value <= 100));

    let dominant = service.dominant("u1", MOOD_WINDOW_DAYS).await.unwrap();
    assert_eq!(dominant, Some(MoodKind::Happy));
}

#[tokio::test]
async fn test_will_and_contacts_for_signed_in_user() {
    let temp = TempDir::new().unwrap();
    let state = AppState::local(temp.path(), None).await.unwrap();
    let user = state.session.sign_up("13712345678", "guardian").await.unwrap();

    let details = AssetDetails {
        institution: Some("Harbor Credit Union".to_string()),
        account_hint: Some("ends 7731".to_string()),
        estimated_value: Some("40,000".to_string()),
        notes: Some("Statements in the desk drawer".to_string()),
    };
    let asset = state
        .will
        .create(
            &user.id,
            NewWillItem {
                title: "Savings".to_string(),
                content: WillContent::Asset(details.clone()),
                status: Some(WillStatus::Ready),
                meta: None,
                meta_icon: None,
            },
        )
        .await
        .unwrap();

    let items = state.will.list(&user.id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, asset.id);
    assert_eq!(items[0].content, WillContent::Asset(details));
    assert_eq!(state.will.summary(&user.id).await.unwrap().ready, 1);

    for i in 0..MAX_CONTACTS {
        state
            .contacts
            .create(
                &user.id,
                NewContact {
                    name: format!("Contact {}", i),
                    email: format!("c{}@example.com", i),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    let overflow = state
        .contacts
        .create(
            &user.id,
            NewContact {
                name: "One too many".to_string(),
                email: "extra@example.com".to_string(),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(overflow, Err(AppError::ContactLimitReached(n)) if n == MAX_CONTACTS));

    state.shutdown().await;
}

#[tokio::test]
async fn test_stats_follow_profile_birthday() {
    let temp = TempDir::new().unwrap();
    let state = AppState::local(temp.path(), None).await.unwrap();
    state.session.sign_up("13612345678", "guardian").await.unwrap();

    let before = stats::life_stats(None).unwrap();
    assert_eq!(before.peer_percentile, 88);

    let birthday = (Utc::now() - Duration::days(30 * 365)).format("%Y-%m-%d").to_string();
    let user = state
        .session
        .update_profile(lifeguardian::database::ProfilePatch {
            birthday: Some(birthday),
            ..Default::default()
        })
        .await
        .unwrap();

    let after = stats::life_stats(user.birthday.as_deref()).unwrap();
    assert!((after.days_alive - 10950).abs() <= 8);
    assert!((after.remaining_years - 48).abs() <= 1);

    state.shutdown().await;
}
