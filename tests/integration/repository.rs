// tests/integration/repository.rs
use super::{create_test_repo, days_ago, seed_entry};
use chrono::{NaiveDate, TimeZone, Utc};
use journal_companion::models::internal::{
    EntryFilter, EntryUpdate, Mood, NewConversation, NewEntry, PeriodType, Role, SessionType,
    Summary,
};
use journal_companion::storage::{ConversationStore, EntryStore, RepositoryError, SummaryStore};
use uuid::Uuid;

#[tokio::test]
async fn test_create_and_fetch_entry() {
    let repo = create_test_repo().await;

    let entry = repo
        .create_entry(
            "u1",
            NewEntry {
                content: "First entry".to_string(),
                mood: Some(Mood::Good),
                energy: Some(4),
                tags: vec![" work ".to_string(), "work".to_string(), "home".to_string()],
                created_at: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(entry.tags, vec!["work", "home"]);
    assert!(entry.reflection.is_none());
    assert!(entry.themes.is_empty());

    let fetched = repo.get_entry("u1", entry.id).await.unwrap().unwrap();
    assert_eq!(fetched, entry);

    // Other users never see it
    assert!(repo.get_entry("u2", entry.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_list_entries_filters_and_orders_newest_first() {
    let repo = create_test_repo().await;
    seed_entry(&repo, "u1", days_ago(10), "old", Some(Mood::Rough), &["work"]).await;
    seed_entry(&repo, "u1", days_ago(3), "mid", Some(Mood::Okay), &["health"]).await;
    seed_entry(&repo, "u1", days_ago(1), "new", Some(Mood::Good), &["work", "wins"]).await;
    seed_entry(&repo, "u2", days_ago(1), "someone else", None, &["work"]).await;

    let all = repo.list_entries("u1", &EntryFilter::default()).await.unwrap();
    let contents: Vec<&str> = all.iter().map(|e| e.content.as_str()).collect();
    assert_eq!(contents, vec!["new", "mid", "old"]);

    let recent = repo
        .list_entries(
            "u1",
            &EntryFilter {
                since: Some(days_ago(7)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(recent.len(), 2);

    let tagged = repo
        .list_entries(
            "u1",
            &EntryFilter {
                tag: Some("work".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let contents: Vec<&str> = tagged.iter().map(|e| e.content.as_str()).collect();
    assert_eq!(contents, vec!["new", "old"]);

    let rough = repo
        .list_entries(
            "u1",
            &EntryFilter {
                mood: Some(Mood::Rough),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(rough.len(), 1);

    let bounded = repo
        .list_entries(
            "u1",
            &EntryFilter {
                until: Some(days_ago(2)),
                limit: 1,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(bounded.len(), 1);
    assert_eq!(bounded[0].content, "mid");
}

#[tokio::test]
async fn test_update_touches_only_allowed_fields() {
    let repo = create_test_repo().await;
    let entry = seed_entry(&repo, "u1", days_ago(0), "draft", None, &[]).await;
    repo.annotate_entry("u1", entry.id, Some("A reflection".to_string()), vec!["focus".to_string()])
        .await
        .unwrap();

    let updated = repo
        .update_entry(
            "u1",
            entry.id,
            EntryUpdate {
                content: Some("final".to_string()),
                mood: Some(Mood::Okay),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.content, "final");
    assert_eq!(updated.mood, Some(Mood::Okay));
    assert_eq!(updated.created_at, entry.created_at);
    assert!(updated.updated_at >= entry.updated_at);
    assert_eq!(updated.reflection.as_deref(), Some("A reflection"));
    assert_eq!(updated.themes, vec!["focus"]);
}

#[tokio::test]
async fn test_blank_content_is_invalid_input() {
    let repo = create_test_repo().await;
    let err = repo
        .create_entry(
            "u1",
            NewEntry {
                content: "   ".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::InvalidInput(_)));
}

#[tokio::test]
async fn test_soft_delete_hides_entry() {
    let repo = create_test_repo().await;
    let entry = seed_entry(&repo, "u1", days_ago(0), "gone soon", None, &[]).await;

    assert!(repo.soft_delete_entry("u1", entry.id).await.unwrap());
    assert!(!repo.soft_delete_entry("u1", entry.id).await.unwrap());
    assert!(repo.get_entry("u1", entry.id).await.unwrap().is_none());
    assert!(repo
        .list_entries("u1", &EntryFilter::default())
        .await
        .unwrap()
        .is_empty());
    assert!(repo
        .update_entry(
            "u1",
            entry.id,
            EntryUpdate {
                content: Some("revived".to_string()),
                ..Default::default()
            }
        )
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_entry_dates_are_distinct_and_descending() {
    let repo = create_test_repo().await;
    let day = |d: u32, h: u32| Utc.with_ymd_and_hms(2024, 5, d, h, 0, 0).unwrap();
    seed_entry(&repo, "u1", day(17, 8), "a", None, &[]).await;
    seed_entry(&repo, "u1", day(19, 8), "b", None, &[]).await;
    seed_entry(&repo, "u1", day(19, 21), "c", None, &[]).await;
    seed_entry(&repo, "u1", day(20, 7), "d", None, &[]).await;

    let dates = repo.entry_dates("u1", 100).await.unwrap();
    let expected: Vec<NaiveDate> = [20, 19, 17]
        .iter()
        .map(|d| NaiveDate::from_ymd_opt(2024, 5, *d).unwrap())
        .collect();
    assert_eq!(dates, expected);
}

#[tokio::test]
async fn test_summary_upsert_replaces_by_period_key() {
    let repo = create_test_repo().await;
    let start = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
    let mut summary = Summary {
        user_id: "u1".to_string(),
        period_start: start,
        period_end: NaiveDate::from_ymd_opt(2024, 4, 30).unwrap(),
        period_type: PeriodType::Monthly,
        summary: "first draft".to_string(),
        entry_count: 3,
    };

    repo.upsert_summary(&summary).await.unwrap();
    summary.summary = "second draft".to_string();
    summary.entry_count = 4;
    repo.upsert_summary(&summary).await.unwrap();

    let stored = repo
        .get_summary("u1", start, PeriodType::Monthly)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored, summary);

    // Same start, different type is a different key
    assert!(repo
        .get_summary("u1", start, PeriodType::Weekly)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_latest_summary_picks_most_recent_period() {
    let repo = create_test_repo().await;
    for (month, text) in [(2, "february"), (4, "april"), (3, "march")] {
        let start = NaiveDate::from_ymd_opt(2024, month, 1).unwrap();
        repo.upsert_summary(&Summary {
            user_id: "u1".to_string(),
            period_start: start,
            period_end: PeriodType::Monthly.period_end(start).unwrap(),
            period_type: PeriodType::Monthly,
            summary: text.to_string(),
            entry_count: 1,
        })
        .await
        .unwrap();
    }

    let latest = repo
        .latest_summary("u1", PeriodType::Monthly)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.summary, "april");
    assert!(repo
        .latest_summary("u2", PeriodType::Monthly)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_conversation_messages_keep_canonical_order() {
    let repo = create_test_repo().await;
    let conv = repo
        .create_conversation(
            "u1",
            NewConversation {
                entry_id: None,
                session_type: SessionType::WeeklyReview,
            },
        )
        .await
        .unwrap();

    repo.append_message(conv.id, Role::User, "one").await.unwrap();
    repo.append_message(conv.id, Role::Assistant, "two").await.unwrap();
    repo.append_message(conv.id, Role::User, "three").await.unwrap();

    let messages = repo.list_messages(conv.id).await.unwrap();
    let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["one", "two", "three"]);

    let refreshed = repo.get_conversation("u1", conv.id).await.unwrap().unwrap();
    assert!(refreshed.updated_at >= conv.updated_at);
    assert_eq!(refreshed.session_type, SessionType::WeeklyReview);
}

#[tokio::test]
async fn test_append_to_deleted_conversation_is_not_found() {
    let repo = create_test_repo().await;
    let conv = repo
        .create_conversation(
            "u1",
            NewConversation {
                entry_id: None,
                session_type: SessionType::Freeform,
            },
        )
        .await
        .unwrap();

    assert!(repo.soft_delete_conversation("u1", conv.id).await.unwrap());
    let err = repo
        .append_message(conv.id, Role::User, "hello?")
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound(_)));

    let err = repo
        .append_message(Uuid::new_v4(), Role::User, "anyone?")
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound(_)));
}
