// tests/integration/concurrency.rs
use super::{create_orchestrator, create_test_repo, seed_entry, test_settings, Arc, FakeCompletion};
use chrono::{NaiveDate, TimeZone, Utc};
use futures::future::join_all;
use journal_companion::models::internal::{NewConversation, PeriodType, Role, SessionType};
use journal_companion::storage::{summaries, ConversationStore};
use sea_orm::{EntityTrait, PaginatorTrait};

#[tokio::test]
async fn test_concurrent_summary_generation_leaves_one_row() {
    let repo = create_test_repo().await;
    let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    for day in [3, 11, 25] {
        let at = Utc.with_ymd_and_hms(2024, 3, day, 10, 0, 0).unwrap();
        seed_entry(&repo, "u1", at, &format!("march {}", day), None, &[]).await;
    }

    let completion = Arc::new(FakeCompletion::slow(
        "March, in short.",
        std::time::Duration::from_millis(20),
    ));
    let orchestrator = Arc::new(create_orchestrator(repo.clone(), completion, test_settings()));

    let handles = (0..5).map(|_| {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            orchestrator
                .get_or_generate_summary("u1", start, PeriodType::Monthly)
                .await
        })
    });

    for result in join_all(handles).await {
        let outcome = result.unwrap().unwrap();
        assert_eq!(outcome.summary.entry_count, 3);
        assert_eq!(outcome.summary.summary, "March, in short.");
    }

    let rows = summaries::Entity::find().count(repo.db()).await.unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn test_concurrent_message_appends_are_all_kept() {
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

    let mut handles = vec![];
    for i in 0..10 {
        let repo = repo.clone();
        handles.push(tokio::spawn(async move {
            repo.append_message(conv.id, Role::User, &format!("message {}", i))
                .await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    let messages = repo.list_messages(conv.id).await.unwrap();
    assert_eq!(messages.len(), 10);
}
