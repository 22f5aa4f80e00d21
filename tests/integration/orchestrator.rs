// tests/integration/orchestrator.rs
use super::{create_orchestrator, create_test_repo, days_ago, seed_entry, test_settings, Arc, FakeCompletion};
use chrono::{Datelike, NaiveDate, TimeZone, Utc};
use journal_companion::models::internal::{Mood, NewEntry, PeriodType, Role, SessionType};
use journal_companion::orchestrator::companion::SendMessage;
use journal_companion::orchestrator::insights::{MoodTrend, TagCount};
use journal_companion::orchestrator::prompt_builder::SessionState;
use journal_companion::orchestrator::{OrchestratorError, OrchestratorSettings};
use journal_companion::storage::{ConversationStore, EntryStore, SummaryStore};

#[tokio::test]
async fn test_create_entry_with_reflection_stores_annotations() {
    let repo = create_test_repo().await;
    let completion = Arc::new(FakeCompletion::replying("Rest, Family"));
    let orchestrator = create_orchestrator(repo.clone(), completion.clone(), test_settings());

    let entry = orchestrator
        .create_entry(
            "u1",
            NewEntry {
                content: "Slept in and called mum.".to_string(),
                mood: Some(Mood::Good),
                ..Default::default()
            },
            true,
        )
        .await
        .unwrap();

    // One call for the reflection, one for the themes
    assert_eq!(completion.calls(), 2);
    assert_eq!(entry.reflection.as_deref(), Some("Rest, Family"));
    assert_eq!(entry.themes, vec!["rest", "family"]);

    let stored = repo.get_entry("u1", entry.id).await.unwrap().unwrap();
    assert_eq!(stored.themes, vec!["rest", "family"]);
}

#[tokio::test]
async fn test_reflection_timeout_still_persists_entry() {
    let repo = create_test_repo().await;
    let completion = Arc::new(FakeCompletion::slow("too late", std::time::Duration::from_secs(2)));
    let settings = OrchestratorSettings {
        completion_timeout: std::time::Duration::from_millis(50),
        ..test_settings()
    };
    let orchestrator = create_orchestrator(repo.clone(), completion, settings);

    let entry = orchestrator
        .create_entry(
            "u1",
            NewEntry {
                content: "Long day".to_string(),
                ..Default::default()
            },
            true,
        )
        .await
        .unwrap();

    assert!(entry.reflection.is_none());
    assert!(repo.get_entry("u1", entry.id).await.unwrap().is_some());

    // Asking explicitly surfaces the timeout
    let err = orchestrator.reflect_on_entry("u1", entry.id).await.unwrap_err();
    assert!(err.is_timeout());
}

#[tokio::test]
async fn test_assemble_context_tiers() {
    let repo = create_test_repo().await;
    seed_entry(&repo, "u1", days_ago(20), "outside the window", Some(Mood::Rough), &[]).await;
    let a = seed_entry(&repo, "u1", days_ago(6), "hard week", Some(Mood::Rough), &[]).await;
    let b = seed_entry(&repo, "u1", days_ago(1), "better now", Some(Mood::Good), &[]).await;
    repo.annotate_entry("u1", a.id, None, vec!["work".to_string(), "sleep".to_string()])
        .await
        .unwrap();
    repo.annotate_entry("u1", b.id, None, vec!["work".to_string()])
        .await
        .unwrap();

    let orchestrator = create_orchestrator(repo, Arc::new(FakeCompletion::replying("x")), test_settings());
    let payload = orchestrator.assemble_context("u1", None).await.unwrap();

    assert_eq!(payload.recent_entries.len(), 2);
    assert_eq!(payload.recent_entries[0].content, "better now");
    assert_eq!(payload.mood_trend, MoodTrend::Up);
    assert_eq!(payload.recurring_themes, vec!["work"]);
    assert_eq!(payload.long_term_summary, "");

    let prompt = orchestrator.build_prompt(&payload, &SessionState::default());
    assert!(prompt.contains("## Recent Entries"));
    assert!(prompt.contains("better now"));
    assert!(!prompt.contains("outside the window"));
    assert!(!prompt.contains("## Long-Term Context"));
}

#[tokio::test]
async fn test_weekly_summary_generated_once_and_cached() {
    let repo = create_test_repo().await;
    let monday = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
    let at = |d: u32, h: u32| Utc.with_ymd_and_hms(2024, 5, d, h, 0, 0).unwrap();
    seed_entry(&repo, "u1", at(5, 23), "sunday before", None, &[]).await;
    seed_entry(&repo, "u1", at(6, 0), "monday midnight", None, &[]).await;
    seed_entry(&repo, "u1", at(12, 23), "sunday night", None, &[]).await;
    seed_entry(&repo, "u1", at(13, 0), "next monday", None, &[]).await;

    let completion = Arc::new(FakeCompletion::replying("A week of beginnings."));
    let orchestrator = create_orchestrator(repo.clone(), completion.clone(), test_settings());

    let first = orchestrator
        .get_or_generate_summary("u1", monday, PeriodType::Weekly)
        .await
        .unwrap();
    assert!(first.generated);
    assert_eq!(first.summary.entry_count, 2);
    assert_eq!(first.summary.period_end, NaiveDate::from_ymd_opt(2024, 5, 12).unwrap());

    let prompt = completion.last_history()[0].content.clone();
    let midnight = prompt.find("monday midnight").unwrap();
    let night = prompt.find("sunday night").unwrap();
    assert!(midnight < night, "entries render chronologically");
    assert!(!prompt.contains("sunday before"));
    assert!(!prompt.contains("next monday"));

    let second = orchestrator
        .get_or_generate_summary("u1", monday, PeriodType::Weekly)
        .await
        .unwrap();
    assert!(!second.generated);
    assert_eq!(second.summary, first.summary);
    assert_eq!(completion.calls(), 1);
}

#[tokio::test]
async fn test_monthly_summary_covers_every_entry_in_a_busy_month() {
    let repo = create_test_repo().await;
    let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let first_of_march = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    for i in 0..210i64 {
        let at = first_of_march + chrono::Duration::minutes(i * 180);
        seed_entry(&repo, "u1", at, &format!("entry-{:03}", i), None, &[]).await;
    }

    let completion = Arc::new(FakeCompletion::replying("A crowded March."));
    let orchestrator = create_orchestrator(repo.clone(), completion.clone(), test_settings());

    let outcome = orchestrator
        .get_or_generate_summary("u1", start, PeriodType::Monthly)
        .await
        .unwrap();
    assert_eq!(outcome.summary.entry_count, 210);

    let prompt = completion.last_history()[0].content.clone();
    let first = prompt.find("entry-000").unwrap();
    let last = prompt.find("entry-209").unwrap();
    assert!(first < last);
}

#[tokio::test]
async fn test_failed_summary_is_not_persisted() {
    let repo = create_test_repo().await;
    let start = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
    seed_entry(&repo, "u1", Utc.with_ymd_and_hms(2024, 4, 10, 9, 0, 0).unwrap(), "april", None, &[]).await;

    let orchestrator = create_orchestrator(repo.clone(), Arc::new(FakeCompletion::failing()), test_settings());
    let err = orchestrator
        .get_or_generate_summary("u1", start, PeriodType::Monthly)
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::Completion(_)));
    assert!(repo
        .get_summary("u1", start, PeriodType::Monthly)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_empty_period_is_not_found() {
    let repo = create_test_repo().await;
    let completion = Arc::new(FakeCompletion::replying("unused"));
    let orchestrator = create_orchestrator(repo, completion.clone(), test_settings());

    let err = orchestrator
        .get_or_generate_summary("u1", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), PeriodType::Monthly)
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::NotFound(_)));
    assert_eq!(completion.calls(), 0);
}

#[tokio::test]
async fn test_backfill_generates_previous_week_and_month() {
    let repo = create_test_repo().await;
    // Wednesday 2024-05-15: previous week starts Monday 05-06, previous month is April
    let today = NaiveDate::from_ymd_opt(2024, 5, 15).unwrap();
    seed_entry(&repo, "u1", Utc.with_ymd_and_hms(2024, 5, 8, 12, 0, 0).unwrap(), "last week", None, &[]).await;
    seed_entry(&repo, "u1", Utc.with_ymd_and_hms(2024, 4, 20, 12, 0, 0).unwrap(), "last month", None, &[]).await;

    let completion = Arc::new(FakeCompletion::replying("summary"));
    let orchestrator = create_orchestrator(repo.clone(), completion.clone(), test_settings());

    let outcomes = orchestrator.backfill_summaries("u1", today).await.unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].summary.period_type, PeriodType::Weekly);
    assert_eq!(outcomes[0].summary.period_start, NaiveDate::from_ymd_opt(2024, 5, 6).unwrap());
    assert_eq!(outcomes[1].summary.period_type, PeriodType::Monthly);
    assert_eq!(outcomes[1].summary.period_start, NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());

    // Running again serves both from the store
    let again = orchestrator.backfill_summaries("u1", today).await.unwrap();
    assert!(again.iter().all(|o| !o.generated));
    assert_eq!(completion.calls(), 2);
}

#[tokio::test]
async fn test_assembly_backfills_last_month_in_background() {
    let repo = create_test_repo().await;
    let today = Utc::now().date_naive();
    let last_month = PeriodType::Monthly.previous_period_start(today);
    let in_last_month = last_month
        .and_hms_opt(12, 0, 0)
        .unwrap()
        .and_utc();
    seed_entry(&repo, "u1", in_last_month, "from last month", None, &[]).await;

    let completion = Arc::new(FakeCompletion::replying("Last month, briefly."));
    let settings = OrchestratorSettings {
        summary_backfill: true,
        ..test_settings()
    };
    let orchestrator = create_orchestrator(repo.clone(), completion, settings);

    let payload = orchestrator.assemble_context("u1", None).await.unwrap();
    // The first assembly does not wait for generation
    assert_eq!(payload.long_term_summary, "");

    let mut stored = None;
    for _ in 0..50 {
        stored = repo.latest_summary("u1", PeriodType::Monthly).await.unwrap();
        if stored.is_some() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    let stored = stored.expect("backfill should have stored a summary");
    assert_eq!(stored.period_start, last_month);
    assert_eq!(stored.period_start.day(), 1);

    let payload = orchestrator.assemble_context("u1", None).await.unwrap();
    assert_eq!(payload.long_term_summary, "Last month, briefly.");
}

#[tokio::test]
async fn test_repeated_assembly_runs_one_backfill_at_a_time() {
    let repo = create_test_repo().await;
    let today = Utc::now().date_naive();
    let last_month = PeriodType::Monthly.previous_period_start(today);
    let in_last_month = last_month.and_hms_opt(12, 0, 0).unwrap().and_utc();
    seed_entry(&repo, "u1", in_last_month, "from last month", None, &[]).await;

    let completion = Arc::new(FakeCompletion::slow(
        "Last month, slowly.",
        std::time::Duration::from_millis(200),
    ));
    let settings = OrchestratorSettings {
        summary_backfill: true,
        ..test_settings()
    };
    let orchestrator = create_orchestrator(repo.clone(), completion.clone(), settings);

    for _ in 0..3 {
        orchestrator.assemble_context("u1", None).await.unwrap();
    }

    let mut stored = None;
    for _ in 0..50 {
        stored = repo.latest_summary("u1", PeriodType::Monthly).await.unwrap();
        if stored.is_some() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert!(stored.is_some());
    assert_eq!(completion.calls(), 1);
}

#[tokio::test]
async fn test_compute_insights_over_recent_entries() {
    let repo = create_test_repo().await;
    seed_entry(&repo, "u1", days_ago(6), "a", Some(Mood::Good), &["work", "health"]).await;
    seed_entry(&repo, "u1", days_ago(3), "b", Some(Mood::Okay), &["work"]).await;
    seed_entry(&repo, "u1", days_ago(1), "c", Some(Mood::Rough), &["wins"]).await;
    seed_entry(&repo, "u1", days_ago(0), "d", None, &[]).await;
    seed_entry(&repo, "u1", days_ago(45), "ancient", Some(Mood::Good), &["old"]).await;

    let orchestrator = create_orchestrator(repo, Arc::new(FakeCompletion::replying("x")), test_settings());
    let insights = orchestrator.compute_insights("u1").await.unwrap();

    assert_eq!(insights.mood_distribution.good, 1);
    assert_eq!(insights.mood_distribution.rough, 1);
    assert_eq!(insights.top_tags[0], TagCount { tag: "work".to_string(), count: 2 });
    assert!(!insights.top_tags.iter().any(|t| t.tag == "old"));
    // Today and yesterday have entries; two days ago does not
    assert_eq!(insights.streak, 2);
}

#[tokio::test]
async fn test_send_message_round_trip() {
    let repo = create_test_repo().await;
    let entry = seed_entry(&repo, "u1", days_ago(0), "I finally finished the draft.", Some(Mood::Good), &[]).await;

    let completion = Arc::new(FakeCompletion::replying("That sounds like a relief."));
    let orchestrator = create_orchestrator(repo.clone(), completion.clone(), test_settings());

    let reply = orchestrator
        .send_message(
            "u1",
            SendMessage {
                conversation_id: None,
                session_type: SessionType::EntryReflection,
                entry_id: Some(entry.id),
                content: "Can we talk about this?".to_string(),
            },
        )
        .await
        .unwrap();

    assert_eq!(reply.conversation.entry_id, Some(entry.id));
    assert_eq!(reply.assistant_message.role, Role::Assistant);

    let system = completion.last_system_prompt().unwrap();
    assert!(system.ends_with("## Current Entry\nI finally finished the draft."));

    // Continue the same conversation
    orchestrator
        .send_message(
            "u1",
            SendMessage {
                conversation_id: Some(reply.conversation.id),
                content: "It was.".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let history = completion.last_history();
    let roles: Vec<Role> = history.iter().map(|t| t.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);

    let thread = orchestrator
        .get_conversation("u1", reply.conversation.id)
        .await
        .unwrap();
    assert_eq!(thread.messages.len(), 4);
}

#[tokio::test]
async fn test_send_message_failure_keeps_user_turn_only() {
    let repo = create_test_repo().await;
    let orchestrator = create_orchestrator(repo.clone(), Arc::new(FakeCompletion::failing()), test_settings());

    let err = orchestrator
        .send_message(
            "u1",
            SendMessage {
                content: "hello?".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::Completion(_)));

    let conversations = repo.list_conversations("u1", 10, 0).await.unwrap();
    assert_eq!(conversations.len(), 1);
    let messages = repo.list_messages(conversations[0].id).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, Role::User);
}

#[tokio::test]
async fn test_deleted_conversation_is_gone() {
    let repo = create_test_repo().await;
    let orchestrator = create_orchestrator(repo, Arc::new(FakeCompletion::replying("ok")), test_settings());

    let reply = orchestrator
        .send_message(
            "u1",
            SendMessage {
                content: "hi".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    orchestrator
        .delete_conversation("u1", reply.conversation.id)
        .await
        .unwrap();
    let err = orchestrator
        .get_conversation("u1", reply.conversation.id)
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::NotFound(_)));
    assert!(orchestrator
        .list_conversations("u1", 10, 0)
        .await
        .unwrap()
        .is_empty());
}
