mod common;

use chrono::{Duration, Utc};
use common::{FlakyStore, CHAT, USER};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use teloxide::types::{ChatId, UserId};

use emerald_moderator::policy::AiModLayer;
use emerald_moderator::store::{CounterStore, MemoryStore, PolicyStore, StrikeLedger, Store};
use emerald_moderator::strike_manager::StrikeManager;

#[tokio::test]
async fn test_points_accumulate_with_audit_trail() {
    let store = MemoryStore::new();

    assert_eq!(store.add_points(CHAT, USER, 2, "hate").await.unwrap(), 2);
    assert_eq!(store.add_points(CHAT, USER, 3, "sexual").await.unwrap(), 5);
    assert_eq!(store.get_points(CHAT, USER).await.unwrap(), 5);

    let events = store.strike_events(CHAT, 10).await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].reason, "sexual");
    assert_eq!(events[0].delta, 3);
    assert_eq!(events[1].reason, "hate");
}

#[tokio::test]
async fn test_decay_only_touches_stale_records_and_floors_at_zero() {
    let store = MemoryStore::new();
    store.add_points(CHAT, USER, 1, "toxicity").await.unwrap();

    // still fresh
    assert_eq!(store.decay_at(CHAT, 7, Utc::now()).await.unwrap(), 0);
    assert_eq!(store.get_points(CHAT, USER).await.unwrap(), 1);

    let later = Utc::now() + Duration::days(8);
    assert_eq!(store.decay_at(CHAT, 7, later).await.unwrap(), 1);
    assert_eq!(store.get_points(CHAT, USER).await.unwrap(), 0);
    assert_eq!(store.decay_at(CHAT, 7, later).await.unwrap(), 0);
    assert_eq!(store.get_points(CHAT, USER).await.unwrap(), 0);
}

#[tokio::test]
async fn test_leaderboard_orders_by_points() {
    let store = MemoryStore::new();
    store.add_points(CHAT, UserId(1), 3, "hate").await.unwrap();
    store.add_points(CHAT, UserId(2), 9, "sexual_minors").await.unwrap();
    store.add_points(CHAT, UserId(3), 1, "toxicity").await.unwrap();

    let top: Vec<(u64, i64)> = store
        .top(CHAT, 2)
        .await
        .unwrap()
        .into_iter()
        .map(|r| (r.user_id, r.points))
        .collect();
    assert_eq!(top, vec![(2, 9), (1, 3)]);
}

#[tokio::test]
async fn test_maintenance_uses_per_chat_decay_window() {
    let store = Arc::new(MemoryStore::new());
    store
        .set_ai_layer(
            CHAT,
            0,
            &AiModLayer {
                strike_decay_days: Some(30),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    store.add_points(CHAT, USER, 4, "harassment").await.unwrap();
    let manager = StrikeManager::new(store.clone() as Arc<dyn Store>);

    let in_ten_days = Utc::now() + Duration::days(10);
    let report = manager.run_maintenance(in_ten_days).await.unwrap();
    assert_eq!(report.chats, 1);
    assert_eq!(report.decayed, 0);

    let in_forty_days = Utc::now() + Duration::days(40);
    let report = manager.run_maintenance(in_forty_days).await.unwrap();
    assert_eq!(report.decayed, 1);
    assert_eq!(store.get_points(CHAT, USER).await.unwrap(), 3);
}

#[tokio::test]
async fn test_maintenance_prunes_old_counters() {
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    let today = now.date_naive();
    let stale = today - Duration::days(5);
    store.record_message(CHAT, 0, USER, stale).await.unwrap();
    store.record_message(CHAT, 0, USER, today).await.unwrap();
    let manager = StrikeManager::new(store.clone() as Arc<dyn Store>);

    let report = manager.run_maintenance(now).await.unwrap();

    assert_eq!(report.pruned, 1);
    assert_eq!(store.count_messages(CHAT, 0, USER, today).await.unwrap(), 1);
}

#[tokio::test]
async fn test_maintenance_continues_past_failing_chat() {
    let store = FlakyStore::new();
    let other = ChatId(-1005678);
    for chat in [CHAT, other] {
        store
            .set_ai_layer(
                chat,
                0,
                &AiModLayer {
                    strike_decay_days: Some(30),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        store.add_points(chat, USER, 2, "toxicity").await.unwrap();
    }
    let now = Utc::now();
    let stale = now.date_naive() - Duration::days(5);
    store.record_message(other, 0, USER, stale).await.unwrap();
    store.fail_decay_chat.store(CHAT.0, Ordering::SeqCst);
    let manager = StrikeManager::new(store.clone() as Arc<dyn Store>);

    let report = manager.run_maintenance(now + Duration::days(40)).await.unwrap();

    assert_eq!(report.chats, 2);
    assert_eq!(report.decayed, 1);
    assert_eq!(report.pruned, 1);
    assert_eq!(store.get_points(CHAT, USER).await.unwrap(), 2);
    assert_eq!(store.get_points(other, USER).await.unwrap(), 1);
}
