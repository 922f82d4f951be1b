//! Tests against a local Redis at `redis://127.0.0.1/`; run with `--ignored`.

use chrono::{NaiveDate, Utc};
use serial_test::serial;
use teloxide::types::{ChatId, UserId};

use emerald_moderator::night_mode::NightModeConfig;
use emerald_moderator::policy::{AiModLayer, SpamLevel, SpamPolicyLayer};
use emerald_moderator::store::redis_store::{hits_key, quota_key};
use emerald_moderator::store::{
    CounterStore, ModerationLog, PolicyStore, RedisStore, SpamEvent, StrikeLedger,
};

const REDIS_URL: &str = "redis://127.0.0.1/";
const CHAT: ChatId = ChatId(-100999000111);
const USER: UserId = UserId(4242);

async fn fresh_store() -> RedisStore {
    let store = RedisStore::connect(REDIS_URL)
        .await
        .expect("Failed to connect to Redis");
    store.purge_chat(CHAT).await.expect("Failed to purge test chat");
    store
}

#[test]
fn test_counter_keys_carry_local_day() {
    let day = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
    assert_eq!(
        quota_key(ChatId(-5), 3, UserId(9), day),
        "tg:quota:-5:3:9:2024-03-10"
    );
    assert_eq!(
        hits_key(ChatId(-5), UserId(9), "spam", day),
        "tg:hits:spam:-5:9:2024-03-10"
    );
}

#[tokio::test]
#[serial]
#[ignore]
async fn test_policy_layers_round_trip() {
    let store = fresh_store().await;
    store
        .set_spam_layer(
            CHAT,
            &SpamPolicyLayer {
                level: Some(SpamLevel::Medium),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    store
        .set_ai_layer(
            CHAT,
            4,
            &AiModLayer {
                tox_thresh: Some(0.5),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    store
        .set_night_mode(
            CHAT,
            &NightModeConfig {
                enabled: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(
        store.effective_spam_policy(CHAT, 4).await.unwrap().level,
        SpamLevel::Medium
    );
    assert_eq!(store.effective_ai_policy(CHAT, 4).await.unwrap().tox_thresh, 0.5);
    assert!(store.night_mode(CHAT).await.unwrap().unwrap().enabled);
    assert!(store.known_chats().await.unwrap().contains(&CHAT));

    store.purge_chat(CHAT).await.unwrap();
    assert_eq!(store.spam_layer(CHAT).await.unwrap(), None);
}

#[tokio::test]
#[serial]
#[ignore]
async fn test_counters_and_strikes() {
    let store = fresh_store().await;
    let now = Utc::now();
    let day = now.date_naive();
    // counters expire instead of being purged, so use a fresh topic per run
    let topic = (now.timestamp_subsec_nanos() % 1_000_000) as i32 + 1;

    assert_eq!(store.record_message(CHAT, topic, USER, day).await.unwrap(), 1);
    assert_eq!(store.record_message(CHAT, topic, USER, day).await.unwrap(), 2);
    assert_eq!(store.count_messages(CHAT, topic, USER, day).await.unwrap(), 2);

    assert_eq!(store.add_points(CHAT, USER, 3, "hate").await.unwrap(), 3);
    assert_eq!(store.get_points(CHAT, USER).await.unwrap(), 3);
    let top = store.top(CHAT, 5).await.unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].user_id, USER.0);

    store.purge_chat(CHAT).await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore]
async fn test_spam_log_is_newest_first() {
    let store = fresh_store().await;
    for message_id in 1..=3 {
        store
            .append_spam_event(&SpamEvent {
                chat_id: CHAT.0,
                topic_id: 0,
                user_id: USER.0,
                message_id,
                reason: "flood".to_string(),
                count: 6,
                limit: 5,
                action: "delete".to_string(),
                domains: Vec::new(),
                at: Utc::now(),
            })
            .await
            .unwrap();
    }

    let events = store.recent_spam_events(CHAT, 2).await.unwrap();
    let ids: Vec<i32> = events.iter().map(|e| e.message_id).collect();
    assert_eq!(ids, vec![3, 2]);

    store.purge_chat(CHAT).await.unwrap();
}
