mod common;

use chrono::{Duration, Utc};
use common::*;
use std::sync::Arc;

use emerald_moderator::ai_moderation::ModerationOutcome;
use emerald_moderator::moderator::Moderator;
use emerald_moderator::night_mode::NightModeConfig;
use emerald_moderator::policy::{Action, AiModLayer, SpamLevel, SpamPolicyLayer};
use emerald_moderator::spam_enforcer::{SpamOutcome, SpamReason};
use emerald_moderator::store::{MemoryStore, PolicyStore};

struct Harness {
    store: Arc<MemoryStore>,
    actions: Arc<RecordingActions>,
    classifier: Arc<ScriptedClassifier>,
    moderator: Moderator,
}

async fn harness(classifier: Arc<ScriptedClassifier>) -> Harness {
    let store = Arc::new(MemoryStore::new());
    store.set_pro(CHAT, true).await.unwrap();
    store
        .set_ai_layer(
            CHAT,
            0,
            &AiModLayer {
                enabled: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    store
        .set_spam_layer(
            CHAT,
            &SpamPolicyLayer {
                level: Some(SpamLevel::Strict),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let actions = RecordingActions::new();
    let moderator = Moderator::new(store.clone(), classifier.clone(), actions.clone(), "emerald_bot");
    Harness {
        store,
        actions,
        classifier,
        moderator,
    }
}

#[tokio::test]
async fn test_clean_message_passes_every_stage() {
    let h = harness(ScriptedClassifier::text(&[("toxicity", 0.1)])).await;

    let outcome = h.moderator.moderate(&message(1, "hello all")).await;

    assert!(!outcome.night_deleted);
    assert_eq!(outcome.spam, Some(SpamOutcome::Allowed));
    assert_eq!(outcome.ai, Some(ModerationOutcome::Allowed));
    assert!(h.actions.calls().is_empty());
}

#[tokio::test]
async fn test_quiet_hours_stop_the_pipeline() {
    let h = harness(ScriptedClassifier::text(&[("toxicity", 0.99)])).await;
    let config = NightModeConfig {
        override_until: Some(Utc::now() + Duration::minutes(20)),
        ..Default::default()
    };
    h.store.set_night_mode(CHAT, &config).await.unwrap();

    let outcome = h.moderator.moderate(&message(1, "you idiot")).await;

    assert!(outcome.night_deleted);
    assert_eq!(outcome.spam, None);
    assert_eq!(outcome.ai, None);
    assert_eq!(h.classifier.call_count(), 0);
    assert_eq!(h.actions.deletes(), 1);
}

#[tokio::test]
async fn test_spam_deletion_skips_ai() {
    let h = harness(ScriptedClassifier::text(&[("toxicity", 0.99)])).await;

    let outcome = h.moderator.moderate(&message(1, &"🤡".repeat(9))).await;

    assert_eq!(
        outcome.spam,
        Some(SpamOutcome::Violation {
            reason: SpamReason::EmojiPerMsg,
            action: Action::Delete
        })
    );
    assert_eq!(outcome.ai, None);
    assert_eq!(h.classifier.call_count(), 0);
    assert_eq!(h.actions.deletes(), 1);
}

#[tokio::test]
async fn test_spam_warning_still_runs_ai() {
    let h = harness(ScriptedClassifier::text(&[("hate", 0.95)])).await;
    h.store
        .set_spam_layer(
            CHAT,
            &SpamPolicyLayer {
                level: Some(SpamLevel::Strict),
                action_primary: Some(Action::Warn),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let outcome = h.moderator.moderate(&message(1, &"🤡".repeat(9))).await;

    assert!(matches!(
        outcome.spam,
        Some(SpamOutcome::Violation {
            action: Action::Warn,
            ..
        })
    ));
    assert!(matches!(outcome.ai, Some(ModerationOutcome::Deleted(_))));
    assert_eq!(h.actions.deletes(), 1);
}

#[tokio::test]
async fn test_command_text_from_member_is_moderated() {
    let h = harness(ScriptedClassifier::text(&[("toxicity", 0.1)])).await;
    h.store
        .set_spam_layer(
            CHAT,
            &SpamPolicyLayer {
                level: Some(SpamLevel::Strict),
                domain_blacklist: Some(["scam.xyz".to_string()].into_iter().collect()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let outcome = h.moderator.moderate(&message(1, "/spamlevel https://scam.xyz")).await;

    assert_eq!(
        outcome.spam,
        Some(SpamOutcome::Violation {
            reason: SpamReason::LinkBlacklist,
            action: Action::Delete
        })
    );
    assert_eq!(h.actions.deletes(), 1);
}
