//! Wires the enforcers together around one store and one runtime state.

use chrono::Utc;
use std::sync::Arc;

use crate::actions::ChatActions;
use crate::ai_moderation::{AiModerationEngine, ModerationOutcome};
use crate::classifier::Classifier;
use crate::message::IncomingMessage;
use crate::night_mode::NightModeScheduler;
use crate::policy::Action;
use crate::rate_limit::EngineRuntimeState;
use crate::spam_enforcer::{SpamEnforcer, SpamOutcome};
use crate::store::Store;
use crate::strike_manager::StrikeManager;

/// What each stage did with a message. Later stages do not run once the
/// message is gone.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    pub night_deleted: bool,
    pub spam: Option<SpamOutcome>,
    pub ai: Option<ModerationOutcome>,
}

pub struct Moderator {
    pub store: Arc<dyn Store>,
    pub state: Arc<EngineRuntimeState>,
    pub spam: SpamEnforcer,
    pub ai: AiModerationEngine,
    pub night: Arc<NightModeScheduler>,
    pub strikes: Arc<StrikeManager>,
    pub bot_username: String,
}

impl Moderator {
    pub fn new(
        store: Arc<dyn Store>,
        classifier: Arc<dyn Classifier>,
        actions: Arc<dyn ChatActions>,
        bot_username: impl Into<String>,
    ) -> Self {
        let state = EngineRuntimeState::shared();
        Self {
            spam: SpamEnforcer::new(store.clone(), actions.clone(), state.clone()),
            ai: AiModerationEngine::new(store.clone(), classifier, actions.clone(), state.clone()),
            night: Arc::new(NightModeScheduler::new(store.clone(), actions, state.clone())),
            strikes: Arc::new(StrikeManager::new(store.clone())),
            store,
            state,
            bot_username: bot_username.into(),
        }
    }

    /// Night mode, then spam rules, then AI moderation.
    pub async fn moderate(&self, msg: &IncomingMessage) -> PipelineOutcome {
        let night_deleted = match self.night.enforce_message(msg, Utc::now()).await {
            Ok(deleted) => deleted,
            Err(e) => {
                log::warn!("Night mode check failed in chat {}: {}", msg.chat_id, e);
                false
            }
        };
        if night_deleted {
            return PipelineOutcome {
                night_deleted,
                spam: None,
                ai: None,
            };
        }

        let spam = self.spam.process(msg).await;
        if let SpamOutcome::Violation { action, .. } = &spam {
            if *action >= Action::Delete {
                return PipelineOutcome {
                    night_deleted,
                    spam: Some(spam),
                    ai: None,
                };
            }
        }

        let ai = self.ai.process(msg).await;
        PipelineOutcome {
            night_deleted,
            spam: Some(spam),
            ai: Some(ai),
        }
    }

    /// Spawns the night mode scheduler, strike maintenance and the rate-window sweeper.
    pub fn spawn_background_tasks(&self) {
        let night = self.night.clone();
        tokio::spawn(async move { night.start().await });

        let strikes = self.strikes.clone();
        tokio::spawn(async move { strikes.start_strike_decay().await });

        tokio::spawn(crate::rate_limit::run_sweeper(self.state.clone()));
    }
}
