use dotenv::*;
use std::env;
use std::sync::Arc;
use teloxide::prelude::*;

use emerald_moderator::actions::ChatActions;
use emerald_moderator::admin_handlers::run_dispatcher;
use emerald_moderator::classifier::{Classifier, DisabledClassifier, OpenAiClassifier};
use emerald_moderator::config::Settings;
use emerald_moderator::moderator::Moderator;
use emerald_moderator::open_store;

#[tokio::main]
async fn main() {
    pretty_env_logger::init();
    dotenv().ok();
    log::info!("Starting the moderation bot...");

    let bot_token = env::var("BOT_TOKEN").expect("BOT_TOKEN must be set in .env file");
    let settings = Settings::from_env();

    let store = match open_store(&settings).await {
        Ok(store) => store,
        Err(e) => {
            log::error!("Could not open store at {}: {}", settings.redis_url, e);
            return;
        }
    };

    let classifier: Arc<dyn Classifier> = if settings.openai_api_key.is_some() {
        Arc::new(OpenAiClassifier::new(&settings))
    } else {
        log::warn!("OPENAI_API_KEY not set, AI moderation will allow everything");
        Arc::new(DisabledClassifier)
    };
    log::info!("Classifier provider: {}", classifier.provider_name());

    let bot = Bot::new(bot_token);
    let actions: Arc<dyn ChatActions> = Arc::new(bot.clone());
    let moderator = Arc::new(Moderator::new(store, classifier, actions, settings.bot_username.clone()));
    moderator.spawn_background_tasks();

    run_dispatcher(bot, moderator).await;
}
