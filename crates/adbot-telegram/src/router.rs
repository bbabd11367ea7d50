use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use tokio_util::sync::CancellationToken;

use adbot_core::{
    config::Config, flow::SubmissionFlow, messaging::port::MessagingPort,
    moderation::ModerationDesk, registry::Registry, utils::AuditLogger,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub flow: Arc<SubmissionFlow>,
    pub desk: Arc<ModerationDesk>,
    pub registry: Arc<Registry>,
}

impl AppState {
    pub fn new(cfg: Arc<Config>, messenger: Arc<dyn MessagingPort>) -> Self {
        let registry = Arc::new(Registry::new());
        let audit = Arc::new(AuditLogger::new(
            cfg.audit_log_path.clone(),
            cfg.audit_log_json,
        ));
        let desk = Arc::new(ModerationDesk::new(
            cfg.clone(),
            messenger.clone(),
            registry.clone(),
            audit.clone(),
        ));
        let flow = Arc::new(SubmissionFlow::new(
            cfg.clone(),
            messenger,
            registry.clone(),
            desk.clone(),
            audit,
        ));
        Self {
            cfg,
            flow,
            desk,
            registry,
        }
    }
}

pub async fn run_polling(cfg: Arc<Config>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.bot_token.clone());

    match bot.get_me().await {
        Ok(me) => {
            let handle = me.username();
            if let Some(expected) = cfg.bot_username.as_deref() {
                if !expected.trim_start_matches('@').eq_ignore_ascii_case(handle) {
                    tracing::warn!(expected, actual = handle, "BOT_USERNAME does not match the token");
                }
            }
            tracing::info!("adbot started: @{handle}");
        }
        Err(e) => tracing::warn!("get_me failed: {e}"),
    }
    tracing::info!(
        channel = %cfg.channel,
        admin_chat = cfg.admin_chat_id.0,
        "publishing to channel, moderating in admin chat"
    );

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let state = Arc::new(AppState::new(cfg.clone(), messenger));

    let shutdown = CancellationToken::new();
    let sweeper = match cfg.submission_ttl {
        Some(ttl) => {
            tracing::info!(?ttl, every = ?cfg.sweep_interval, "expiry sweeper enabled");
            Some(state.desk.clone().spawn_expiry_sweeper(
                ttl,
                cfg.sweep_interval,
                shutdown.clone(),
            ))
        }
        None => {
            tracing::info!("expiry sweeper disabled");
            None
        }
    };

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state.clone()])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    shutdown.cancel();
    if let Some(handle) = sweeper {
        if let Err(e) = handle.await {
            tracing::warn!("expiry sweeper ended abnormally: {e}");
        }
    }
    tracing::info!(
        unresolved = state.registry.len().await,
        mid_submission = state.flow.active_sessions().await,
        "adbot stopped"
    );

    Ok(())
}
