use anyhow::Result;
use celebcheck::model::Role;
use celebcheck::{config, db, handlers, messenger, moderation, outbox, synonyms};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use tracing::info;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;

    let pool = celebcheck::open_store(&cfg).await?;
    db::set_role(&pool, cfg.telegram.admin_id, Role::Admin).await?;

    let mirror = celebcheck::mirror_from_config(&cfg)?;
    tokio::spawn(outbox::run_worker(
        pool.clone(),
        mirror,
        Duration::from_millis(cfg.app.poll_interval_ms),
        cfg.app.max_backoff_seconds as i64,
    ));

    let bot = Bot::new(cfg.telegram.bot_token.clone());
    let workflow = Arc::new(moderation::Workflow::new(
        pool.clone(),
        Arc::new(messenger::TelegramMessenger::new(bot.clone())),
        synonyms::SynonymResolver::from_config(&cfg.synonyms),
        cfg.matching,
        cfg.telegram.admin_id,
    ));

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handlers::handle_message))
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback));

    info!("starting telegram bot");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![workflow])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    pool.close().await;
    Ok(())
}
