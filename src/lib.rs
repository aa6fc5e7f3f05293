pub mod cards;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod matcher;
pub mod messenger;
pub mod model;
pub mod moderation;
pub mod normalize;
pub mod outbox;
pub mod sheets;
pub mod synonyms;
pub mod trigram;

use anyhow::Result;
use sheets::{DisabledMirror, SheetMirror, SheetsClient};

/// Database URL from `DATABASE_URL`, falling back to the config file.
pub fn database_url(cfg: &config::Config) -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| cfg.app.database_url.clone())
}

/// Open the pool and bring the schema up to date.
pub async fn open_store(cfg: &config::Config) -> Result<db::Pool> {
    let pool = db::init_pool(&database_url(cfg), cfg.app.max_connections).await?;
    db::run_migrations(&pool).await?;
    Ok(pool)
}

pub fn mirror_from_config(cfg: &config::Config) -> Result<Box<dyn SheetMirror>> {
    Ok(match &cfg.mirror {
        Some(m) => Box::new(SheetsClient::from_config(m)?),
        None => Box::new(DisabledMirror),
    })
}
