use anyhow::{anyhow, Result};
use celebcheck::config::{self, Config};
use celebcheck::db;
use celebcheck::sheets::{sheet_grid, SheetMirror, SheetsClient};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[command(about = "Overwrite the spreadsheet mirror with the full catalog.")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Print the rows instead of uploading them
    #[arg(long)]
    dry_run: bool,
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
    run(&cfg, args.dry_run).await
}

async fn run(cfg: &Config, dry_run: bool) -> Result<()> {
    let pool = celebcheck::open_store(cfg).await?;
    let entries = db::list_entries(&pool).await?;

    if dry_run {
        for row in sheet_grid(&entries) {
            println!("{}", serde_json::to_string(&row)?);
        }
        return Ok(());
    }

    let mirror_cfg = cfg
        .mirror
        .as_ref()
        .ok_or_else(|| anyhow!("no mirror section in config"))?;
    let client = SheetsClient::from_config(mirror_cfg)?;
    client.replace_all(&entries).await?;
    info!(count = entries.len(), "catalog exported");
    pool.close().await;
    Ok(())
}
