mod collectors;
mod config;
mod db;
mod error;
mod models;
mod normalize;
mod notify;

use std::sync::Arc;

use clap::Parser;
use sqlx::SqlitePool;
use tracing_subscriber::EnvFilter;

use crate::collectors::runner::{self, ScanSettings};
use crate::collectors::{ReqwestTransport, build_collectors};
use crate::config::{Command, Config};
use crate::models::job::JobRecord;

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("jobwatch=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    init_tracing(config.log_json);

    tracing::info!("Opening job store at {}", config.database_url);
    let pool = db::create_pool(&config.database_url).await?;
    db::initialize(&pool).await?;

    match config.resolved_command() {
        Command::Init => {
            tracing::info!("Job store ready");
        }
        Command::Scan => scan(&config, &pool).await?,
        Command::Recent {
            limit,
            source,
            json,
        } => {
            let jobs = JobRecord::recent(&pool, source.as_deref(), limit).await?;
            for job in jobs {
                if json {
                    println!("{}", serde_json::to_string(&job)?);
                    continue;
                }
                println!(
                    "{}  {:<10} {} | {} | {}",
                    job.first_seen_at.format("%Y-%m-%d %H:%M"),
                    job.source,
                    job.company,
                    job.title,
                    job.link
                );
            }
        }
        Command::NotifyTest { message } => {
            let notifier = notify::configured(
                config.bot_token.as_deref(),
                config.chat_id.as_deref(),
                config.request_timeout(),
            )?;
            notifier.notify(&message).await?;
            tracing::info!("Test message sent");
        }
    }

    pool.close().await;
    Ok(())
}

async fn scan(config: &Config, pool: &SqlitePool) -> anyhow::Result<()> {
    let transport = Arc::new(ReqwestTransport::new(config.request_timeout())?);
    let adapters = build_collectors(&config.only_sources, &config.sources, transport)?;

    let notifier = notify::configured(
        config.bot_token.as_deref(),
        config.chat_id.as_deref(),
        config.request_timeout(),
    )?;

    let settings = ScanSettings {
        window: config.window(),
        max_pages: config.max_pages,
        parallel: config.parallel,
        max_job_lines: config.max_job_lines,
    };

    let summary =
        runner::run_all(&adapters, pool, &settings, notifier.as_ref(), chrono::Utc::now()).await?;

    let failed: Vec<_> = summary
        .sources
        .iter()
        .filter(|s| s.error.is_some())
        .map(|s| s.source.as_str())
        .collect();
    if !failed.is_empty() {
        tracing::warn!("Sources failed this cycle: {}", failed.join(", "));
    }
    tracing::info!("Job store holds {} jobs", JobRecord::count(pool).await?);

    Ok(())
}
