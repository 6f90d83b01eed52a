mod args;
mod logging;

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};
use tracker_app::{
    AppState, RefreshError, RefreshService, default_config_path, load_or_create, load_pricing,
};
use tracker_core::UsageSnapshot;

use crate::args::{Cli, Command};

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Awaits one refresh. When `interrupt` fires first, that same run is
/// cancelled and awaited; no second run is started.
async fn refresh_until<S: Future>(
    service: &RefreshService,
    interrupt: S,
) -> std::result::Result<UsageSnapshot, RefreshError> {
    let run = service.refresh();
    tokio::pin!(run);
    tokio::select! {
        biased;
        result = &mut run => result,
        _ = interrupt => {
            warn!("interrupted, stopping after the current file");
            service.cancel();
            run.await
        }
    }
}

async fn refresh(app: &AppState) -> Result<()> {
    let service = app.services.refresh.clone();
    let result = refresh_until(&service, tokio::signal::ctrl_c()).await;
    if let Some(stats) = service.last_stats() {
        for issue in &stats.issues {
            warn!(file = %issue.file_path, kind = ?issue.kind, "{}", issue.message);
        }
    }
    match result {
        Ok(snapshot) => print_json(&snapshot),
        Err(RefreshError::TotalFailure { files, issues }) => {
            for issue in &issues {
                warn!(file = %issue.file_path, "{}", issue.message);
            }
            anyhow::bail!("refresh failed: none of the {} changed log files could be read", files)
        }
        Err(err) => Err(err.into()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let loaded = load_or_create(&config_path)
        .with_context(|| format!("load config {}", config_path.display()))?;
    if loaded.created {
        info!(path = %loaded.path.display(), "wrote default config");
    }
    let mut config = loaded.config;
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    match cli.command.unwrap_or(Command::Refresh) {
        Command::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        Command::Scan => {
            let pricing = load_pricing(config.pricing_path.as_deref())?;
            let horizon = config.retention_horizon(Utc::now());
            let roots = config.log_roots();
            let summary = tokio::task::spawn_blocking(move || {
                ingest::summarize_logs(&roots, Some(horizon), &pricing, &Local::now())
            })
            .await?;
            print_json(&summary)
        }
        command => {
            let app = AppState::open(config).context("open usage store")?;
            run(&app, command).await
        }
    }
}

async fn run(app: &AppState, command: Command) -> Result<()> {
    let services = app.services.clone();
    match command {
        Command::Refresh => refresh(app).await,
        Command::Summary { period, refresh } => {
            if refresh {
                services.refresh.refresh().await?;
            }
            let summary =
                tokio::task::spawn_blocking(move || services.analytics.summarize(period)).await??;
            print_json(&summary)
        }
        Command::Models { period, refresh } => {
            if refresh {
                services.refresh.refresh().await?;
            }
            let models =
                tokio::task::spawn_blocking(move || services.analytics.breakdown_by_model(period))
                    .await??;
            print_json(&models)
        }
        Command::Sweep => {
            let horizon = app.config.retention_horizon(Utc::now());
            let stats =
                tokio::task::spawn_blocking(move || services.importer.sweep(horizon)).await??;
            info!(
                records_deleted = stats.records_deleted,
                file_states_deleted = stats.file_states_deleted,
                "sweep finished"
            );
            Ok(())
        }
        Command::BackfillCosts => {
            let updated =
                tokio::task::spawn_blocking(move || services.importer.backfill_costs()).await??;
            info!(updated, "repriced stored records");
            Ok(())
        }
        Command::Reset { file } => {
            let file = std::path::absolute(&file).unwrap_or(file);
            let file_id = ingest::file_id(&file);
            services.importer.reset_file(&file_id)?;
            info!(file = %file_id, "file will be read in full on the next refresh");
            Ok(())
        }
        Command::Scan | Command::Config => Ok(()),
    }
}
