mod cli;
mod connector;
mod crm;
mod error;
mod ledger;
mod mode;
mod orchestrator;
mod pipeline;
mod transform;
mod watermark;
mod writer;

#[cfg(test)]
mod test_support;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use hubsync_config::{init_tracing, AppConfig};
use hubsync_db::records::models::EntityType;
use hubsync_db::records::pg_repository::PgRecordRepository;
use hubsync_db::sync::pg_repository::PgSyncRunRepository;

use crate::cli::Args;
use crate::connector::Connector;
use crate::crm::client::{CrmClient, CrmClientConfig};
use crate::ledger::{JsonlLogSink, LogSink};
use crate::orchestrator::SyncOrchestrator;
use crate::pipeline::{EntityPipeline, PipelineSettings};

/// Exit code when the invocation itself could not run.
const EXIT_INVOCATION_FAILED: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing("info");
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::from(EXIT_INVOCATION_FAILED);
        }
    };
    init_tracing(&config.log_level);

    tracing::info!(service = "hubsync-ingest", log_level = %config.log_level, "starting");

    match run(args, config).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!(error = %e, "sync invocation failed");
            ExitCode::from(EXIT_INVOCATION_FAILED)
        }
    }
}

async fn run(
    args: Args,
    config: AppConfig,
) -> Result<u8, Box<dyn std::error::Error + Send + Sync>> {
    let mode = args.mode()?;

    let pool = hubsync_db::create_pool(&config.database_url, config.db_max_connections).await?;
    if args.ensure_schema {
        hubsync_db::schema::ensure_schema(&pool).await?;
    }

    let crm_config = CrmClientConfig::from_env()?;
    tracing::info!(
        base_url = %crm_config.base_url,
        page_size = crm_config.page_size,
        max_attempts = crm_config.max_attempts,
        "crm client configured"
    );
    let client = CrmClient::new(crm_config)?;

    let sink: Arc<dyn LogSink> = Arc::new(JsonlLogSink::new(config.sync_log_path.clone()));
    let settings = PipelineSettings::from(&config);

    let connectors: Vec<Arc<dyn Connector>> = EntityType::ALL
        .iter()
        .map(|entity| {
            Arc::new(EntityPipeline::new(
                *entity,
                client.clone(),
                PgRecordRepository::new(pool.clone()),
                PgSyncRunRepository::new(pool.clone()),
                Arc::clone(&sink),
                &settings,
            )) as Arc<dyn Connector>
        })
        .collect();

    let orchestrator = SyncOrchestrator::new(connectors);
    let trigger = args.trigger.into();
    let summary = match args.entity.entity() {
        Some(entity) => orchestrator.run_sync(entity, mode, trigger).await?,
        None => orchestrator.run(&EntityType::ALL, mode, trigger).await?,
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(summary.exit_code())
}
