use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tracing::{info, warn};

use quote_ingest::app;
use quote_ingest::config::IngestConfig;
use quote_ingest::db::{job_run_queries, InMemoryQuoteRepository, PgQuoteRepository, QuoteRepository};
use quote_ingest::external::{ObjectSource, ObjectStoreSource};
use quote_ingest::logging::{init_logging, LoggingConfig};
use quote_ingest::services::ingest_processor;
use quote_ingest::services::job_scheduler_service::{JobContext, JobRunner, JobSchedulerService};
use quote_ingest::state::AppState;

/// Waits for currency-quote files in object storage and loads them into Postgres.
#[derive(Parser, Debug)]
#[command(name = "quote-ingest", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the hourly scheduler and the HTTP API (default).
    Serve,
    /// Run the wait-then-load job once, with retries.
    Run {
        /// Keep the quote in memory instead of writing to the database.
        #[arg(long)]
        dry_run: bool,
    },
    /// Run only the load step once, without waiting or retrying.
    Process {
        /// Keep the quote in memory instead of writing to the database.
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging FIRST
    init_logging(LoggingConfig::from_env())
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    let cli = Cli::parse();

    let config = IngestConfig::from_env();
    config.validate()?;
    let config = Arc::new(config);

    let source: Arc<dyn ObjectSource> = Arc::new(
        ObjectStoreSource::s3(&config.storage, &config.bucket)
            .context("failed to build object storage client")?,
    );

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, source).await,
        Command::Run { dry_run } => run_once(config, source, dry_run).await,
        Command::Process { dry_run } => process_once(config, source, dry_run).await,
    }
}

async fn connect(config: &IngestConfig) -> anyhow::Result<PgPool> {
    let url = config.database.require_url()?;
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(url)
        .await
        .with_context(|| format!("failed to connect using profile '{}'", config.database.profile))?;
    info!("🐘 Connected to database via profile '{}'", config.database.profile);
    Ok(pool)
}

async fn repository_for(
    config: &IngestConfig,
    dry_run: bool,
) -> anyhow::Result<(Arc<dyn QuoteRepository>, Option<PgPool>)> {
    if dry_run {
        warn!("🧪 Dry run: quotes are kept in memory, nothing is written");
        let repository: Arc<dyn QuoteRepository> = Arc::new(InMemoryQuoteRepository::new());
        return Ok((repository, None));
    }

    let pool = connect(config).await?;
    let repository: Arc<dyn QuoteRepository> =
        Arc::new(PgQuoteRepository::new(pool.clone(), config.table.clone()));
    Ok((repository, Some(pool)))
}

async fn serve(config: Arc<IngestConfig>, source: Arc<dyn ObjectSource>) -> anyhow::Result<()> {
    let pool = connect(&config).await?;
    job_run_queries::ensure_table(&pool)
        .await
        .context("failed to create job_runs table")?;

    let context = JobContext {
        source,
        repository: Arc::new(PgQuoteRepository::new(pool.clone(), config.table.clone())),
        config: config.clone(),
    };
    let runner = JobRunner::new(context, Some(pool.clone()));

    let mut scheduler = JobSchedulerService::new(runner.clone()).await?;
    scheduler.start().await?;

    let app = app::create_app(AppState {
        pool,
        runner,
        config: config.clone(),
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("🚀 quote-ingest running at http://{}/", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop().await?;
    Ok(())
}

async fn run_once(config: Arc<IngestConfig>, source: Arc<dyn ObjectSource>, dry_run: bool) -> anyhow::Result<()> {
    let (repository, pool) = repository_for(&config, dry_run).await?;
    if let Some(pool) = &pool {
        job_run_queries::ensure_table(pool).await?;
    }

    let runner = JobRunner::new(
        JobContext {
            source,
            repository,
            config,
        },
        pool,
    );

    match runner.run_or_skip("cli").await {
        Some(result) => {
            let result = result?;
            info!("Run finished: {} row(s) written", result.items_processed);
            Ok(())
        }
        None => anyhow::bail!("{} is already running", runner.job_name()),
    }
}

async fn process_once(config: Arc<IngestConfig>, source: Arc<dyn ObjectSource>, dry_run: bool) -> anyhow::Result<()> {
    let (repository, _pool) = repository_for(&config, dry_run).await?;
    let outcome =
        ingest_processor::process_latest(source.as_ref(), repository.as_ref(), &config.currency_pair).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
