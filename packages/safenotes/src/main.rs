mod api;
mod chains;
mod config;
mod database;
mod identity;
mod models;
mod safe_client;
mod sync;
mod view;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{App, HttpServer, http::header, middleware::Logger, web};
use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    database::database::Database,
    models::model::{AppConfig, SyncEvent},
    safe_client::client::SafeTransferClient,
    sync::orchestrator::{SyncCancellation, SyncService},
};

pub struct AppState {
    pub database: Arc<Database>,
    pub config: AppConfig,
    pub transfer_client: Arc<SafeTransferClient>,
    pub sync_service: Arc<SyncService<Database, SafeTransferClient>>,
}

#[derive(Debug, Parser)]
#[command(name = "safenotes", about = "Safe transfer ledger and annotation service")]
struct Cli {
    /// TOML config file used when env configuration is incomplete
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Sync SYNC_ORGANIZATION_ID once before serving requests
    #[arg(long)]
    sync_on_startup: bool,
}

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "safenotes=info,actix_web=info".into()),
        )
        .init();

    let cli = Cli::parse();

    info!("🚀 Starting Safenotes ledger service");

    let config = AppConfig::from_env()
        .or_else(|_| AppConfig::from_file(cli.config.clone()))
        .context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let database = Arc::new(
        Database::new(&config.database.url, config.database.max_connections)
            .context("Failed to initialize database")?,
    );

    info!("📊 Running database migrations");
    Database::run_migrations(&database.pool).context("Failed to run migrations")?;

    info!("🔗 Initializing transaction-service client");
    let transfer_client = Arc::new(SafeTransferClient::new(&config.safe_api));

    let sync_service = Arc::new(SyncService::new(
        database.clone(),
        transfer_client.clone(),
        Duration::from_millis(config.safe_api.write_delay_ms),
    ));

    let should_sync_on_startup = cli.sync_on_startup
        || std::env::var("SYNC_ON_STARTUP")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .unwrap_or(false);

    if should_sync_on_startup {
        let organization_id: Uuid = std::env::var("SYNC_ORGANIZATION_ID")
            .context("SYNC_ORGANIZATION_ID must be set when syncing on startup")?
            .parse()
            .context("Invalid SYNC_ORGANIZATION_ID")?;

        info!(
            "🔄 Performing initial sync for organization {}",
            organization_id
        );

        let (events, mut receiver) = mpsc::unbounded_channel::<SyncEvent>();
        let progress_logger = tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                info!(
                    "  {} [{}] {}/{} ({} skipped)",
                    event.safe_id,
                    event.status.state.as_str(),
                    event.status.progress.current,
                    event.status.progress.total,
                    event.status.progress.skipped,
                );
            }
        });

        let cancel = SyncCancellation::new();
        match sync_service
            .sync_organization(
                organization_id,
                config.safe_api.transfer_limit,
                &events,
                &cancel,
            )
            .await
        {
            Ok(report) => info!(
                "✅ Initial sync done: {} written, {} skipped",
                report.written, report.skipped
            ),
            Err(e) => error!("❌ Initial sync failed: {}", e),
        }

        drop(events);
        let _ = progress_logger.await;
    }

    let app_state = web::Data::new(AppState {
        database: database.clone(),
        config: config.clone(),
        transfer_client: transfer_client.clone(),
        sync_service: sync_service.clone(),
    });

    let host = config.server.host.clone();
    let port = config.server.port;

    info!("🌐 Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(
                &std::env::var("CORS_ORIGIN")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            )
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
            .allowed_headers(vec![
                header::CONTENT_TYPE,
                header::AUTHORIZATION,
                header::ACCEPT,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(app_state.clone())
            .configure(config::config_scope::configure)
            .wrap(cors)
            .wrap(Logger::default())
    })
    .bind((host.as_str(), port))
    .context("Failed to bind HTTP server")?
    .run()
    .await
    .context("HTTP server stopped unexpectedly")?;

    Ok(())
}
