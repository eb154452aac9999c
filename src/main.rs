use clap::{Parser, Subcommand};
use lustre::config::AppConfig;
use lustre_api::{BatchRunner, RestApi, RunScheduler};
use lustre_core::CancelToken;
use lustre_storage::{export_json, import_json, migrate, CatalogStore, LmdbStorage};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

/// Batch similar-item recommender for diamond inventories
#[derive(Parser, Debug)]
#[command(name = "lustre")]
#[command(about = "Computes similar-item lists for a diamond catalog", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: AppConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the trigger API; every trigger queues one batch run
    Serve {
        /// HTTP API port
        #[arg(long, env = "LUSTRE_HTTP_PORT", default_value_t = 8000)]
        http_port: u16,
    },
    /// Run one batch update in the foreground and print its report
    Run,
    /// Replace the collection with the documents of a JSON inventory dump
    Import { file: PathBuf },
    /// Write every document of the collection to a JSON file
    Export { file: PathBuf },
    /// Copy a source collection into the active collection and a backup
    Migrate {
        /// Data directory of the source database (defaults to --data-dir)
        #[arg(long)]
        source_data_dir: Option<PathBuf>,

        #[arg(long)]
        source_db: String,

        #[arg(long)]
        source_collection: String,

        /// Defaults to --collection
        #[arg(long)]
        active: Option<String>,

        /// Defaults to "<active>_backup"
        #[arg(long)]
        backup: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.config;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Lustre v{}", env!("CARGO_PKG_VERSION"));
    config.engine_config().validate()?;

    let db_path = config.database_path();
    info!("Database: {:?}", db_path);

    match cli.command {
        Command::Serve { http_port } => serve(&config, http_port).await,
        Command::Run => {
            let storage = LmdbStorage::open(&db_path)?;
            let store: Arc<dyn CatalogStore> = Arc::new(storage.collection(&config.collection)?);
            let runner = BatchRunner::new(store, config.engine_config())?;
            let report = tokio::task::spawn_blocking(move || runner.run(Uuid::new_v4(), &CancelToken::new())).await??;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Import { file } => {
            let storage = LmdbStorage::open(&db_path)?;
            let collection = storage.collection(&config.collection)?;
            import_json(&file, &collection)?;
            Ok(())
        }
        Command::Export { file } => {
            let storage = LmdbStorage::open(&db_path)?;
            let collection = storage.collection(&config.collection)?;
            export_json(&collection, &file)?;
            Ok(())
        }
        Command::Migrate {
            source_data_dir,
            source_db,
            source_collection,
            active,
            backup,
        } => {
            let source_path = source_data_dir.unwrap_or_else(|| config.data_dir.clone()).join(&source_db);
            let active = active.unwrap_or_else(|| config.collection.clone());
            let backup = backup.unwrap_or_else(|| format!("{}_backup", active));
            anyhow::ensure!(
                !(source_path == db_path && (source_collection == active || source_collection == backup)),
                "source collection '{}' cannot also be a migration target",
                source_collection
            );

            let target = LmdbStorage::open(&db_path)?;
            // An LMDB environment can only be opened once per process
            let separate_source = if source_path == db_path {
                None
            } else {
                Some(LmdbStorage::open(&source_path)?)
            };
            let source_storage = separate_source.as_ref().unwrap_or(&target);

            let source = source_storage.collection(&source_collection)?;
            let report = migrate(&source, &target.collection(&active)?, &target.collection(&backup)?)?;
            info!(
                "Migration finished: {} source documents, {} active, {} backup",
                report.source_count, report.active_inserted, report.backup_inserted
            );
            Ok(())
        }
    }
}

async fn serve(config: &AppConfig, http_port: u16) -> anyhow::Result<()> {
    let storage = LmdbStorage::open(config.database_path())?;
    let store: Arc<dyn CatalogStore> = Arc::new(storage.collection(&config.collection)?);
    info!("Storage initialized, collection '{}'", config.collection);

    let runner = BatchRunner::new(store, config.engine_config())?;
    let scheduler = Arc::new(RunScheduler::new(Arc::new(runner)));

    let scheduler_http = scheduler.clone();
    let http_handle = std::thread::spawn(move || {
        let sys = actix_web::rt::System::new();
        sys.block_on(async {
            if let Err(e) = RestApi::start(scheduler_http, http_port).await {
                tracing::error!("HTTP server error: {}", e);
            }
        })
    });

    info!("Lustre started successfully");
    info!("HTTP API: http://localhost:{}/", http_port);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        _ = tokio::task::spawn_blocking(move || {
            http_handle.join().ok();
        }) => {
            info!("HTTP server stopped");
        }
    }

    info!("Shutting down...");
    scheduler.shutdown();
    Ok(())
}
