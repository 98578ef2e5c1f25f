use actix_web::{App, HttpServer, web};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer, filter::LevelFilter};

use auto_trends::api::{
    self,
    data::DataService,
    job::JobService,
    plot::PlotService,
    validation,
};
use auto_trends::config::{Cli, Config};
use auto_trends::db;
use auto_trends::shutdown::ShutdownCoordinator;
use auto_trends::worker::JobWorker;

fn init_logging(log_dir: &str) -> std::io::Result<()> {
    std::fs::create_dir_all(log_dir)?;

    // Log files will be created as: logs/info.log.2024-12-22, logs/error.log.2024-12-22, etc.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());

    let info_file = tracing_appender::rolling::daily(log_dir, "info.log");
    let warn_file = tracing_appender::rolling::daily(log_dir, "warn.log");
    let error_file = tracing_appender::rolling::daily(log_dir, "error.log");
    let debug_file = tracing_appender::rolling::daily(log_dir, "debug.log");

    let info_layer = tracing_subscriber::fmt::layer()
        .with_writer(info_file)
        .with_ansi(false)
        .with_filter(LevelFilter::INFO);

    let warn_layer = tracing_subscriber::fmt::layer()
        .with_writer(warn_file)
        .with_ansi(false)
        .with_filter(LevelFilter::WARN);

    let error_layer = tracing_subscriber::fmt::layer()
        .with_writer(error_file)
        .with_ansi(false)
        .with_filter(LevelFilter::ERROR);

    let debug_layer = tracing_subscriber::fmt::layer()
        .with_writer(debug_file)
        .with_ansi(false)
        .with_filter(LevelFilter::DEBUG);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(info_layer)
        .with(warn_layer)
        .with(error_layer)
        .with(debug_layer)
        .init();

    Ok(())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env()
        .map(|config| config.with_cli(cli))
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    init_logging(&config.log_dir)?;

    info!("Starting auto-trends application");
    info!("Configuration loaded successfully:");
    info!("  - Store: {}", if config.redis_url.is_some() { "redis" } else { "in-memory" });
    info!("  - Dataset: {}", config.data_path.display());
    info!("  - Max payload size: {} bytes", config.max_payload_size);
    info!("  - Queue poll interval: {:?}", config.queue_poll_interval);
    info!("  - Worker enabled: {}", config.run_worker);

    let stores = db::connection::get_connection(config.redis_url.as_deref())
        .await
        .map_err(|e| {
            error!("Failed to connect to store: {}", e);
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, e)
        })?;

    // watch channel lets the worker observe the latest shutdown flag
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let worker_handle = if config.run_worker {
        let job_worker = JobWorker::new(stores.clone(), config.queue_poll_interval);
        let handle = tokio::spawn(async move {
            job_worker.run(shutdown_rx).await;
        });
        info!("Spawned job worker");
        Some(handle)
    } else {
        info!("Job worker disabled in this process");
        None
    };

    // Services are built once and shared by every HTTP worker thread
    let store_data = web::Data::new(stores.clone());
    let job_service = web::Data::new(JobService::new(stores.clone()));
    let data_service = web::Data::new(DataService::new(stores.clone(), config.data_path.clone()));
    let plot_service = web::Data::new(PlotService::new(stores.clone()));
    let max_payload_size = config.max_payload_size;

    let server = HttpServer::new(move || {
        let payload_config = web::PayloadConfig::default()
            .limit(max_payload_size);

        App::new()
            .app_data(store_data.clone())
            .app_data(job_service.clone())
            .app_data(data_service.clone())
            .app_data(plot_service.clone())
            .app_data(payload_config) // Global payload size limit
            .app_data(validation::json_config().limit(max_payload_size))
            .configure(api::configure)
    });

    info!("Server starting on http://{}:{}", config.bind_addr, config.port);

    let server = server
        .bind((config.bind_addr.as_str(), config.port))?
        .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    let coordinator = ShutdownCoordinator::new(
        server_handle,
        server_task,
        worker_handle,
        shutdown_tx,
        stores,
    );

    coordinator.wait_for_shutdown().await
}
