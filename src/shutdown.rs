use actix_web::dev::ServerHandle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::db::Stores;

/// Handles graceful shutdown of the application
///
/// This module orchestrates graceful shutdown by:
/// 1. Listening for shutdown signals (SIGTERM, SIGINT/CTRL+C)
/// 2. Stopping the HTTP server (stops accepting new requests)
/// 3. Signaling the worker to stop dequeuing
/// 4. Waiting for the worker to finish the job it holds
/// 5. Releasing the store connections
pub struct ShutdownCoordinator {
    server_handle: ServerHandle,
    server_task: JoinHandle<Result<(), std::io::Error>>,
    worker_handle: Option<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
    stores: Stores,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator
    pub fn new(
        server_handle: ServerHandle,
        server_task: JoinHandle<Result<(), std::io::Error>>,
        worker_handle: Option<JoinHandle<()>>,
        shutdown_tx: watch::Sender<bool>,
        stores: Stores,
    ) -> Self {
        Self {
            server_handle,
            server_task,
            worker_handle,
            shutdown_tx,
            stores,
        }
    }

    /// Wait for CTRL+C or SIGTERM (Unix only), then shut down in order
    pub async fn wait_for_shutdown(self) -> Result<(), std::io::Error> {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to install CTRL+C signal handler: {:?}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    error!("Failed to install SIGTERM signal handler: {:?}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received CTRL+C signal, initiating graceful shutdown...");
            }
            _ = terminate => {
                info!("Received SIGTERM signal, initiating graceful shutdown...");
            }
        }

        self.shutdown().await
    }

    /// Perform the actual shutdown sequence
    async fn shutdown(self) -> Result<(), std::io::Error> {
        // 1. Stop HTTP server (stop accepting new requests)
        info!("Stopping HTTP server (no longer accepting new requests)...");
        self.server_handle.stop(true).await;
        info!("HTTP server stopped accepting new requests");

        // 2. Signal the worker; a job already in progress runs to the end
        if let Some(handle) = self.worker_handle {
            info!("Signaling worker to stop dequeuing jobs...");
            if let Err(e) = self.shutdown_tx.send(true) {
                error!("Failed to send shutdown signal to worker: {:?}", e);
            }

            // 3. Wait for it
            match handle.await {
                Ok(()) => info!("Worker stopped"),
                Err(e) => error!("Worker failed to stop: {:?}", e),
            }
        }

        // 4. Wait for HTTP server task to complete
        info!("Waiting for HTTP server to fully shut down...");
        match self.server_task.await {
            Ok(Ok(_)) => info!("HTTP server shut down successfully"),
            Ok(Err(e)) => error!("HTTP server encountered error during shutdown: {:?}", e),
            Err(e) => error!("HTTP server task panicked: {:?}", e),
        }

        // 5. Server and worker have dropped their clones; this should be the last one
        self.stores.close();

        info!("Graceful shutdown completed successfully");
        Ok(())
    }
}
