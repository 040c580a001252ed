//! Service host: owns the listener, the health endpoint and the process
//! lifecycle of the BackupService.

use crate::logging;
use crate::proto::backup_service_server::BackupServiceServer;
use crate::service::BackupServiceImpl;
use crate::settings::ProcessSettings;
use crate::shutdown::shutdown_signal;
use anyhow::Context;
use std::net::{Ipv6Addr, SocketAddr};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tonic_health::ServingStatus;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

pub struct ServiceHost {
    settings: ProcessSettings,
    service: BackupServiceImpl,
}

impl ServiceHost {
    pub fn new(settings: ProcessSettings, service: BackupServiceImpl) -> Self {
        Self { settings, service }
    }

    pub fn settings(&self) -> &ProcessSettings {
        &self.settings
    }

    /// Runs the service until SIGINT or SIGTERM.
    pub async fn run(self) -> anyhow::Result<()> {
        logging::init(&self.settings.logging)?;

        let delay = self.settings.host.startup_delay;
        debug!("Sleeping for {} sec", delay.as_secs());
        tokio::time::sleep(delay).await;

        let addr = SocketAddr::from((Ipv6Addr::UNSPECIFIED, self.settings.host.port));
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;

        let shutdown = CancellationToken::new();
        tokio::spawn(shutdown_signal(shutdown.clone()));

        self.serve(listener, shutdown).await
    }

    /// Serves calls on `listener` until `shutdown` is cancelled, then stops
    /// accepting and gives in-flight calls the configured grace period.
    pub async fn serve(self, listener: TcpListener, shutdown: CancellationToken) -> anyhow::Result<()> {
        let addr = listener.local_addr()?;
        let grace = self.settings.host.shutdown_grace;
        let pool = self.service.pool().clone();

        let (health_reporter, health_service) = tonic_health::server::health_reporter();
        health_reporter
            .set_serving::<BackupServiceServer<BackupServiceImpl>>()
            .await;

        let stop_accepting = CancellationToken::new();
        let stopped = stop_accepting.clone();
        let router = Server::builder()
            .layer(
                tower::ServiceBuilder::new()
                    .layer(TraceLayer::new_for_grpc())
                    .into_inner(),
            )
            .add_service(health_service)
            .add_service(BackupServiceServer::new(self.service));

        info!(
            workers = pool.capacity(),
            "Starting server. Listening on {}", addr
        );
        let mut server = tokio::spawn(router.serve_with_incoming_shutdown(
            TcpListenerStream::new(listener),
            async move { stopped.cancelled().await },
        ));

        tokio::select! {
            result = &mut server => {
                result.context("server task panicked")??;
                warn!("Server stopped without a shutdown request");
                return Ok(());
            }
            _ = shutdown.cancelled() => {}
        }

        info!("Shutting down, no longer accepting calls");
        health_reporter
            .set_service_status("", ServingStatus::NotServing)
            .await;
        health_reporter
            .set_not_serving::<BackupServiceServer<BackupServiceImpl>>()
            .await;
        stop_accepting.cancel();

        match tokio::time::timeout(grace, &mut server).await {
            Ok(result) => result.context("server task panicked")??,
            Err(_) => {
                warn!(
                    in_flight = pool.in_flight(),
                    "Shutdown grace period of {}s elapsed, abandoning in-flight calls",
                    grace.as_secs()
                );
                server.abort();
            }
        }

        pool.drain(std::time::Duration::ZERO).await;
        info!("Server stopped");
        Ok(())
    }
}
