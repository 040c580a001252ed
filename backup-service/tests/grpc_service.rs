//! End-to-end tests driving the gRPC host with the generated client.

use backup_engine::config::{GrpcConfig, LoggingConfig, StorageConfig};
use backup_engine::{Config, LocalBackupEngine, LocalPurgeEngine, LocalStorage};
use backup_service::proto::backup_service_client::BackupServiceClient;
use backup_service::proto::{
    BackupRequest, BackupStatusRequest, DeleteBackupRequest, GetBackupsRequest, StatusType,
};
use backup_service::{BackupServiceImpl, ProcessSettings, ServiceHost, WorkerPool};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tonic::transport::Channel;
use tonic::Code;
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_client::HealthClient;
use tonic_health::pb::HealthCheckRequest;

struct TestServer {
    _dir: TempDir,
    config: Arc<Config>,
    addr: SocketAddr,
    shutdown: CancellationToken,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    async fn start(cluster_nodes: &[&str]) -> Self {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join("data");
        std::fs::create_dir_all(&data_dir).unwrap();
        std::fs::write(data_dir.join("table.db"), b"rows").unwrap();

        let config = Arc::new(Config {
            storage: StorageConfig {
                base_path: dir.path().join("storage"),
                fqdn: "n1".to_string(),
                data_dir,
                cluster_nodes: cluster_nodes.iter().map(|n| n.to_string()).collect(),
            },
            logging: LoggingConfig::default(),
            grpc: GrpcConfig::default(),
        });
        let settings = ProcessSettings::new(&config, Duration::ZERO);
        let service = BackupServiceImpl::new(
            Arc::new(LocalBackupEngine::new(config.clone())),
            Arc::new(LocalPurgeEngine::new(config.clone())),
            Arc::new(LocalStorage::new(&config.storage.base_path)),
            WorkerPool::new(settings.host.max_workers),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(ServiceHost::new(settings, service).serve(listener, shutdown.clone()));

        Self {
            _dir: dir,
            config,
            addr,
            shutdown,
            handle,
        }
    }

    async fn channel(&self) -> Channel {
        let endpoint = format!("http://{}", self.addr);
        for _ in 0..50 {
            if let Ok(channel) = Channel::from_shared(endpoint.clone()).unwrap().connect().await {
                return channel;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("server at {} never came up", self.addr);
    }

    async fn client(&self) -> BackupServiceClient<Channel> {
        BackupServiceClient::new(self.channel().await)
    }

    async fn stop(self) {
        self.shutdown.cancel();
        self.handle.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn test_health_reports_serving() {
    let server = TestServer::start(&[]).await;
    let mut health = HealthClient::new(server.channel().await);

    for service in ["", "clusterbackup.v1.BackupService"] {
        let response = health
            .check(HealthCheckRequest {
                service: service.to_string(),
            })
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.status, ServingStatus::Serving as i32, "service {service:?}");
    }

    server.stop().await;
}

#[tokio::test]
async fn test_backup_status_and_delete_lifecycle() {
    let server = TestServer::start(&["n1", "n2"]).await;
    let mut client = server.client().await;

    client
        .backup(BackupRequest {
            name: "nightly".into(),
        })
        .await
        .unwrap();

    let status = client
        .backup_status(BackupStatusRequest {
            backup_name: "nightly".into(),
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(status.finished_nodes, vec!["n1"]);
    assert!(status.unfinished_nodes.is_empty());
    assert_eq!(status.missing_nodes, vec!["n2"]);
    assert!(!status.start_time.is_empty());
    assert_eq!(status.finish_time, "");

    let backups = client
        .get_backups(GetBackupsRequest {})
        .await
        .unwrap()
        .into_inner()
        .backups;
    assert_eq!(backups.len(), 1);
    assert_eq!(backups[0].backup_name, "nightly");
    assert_eq!(backups[0].total_nodes, 2);
    assert_eq!(backups[0].status, StatusType::Failed as i32);

    client
        .delete_backup(DeleteBackupRequest {
            name: "nightly".into(),
        })
        .await
        .unwrap();

    let err = client
        .backup_status(BackupStatusRequest {
            backup_name: "nightly".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::NotFound);

    server.stop().await;
}

#[tokio::test]
async fn test_completed_backup_has_finish_time() {
    let server = TestServer::start(&[]).await;
    let mut client = server.client().await;

    client
        .backup(BackupRequest { name: "x".into() })
        .await
        .unwrap();
    let status = client
        .backup_status(BackupStatusRequest {
            backup_name: "x".into(),
        })
        .await
        .unwrap()
        .into_inner();

    assert_eq!(status.finished_nodes, vec!["n1"]);
    assert_eq!(status.finish_time.len(), "2024-01-01 00:00:00".len());

    server.stop().await;
}

#[tokio::test]
async fn test_unknown_backup_is_not_found() {
    let server = TestServer::start(&[]).await;
    let mut client = server.client().await;

    let err = client
        .backup_status(BackupStatusRequest {
            backup_name: "does-not-exist".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::NotFound);
    assert!(err.message().contains("does-not-exist"));

    server.stop().await;
}

#[tokio::test]
async fn test_unusable_backup_name_is_not_found() {
    let server = TestServer::start(&[]).await;
    let mut client = server.client().await;

    for name in ["", "a/b", ".hidden"] {
        let err = client
            .backup_status(BackupStatusRequest {
                backup_name: name.into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::NotFound, "name {name:?}");
        assert_eq!(err.message(), format!("backup <{name}> does not exist"));
    }

    server.stop().await;
}

#[tokio::test]
async fn test_failed_operations_still_succeed_on_the_wire() {
    let server = TestServer::start(&[]).await;
    let mut client = server.client().await;

    // Deleting something that never existed fails inside the purge engine.
    client
        .delete_backup(DeleteBackupRequest {
            name: "ghost".into(),
        })
        .await
        .unwrap();

    // Without a data directory the node never finishes its backup.
    std::fs::remove_dir_all(&server.config.storage.data_dir).unwrap();
    client
        .backup(BackupRequest {
            name: "broken".into(),
        })
        .await
        .unwrap();

    let status = client
        .backup_status(BackupStatusRequest {
            backup_name: "broken".into(),
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(status.unfinished_nodes, vec!["n1"]);
    assert_eq!(status.finish_time, "");

    server.stop().await;
}

#[tokio::test]
async fn test_get_backups_empty() {
    let server = TestServer::start(&[]).await;
    let mut client = server.client().await;

    let backups = client
        .get_backups(GetBackupsRequest {})
        .await
        .unwrap()
        .into_inner()
        .backups;
    assert!(backups.is_empty());

    server.stop().await;
}
