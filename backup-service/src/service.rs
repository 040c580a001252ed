//! Request handlers of the BackupService RPCs.
//!
//! Every handler makes exactly one collaborator call on the worker pool and
//! shapes its result. No state is shared between calls.

use crate::error::{OperationOutcome, ServiceError};
use crate::pool::WorkerPool;
use crate::proto::backup_service_server::BackupService;
use crate::proto::{
    BackupRequest, BackupResponse, BackupStatusRequest, BackupStatusResponse, DeleteBackupRequest,
    DeleteBackupResponse, GetBackupsRequest, GetBackupsResponse,
};
use crate::status::backup_status;
use backup_engine::{BackupEngine, BackupMode, EngineError, PurgeEngine, StorageIndex};
use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::{error, info, info_span, Instrument, Span};

/// Mode of every backup started over RPC.
pub const DEFAULT_BACKUP_MODE: BackupMode = BackupMode::Differential;

pub struct BackupServiceImpl {
    backups: Arc<dyn BackupEngine>,
    purge: Arc<dyn PurgeEngine>,
    storage: Arc<dyn StorageIndex>,
    pool: WorkerPool,
}

impl BackupServiceImpl {
    pub fn new(
        backups: Arc<dyn BackupEngine>,
        purge: Arc<dyn PurgeEngine>,
        storage: Arc<dyn StorageIndex>,
        pool: WorkerPool,
    ) -> Self {
        Self {
            backups,
            purge,
            storage,
            pool,
        }
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    async fn start_backup(&self, name: String) -> OperationOutcome {
        info!("Performing backup {}", name);
        let engine = self.backups.clone();
        let result = self
            .pool
            .run(move || engine.run_backup(&name, None, DEFAULT_BACKUP_MODE))
            .await
            .and_then(|r| r.map_err(ServiceError::from));
        OperationOutcome::from_result(result)
    }

    async fn lookup_status(&self, name: String) -> Result<BackupStatusResponse, ServiceError> {
        let storage = self.storage.clone();
        let lookup = name.clone();
        let snapshot = self.pool.run(move || storage.get_cluster_backup(&lookup)).await?;

        match snapshot {
            Ok(backup) => Ok(backup_status(&backup)),
            Err(EngineError::NotFound(_) | EngineError::InvalidName(_)) => {
                info!("Backup {} does not exist", name);
                Err(ServiceError::NotFound(name))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn purge_backup(&self, name: String) -> OperationOutcome {
        info!("Deleting backup {}", name);
        let purge = self.purge.clone();
        let result = self
            .pool
            .run(move || purge.delete_backup(&name, true))
            .await
            .and_then(|r| r.map_err(ServiceError::from));
        OperationOutcome::from_result(result)
    }

    async fn list_backups(&self) -> Result<GetBackupsResponse, ServiceError> {
        let storage = self.storage.clone();
        let summaries = self.pool.run(move || storage.list_backups()).await??;
        Ok(GetBackupsResponse {
            backups: summaries.into_iter().map(Into::into).collect(),
        })
    }
}

fn call_span(method: &'static str, backup: &str) -> Span {
    info_span!("rpc", method, call_id = %uuid::Uuid::new_v4(), backup)
}

#[tonic::async_trait]
impl BackupService for BackupServiceImpl {
    async fn backup(&self, request: Request<BackupRequest>) -> Result<Response<BackupResponse>, Status> {
        let name = request.into_inner().name;
        let span = call_span("Backup", &name);

        match self.start_backup(name.clone()).instrument(span.clone()).await {
            OperationOutcome::Accepted => span.in_scope(|| info!("Backup {} finished", name)),
            OperationOutcome::Rejected(e) => span.in_scope(|| error!("Backup {} failed: {}", name, e)),
        }
        Ok(Response::new(BackupResponse {}))
    }

    async fn backup_status(
        &self,
        request: Request<BackupStatusRequest>,
    ) -> Result<Response<BackupStatusResponse>, Status> {
        let name = request.into_inner().backup_name;
        let span = call_span("BackupStatus", &name);

        let status = self.lookup_status(name).instrument(span).await?;
        Ok(Response::new(status))
    }

    async fn delete_backup(
        &self,
        request: Request<DeleteBackupRequest>,
    ) -> Result<Response<DeleteBackupResponse>, Status> {
        let name = request.into_inner().name;
        let span = call_span("DeleteBackup", &name);

        match self.purge_backup(name.clone()).instrument(span.clone()).await {
            OperationOutcome::Accepted => span.in_scope(|| info!("Backup {} deleted", name)),
            OperationOutcome::Rejected(e) => {
                span.in_scope(|| error!("Deleting backup {} failed: {}", name, e))
            }
        }
        Ok(Response::new(DeleteBackupResponse {}))
    }

    async fn get_backups(
        &self,
        _request: Request<GetBackupsRequest>,
    ) -> Result<Response<GetBackupsResponse>, Status> {
        let response = self.list_backups().instrument(call_span("GetBackups", "")).await?;
        Ok(Response::new(response))
    }
}
