//! Maps collaborator failures onto gRPC outcomes.
//!
//! Only an unknown backup name reaches callers as an error status. A name
//! the storage layout cannot hold is unknown too. Failures
//! of Backup and DeleteBackup never do: the handler logs them and answers
//! with the empty response, and callers learn the real outcome through
//! BackupStatus.

use backup_engine::EngineError;
use tonic::Status;

#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("backup <{0}> does not exist")]
    NotFound(String),

    #[error("invalid backup name {0:?}")]
    InvalidName(String),

    #[error("{0}")]
    Engine(#[source] EngineError),

    #[error("worker pool error: {0}")]
    Pool(String),
}

impl From<EngineError> for ServiceError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::NotFound(name) => ServiceError::NotFound(name),
            EngineError::InvalidName(name) => ServiceError::InvalidName(name),
            other => ServiceError::Engine(other),
        }
    }
}

impl From<ServiceError> for Status {
    fn from(e: ServiceError) -> Self {
        match &e {
            ServiceError::NotFound(_) => Status::not_found(e.to_string()),
            ServiceError::InvalidName(name) => Status::not_found(format!("backup <{name}> does not exist")),
            ServiceError::Engine(_) | ServiceError::Pool(_) => {
                tracing::error!("Internal error: {e:#}");
                Status::internal("internal error, see service logs")
            }
        }
    }
}

/// Result of the synchronous leg of a long-running operation.
///
/// `Rejected` is logged but still answered with the empty success
/// response; the durable outcome is read back with BackupStatus.
#[derive(Debug)]
pub enum OperationOutcome {
    Accepted,
    Rejected(ServiceError),
}

impl OperationOutcome {
    pub fn from_result<T>(result: Result<T, ServiceError>) -> Self {
        match result {
            Ok(_) => OperationOutcome::Accepted,
            Err(e) => OperationOutcome::Rejected(e),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, OperationOutcome::Accepted)
    }
}
