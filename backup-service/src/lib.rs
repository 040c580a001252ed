//! Backup service library
//!
//! gRPC front end for the backup engines: request handlers, the status
//! aggregation and error mapping they rely on, and the service host.

pub mod error;
pub mod host;
pub mod logging;
pub mod pool;
pub mod proto;
pub mod service;
pub mod settings;
pub mod shutdown;
pub mod status;

pub use error::{OperationOutcome, ServiceError};
pub use host::ServiceHost;
pub use pool::WorkerPool;
pub use service::BackupServiceImpl;
pub use settings::ProcessSettings;
