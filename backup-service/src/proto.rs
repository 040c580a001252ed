//! Wire messages of the `clusterbackup.v1.BackupService` gRPC service.
//!
//! Field names and tags mirror this service definition:
//!
//! ```text
//! service BackupService {
//!   rpc Backup(BackupRequest) returns (BackupResponse);
//!   rpc BackupStatus(BackupStatusRequest) returns (BackupStatusResponse);
//!   rpc DeleteBackup(DeleteBackupRequest) returns (DeleteBackupResponse);
//!   rpc GetBackups(GetBackupsRequest) returns (GetBackupsResponse);
//! }
//! ```

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BackupRequest {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct BackupResponse {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BackupStatusRequest {
    #[prost(string, tag = "1")]
    pub backup_name: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BackupStatusResponse {
    #[prost(string, repeated, tag = "1")]
    pub finished_nodes: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(string, repeated, tag = "2")]
    pub unfinished_nodes: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(string, repeated, tag = "3")]
    pub missing_nodes: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(string, tag = "4")]
    pub start_time: ::prost::alloc::string::String,
    #[prost(string, tag = "5")]
    pub finish_time: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeleteBackupRequest {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct DeleteBackupResponse {}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct GetBackupsRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetBackupsResponse {
    #[prost(message, repeated, tag = "1")]
    pub backups: ::prost::alloc::vec::Vec<BackupSummary>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BackupSummary {
    #[prost(string, tag = "1")]
    pub backup_name: ::prost::alloc::string::String,
    /// Seconds since the Unix epoch
    #[prost(int64, tag = "2")]
    pub start_time: i64,
    /// Seconds since the Unix epoch, 0 while the backup is running
    #[prost(int64, tag = "3")]
    pub finish_time: i64,
    #[prost(int32, tag = "4")]
    pub total_nodes: i32,
    #[prost(int32, tag = "5")]
    pub finished_nodes: i32,
    #[prost(message, repeated, tag = "6")]
    pub nodes: ::prost::alloc::vec::Vec<BackupNode>,
    #[prost(enumeration = "StatusType", tag = "7")]
    pub status: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BackupNode {
    #[prost(string, tag = "1")]
    pub host: ::prost::alloc::string::String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum StatusType {
    InProgress = 0,
    Success = 1,
    Failed = 2,
}

impl From<backup_engine::BackupState> for StatusType {
    fn from(state: backup_engine::BackupState) -> Self {
        match state {
            backup_engine::BackupState::InProgress => StatusType::InProgress,
            backup_engine::BackupState::Success => StatusType::Success,
            backup_engine::BackupState::Failed => StatusType::Failed,
        }
    }
}

impl From<backup_engine::BackupSummary> for BackupSummary {
    fn from(summary: backup_engine::BackupSummary) -> Self {
        Self {
            backup_name: summary.backup_name,
            start_time: summary.start_time,
            finish_time: summary.finish_time.unwrap_or_default(),
            total_nodes: summary.total_nodes as i32,
            finished_nodes: summary.finished_nodes as i32,
            nodes: summary
                .nodes
                .into_iter()
                .map(|host| BackupNode { host })
                .collect(),
            status: StatusType::from(summary.state) as i32,
        }
    }
}

include!(concat!(env!("OUT_DIR"), "/clusterbackup.v1.BackupService.rs"));
