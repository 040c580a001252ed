//! Generates the BackupService server and client stubs.
//!
//! Messages are hand-written prost structs in `src/proto.rs`, so only the
//! service glue is generated and no `protoc` is needed at build time.

fn method(name: &str, route: &str, input: &str, output: &str) -> tonic_build::manual::Method {
    tonic_build::manual::Method::builder()
        .name(name)
        .route_name(route)
        .input_type(format!("crate::proto::{input}"))
        .output_type(format!("crate::proto::{output}"))
        .codec_path("tonic::codec::ProstCodec")
        .build()
}

fn main() {
    let service = tonic_build::manual::Service::builder()
        .name("BackupService")
        .package("clusterbackup.v1")
        .method(method("backup", "Backup", "BackupRequest", "BackupResponse"))
        .method(method(
            "backup_status",
            "BackupStatus",
            "BackupStatusRequest",
            "BackupStatusResponse",
        ))
        .method(method(
            "delete_backup",
            "DeleteBackup",
            "DeleteBackupRequest",
            "DeleteBackupResponse",
        ))
        .method(method(
            "get_backups",
            "GetBackups",
            "GetBackupsRequest",
            "GetBackupsResponse",
        ))
        .build();

    tonic_build::manual::Builder::new().compile(&[service]);
    println!("cargo:rerun-if-changed=build.rs");
}
