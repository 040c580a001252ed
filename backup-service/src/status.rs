//! Derives the BackupStatus view of a cluster backup.

use crate::proto::BackupStatusResponse;
use backup_engine::ClusterBackup;
use chrono::{Local, TimeZone};
use std::fmt::Display;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Renders epoch seconds in the process's local time zone.
pub fn format_timestamp(epoch_secs: i64) -> String {
    format_timestamp_in(&Local, epoch_secs)
}

pub fn format_timestamp_in<Tz>(tz: &Tz, epoch_secs: i64) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match tz.timestamp_opt(epoch_secs, 0).earliest() {
        Some(dt) => dt.format(TIMESTAMP_FORMAT).to_string(),
        None => String::new(),
    }
}

/// Builds the status response for a snapshot. An empty `finish_time` means
/// the backup is still running.
pub fn backup_status(backup: &ClusterBackup) -> BackupStatusResponse {
    BackupStatusResponse {
        start_time: format_timestamp(backup.started()),
        finish_time: backup.finished().map(format_timestamp).unwrap_or_default(),
        finished_nodes: backup.complete_nodes(),
        unfinished_nodes: backup.incomplete_nodes(),
        missing_nodes: backup.missing_nodes(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backup_engine::storage::{NodeRecord, Tokenmap};
    use backup_engine::BackupMode;
    use chrono::{FixedOffset, Utc};
    use std::collections::HashSet;

    fn record(fqdn: &str, started: i64, finished: Option<i64>) -> NodeRecord {
        NodeRecord {
            fqdn: fqdn.to_string(),
            started,
            finished,
            mode: BackupMode::Differential,
        }
    }

    fn cluster_backup(nodes: &[&str], records: Vec<NodeRecord>) -> ClusterBackup {
        let tokenmap = Tokenmap {
            nodes: nodes.iter().map(|n| n.to_string()).collect(),
        };
        ClusterBackup::new("nightly-2024-01-01", tokenmap, records).unwrap()
    }

    #[test]
    fn test_running_backup() {
        let backup = cluster_backup(
            &["n1", "n2", "n3"],
            vec![
                record("n1", 1704067200, Some(1704067300)),
                record("n2", 1704067260, Some(1704067400)),
                record("n3", 1704067230, None),
            ],
        );

        let status = backup_status(&backup);
        assert_eq!(status.start_time, format_timestamp(1704067200));
        assert_eq!(status.finish_time, "");
        assert_eq!(status.finished_nodes, vec!["n1", "n2"]);
        assert_eq!(status.unfinished_nodes, vec!["n3"]);
        assert!(status.missing_nodes.is_empty());
    }

    #[test]
    fn test_finished_backup_has_finish_time() {
        let backup = cluster_backup(
            &["n1", "n2"],
            vec![
                record("n1", 1704067200, Some(1704067300)),
                record("n2", 1704067200, Some(1704067500)),
            ],
        );

        let status = backup_status(&backup);
        assert_eq!(status.finish_time, format_timestamp(1704067500));
        assert!(!status.finish_time.is_empty());
    }

    #[test]
    fn test_node_groups_partition_expected_set() {
        let backup = cluster_backup(
            &["n1", "n2", "n3", "n4", "n5"],
            vec![
                record("n4", 10, Some(20)),
                record("n2", 10, None),
                record("n1", 10, Some(30)),
            ],
        );
        let status = backup_status(&backup);

        let finished: HashSet<_> = status.finished_nodes.iter().collect();
        let unfinished: HashSet<_> = status.unfinished_nodes.iter().collect();
        let missing: HashSet<_> = status.missing_nodes.iter().collect();
        assert!(finished.is_disjoint(&unfinished));
        assert!(finished.is_disjoint(&missing));
        assert!(unfinished.is_disjoint(&missing));

        let union: HashSet<&str> = finished
            .union(&unfinished)
            .chain(missing.iter())
            .map(|s| s.as_str())
            .collect();
        let expected: HashSet<&str> = backup.expected_nodes().collect();
        assert_eq!(union, expected);
        assert_eq!(status.finish_time, "");
    }

    #[test]
    fn test_timestamp_rendering() {
        assert_eq!(format_timestamp_in(&Utc, 1704067200), "2024-01-01 00:00:00");
        let cest = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(format_timestamp_in(&cest, 1704067200), "2024-01-01 02:00:00");
        assert_eq!(format_timestamp_in(&Utc, i64::MAX), "");
    }

    #[test]
    fn test_timestamp_format_shape() {
        let rendered = format_timestamp(1704067200);
        assert_eq!(rendered.len(), "2024-01-01 00:00:00".len());
        assert_eq!(&rendered[4..5], "-");
        assert_eq!(&rendered[13..14], ":");
    }
}
