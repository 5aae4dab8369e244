use super::test_helpers::*;
use super::*;
use crate::config::Config;
use crate::error::{DatabaseError, Error, JobError, SubmissionError};
use crate::types::{
    EXTERNAL_ID_FIELD, ImageJobRequest, JobSnapshot, JobStatus, OutputMode, RecordJobRequest,
};
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;


/// Upper bound for any single job in these tests
const JOB_DEADLINE: Duration = Duration::from_secs(10);

async fn wait_terminal(registry: &JobRegistry, id: &JobId) -> JobSnapshot {
    tokio::time::timeout(JOB_DEADLINE, registry.wait(id))
        .await
        .expect("job did not finish in time")
        .expect("job is known")
}

fn tabular_request(ids: &[&str], fields: &[&str]) -> RecordJobRequest {
    RecordJobRequest {
        identifiers: ids.iter().map(|s| s.to_string()).collect(),
        fields: fields.iter().map(|s| s.to_string()).collect(),
        mode: OutputMode::Tabular,
        label: "sipm".into(),
        ..RecordJobRequest::default()
    }
}

/// Read a CSV export into header + records
fn read_csv(path: &std::path::Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let header = reader
        .headers()
        .unwrap()
        .iter()
        .map(String::from)
        .collect();
    let records = reader
        .records()
        .map(|r| r.unwrap().iter().map(String::from).collect())
        .collect();
    (header, records)
}

fn assert_consistent(snapshot: &JobSnapshot) {
    assert!(
        snapshot.processed <= snapshot.total || snapshot.total == 0 && snapshot.processed == 0,
        "processed {} > total {}",
        snapshot.processed,
        snapshot.total
    );
    assert!(snapshot.failed <= snapshot.processed);
    if !snapshot.is_terminal() {
        assert!(snapshot.output_path.is_none(), "output_path before terminal");
        assert!(snapshot.error.is_none(), "error before terminal");
        assert!(snapshot.finished_at.is_none());
    }
    if snapshot.status == JobStatus::Done {
        assert!(snapshot.output_path.is_some());
        assert!(snapshot.error.is_none());
    }
    if snapshot.status == JobStatus::Error {
        assert!(snapshot.error.is_some());
        assert!(snapshot.output_path.is_none());
    }
}
