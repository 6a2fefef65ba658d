//! Status Polling Interface
//!
//! Clients learn about job progress only by polling `GET /api/jobs/:id`.
//! Each poll is an independent read of the current job state; the server
//! keeps no subscriptions and never blocks a poll waiting for a job.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pdftools_core::Operation;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::jobs::{Job, JobStatus};
use crate::registry::{FileRecord, FileRegistry};

/// A job as returned to polling clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub id: Uuid,
    pub operation: Operation,
    pub status: JobStatus,
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub input_files: Vec<Uuid>,
    pub output_files: Vec<FileRecord>,
    #[serde(default)]
    pub notices: Vec<String>,
    /// Suggested wait before the next poll; absent once the job is terminal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_after_ms: Option<u64>,
}

impl JobView {
    /// Build the view of `job`. Output files deleted since the job finished
    /// are left out.
    pub fn new(job: Job, registry: &FileRegistry, policy: &PollingPolicy) -> Self {
        let output_files = job
            .output_files
            .iter()
            .filter_map(|id| registry.get(id))
            .collect();
        Self {
            id: job.id,
            operation: job.operation,
            status: job.status,
            progress: job.progress,
            created_at: job.created_at,
            completed_at: job.completed_at,
            error_message: job.error_message,
            input_files: job.input_files,
            output_files,
            notices: job.notices,
            poll_after_ms: policy
                .next_poll(job.status)
                .map(|d| d.as_millis() as u64),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PollingPolicy {
    pub interval: Duration,
}

impl Default for PollingPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
        }
    }
}

impl PollingPolicy {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// How long to wait before polling again, or `None` to stop.
    pub fn next_poll(&self, status: JobStatus) -> Option<Duration> {
        if status.is_terminal() {
            None
        } else {
            Some(self.interval)
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum PollError {
    #[error("Job not found")]
    NotFound,

    #[error("Job did not finish after {0} polls")]
    TimedOut(usize),
}

/// Poll `fetch` until it reports a terminal job, sleeping the policy interval
/// between non-terminal observations. `fetch` returning `None` means the job
/// no longer exists.
pub async fn poll_until_terminal<F, Fut>(
    mut fetch: F,
    policy: PollingPolicy,
    max_polls: usize,
) -> Result<JobView, PollError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<JobView>>,
{
    for _ in 0..max_polls {
        let view = fetch().await.ok_or(PollError::NotFound)?;
        match policy.next_poll(view.status) {
            None => return Ok(view),
            Some(wait) => tokio::time::sleep(wait).await,
        }
    }
    Err(PollError::TimedOut(max_polls))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn view(status: JobStatus) -> JobView {
        JobView {
            id: Uuid::nil(),
            operation: Operation::MergePdf,
            status,
            progress: if status == JobStatus::Completed { 100 } else { 0 },
            created_at: Utc::now(),
            completed_at: None,
            error_message: None,
            input_files: vec![],
            output_files: vec![],
            notices: vec![],
            poll_after_ms: None,
        }
    }

    #[test]
    fn test_next_poll_stops_at_terminal_states() {
        let policy = PollingPolicy::default();
        assert_eq!(policy.next_poll(JobStatus::Pending), Some(Duration::from_millis(2000)));
        assert_eq!(policy.next_poll(JobStatus::Processing), Some(Duration::from_millis(2000)));
        assert_eq!(policy.next_poll(JobStatus::Completed), None);
        assert_eq!(policy.next_poll(JobStatus::Failed), None);
    }

    #[tokio::test]
    async fn test_poll_until_terminal() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let result = poll_until_terminal(
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    Some(view(match n {
                        0 => JobStatus::Pending,
                        1 => JobStatus::Processing,
                        _ => JobStatus::Completed,
                    }))
                }
            },
            PollingPolicy::new(Duration::from_millis(1)),
            10,
        )
        .await
        .unwrap();

        assert_eq!(result.status, JobStatus::Completed);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poll_gives_up() {
        let result = poll_until_terminal(
            || async { Some(view(JobStatus::Processing)) },
            PollingPolicy::new(Duration::from_millis(1)),
            3,
        )
        .await;
        assert_eq!(result.unwrap_err(), PollError::TimedOut(3));

        let missing = poll_until_terminal(
            || async { None },
            PollingPolicy::new(Duration::from_millis(1)),
            3,
        )
        .await;
        assert_eq!(missing.unwrap_err(), PollError::NotFound);
    }

    #[test]
    fn test_view_omits_poll_hint_when_terminal() {
        let json = serde_json::to_value(view(JobStatus::Failed)).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["operation"], "merge-pdf");
        assert!(json.get("pollAfterMs").is_none());
        assert!(json.get("errorMessage").is_none());
    }
}
