//! Job Lifecycle Manager
//!
//! Jobs move `pending -> processing -> completed | failed` and never leave a
//! terminal state. Creating a job only enqueues its id; a dispatcher loop
//! picks ids off a bounded queue and runs them on worker tasks, at most
//! `workers` at a time.
//!
//! A job runs at most once. The `pending -> processing` transition happens
//! under the job's map entry lock in [`JobStore::claim`], and only the caller
//! that wins the claim executes the job.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use pdftools_core::{Artifact, InputDocument, Operation, PdfCommand, ProcessOutput};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::registry::{FileRecord, FileRegistry, FileStatus, NewFile};
use crate::storage::StoredFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub operation: Operation,
    pub status: JobStatus,
    /// 0 until the job completes, then 100
    pub progress: u8,
    pub input_files: Vec<Uuid>,
    pub output_files: Vec<Uuid>,
    pub parameters: serde_json::Value,
    /// Limitations disclosed by the operation
    pub notices: Vec<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(operation: Operation, input_files: Vec<Uuid>, parameters: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation,
            status: JobStatus::Pending,
            progress: 0,
            input_files,
            output_files: Vec::new(),
            parameters,
            notices: Vec::new(),
            error_message: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// Job records keyed by id
#[derive(Default)]
pub struct JobStore {
    jobs: DashMap<Uuid, Job>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job: Job) {
        self.jobs.insert(job.id, job);
    }

    pub fn get(&self, id: &Uuid) -> Option<Job> {
        self.jobs.get(id).map(|j| j.value().clone())
    }

    /// All jobs, newest first.
    pub fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.iter().map(|j| j.value().clone()).collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    pub fn remove(&self, id: &Uuid) -> Option<Job> {
        self.jobs.remove(id).map(|(_, job)| job)
    }

    /// Move a pending job to processing. Returns true only for the one caller
    /// that performed the transition.
    pub fn claim(&self, id: &Uuid) -> bool {
        match self.jobs.get_mut(id) {
            Some(mut job) if job.status == JobStatus::Pending => {
                job.status = JobStatus::Processing;
                true
            }
            _ => false,
        }
    }

    /// Record a successful result on a processing job.
    pub fn complete(&self, id: &Uuid, output_files: Vec<Uuid>, notices: Vec<String>) -> bool {
        match self.jobs.get_mut(id) {
            Some(mut job) if job.status == JobStatus::Processing => {
                job.status = JobStatus::Completed;
                job.progress = 100;
                job.output_files = output_files;
                job.notices = notices;
                job.completed_at = Some(Utc::now());
                true
            }
            _ => false,
        }
    }

    /// Record a failure on a job that has not yet reached a terminal state.
    pub fn fail(&self, id: &Uuid, message: impl Into<String>) -> bool {
        match self.jobs.get_mut(id) {
            Some(mut job) if !job.status.is_terminal() => {
                job.status = JobStatus::Failed;
                job.progress = 0;
                job.error_message = Some(message.into());
                job.completed_at = Some(Utc::now());
                true
            }
            _ => false,
        }
    }
}

/// Executes claimed jobs. Shared by the dispatcher loop and [`JobManager`].
struct JobRunner {
    jobs: Arc<JobStore>,
    registry: Arc<FileRegistry>,
}

impl JobRunner {
    async fn run_job(&self, id: Uuid) {
        if !self.jobs.claim(&id) {
            debug!("Job {} was already claimed or no longer exists", id);
            return;
        }
        info!("Job {} started", id);

        match self.execute(id).await {
            Ok((outputs, notices)) => {
                for notice in &notices {
                    warn!("Job {}: {}", id, notice);
                }
                let count = outputs.len();
                if self.jobs.complete(&id, outputs.clone(), notices) {
                    info!("Job {} completed with {} output file(s)", id, count);
                } else {
                    // Deleted after its outputs were registered
                    warn!("Job {} is gone; discarding {} output file(s)", id, count);
                    for file_id in &outputs {
                        self.registry.delete(file_id).await;
                    }
                }
            }
            Err(message) => {
                error!("Job {} failed: {}", id, message);
                self.jobs.fail(&id, message);
            }
        }
    }

    async fn execute(&self, id: Uuid) -> Result<(Vec<Uuid>, Vec<String>), String> {
        let job = self.jobs.get(&id).ok_or_else(|| format!("Job {} not found", id))?;

        // Parameters and input count are checked before any file is read
        let command = PdfCommand::parse(job.operation, &job.parameters).map_err(|e| e.to_string())?;
        command
            .validate_inputs(job.input_files.len())
            .map_err(|e| e.to_string())?;
        debug!("Job {} parameters: {}", id, job.parameters);

        let mut inputs = Vec::with_capacity(job.input_files.len());
        for file_id in &job.input_files {
            let record = self
                .registry
                .get(file_id)
                .ok_or_else(|| format!("Input file {} not found", file_id))?;
            let bytes = self
                .registry
                .read(&record)
                .await
                .map_err(|e| format!("Failed to read {}: {}", record.original_name, e))?;
            inputs.push(InputDocument::new(record.original_name, record.file_type, bytes));
        }

        let output = tokio::task::spawn_blocking(move || pdftools_core::execute(&command, &inputs))
            .await
            .map_err(|e| {
                error!("Job {} worker task failed: {}", id, e);
                "Processing task panicked".to_string()
            })?
            .map_err(|e| e.to_string())?;

        let ProcessOutput { artifacts, notices } = output;
        let records = self.store_outputs(&job, artifacts).await?;
        for file_id in &job.input_files {
            self.registry.mark_processed(file_id);
        }
        Ok((records.into_iter().map(|r| r.id).collect(), notices))
    }

    /// Write every artifact to disk, then register them all. If any write
    /// fails, or the job was deleted while it ran, the files already written
    /// are removed and nothing is registered.
    async fn store_outputs(
        &self,
        job: &Job,
        artifacts: Vec<Artifact>,
    ) -> Result<Vec<FileRecord>, String> {
        let storage = self.registry.storage();
        let mut written: Vec<(StoredFile, String, &'static str)> = Vec::new();

        for artifact in artifacts {
            match storage
                .save_output(&artifact.tag, artifact.extension, &artifact.bytes)
                .await
            {
                Ok(stored) => written.push((
                    stored,
                    format!("{}.{}", artifact.tag, artifact.extension),
                    artifact.mime_type,
                )),
                Err(e) => {
                    self.discard(&written).await;
                    return Err(format!("Failed to write output file: {}", e));
                }
            }
        }

        let still_running = self
            .jobs
            .get(&job.id)
            .is_some_and(|j| j.status == JobStatus::Processing);
        if !still_running {
            self.discard(&written).await;
            return Err(format!("Job {} was deleted while running", job.id));
        }

        let metadata = json!({
            "operation": job.operation,
            "createdFrom": job.input_files,
            "jobId": job.id,
        });
        Ok(written
            .into_iter()
            .map(|(stored, original_name, mime_type)| {
                self.registry.create(NewFile {
                    original_name,
                    file_type: mime_type.to_string(),
                    stored,
                    status: FileStatus::Processed,
                    metadata: metadata.clone(),
                })
            })
            .collect())
    }

    async fn discard(&self, written: &[(StoredFile, String, &'static str)]) {
        let storage = self.registry.storage();
        for (stored, _, _) in written {
            if let Err(e) = storage.remove(&stored.path).await {
                warn!("Could not remove {}: {}", stored.path.display(), e);
            }
        }
    }
}

/// Accepts jobs and runs them in the background
#[derive(Clone)]
pub struct JobManager {
    runner: Arc<JobRunner>,
    queue: mpsc::Sender<Uuid>,
}

impl JobManager {
    /// Create the manager and spawn its dispatcher loop on the current runtime.
    pub fn start(
        jobs: Arc<JobStore>,
        registry: Arc<FileRegistry>,
        workers: usize,
        queue_capacity: usize,
    ) -> Self {
        let runner = Arc::new(JobRunner { jobs, registry });
        let (queue, receiver) = mpsc::channel(queue_capacity.max(1));
        tokio::spawn(dispatch_loop(Arc::clone(&runner), receiver, workers.max(1)));
        Self { runner, queue }
    }

    /// Create a pending job and queue it. Returns without waiting for the
    /// job to run. A job that cannot be queued is failed immediately.
    pub fn submit(
        &self,
        operation: Operation,
        input_files: Vec<Uuid>,
        parameters: serde_json::Value,
    ) -> Job {
        let job = Job::new(operation, input_files, parameters);
        let id = job.id;
        self.runner.jobs.insert(job.clone());
        info!("Job {} created: {} on {} file(s)", id, operation, job.input_files.len());

        if let Err(e) = self.queue.try_send(id) {
            error!("Could not queue job {}: {}", id, e);
            self.runner
                .jobs
                .fail(&id, "The server is busy; the job could not be queued");
        }
        job
    }

    /// Run a job now on the calling task. Safe to call for a job that is
    /// queued or already running; only one execution ever happens.
    pub async fn run_job(&self, id: Uuid) {
        self.runner.run_job(id).await;
    }
}

async fn dispatch_loop(runner: Arc<JobRunner>, mut receiver: mpsc::Receiver<Uuid>, workers: usize) {
    info!("Job dispatcher started with {} worker(s)", workers);
    let semaphore = Arc::new(Semaphore::new(workers));

    while let Some(id) = receiver.recv().await {
        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let runner = Arc::clone(&runner);
        tokio::spawn(async move {
            runner.run_job(id).await;
            drop(permit);
        });
    }
    debug!("Job dispatcher stopped");
}
