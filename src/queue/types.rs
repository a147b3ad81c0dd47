use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;
use super::preview::PreviewId;

/// Ceiling on simultaneous in-flight uploads.
pub const MAX_CONCURRENT_UPLOADS: usize = 2;

/// Largest accepted payload: 10 MiB.
pub const MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Progress markers. The backend gives no byte-level progress events, so a
/// job's progress only moves through these fixed points.
pub(crate) const PROGRESS_STARTED: u8 = 10;
pub(crate) const PROGRESS_ACCEPTED: u8 = 90;
pub(crate) const PROGRESS_DONE: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for a free concurrency slot.
    Pending,
    /// Request in flight.
    Uploading,
    /// Bytes accepted, backend analysis underway. Display-only phase: there
    /// is no completion signal to poll for, so the job moves on immediately.
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Completed or Failed. No further automatic transition happens from
    /// either; only `retry_job` or removal moves the job again.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Occupying a concurrency slot.
    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Uploading | JobStatus::Processing)
    }
}

/// A file staged for upload. The bytes are reference-counted so cloning the
/// staged file into the upload task is cheap.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl StagedFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

/// One file's tracked passage through the upload pipeline. Snapshot struct:
/// the coordinator owns the mutable state and hands out clones.
#[derive(Debug, Clone, Serialize)]
pub struct UploadJob {
    pub id: JobId,
    pub file_name: String,
    pub file_size: u64,
    pub content_type: String,
    pub status: JobStatus,
    /// 0-100, monotonically non-decreasing while active; reset only on retry.
    pub progress: u8,
    /// Present only when `status` is Failed.
    pub error: Option<String>,
    /// Backend-assigned resource id, set once the upload call succeeds.
    pub result_id: Option<String>,
    /// Local display reference, released exactly once when the job leaves
    /// the queue.
    pub preview: PreviewId,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl UploadJob {
    pub(crate) fn new(file: &StagedFile, preview: PreviewId) -> Self {
        Self {
            id: JobId::new(),
            file_name: file.name.clone(),
            file_size: file.size(),
            content_type: file.content_type.clone(),
            status: JobStatus::Pending,
            progress: 0,
            error: None,
            result_id: None,
            preview,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}

/// Current queue counts. `uploading` covers both Uploading and Processing
/// since both occupy a concurrency slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub uploading: usize,
    pub completed: usize,
    pub failed: usize,
}

impl QueueStats {
    pub fn collect<'a>(jobs: impl IntoIterator<Item = &'a UploadJob>) -> Self {
        let mut stats = Self::default();
        for job in jobs {
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Uploading | JobStatus::Processing => stats.uploading += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }

    pub fn total(&self) -> usize {
        self.pending + self.uploading + self.completed + self.failed
    }
}

/// Coordinator commands, replied to over oneshot channels.
pub(crate) enum QueueCommand {
    AddFiles {
        files: Vec<StagedFile>,
        reply: oneshot::Sender<Vec<JobId>>,
    },

    Retry {
        id: JobId,
        reply: oneshot::Sender<()>,
    },

    Remove {
        id: JobId,
        reply: oneshot::Sender<()>,
    },

    ClearCompleted {
        reply: oneshot::Sender<usize>,
    },

    GetJob {
        id: JobId,
        reply: oneshot::Sender<Option<UploadJob>>,
    },

    GetJobs {
        reply: oneshot::Sender<Vec<UploadJob>>,
    },

    GetStats {
        reply: oneshot::Sender<QueueStats>,
    },
}
