use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use super::client::ImageSink;
use super::errors::{QueueError, Result};
use super::preview::PreviewStore;
use super::types::{
    JobId, QueueCommand, QueueStats, StagedFile, UploadJob, MAX_CONCURRENT_UPLOADS, MAX_FILE_BYTES,
};
use super::worker::QueueWorker;

/// Handle to the upload queue coordinator. Cheap to clone; every clone
/// talks to the same worker task. Construct one per application session and
/// pass it to whatever needs it - there is deliberately no global instance.
#[derive(Clone)]
pub struct UploadQueue {
    command_tx: mpsc::Sender<QueueCommand>,
    snapshot_rx: watch::Receiver<Vec<UploadJob>>,
}

/// Queue handle paired with the worker task, for orderly teardown.
pub struct UploadQueueHandle {
    pub queue: UploadQueue,
    worker_handle: JoinHandle<()>,
}

impl UploadQueueHandle {
    /// Drops the last internal handle and waits for the worker to exit.
    /// The worker releases every remaining preview on the way out.
    pub async fn shutdown(self) -> Result<()> {
        drop(self.queue);
        self.worker_handle
            .await
            .map_err(|err| QueueError::internal(format!("worker panic: {}", err)))
    }
}

impl UploadQueue {
    pub fn new(sink: Arc<dyn ImageSink>, previews: Arc<dyn PreviewStore>) -> UploadQueueHandle {
        Self::with_limits(sink, previews, MAX_CONCURRENT_UPLOADS, MAX_FILE_BYTES)
    }

    pub fn with_limits(
        sink: Arc<dyn ImageSink>,
        previews: Arc<dyn PreviewStore>,
        max_concurrent: usize,
        max_file_bytes: u64,
    ) -> UploadQueueHandle {
        let (command_tx, command_rx) = mpsc::channel(64);
        let (snapshot_tx, snapshot_rx) = watch::channel(Vec::new());

        let worker_handle = tokio::spawn(QueueWorker::run(
            sink,
            previews,
            max_concurrent,
            max_file_bytes,
            command_rx,
            snapshot_tx,
        ));

        UploadQueueHandle {
            queue: Self {
                command_tx,
                snapshot_rx,
            },
            worker_handle,
        }
    }

    /// Validate and enqueue a batch of files. Non-images and files over the
    /// size limit are dropped with a logged warning, never becoming jobs.
    /// Returns the ids of the jobs that were created.
    pub async fn add_files(&self, files: Vec<StagedFile>) -> Result<Vec<JobId>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(QueueCommand::AddFiles {
                files,
                reply: reply_tx,
            })
            .await
            .map_err(|_| QueueError::Shutdown)?;

        reply_rx.await.map_err(|_| QueueError::Shutdown)
    }

    /// Observe the job list. The receiver holds the current snapshot
    /// immediately and is notified of every subsequent mutation; dropping
    /// it is the unsubscribe. Each subscriber gets its own receiver.
    pub fn subscribe(&self) -> watch::Receiver<Vec<UploadJob>> {
        self.snapshot_rx.clone()
    }

    /// Reset a failed job to pending so it re-enters scheduling. No-op for
    /// unknown ids or jobs in any other state.
    pub async fn retry_job(&self, id: JobId) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(QueueCommand::Retry { id, reply: reply_tx })
            .await
            .map_err(|_| QueueError::Shutdown)?;

        reply_rx.await.map_err(|_| QueueError::Shutdown)
    }

    /// Remove a job in any state and release its preview. An in-flight
    /// request is not cancelled; its eventual result is discarded.
    pub async fn remove_job(&self, id: JobId) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(QueueCommand::Remove { id, reply: reply_tx })
            .await
            .map_err(|_| QueueError::Shutdown)?;

        reply_rx.await.map_err(|_| QueueError::Shutdown)
    }

    /// Drop every completed job, releasing their previews. Returns how many
    /// were removed.
    pub async fn clear_completed(&self) -> Result<usize> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(QueueCommand::ClearCompleted { reply: reply_tx })
            .await
            .map_err(|_| QueueError::Shutdown)?;

        reply_rx.await.map_err(|_| QueueError::Shutdown)
    }

    pub async fn job(&self, id: JobId) -> Result<Option<UploadJob>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(QueueCommand::GetJob { id, reply: reply_tx })
            .await
            .map_err(|_| QueueError::Shutdown)?;

        reply_rx.await.map_err(|_| QueueError::Shutdown)
    }

    pub async fn jobs(&self) -> Result<Vec<UploadJob>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(QueueCommand::GetJobs { reply: reply_tx })
            .await
            .map_err(|_| QueueError::Shutdown)?;

        reply_rx.await.map_err(|_| QueueError::Shutdown)
    }

    pub async fn stats(&self) -> Result<QueueStats> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(QueueCommand::GetStats { reply: reply_tx })
            .await
            .map_err(|_| QueueError::Shutdown)?;

        reply_rx.await.map_err(|_| QueueError::Shutdown)
    }
}
