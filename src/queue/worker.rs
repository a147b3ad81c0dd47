use std::collections::HashSet;
use std::sync::Arc;
use chrono::Utc;
use tokio::sync::{mpsc, watch};
use super::client::ImageSink;
use super::errors::QueueError;
use super::preview::PreviewStore;
use super::types::{
    JobId, JobStatus, QueueCommand, QueueStats, StagedFile, UploadJob,
    PROGRESS_ACCEPTED, PROGRESS_DONE, PROGRESS_STARTED,
};

const GENERIC_FAILURE: &str = "Upload failed";

/// A queued job together with the payload it will send. Snapshots hand out
/// only the `job` half; the bytes never leave the worker except into the
/// upload task itself.
struct JobEntry {
    job: UploadJob,
    file: StagedFile,
}

struct UploadOutcome {
    id: JobId,
    result: Result<String, QueueError>,
}

/// Owns the job list and all mutations to it. Runs as a single task, so the
/// scheduler can never be entered twice and no locking is needed around the
/// list itself.
pub(crate) struct QueueWorker {
    sink: Arc<dyn ImageSink>,
    previews: Arc<dyn PreviewStore>,
    max_concurrent: usize,
    max_file_bytes: u64,
    jobs: Vec<JobEntry>,
    in_flight: HashSet<JobId>,
    snapshot_tx: watch::Sender<Vec<UploadJob>>,
    outcome_tx: mpsc::UnboundedSender<UploadOutcome>,
    outcome_rx: mpsc::UnboundedReceiver<UploadOutcome>,
}

impl QueueWorker {
    pub(crate) async fn run(
        sink: Arc<dyn ImageSink>,
        previews: Arc<dyn PreviewStore>,
        max_concurrent: usize,
        max_file_bytes: u64,
        mut command_rx: mpsc::Receiver<QueueCommand>,
        snapshot_tx: watch::Sender<Vec<UploadJob>>,
    ) {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let mut worker = Self {
            sink,
            previews,
            max_concurrent,
            max_file_bytes,
            jobs: Vec::new(),
            in_flight: HashSet::new(),
            snapshot_tx,
            outcome_tx,
            outcome_rx,
        };

        loop {
            tokio::select! {
                command = command_rx.recv() => {
                    match command {
                        Some(command) => worker.handle_command(command),
                        // All queue handles dropped.
                        None => break,
                    }
                }
                Some(outcome) = worker.outcome_rx.recv() => {
                    worker.handle_outcome(outcome);
                }
            }

            worker.process_queue();
        }

        // Queue teardown is the last exit path a preview can take.
        for entry in std::mem::take(&mut worker.jobs) {
            worker.previews.release(entry.job.preview);
        }
    }

    /// Fill free concurrency slots with pending jobs, earliest enqueued
    /// first. Retried jobs keep their original enqueue position.
    fn process_queue(&mut self) {
        while self.in_flight.len() < self.max_concurrent {
            let Some(entry) = self
                .jobs
                .iter_mut()
                .find(|entry| entry.job.status == JobStatus::Pending)
            else {
                break;
            };

            entry.job.status = JobStatus::Uploading;
            entry.job.progress = PROGRESS_STARTED;
            entry.job.started_at = Some(Utc::now());

            let id = entry.job.id;
            let file = entry.file.clone();
            let sink = self.sink.clone();
            let outcome_tx = self.outcome_tx.clone();

            self.in_flight.insert(id);
            tokio::spawn(async move {
                let result = sink.submit(&file).await;
                let _ = outcome_tx.send(UploadOutcome { id, result });
            });

            log::debug!("started upload {}", id);
            self.publish();
        }
    }

    fn handle_command(&mut self, command: QueueCommand) {
        match command {
            QueueCommand::AddFiles { files, reply } => {
                let accepted = self.add_files(files);
                let _ = reply.send(accepted);
            }
            QueueCommand::Retry { id, reply } => {
                self.retry_job(id);
                let _ = reply.send(());
            }
            QueueCommand::Remove { id, reply } => {
                self.remove_job(id);
                let _ = reply.send(());
            }
            QueueCommand::ClearCompleted { reply } => {
                let _ = reply.send(self.clear_completed());
            }
            QueueCommand::GetJob { id, reply } => {
                let job = self
                    .jobs
                    .iter()
                    .find(|entry| entry.job.id == id)
                    .map(|entry| entry.job.clone());
                let _ = reply.send(job);
            }
            QueueCommand::GetJobs { reply } => {
                let _ = reply.send(self.jobs.iter().map(|entry| entry.job.clone()).collect());
            }
            QueueCommand::GetStats { reply } => {
                let _ = reply.send(QueueStats::collect(self.jobs.iter().map(|entry| &entry.job)));
            }
        }
    }

    /// Validate and enqueue. Rejected files never become jobs; they are
    /// reported on the warning channel only.
    fn add_files(&mut self, files: Vec<StagedFile>) -> Vec<JobId> {
        let mut accepted = Vec::new();

        for file in files {
            if !file.is_image() {
                log::warn!(
                    "rejected {}: content type {} is not an image",
                    file.name,
                    file.content_type
                );
                continue;
            }
            if file.size() > self.max_file_bytes {
                log::warn!(
                    "rejected {}: {} bytes exceeds the {} byte limit",
                    file.name,
                    file.size(),
                    self.max_file_bytes
                );
                continue;
            }

            let preview = self.previews.create(&file);
            let job = UploadJob::new(&file, preview);
            accepted.push(job.id);
            self.jobs.push(JobEntry { job, file });
        }

        if !accepted.is_empty() {
            self.publish();
        }

        accepted
    }

    /// Failed jobs only; anything else is a no-op, not an error.
    fn retry_job(&mut self, id: JobId) {
        let Some(entry) = self.jobs.iter_mut().find(|entry| entry.job.id == id) else {
            return;
        };
        if entry.job.status != JobStatus::Failed {
            return;
        }

        entry.job.status = JobStatus::Pending;
        entry.job.progress = 0;
        entry.job.error = None;
        entry.job.result_id = None;
        entry.job.started_at = None;
        entry.job.completed_at = None;

        log::debug!("retrying job {}", id);
        self.publish();
    }

    /// Removal does not cancel an in-flight request; the job's slot stays
    /// occupied until the request resolves, and the result is then
    /// discarded because the id no longer resolves.
    fn remove_job(&mut self, id: JobId) {
        let Some(index) = self.jobs.iter().position(|entry| entry.job.id == id) else {
            return;
        };

        let entry = self.jobs.remove(index);
        self.previews.release(entry.job.preview);
        self.publish();
    }

    fn clear_completed(&mut self) -> usize {
        let previews = self.previews.clone();
        let mut removed = 0;

        self.jobs.retain(|entry| {
            if entry.job.status == JobStatus::Completed {
                previews.release(entry.job.preview);
                removed += 1;
                false
            } else {
                true
            }
        });

        if removed > 0 {
            self.publish();
        }
        removed
    }

    fn handle_outcome(&mut self, outcome: UploadOutcome) {
        self.in_flight.remove(&outcome.id);

        let Some(index) = self
            .jobs
            .iter()
            .position(|entry| entry.job.id == outcome.id)
        else {
            // Job was removed while its request was in flight.
            log::debug!("discarding upload result for removed job {}", outcome.id);
            return;
        };

        match outcome.result {
            Ok(result_id) => {
                {
                    let job = &mut self.jobs[index].job;
                    job.status = JobStatus::Processing;
                    job.progress = PROGRESS_ACCEPTED;
                    job.result_id = Some(result_id);
                }
                self.publish();

                // The backend analyzes the image asynchronously but offers no
                // completion signal, so the job is done as far as this client
                // can tell once the bytes are accepted.
                {
                    let job = &mut self.jobs[index].job;
                    job.status = JobStatus::Completed;
                    job.progress = PROGRESS_DONE;
                    job.completed_at = Some(Utc::now());
                }
                self.publish();
            }
            Err(err) => {
                let message = failure_message(&err);
                log::warn!("upload {} failed: {}", outcome.id, message);

                {
                    // Progress stays where the attempt left it.
                    let job = &mut self.jobs[index].job;
                    job.status = JobStatus::Failed;
                    job.error = Some(message);
                    job.completed_at = Some(Utc::now());
                }
                self.publish();
            }
        }
    }

    /// Snapshots are stored before `send` returns, so a subscriber never
    /// observes a partially applied mutation.
    fn publish(&self) {
        let _ = self
            .snapshot_tx
            .send(self.jobs.iter().map(|entry| entry.job.clone()).collect());
    }
}

/// Best-effort human readable cause: the server's structured message rides
/// inside the error already; otherwise fall back to the transport text, and
/// to a generic string when even that is empty.
fn failure_message(err: &QueueError) -> String {
    match err {
        QueueError::Server { message, .. } if !message.trim().is_empty() => message.clone(),
        other => {
            let text = other.to_string();
            if text.trim().is_empty() {
                GENERIC_FAILURE.to_string()
            } else {
                text
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_message_prefers_server_message() {
        let err = QueueError::server_error(422, "image too dark");
        assert_eq!(failure_message(&err), "image too dark");
    }

    #[test]
    fn failure_message_falls_back_to_error_text() {
        let err = QueueError::server_error(500, "  ");
        assert!(failure_message(&err).contains("500"));

        let err = QueueError::internal("connection reset");
        assert_eq!(failure_message(&err), "Internal error: connection reset");
    }

    #[test]
    fn failure_message_generic_fallback() {
        let err = QueueError::internal("");
        // `Internal error: ` is never empty, but an empty rendering must
        // still come out readable.
        assert!(!failure_message(&err).trim().is_empty());
        assert_eq!(GENERIC_FAILURE, "Upload failed");
    }
}
