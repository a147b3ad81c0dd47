mod client;
mod coordinator;
mod errors;
mod preview;
mod types;
mod worker;


pub use client::{ImageSink, WardrobeClient};
pub use coordinator::{UploadQueue, UploadQueueHandle};
pub use errors::{QueueError, Result};
pub use preview::{MemoryPreviewStore, PreviewId, PreviewStore};
pub use types::{
    JobId, JobStatus, QueueStats, StagedFile, UploadJob, MAX_CONCURRENT_UPLOADS, MAX_FILE_BYTES,
};
