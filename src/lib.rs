pub mod config;
pub mod queue;

pub use queue::{
    ImageSink,
    JobId,
    JobStatus,
    MemoryPreviewStore,
    PreviewId,
    PreviewStore,
    QueueError,
    QueueStats,
    Result,
    StagedFile,
    UploadJob,
    UploadQueue,
    UploadQueueHandle,
    WardrobeClient,
    MAX_CONCURRENT_UPLOADS,
    MAX_FILE_BYTES,
};
