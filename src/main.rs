use std::path::Path;
use std::sync::Arc;
use anyhow::{bail, Context};
use bytes::Bytes;
use hamper::config::Config;
use hamper::{MemoryPreviewStore, StagedFile, UploadQueue, WardrobeClient};

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = Config::load("config.toml")?;
    let paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        bail!("usage: hamper <image> [<image>...]");
    }

    let mut files = Vec::new();
    for path in &paths {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path))?;
        let path = Path::new(path);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        files.push(StagedFile::new(name, content_type_for(path), Bytes::from(bytes)));
    }

    let client = Arc::new(WardrobeClient::new(&config.endpoint)?);
    let previews = Arc::new(MemoryPreviewStore::new());
    let handle = UploadQueue::with_limits(
        client,
        previews,
        config.max_concurrent,
        config.max_file_bytes,
    );
    let queue = &handle.queue;

    let mut snapshots = queue.subscribe();
    let accepted = queue.add_files(files).await?;
    println!("queued {} of {} files", accepted.len(), paths.len());

    loop {
        {
            let jobs = snapshots.borrow_and_update();
            if jobs.iter().all(|job| job.status.is_terminal()) {
                break;
            }
        }
        if snapshots.changed().await.is_err() {
            break;
        }
    }

    for job in queue.jobs().await? {
        match (&job.result_id, &job.error) {
            (Some(result_id), _) => println!("{}: done, item {}", job.file_name, result_id),
            (None, Some(error)) => println!("{}: failed, {}", job.file_name, error),
            (None, None) => println!("{}: {:?}", job.file_name, job.status),
        }
    }

    handle.shutdown().await?;
    Ok(())
}
