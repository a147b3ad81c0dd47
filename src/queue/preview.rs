use std::collections::HashSet;
use std::sync::Mutex;
use serde::Serialize;
use uuid::Uuid;
use super::types::StagedFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PreviewId(Uuid);

impl PreviewId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PreviewId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PreviewId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registry of transient thumbnail references. These stand in for a scarce
/// client-side resource (the display layer caps how many can be live at
/// once), so the coordinator releases each one exactly once when its job
/// leaves the queue.
pub trait PreviewStore: Send + Sync {
    fn create(&self, file: &StagedFile) -> PreviewId;

    fn release(&self, id: PreviewId);
}

/// In-process registry backing the default store. Tracks live ids so a
/// double release shows up in the logs instead of passing silently.
#[derive(Default)]
pub struct MemoryPreviewStore {
    live: Mutex<HashSet<PreviewId>>,
}

impl MemoryPreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().expect("preview store lock poisoned").len()
    }
}

impl PreviewStore for MemoryPreviewStore {
    fn create(&self, file: &StagedFile) -> PreviewId {
        let id = PreviewId::new();
        self.live
            .lock()
            .expect("preview store lock poisoned")
            .insert(id);
        log::debug!("created preview {} for {}", id, file.name);
        id
    }

    fn release(&self, id: PreviewId) {
        let removed = self
            .live
            .lock()
            .expect("preview store lock poisoned")
            .remove(&id);
        if !removed {
            log::warn!("released unknown preview {}", id);
        }
    }
}
