use std::path::Path;
use anyhow::Context;
use serde::Deserialize;
use crate::queue::{MAX_CONCURRENT_UPLOADS, MAX_FILE_BYTES};

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    /// Wardrobe item submission endpoint.
    pub endpoint: String,

    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

fn default_max_concurrent() -> usize {
    MAX_CONCURRENT_UPLOADS
}

fn default_max_file_bytes() -> u64 {
    MAX_FILE_BYTES
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Config> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }
}
