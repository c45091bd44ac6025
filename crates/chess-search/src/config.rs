//! Engine configuration.
//!
//! Values come from defaults, an optional TOML file, command-line flags and
//! UCI `setoption`, in that order of precedence. Whatever the source, they
//! are clamped to what the engine supports before use.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Most search threads the engine will run.
pub const MAX_THREADS: usize = 8;
/// Largest transposition table in MiB.
pub const MAX_HASH_MB: usize = 4096;

const DEFAULT_HASH_MB: usize = 16;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Number of search threads.
    pub threads: usize,
    /// Transposition table size in MiB.
    pub hash_mb: usize,
}

fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(MAX_THREADS)
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            threads: default_threads(),
            hash_mb: DEFAULT_HASH_MB,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str::<EngineConfig>(text)?.clamped())
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!("Loaded config from {}", path.display());
        Self::from_toml_str(&text)
    }

    /// Brings both values into range, warning about any that were changed.
    pub fn clamped(self) -> Self {
        let threads = self.threads.clamp(1, MAX_THREADS);
        if threads != self.threads {
            tracing::warn!(requested = self.threads, using = threads, "thread count out of range");
        }
        let hash_mb = self.hash_mb.clamp(1, MAX_HASH_MB);
        if hash_mb != self.hash_mb {
            tracing::warn!(requested = self.hash_mb, using = hash_mb, "hash size out of range");
        }
        EngineConfig { threads, hash_mb }
    }

    pub fn with_threads(self, threads: usize) -> Self {
        EngineConfig { threads, ..self }.clamped()
    }

    pub fn with_hash_mb(self, hash_mb: usize) -> Self {
        EngineConfig { hash_mb, ..self }.clamped()
    }
}
