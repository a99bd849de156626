//! Configuration for the chunking pipeline

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Main pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// Metadata extraction configuration
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Batch processing configuration
    #[serde(default)]
    pub processing: ProcessingConfig,
}

impl PipelineConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read config file {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&raw)?;
        Ok(config)
    }

    /// Reject parameter combinations that cannot produce a valid run
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;

        if self.processing.workers == 0 {
            return Err(Error::config("workers must be at least 1"));
        }
        if self.processing.file_timeout_secs == Some(0) {
            return Err(Error::config("file_timeout_secs must be greater than 0"));
        }
        Ok(())
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum chunk body size in characters (header excluded)
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,
    /// Characters repeated from the end of one chunk at the start of the next
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
    /// Strip heading lines, join hyphenation and collapse spacing before chunking
    #[serde(default = "default_clean_sections")]
    pub clean_sections: bool,
}

fn default_max_chunk_chars() -> usize { 2000 }
fn default_overlap_chars() -> usize { 200 }
fn default_clean_sections() -> bool { true }

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: default_max_chunk_chars(),
            overlap_chars: default_overlap_chars(),
            clean_sections: default_clean_sections(),
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_chars == 0 {
            return Err(Error::config("max_chunk_chars must be greater than 0"));
        }
        if self.overlap_chars >= self.max_chunk_chars {
            return Err(Error::config(format!(
                "overlap_chars ({}) must be smaller than max_chunk_chars ({})",
                self.overlap_chars, self.max_chunk_chars
            )));
        }
        Ok(())
    }
}

/// Metadata extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// Only this many leading characters are searched for case metadata
    #[serde(default = "default_prefix_window_chars")]
    pub prefix_window_chars: usize,
}

fn default_prefix_window_chars() -> usize { 6000 }

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            prefix_window_chars: default_prefix_window_chars(),
        }
    }
}

/// Batch processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Number of parallel file workers
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Per-file time limit in seconds; a file over the limit is recorded as failed
    #[serde(default)]
    pub file_timeout_secs: Option<u64>,
    /// Descend into subdirectories when listing input files
    #[serde(default)]
    pub recursive: bool,
}

fn default_workers() -> usize { 4 }

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            file_timeout_secs: None,
            recursive: false,
        }
    }
}

impl ProcessingConfig {
    pub fn file_timeout(&self) -> Option<Duration> {
        self.file_timeout_secs.map(Duration::from_secs)
    }
}
