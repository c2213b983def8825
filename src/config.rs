//! Configuration for blocklog
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{LogError, Result};

/// Main configuration for a log instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Device Configuration
    // -------------------------------------------------------------------------
    /// Path of the device image opened by `LogEngine::open`
    pub device_path: PathBuf,

    /// Block size used when opening a file-backed device (power of two)
    pub block_size: u64,

    // -------------------------------------------------------------------------
    // Cache Configuration
    // -------------------------------------------------------------------------
    /// Write buffer capacity, in device blocks
    pub write_cache_blocks: usize,

    /// Read cache capacity, in device blocks
    pub read_cache_blocks: usize,

    // -------------------------------------------------------------------------
    // Worker Configuration
    // -------------------------------------------------------------------------
    /// Name given to the background flush thread
    pub worker_thread_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_path: PathBuf::from("./blocklog.img"),
            block_size: 4096,
            write_cache_blocks: 32,
            read_cache_blocks: 256,
            worker_thread_name: "blocklog-flush".to_string(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check the settings that the engine cannot work around
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 || !self.block_size.is_power_of_two() {
            return Err(LogError::Config(format!(
                "block size must be a non-zero power of two, got {}",
                self.block_size
            )));
        }
        if self.write_cache_blocks == 0 {
            return Err(LogError::Config(
                "write cache must hold at least one block".to_string(),
            ));
        }
        if self.read_cache_blocks == 0 {
            return Err(LogError::Config(
                "read cache must hold at least one block".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the device image path
    pub fn device_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.device_path = path.into();
        self
    }

    /// Set the block size for file-backed devices
    pub fn block_size(mut self, size: u64) -> Self {
        self.config.block_size = size;
        self
    }

    /// Set the write buffer capacity (in blocks)
    pub fn write_cache_blocks(mut self, blocks: usize) -> Self {
        self.config.write_cache_blocks = blocks;
        self
    }

    /// Set the read cache capacity (in blocks)
    pub fn read_cache_blocks(mut self, blocks: usize) -> Self {
        self.config.read_cache_blocks = blocks;
        self
    }

    /// Set the flush thread name
    pub fn worker_thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.worker_thread_name = name.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
