use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::Context;

use crate::foundation::error::{BltError, BltResult};
use crate::raster::KernelKind;

/// Engine limits and execution settings.
///
/// Every field has a default, so an empty JSON object is a valid configuration. Unknown keys
/// are rejected.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Largest mappable length in bytes.
    pub max_buffer_len: u64,
    /// Required alignment of mapped offsets and lengths. Must be a power of two.
    pub buffer_alignment: u64,
    /// Maximum number of live mappings.
    pub max_mappings: usize,
    /// Maximum number of simultaneously open batches.
    pub max_open_batches: usize,
    /// Optional explicit async worker thread count.
    pub worker_threads: Option<usize>,
    /// Raster kernel backing the engine.
    pub kernel: KernelKind,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_buffer_len: 256 * 1024 * 1024,
            buffer_alignment: 1,
            max_mappings: 4096,
            max_open_batches: 64,
            worker_threads: None,
            kernel: KernelKind::Cpu,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON text and validate it.
    pub fn from_json_str(s: &str) -> BltResult<Self> {
        let cfg: Self = serde_json::from_str(s).context("parse engine config JSON")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a configuration from a JSON file on disk and validate it.
    pub fn from_path(path: impl AsRef<Path>) -> BltResult<Self> {
        let path = path.as_ref();
        let f = File::open(path)
            .with_context(|| format!("open engine config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("parse engine config '{}'", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> BltResult<()> {
        if self.max_buffer_len == 0 {
            return Err(invalid("'max_buffer_len' must be >= 1"));
        }
        if !self.buffer_alignment.is_power_of_two() {
            return Err(invalid("'buffer_alignment' must be a power of two"));
        }
        if self.max_mappings == 0 {
            return Err(invalid("'max_mappings' must be >= 1"));
        }
        if self.max_open_batches == 0 {
            return Err(invalid("'max_open_batches' must be >= 1"));
        }
        if let Some(n) = self.worker_threads
            && n == 0
        {
            return Err(invalid("'worker_threads' must be >= 1 when set"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> BltError {
    BltError::Other(anyhow::anyhow!("invalid engine config: {msg}"))
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/config.rs"]
mod tests;
