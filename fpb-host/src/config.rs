//! Host configuration, persisted as JSON next to the compile database.
//!
//! Mirrors the device-side philosophy of small, explicit, fixed-shape state:
//! nothing here is discovered at runtime that the user didn't ask for.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::HostError;

/// Serial and pipeline settings for a `fpb` invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Serial device path, e.g. `/dev/ttyACM0` or `COM3`.
    pub port: String,
    /// Baud rate. The device firmware is expected to match this.
    pub baud: u32,
    /// Per-read/write timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum bytes of payload per `upload`/`fwrite` chunk, before hex
    /// encoding doubles it on the wire.
    pub chunk_size: usize,
    /// Retries per chunk before giving up with `HostError::RetryExhausted`.
    pub max_retries: u32,
    /// Cross-compiler driver invoked by the inject pipeline, e.g.
    /// `arm-none-eabi-gcc`.
    pub compiler: String,
    /// Path to a `compile_commands.json`, if available.
    pub compile_db: Option<std::path::PathBuf>,
}

impl Default for HostConfig {
    fn default() -> Self {
        HostConfig {
            port: String::new(),
            baud: 115_200,
            timeout_ms: 2_000,
            chunk_size: 256,
            max_retries: 3,
            compiler: "arm-none-eabi-gcc".to_string(),
            compile_db: None,
        }
    }
}

impl HostConfig {
    /// Loads a config file, falling back to [`HostConfig::default`] if it
    /// doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self, HostError> {
        if !path.exists() {
            return Ok(HostConfig::default());
        }
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| HostError::CompileFailed(format!("invalid config at {}: {e}", path.display())))
    }

    /// Writes this config to `path` as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), HostError> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| HostError::CompileFailed(format!("failed to serialize config: {e}")))?;
        fs::write(path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = HostConfig::load_or_default(Path::new("/nonexistent/fpb-host-config.json")).unwrap();
        assert_eq!(cfg.baud, 115_200);
        assert_eq!(cfg.chunk_size, 256);
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut cfg = HostConfig::default();
        cfg.port = "/dev/ttyACM0".to_string();
        cfg.baud = 921_600;
        cfg.save(&path).unwrap();

        let loaded = HostConfig::load_or_default(&path).unwrap();
        assert_eq!(loaded.port, "/dev/ttyACM0");
        assert_eq!(loaded.baud, 921_600);
    }
}
