//! Test harness for config files on disk.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use jobdeck::config::schema::Config;

/// Isolated temporary directory for config files.
pub struct TestHarness {
    temp_dir: TempDir,
}

impl TestHarness {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `content` to `name` inside the harness and returns its path.
    pub fn write_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, content).expect("Failed to write test file");
        path
    }

    /// Serializes `config` as JSON and writes it to `config.json`.
    pub fn write_config(&self, config: &Config) -> PathBuf {
        let json = serde_json::to_string_pretty(config).expect("Failed to serialize config");
        self.write_file("config.json", &json)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
