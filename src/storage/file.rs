//! Disk-backed key-value store
//!
//! Persists each key as a pretty-printed JSON file under a base directory.
//! Good enough for a single host process; concurrent writers need a real
//! database instead.

use async_trait::async_trait;
use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use crate::core::error::EngineResult;

use super::kv::KeyValueStore;

/// File-per-key JSON store
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    base_dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// File path backing a key
    pub fn path_for(&self, key: &str) -> PathBuf {
        // Keys are engine-internal identifiers; separators are flattened so
        // a key can never escape the base directory
        let safe: String = key
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' => '_',
                other => other,
            })
            .collect();
        self.base_dir.join(format!("{safe}.json"))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn ensure_base_dir(&self) -> EngineResult<()> {
        if !self.base_dir.exists() {
            fs::create_dir_all(&self.base_dir)?;
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> EngineResult<Option<Value>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(&path)?;
        let reader = BufReader::new(file);
        let value: Value = serde_json::from_reader(reader)?;
        Ok(Some(value))
    }

    async fn update(&self, key: &str, value: Value) -> EngineResult<()> {
        self.ensure_base_dir()?;
        let path = self.path_for(key);

        let file = File::create(&path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &value)?;
        Ok(())
    }
}
