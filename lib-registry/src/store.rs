//! ICO Config Document Store
//!
//! One JSON document per ICO, named `<ico_id>.json`, in a configurable
//! directory. The declared `ico_id` must match the file stem; mismatched,
//! duplicate, or unparsable documents are skipped with a warning rather
//! than failing the whole load.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::errors::StoreError;
use crate::schema::IcoRecord;

/// Directory-backed store of ICO configuration documents.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load every valid ICO document. A missing directory is an empty
    /// load, not an error.
    pub fn load_all(&self) -> Vec<IcoRecord> {
        let mut records = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => {
                warn!(dir = %self.dir.display(), "ICO configuration directory not found, no ICOs loaded");
                return records;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match self.load_document(&path) {
                Ok(record) => {
                    let stem = path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .unwrap_or_default();
                    if record.id() != stem {
                        warn!(
                            file = %path.display(),
                            declared = record.id(),
                            "ICO ID does not match config file name, skipping"
                        );
                        continue;
                    }
                    if !seen.insert(record.id().to_string()) {
                        warn!(ico_id = record.id(), "duplicate ICO ID, skipping");
                        continue;
                    }
                    info!(ico_id = record.id(), "loaded ICO config");
                    records.push(record);
                }
                Err(err) => {
                    warn!(file = %path.display(), %err, "invalid ICO config document, skipping");
                }
            }
        }

        info!(count = records.len(), "finished loading ICO configs");
        records
    }

    /// Persist one ICO document, creating the directory if needed.
    pub fn save(&self, record: &IcoRecord) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.document_path(record.id());
        let json = serde_json::to_string_pretty(record)?;
        fs::write(&path, json)?;
        info!(ico_id = record.id(), file = %path.display(), "saved ICO config");
        Ok(())
    }

    /// Path of the document for an ICO id.
    pub fn document_path(&self, ico_id: &str) -> PathBuf {
        self.dir.join(format!("{ico_id}.json"))
    }

    fn load_document(&self, path: &Path) -> Result<IcoRecord, StoreError> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}
