//! Canonical-JSON document persistence.
//!
//! Each component owns a single JSON document that is rewritten on every
//! mutation. Writes are atomic: the document is written to a temp file in
//! the same directory, fsynced, then renamed over the target, so a caller
//! disconnecting mid-request can never leave a partially written file.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::canonical::to_canonical_json;
use crate::error::Result;

/// A single persisted JSON document.
#[derive(Debug, Clone)]
pub struct JsonDocument {
    path: PathBuf,
}

impl JsonDocument {
    pub fn new(path: impl AsRef<Path>) -> Self {
        JsonDocument {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document, or `None` if it has never been written.
    pub fn load<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Atomically replace the document with the canonical form of `value`.
    pub fn save<T: Serialize>(&self, value: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let canonical = to_canonical_json(value)?;
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(canonical.as_bytes())?;
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct State {
        entries: Vec<String>,
        counter: u64,
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = tempdir().unwrap();
        let doc = JsonDocument::new(dir.path().join("state.json"));
        assert!(doc.load::<State>().unwrap().is_none());
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let dir = tempdir().unwrap();
        let doc = JsonDocument::new(dir.path().join("state.json"));
        let state = State {
            entries: vec!["a".into(), "b".into()],
            counter: 2,
        };
        doc.save(&state).unwrap();
        assert_eq!(doc.load::<State>().unwrap().unwrap(), state);
    }

    #[test]
    fn test_save_is_canonical() {
        let dir = tempdir().unwrap();
        let doc = JsonDocument::new(dir.path().join("state.json"));
        doc.save(&serde_json::json!({"b": 1, "a": 2})).unwrap();
        let raw = std::fs::read_to_string(doc.path()).unwrap();
        assert_eq!(raw, r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn test_no_temp_file_left_behind() {
        let dir = tempdir().unwrap();
        let doc = JsonDocument::new(dir.path().join("state.json"));
        doc.save(&serde_json::json!({"k": 1})).unwrap();
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["state.json".to_string()]);
    }

    #[test]
    fn test_creates_parent_directory() {
        let dir = tempdir().unwrap();
        let doc = JsonDocument::new(dir.path().join("nested/deeper/state.json"));
        doc.save(&serde_json::json!({"k": 1})).unwrap();
        assert!(doc.path().exists());
    }
}
