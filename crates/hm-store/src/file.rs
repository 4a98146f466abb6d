//! JSON-backed hierarchical distribution store.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use hm_core::Histogram;

use crate::error::{Result, StoreError};
use crate::record::HistRecord;

/// A hierarchical, named container of binned distributions.
///
/// Keys are slash-separated paths. Raw input distributions live under
/// `/<input>/<plot>` (or `/<input>/<folder>/<plot>`), simple systematic
/// variants under `/<input>__<systematic>__<plus|minus>/<plot>`. Exported
/// templates are written as flat names without slashes.
pub struct HistStore {
    path: PathBuf,
    entries: BTreeMap<String, HistRecord>,
    writable: bool,
}

impl HistStore {
    /// Open an existing store for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let text = fs::read_to_string(&path)?;
        let entries: BTreeMap<String, HistRecord> = serde_json::from_str(&text)?;
        Ok(Self { path, entries, writable: false })
    }

    /// Open a store for update, creating it on first save if absent.
    pub fn open_update(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let text = fs::read_to_string(&path)?;
            serde_json::from_str(&text)?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, entries, writable: true })
    }

    /// Whether a path exists in the store.
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Read the distribution stored at `path`.
    ///
    /// The returned histogram is named after the final path segment.
    pub fn get(&self, path: &str) -> Result<Histogram> {
        let record = self
            .entries
            .get(path)
            .ok_or_else(|| StoreError::PathNotFound(path.to_string()))?;

        let name = path.rsplit('/').next().unwrap_or(path);
        record
            .to_histogram(name)
            .map_err(|source| StoreError::Record { path: path.to_string(), source })
    }

    /// Enumerate the top-level source names that hold `plot`.
    ///
    /// For `plot = "/mttbar"` a key `/ttbar/mttbar` contributes `ttbar`.
    /// Enumeration order is lexicographic, so the result does not depend
    /// on the order entries were written in.
    pub fn sources_for(&self, plot: &str) -> Vec<String> {
        self.entries
            .keys()
            .filter_map(|key| {
                let rest = key.strip_prefix('/')?;
                let (source, sub) = rest.split_once('/')?;
                if format!("/{}", sub) == plot { Some(source.to_string()) } else { None }
            })
            .collect()
    }

    /// Insert or replace the distribution at `path`.
    pub fn put(&mut self, path: impl Into<String>, hist: &Histogram) {
        self.entries.insert(path.into(), HistRecord::from_histogram(hist));
    }

    /// Persist the store to disk. Fails on read-only stores.
    pub fn save(&self) -> Result<()> {
        if !self.writable {
            return Err(StoreError::ReadOnly(self.path.display().to_string()));
        }
        fs::write(&self.path, serde_json::to_string_pretty(&self.entries)?)?;
        Ok(())
    }

    /// Number of stored distributions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no distributions.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(content: Vec<f64>) -> Histogram {
        let n = content.len();
        Histogram::new("sample", (0..=n).map(|i| i as f64).collect(), content, vec![0.0; n])
            .expect("sample histogram")
    }

    #[test]
    fn round_trip_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("store.json");

        let mut store = HistStore::open_update(&file).expect("open_update");
        let mut h = sample(vec![1.0, 2.0, 3.0]);
        h.error = vec![1.0, 2.0, 3.0];
        h.title = "M_{t#bart}".to_string();
        store.put("/ttbar/mttbar", &h);
        store.save().expect("save");

        let read = HistStore::open(&file).expect("open");
        let back = read.get("/ttbar/mttbar").expect("get");

        assert_eq!(back.content, h.content);
        assert_eq!(back.error, h.error);
        assert_eq!(back.title, h.title);
        assert_eq!(back.name, "mttbar");
    }

    #[test]
    fn missing_path_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("store.json");
        let store = HistStore::open_update(&file).expect("open_update");

        assert!(matches!(store.get("/nope/plot"), Err(StoreError::PathNotFound(_))));
    }

    #[test]
    fn read_only_store_rejects_save() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("store.json");

        let mut w = HistStore::open_update(&file).expect("open_update");
        w.put("/a/b", &sample(vec![1.0]));
        w.save().expect("save");

        let r = HistStore::open(&file).expect("open");
        assert!(matches!(r.save(), Err(StoreError::ReadOnly(_))));
    }

    #[test]
    fn sources_enumeration_handles_folders() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = HistStore::open_update(dir.path().join("s.json")).expect("open_update");

        store.put("/ttbar/mttbar", &sample(vec![1.0]));
        store.put("/zjets/mttbar", &sample(vec![1.0]));
        store.put("/ttbar/ltop/pt", &sample(vec![1.0]));
        store.put("/ttbar/other", &sample(vec![1.0]));

        assert_eq!(store.sources_for("/mttbar"), vec!["ttbar", "zjets"]);
        assert_eq!(store.sources_for("/ltop/pt"), vec!["ttbar"]);
        assert!(store.sources_for("/absent").is_empty());
    }
}
