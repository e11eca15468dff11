use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::{RepoEntry, StoreError};

/// One cached scan: when it ran and what it found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanCacheEntry {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub scanned_at: DateTime<Utc>,
    pub repos: Vec<RepoEntry>,
}

impl ScanCacheEntry {
    pub fn now(repos: Vec<RepoEntry>) -> Self {
        Self {
            scanned_at: Utc::now(),
            repos,
        }
    }
}

/// Read/write side of the per-root scan cache.
pub trait ScanCache: Send + Sync {
    fn get(&self, root: &Path) -> Option<ScanCacheEntry>;
    fn put(&self, root: &Path, entry: ScanCacheEntry);
}

/// Everything the dashboard persists between launches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreData {
    pub last_scanned_folder: Option<PathBuf>,
    /// Keyed by absolute root path.
    pub scan_cache: HashMap<String, ScanCacheEntry>,
    /// AI summaries keyed by absolute repository path.
    pub ai_responses: HashMap<String, String>,
}

fn cache_key(root: &Path) -> String {
    root.to_string_lossy().into_owned()
}

/// Per-section decode: a corrupt document degrades to defaults, a corrupt
/// section degrades alone, and a corrupt cache entry is dropped on its own
/// without taking the rest of the cache with it.
fn decode_store(raw: &str) -> StoreData {
    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "store file is not valid JSON, starting fresh");
            return StoreData::default();
        }
    };
    let Some(object) = value.as_object() else {
        warn!("store root is not an object, starting fresh");
        return StoreData::default();
    };

    let mut data = StoreData::default();
    if let Some(raw_root) = object.get("lastScannedFolder") {
        data.last_scanned_folder = serde_json::from_value(raw_root.clone()).unwrap_or_default();
    }
    if let Some(entries) = object.get("scanCache").and_then(|v| v.as_object()) {
        for (root, raw_entry) in entries {
            match serde_json::from_value::<ScanCacheEntry>(raw_entry.clone()) {
                Ok(entry) => {
                    data.scan_cache.insert(root.clone(), entry);
                }
                Err(err) => {
                    warn!(root = %root, error = %err, "dropping corrupt scan cache entry");
                }
            }
        }
    }
    if let Some(responses) = object.get("aiResponses") {
        data.ai_responses = serde_json::from_value(responses.clone()).unwrap_or_default();
    }
    data
}

/// JSON-file-backed store with an explicit load/save boundary.
///
/// Loading never fails; see [`decode_store`] for how corruption degrades.
/// Saving goes through a sibling temp file and a rename, so a crash
/// mid-write leaves the previous document intact.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    data: RwLock<StoreData>,
}

impl JsonStore {
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = match fs::read_to_string(&path) {
            Ok(raw) => decode_store(&raw),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => StoreData::default(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "store unreadable, starting fresh");
                StoreData::default()
            }
        };
        debug!(
            path = %path.display(),
            cached_roots = data.scan_cache.len(),
            "store loaded"
        );
        Self {
            path,
            data: RwLock::new(data),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self) -> Result<(), StoreError> {
        let encoded = serde_json::to_string_pretty(&*self.data.read())?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Write {
                path: self.path.clone(),
                source,
            })?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, encoded).map_err(|source| StoreError::Write {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })?;
        Ok(())
    }

    pub fn last_scanned_folder(&self) -> Option<PathBuf> {
        self.data.read().last_scanned_folder.clone()
    }

    /// Cached roots with entry metadata, sorted by root path.
    pub fn cache_entries(&self) -> Vec<(String, ScanCacheEntry)> {
        let data = self.data.read();
        let mut entries: Vec<_> = data
            .scan_cache
            .iter()
            .map(|(root, entry)| (root.clone(), entry.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn summary(&self, repo: &Path) -> Option<String> {
        self.data.read().ai_responses.get(&cache_key(repo)).cloned()
    }

    pub fn set_summary(&self, repo: &Path, text: &str) -> Result<(), StoreError> {
        self.data
            .write()
            .ai_responses
            .insert(cache_key(repo), text.to_string());
        self.save()
    }
}

impl ScanCache for JsonStore {
    fn get(&self, root: &Path) -> Option<ScanCacheEntry> {
        self.data.read().scan_cache.get(&cache_key(root)).cloned()
    }

    fn put(&self, root: &Path, entry: ScanCacheEntry) {
        {
            let mut data = self.data.write();
            data.scan_cache.insert(cache_key(root), entry);
            data.last_scanned_folder = Some(root.to_path_buf());
        }
        // A scan that worked should never fail because its cache write
        // didn't; the result still goes back to the caller.
        if let Err(err) = self.save() {
            warn!(error = %err, "failed to persist scan cache");
        }
    }
}

/// In-memory cache for tests and embedders that handle persistence
/// themselves.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, ScanCacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScanCache for MemoryCache {
    fn get(&self, root: &Path) -> Option<ScanCacheEntry> {
        self.entries.read().get(&cache_key(root)).cloned()
    }

    fn put(&self, root: &Path, entry: ScanCacheEntry) {
        self.entries.write().insert(cache_key(root), entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RepoStatus;
    use tempfile::TempDir;

    fn sample_repo(name: &str) -> RepoEntry {
        RepoEntry {
            name: name.to_string(),
            path: PathBuf::from(format!("/work/{name}")),
            status: RepoStatus::Clean,
            branch: "main".to_string(),
            last_commit: "init".to_string(),
            summary: "Repository found on disk.".to_string(),
        }
    }

    #[test]
    fn test_round_trips_through_disk() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.json");

        let store = JsonStore::load(&path);
        store.put(
            Path::new("/work"),
            ScanCacheEntry::now(vec![sample_repo("api")]),
        );

        let reloaded = JsonStore::load(&path);
        let entry = reloaded.get(Path::new("/work")).unwrap();
        assert_eq!(entry.repos.len(), 1);
        assert_eq!(entry.repos[0].name, "api");
        assert_eq!(reloaded.last_scanned_folder(), Some(PathBuf::from("/work")));
    }

    #[test]
    fn test_missing_file_starts_empty() {
        let tmp = TempDir::new().unwrap();
        let store = JsonStore::load(tmp.path().join("absent.json"));
        assert!(store.get(Path::new("/nope")).is_none());
        assert!(store.cache_entries().is_empty());
    }

    #[test]
    fn test_invalid_json_starts_fresh() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.json");
        fs::write(&path, "{not json at all").unwrap();

        let store = JsonStore::load(&path);
        assert!(store.cache_entries().is_empty());
    }

    #[test]
    fn test_corrupt_cache_entry_is_dropped_alone() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.json");
        let raw = serde_json::json!({
            "lastScannedFolder": "/work",
            "scanCache": {
                "/work": {
                    "scannedAt": 1_700_000_000_000i64,
                    "repos": [sample_repo("api")],
                },
                "/broken": { "scannedAt": "not-a-number", "repos": 42 },
            },
            "aiResponses": { "/work/api": "A small HTTP service." },
        });
        fs::write(&path, serde_json::to_string(&raw).unwrap()).unwrap();

        let store = JsonStore::load(&path);
        assert!(store.get(Path::new("/work")).is_some());
        assert!(store.get(Path::new("/broken")).is_none());
        assert_eq!(
            store.summary(Path::new("/work/api")).as_deref(),
            Some("A small HTTP service.")
        );
    }

    #[test]
    fn test_corrupt_section_degrades_alone() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.json");
        fs::write(
            &path,
            r#"{"lastScannedFolder": "/work", "scanCache": "oops", "aiResponses": []}"#,
        )
        .unwrap();

        let store = JsonStore::load(&path);
        assert_eq!(store.last_scanned_folder(), Some(PathBuf::from("/work")));
        assert!(store.cache_entries().is_empty());
        assert!(store.summary(Path::new("/any")).is_none());
    }

    #[test]
    fn test_scanned_at_is_epoch_milliseconds_on_the_wire() {
        let entry = ScanCacheEntry::now(Vec::new());
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json["scannedAt"].is_i64() || json["scannedAt"].is_u64());
    }

    #[test]
    fn test_put_overwrites_the_previous_entry() {
        let cache = MemoryCache::new();
        cache.put(
            Path::new("/work"),
            ScanCacheEntry::now(vec![sample_repo("api"), sample_repo("web")]),
        );
        cache.put(Path::new("/work"), ScanCacheEntry::now(vec![sample_repo("api")]));

        assert_eq!(cache.get(Path::new("/work")).unwrap().repos.len(), 1);
    }

    #[test]
    fn test_save_creates_missing_parent_directories() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("deep/nested/store.json");

        let store = JsonStore::load(&path);
        store
            .set_summary(Path::new("/work/api"), "Does API things.")
            .unwrap();

        assert!(path.is_file());
    }
}
