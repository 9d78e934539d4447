// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! TTL-keyed on-disk cache shared by bulk index downloads and per-package
//! API lookups.
//!
//! Each entry lives in its own JSON file named after a hash of its key, so
//! concurrent readers only ever observe complete files (writes go through a
//! temporary file and a rename) and a per-key lock keeps writers for the same
//! key from racing each other.

mod storage;


use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{Result, SyncError};

pub use storage::{load_entry, save_entry};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CacheKind {
    BulkIndex,
    ApiItem,
}

impl CacheKind {
    pub const ALL: [CacheKind; 2] = [CacheKind::BulkIndex, CacheKind::ApiItem];

    fn dir_name(self) -> &'static str {
        match self {
            CacheKind::BulkIndex => "index",
            CacheKind::ApiItem => "api",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub kind: CacheKind,
    pub fetched_at: DateTime<Utc>,
    pub ttl_secs: u64,
    pub payload: serde_json::Value,
}

impl CacheEntry {
    pub fn new(kind: CacheKind, key: &str, payload: serde_json::Value, ttl: Duration) -> Self {
        Self {
            key: key.to_string(),
            kind,
            fetched_at: Utc::now(),
            ttl_secs: ttl.as_secs(),
            payload,
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// An entry is fresh while strictly less than its TTL has elapsed.
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        let elapsed = now.signed_duration_since(self.fetched_at);
        match elapsed.to_std() {
            Ok(elapsed) => elapsed < self.ttl(),
            // Clock went backwards; refetch rather than trust the entry
            Err(_) => false,
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub index_entries: usize,
    pub api_entries: usize,
    pub stale_entries: usize,
    pub total_bytes: u64,
}

pub struct CacheStore {
    root: PathBuf,
    key_locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, kind: CacheKind, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.root
            .join(kind.dir_name())
            .join(format!("{}.json", hex::encode(digest)))
    }

    /// Run `f` while holding the writer lock for `key`.
    pub fn with_key_lock<T>(&self, kind: CacheKind, key: &str, f: impl FnOnce() -> T) -> T {
        let path = self.entry_path(kind, key);
        let lock = {
            let mut locks = self
                .key_locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            locks.entry(path).or_default().clone()
        };
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f()
    }

    /// Read an entry regardless of age. Corrupt entries are treated as absent.
    pub fn get(&self, kind: CacheKind, key: &str) -> Result<Option<CacheEntry>> {
        let path = self.entry_path(kind, key);
        if !path.exists() {
            return Ok(None);
        }
        match load_entry(&path) {
            Ok(entry) if entry.key == key => Ok(Some(entry)),
            Ok(entry) => {
                warn!(
                    "Cache entry {} holds key '{}' instead of '{key}', ignoring",
                    path.display(),
                    entry.key
                );
                Ok(None)
            }
            Err(e) => {
                warn!("Ignoring unreadable cache entry {}: {e}", path.display());
                Ok(None)
            }
        }
    }

    pub fn get_fresh(&self, kind: CacheKind, key: &str) -> Result<Option<CacheEntry>> {
        self.get_fresh_at(kind, key, Utc::now())
    }

    pub fn get_fresh_at(
        &self,
        kind: CacheKind,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CacheEntry>> {
        match self.get(kind, key)? {
            Some(entry) if entry.is_fresh_at(now) => {
                debug!("Cache hit for {key}");
                Ok(Some(entry))
            }
            Some(_) => {
                debug!("Cache entry for {key} is stale");
                Ok(None)
            }
            None => {
                debug!("Cache miss for {key}");
                Ok(None)
            }
        }
    }

    pub fn put(
        &self,
        kind: CacheKind,
        key: &str,
        payload: serde_json::Value,
        ttl: Duration,
    ) -> Result<CacheEntry> {
        let entry = CacheEntry::new(kind, key, payload, ttl);
        self.put_entry(&entry)?;
        Ok(entry)
    }

    pub fn put_entry(&self, entry: &CacheEntry) -> Result<()> {
        let path = self.entry_path(entry.kind, &entry.key);
        self.with_key_lock(entry.kind, &entry.key, || save_entry(entry, &path))
    }

    pub fn remove(&self, kind: CacheKind, key: &str) -> Result<bool> {
        let path = self.entry_path(kind, key);
        self.with_key_lock(kind, key, || {
            if path.exists() {
                fs::remove_file(&path).map_err(|e| SyncError::filesystem(&path, e))?;
                Ok(true)
            } else {
                Ok(false)
            }
        })
    }

    /// Remove every entry, or every entry of one kind. Returns the count removed.
    pub fn clear(&self, kind: Option<CacheKind>) -> Result<usize> {
        let kinds: Vec<CacheKind> = match kind {
            Some(kind) => vec![kind],
            None => CacheKind::ALL.to_vec(),
        };

        let mut removed = 0;
        for kind in kinds {
            for path in self.entry_files(kind)? {
                fs::remove_file(&path).map_err(|e| SyncError::filesystem(&path, e))?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Remove the bulk index and all API items belonging to one repository.
    pub fn clear_repository(&self, repository: &str) -> Result<usize> {
        let item_prefix = format!("{repository}:");
        let mut removed = 0;

        for kind in CacheKind::ALL {
            for path in self.entry_files(kind)? {
                let belongs = match load_entry(&path) {
                    Ok(entry) => entry.key == repository || entry.key.starts_with(&item_prefix),
                    Err(_) => false,
                };
                if belongs {
                    fs::remove_file(&path).map_err(|e| SyncError::filesystem(&path, e))?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let now = Utc::now();
        let mut stats = CacheStats::default();

        for kind in CacheKind::ALL {
            for path in self.entry_files(kind)? {
                let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                stats.total_bytes += size;
                match kind {
                    CacheKind::BulkIndex => stats.index_entries += 1,
                    CacheKind::ApiItem => stats.api_entries += 1,
                }
                match load_entry(&path) {
                    Ok(entry) if entry.is_fresh_at(now) => {}
                    _ => stats.stale_entries += 1,
                }
            }
        }
        Ok(stats)
    }

    fn entry_files(&self, kind: CacheKind) -> Result<Vec<PathBuf>> {
        let dir = self.root.join(kind.dir_name());
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| SyncError::filesystem(&dir, e))? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}
