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

use crate::cache::CacheEntry;
use crate::error::{Result, SyncError};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Load a cache entry from a file
pub fn load_entry(path: &Path) -> Result<CacheEntry> {
    let contents = fs::read_to_string(path)
        .map_err(|e| SyncError::Cache(format!("Failed to read cache file: {e}")))?;

    serde_json::from_str(&contents)
        .map_err(|e| SyncError::Cache(format!("Invalid cache file {}: {e}", path.display())))
}

/// Save a cache entry to a file
pub fn save_entry(entry: &CacheEntry, path: &Path) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| SyncError::Cache(format!("Invalid cache path: {}", path.display())))?;
    fs::create_dir_all(parent)
        .map_err(|e| SyncError::Cache(format!("Failed to create cache directory: {e}")))?;

    let json = serde_json::to_vec(entry)?;

    // Write to a uniquely named temporary file first so readers never see a
    // partially written entry
    let mut temp = NamedTempFile::new_in(parent)
        .map_err(|e| SyncError::Cache(format!("Failed to create temp file: {e}")))?;
    temp.write_all(&json)
        .map_err(|e| SyncError::Cache(format!("Failed to write cache file: {e}")))?;

    temp.persist(path)
        .map_err(|e| SyncError::Cache(format!("Failed to rename cache file: {}", e.error)))?;

    Ok(())
}
