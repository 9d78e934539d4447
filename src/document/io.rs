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

use super::Node;
use crate::error::{Result, SyncError};
use serde_yaml::Value;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Parse YAML text into a document tree. `origin` is only used in errors.
pub fn parse_document(text: &str, origin: &str) -> Result<Node> {
    let value: Value = serde_yaml::from_str(text).map_err(|e| SyncError::InvalidDocument {
        path: origin.to_string(),
        message: e.to_string(),
    })?;
    Ok(Node::from(value))
}

pub fn load_document(path: &Path) -> Result<Node> {
    let text = fs::read_to_string(path).map_err(|e| SyncError::filesystem(path, e))?;
    parse_document(&text, &path.display().to_string())
}

pub fn to_yaml_string(node: &Node) -> Result<String> {
    Ok(serde_yaml::to_string(&Value::from(node))?)
}

/// Replace `path` with `contents` via a temporary file in the same
/// directory, keeping the permissions of any existing file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| SyncError::filesystem(parent, e))?;

    let mut temp = NamedTempFile::new_in(parent).map_err(|e| SyncError::filesystem(parent, e))?;
    temp.write_all(contents)
        .map_err(|e| SyncError::filesystem(temp.path(), e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| SyncError::filesystem(temp.path(), e))?;

    if let Ok(metadata) = fs::metadata(path) {
        fs::set_permissions(temp.path(), metadata.permissions())
            .map_err(|e| SyncError::filesystem(path, e))?;
    }

    temp.persist(path)
        .map_err(|e| SyncError::filesystem(path, e.error))?;
    Ok(())
}
