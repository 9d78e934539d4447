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


use std::path::Path;

use crate::document::{Node, load_document, merge, prune_nulls, to_yaml_string};
use crate::error::{Result, SyncError};
use crate::refresh::{default_path, extract};

/// Print the effective document for `file` as YAML.
pub fn execute(file: &Path) -> Result<()> {
    let effective = effective_document(file)?;
    print!("{}", to_yaml_string(&effective)?);
    Ok(())
}

/// An OS override merged over its sibling `default.yaml`; any other
/// document as written, minus null keys.
pub fn effective_document(file: &Path) -> Result<Node> {
    let document = load_document(file)?;
    let extracted = extract(file);

    if !extracted.context.is_os_specific() {
        return Ok(prune_nulls(&document));
    }
    let software_dir = extracted.software_dir.ok_or_else(|| SyncError::InvalidDocument {
        path: file.display().to_string(),
        message: "cannot locate the software directory".to_string(),
    })?;
    let default = default_path(&software_dir);
    if !default.exists() {
        return Err(SyncError::InvalidDocument {
            path: file.display().to_string(),
            message: format!("no default document at {}", default.display()),
        });
    }
    Ok(merge(&load_document(&default)?, &document))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_override_merged_over_default() {
        let temp = TempDir::new().unwrap();
        let software = temp.path().join("nginx");
        fs::create_dir_all(software.join("ubuntu")).unwrap();
        fs::write(
            software.join("default.yaml"),
            "version: \"0.3\"\nmetadata: {name: nginx}\nproviders:\n  apt: {packages: [{name: nginx}]}\n  snap: {packages: [{name: nginx}]}\n",
        )
        .unwrap();
        let file = software.join("ubuntu/22.04.yaml");
        fs::write(&file, "providers:\n  snap: null\n").unwrap();

        let merged = effective_document(&file).unwrap();
        let providers = merged.get("providers").unwrap();
        assert!(providers.get("apt").is_some());
        assert!(providers.get("snap").is_none());
        assert_eq!(merged.get("metadata").unwrap().get("name").unwrap().as_str(), Some("nginx"));
    }

    #[test]
    fn test_missing_default_is_an_error() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("nginx/ubuntu/22.04.yaml");
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, "version: \"0.3\"\n").unwrap();

        let result = effective_document(&file);
        assert!(matches!(result, Err(SyncError::InvalidDocument { .. })));
    }
}
