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

use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::context::{self, Extracted, OsContext, default_path, is_document_file, override_path};
use crate::document::{Node, NodeMap, load_document};
use crate::error::{Result, SyncError};
use crate::repository::RepositoryRegistry;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryPolicy {
    pub skip_default: bool,
    /// Expand a single file target to every document of its software
    pub all_variants: bool,
    /// Add OS/version files the registry knows about but that do not exist
    pub create_missing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub context: OsContext,
    pub software_dir: Option<PathBuf>,
    /// False for files synthesized by `create_missing`
    pub exists: bool,
    pub warning: Option<String>,
}

impl DiscoveredFile {
    fn from_path(path: PathBuf) -> Self {
        let Extracted {
            context,
            software_dir,
            warning,
        } = context::extract(&path);
        Self {
            path,
            context,
            software_dir,
            exists: true,
            warning,
        }
    }
}

/// Resolve `target` to the documents to refresh, sorted by path.
///
/// An unreadable target is the only error; problems with individual files
/// surface later as per-file results.
pub fn discover(
    target: &Path,
    policy: &DiscoveryPolicy,
    provider_filter: &[String],
    registry: &RepositoryRegistry,
) -> Result<Vec<DiscoveredFile>> {
    let metadata = fs::metadata(target).map_err(|e| SyncError::TargetUnreadable {
        path: target.display().to_string(),
        message: e.to_string(),
    })?;

    let mut paths = BTreeSet::new();
    if metadata.is_dir() {
        collect_documents(target, &mut paths)?;
    } else {
        paths.insert(target.to_path_buf());
        if policy.all_variants
            && let Some(software_dir) = context::extract(target).software_dir
        {
            collect_documents(&software_dir, &mut paths)?;
        }
    }

    let mut files: BTreeMap<PathBuf, DiscoveredFile> = paths
        .into_iter()
        .map(DiscoveredFile::from_path)
        .filter(|file| !(policy.skip_default && file.context.is_default))
        .map(|file| (file.path.clone(), file))
        .collect();

    if policy.create_missing {
        let software_dirs: BTreeSet<PathBuf> = files
            .values()
            .filter_map(|file| file.software_dir.clone())
            .collect();
        for software_dir in software_dirs {
            for missing in missing_variants(&software_dir, provider_filter, registry) {
                files.entry(missing.path.clone()).or_insert(missing);
            }
        }
    }

    debug!("Discovered {} document(s) under {}", files.len(), target.display());
    Ok(files.into_values().collect())
}

fn collect_documents(dir: &Path, paths: &mut BTreeSet<PathBuf>) -> Result<()> {
    let walker = WalkDir::new(dir).follow_links(false).sort_by_file_name();
    for entry in walker {
        let entry = entry.map_err(|e| SyncError::TargetUnreadable {
            path: dir.display().to_string(),
            message: e.to_string(),
        })?;
        if entry.file_type().is_file() && is_document_file(entry.path()) {
            paths.insert(entry.into_path());
        }
    }
    Ok(())
}

/// OS/version combinations served by the providers of the default document
/// that have no override file yet.
fn missing_variants(
    software_dir: &Path,
    provider_filter: &[String],
    registry: &RepositoryRegistry,
) -> Vec<DiscoveredFile> {
    let default_file = default_path(software_dir);
    let document = match load_document(&default_file) {
        Ok(document) => document,
        Err(e) => {
            warn!(
                "Cannot create missing variants for {}: {e}",
                software_dir.display()
            );
            return Vec::new();
        }
    };

    let providers: Vec<&str> = document
        .get("providers")
        .and_then(|p| p.as_map())
        .map(|map| map.keys().map(String::as_str).collect())
        .unwrap_or_default();

    let mut combinations = BTreeSet::new();
    for provider in providers {
        if !provider_filter.is_empty() && !provider_filter.iter().any(|p| p == provider) {
            continue;
        }
        combinations.extend(registry.os_versions(provider));
    }

    combinations
        .into_iter()
        .map(|(os, version)| (override_path(software_dir, &os, &version), os, version))
        .filter(|(path, _, _)| !path.exists() && !path.with_extension("yml").exists())
        .map(|(path, os, version)| DiscoveredFile {
            path,
            context: OsContext::os_specific(os, version),
            software_dir: Some(software_dir.to_path_buf()),
            exists: false,
            warning: None,
        })
        .collect()
}

/// Skeleton for a new OS override: the providers of the default document
/// with each package reduced to its name and package name.
pub fn skeleton_from_default(default_doc: &Node) -> Node {
    let mut root = NodeMap::new();
    if let Some(version) = default_doc.get("version") {
        root.insert("version".to_string(), version.clone());
    }

    let mut providers = NodeMap::new();
    if let Some(source) = default_doc.get("providers").and_then(Node::as_map) {
        for (provider, section) in source {
            let packages: Vec<Node> = section
                .get("packages")
                .and_then(Node::as_list)
                .unwrap_or_default()
                .iter()
                .filter_map(|item| {
                    let name = item.get("name")?.clone();
                    let mut entry = NodeMap::new();
                    entry.insert("name".to_string(), name.clone());
                    entry.insert(
                        "package_name".to_string(),
                        item.get("package_name").cloned().unwrap_or(name),
                    );
                    Some(Node::Map(entry))
                })
                .collect();
            if packages.is_empty() {
                continue;
            }
            let mut provider_section = NodeMap::new();
            provider_section.insert("packages".to_string(), Node::List(packages));
            providers.insert(provider.clone(), Node::Map(provider_section));
        }
    }
    root.insert("providers".to_string(), Node::Map(providers));
    Node::Map(root)
}
