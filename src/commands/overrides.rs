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


//! Compare OS override documents against their `default.yaml`.

use colored::*;
use log::{debug, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::SyncConfig;
use crate::document::{DocumentDiff, Node, diff, load_document, merge, prune_identical};
use crate::error::{Result, SyncError};
use crate::refresh::{
    BackupSettings, RunStatus, default_path, extract, is_document_file, write_validated,
};
use crate::validation::StructuralValidator;

/// Root keys every override keeps even when they equal the default.
const PRESERVED_ROOT_KEYS: &[&str] = &["version"];

#[derive(Debug, Clone, Serialize)]
pub struct OverrideReport {
    pub path: PathBuf,
    pub default_path: PathBuf,
    #[serde(flatten)]
    pub diff: DocumentDiff,
    /// Some keys could be dropped without changing the merged document
    pub removable: bool,
    pub pruned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OverrideReport {
    fn is_clean(&self) -> bool {
        self.error.is_none() && (!self.removable || self.pruned)
    }
}

pub struct ValidateOverridesCommand<'a> {
    config: &'a SyncConfig,
}

impl<'a> ValidateOverridesCommand<'a> {
    pub fn new(config: &'a SyncConfig) -> Result<Self> {
        Ok(Self { config })
    }

    pub fn execute(&self, dir: &Path, remove_duplicates: bool, json: bool) -> Result<RunStatus> {
        let overrides = find_overrides(dir)?;
        let settings = BackupSettings {
            enabled: self.config.refresh.backup,
            directory: self.config.refresh.backup_dir.clone(),
            keep: self.config.refresh.keep_backups,
        };

        let reports: Vec<OverrideReport> = overrides
            .iter()
            .map(|(path, default)| check_override(path, default, remove_duplicates, &settings))
            .collect();

        if json {
            println!("{}", serde_json::to_string_pretty(&reports)?);
        } else {
            print_reports(&reports, remove_duplicates);
        }

        if reports.iter().all(OverrideReport::is_clean) {
            Ok(RunStatus::Success)
        } else {
            Ok(RunStatus::PartialSuccess)
        }
    }
}

/// Every OS override below `dir` paired with its sibling default document,
/// in path order.
fn find_overrides(dir: &Path) -> Result<Vec<(PathBuf, PathBuf)>> {
    std::fs::metadata(dir).map_err(|e| SyncError::TargetUnreadable {
        path: dir.display().to_string(),
        message: e.to_string(),
    })?;

    let mut found = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() || !is_document_file(path) {
            continue;
        }
        let extracted = extract(path);
        let Some(software_dir) = extracted.software_dir else {
            continue;
        };
        if !extracted.context.is_os_specific() {
            continue;
        }
        let default = default_path(&software_dir);
        if default.exists() {
            found.push((path.to_path_buf(), default));
        } else {
            warn!("{} has no {}", path.display(), default.display());
        }
    }
    Ok(found)
}

fn check_override(
    path: &Path,
    default_path: &Path,
    remove_duplicates: bool,
    settings: &BackupSettings,
) -> OverrideReport {
    let mut report = OverrideReport {
        path: path.to_path_buf(),
        default_path: default_path.to_path_buf(),
        diff: DocumentDiff::default(),
        removable: false,
        pruned: false,
        backup_path: None,
        error: None,
    };

    let (default, overlay) = match (load_document(default_path), load_document(path)) {
        (Ok(default), Ok(overlay)) => (default, overlay),
        (Err(e), _) | (_, Err(e)) => {
            report.error = Some(e.to_string());
            return report;
        }
    };

    report.diff = diff(&default, &overlay);
    report
        .diff
        .identical_paths
        .retain(|p| !PRESERVED_ROOT_KEYS.contains(&p.as_str()));

    let pruned = prune_identical(&default, &overlay, PRESERVED_ROOT_KEYS);
    report.removable = pruned != overlay;
    debug!(
        "{}: {} identical, {} differing, {} override-only",
        path.display(),
        report.diff.identical_paths.len(),
        report.diff.differing_paths.len(),
        report.diff.b_only_paths.len()
    );

    if remove_duplicates && report.removable {
        match write_pruned(path, &default, &pruned, settings) {
            Ok(backup) => {
                report.pruned = true;
                report.backup_path = backup;
            }
            Err(e) => report.error = Some(e.to_string()),
        }
    }
    report
}

fn write_pruned(
    path: &Path,
    default: &Node,
    pruned: &Node,
    settings: &BackupSettings,
) -> Result<Option<PathBuf>> {
    write_validated(path, pruned, settings, &StructuralValidator, |written| {
        merge(default, &written)
    })
}

fn print_paths(label: ColoredString, paths: &[String]) {
    if paths.is_empty() {
        return;
    }
    println!("  {label}");
    for path in paths {
        println!("    {path}");
    }
}

fn print_reports(reports: &[OverrideReport], remove_duplicates: bool) {
    if reports.is_empty() {
        println!("No OS override documents found");
        return;
    }

    for report in reports {
        let mark = if report.is_clean() { "✓".green() } else { "✗".red() };
        println!("{mark} {}", report.path.display());
        if let Some(error) = &report.error {
            println!("  {} {error}", "error:".red());
            continue;
        }
        print_paths("identical to default:".yellow(), &report.diff.identical_paths);
        print_paths("differs from default:".normal(), &report.diff.differing_paths);
        print_paths("override only:".normal(), &report.diff.b_only_paths);
        if report.pruned {
            println!("  {} removed duplicated keys", "✓".green());
        }
        if let Some(backup) = &report.backup_path {
            println!("  backup: {}", backup.display());
        }
    }

    let removable = reports.iter().filter(|r| r.removable && !r.pruned).count();
    println!("\nChecked {} override documents", reports.len());
    if removable > 0 && !remove_duplicates {
        println!(
            "{}: {removable} documents repeat their default; run with {} to prune them",
            "Hint".yellow().bold(),
            "--remove-duplicates".cyan()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const DEFAULT: &str = r#"version: "0.3"
metadata:
  name: nginx
  description: HTTP server
providers:
  apt:
    packages:
      - name: nginx
        version: "1.24"
"#;

    const OVERRIDE: &str = r#"version: "0.3"
metadata:
  description: HTTP server
providers:
  apt:
    packages:
      - name: nginx
        version: "1.18"
  snap: null
"#;

    fn layout() -> TempDir {
        let temp = TempDir::new().unwrap();
        let software = temp.path().join("nginx");
        fs::create_dir_all(software.join("ubuntu")).unwrap();
        fs::write(software.join("default.yaml"), DEFAULT).unwrap();
        fs::write(software.join("ubuntu/22.04.yaml"), OVERRIDE).unwrap();
        temp
    }

    fn settings() -> BackupSettings {
        BackupSettings::default()
    }

    #[test]
    fn test_find_overrides_pairs_with_default() {
        let temp = layout();
        let found = find_overrides(temp.path()).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].0.ends_with("nginx/ubuntu/22.04.yaml"));
        assert!(found[0].1.ends_with("nginx/default.yaml"));
    }

    #[test]
    fn test_report_classifies_paths() {
        let temp = layout();
        let (path, default) = find_overrides(temp.path()).unwrap().remove(0);
        let report = check_override(&path, &default, false, &settings());

        assert!(report.removable);
        assert!(!report.pruned);
        assert!(report
            .diff
            .identical_paths
            .contains(&"metadata.description".to_string()));
        assert!(!report.diff.identical_paths.contains(&"version".to_string()));
        assert!(report
            .diff
            .differing_paths
            .contains(&"providers.apt.packages[0].version".to_string()));
        assert_eq!(report.diff.b_only_paths, vec!["providers.snap"]);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_remove_duplicates_keeps_effective_document() {
        let temp = layout();
        let (path, default_path) = find_overrides(temp.path()).unwrap().remove(0);
        let default = load_document(&default_path).unwrap();
        let before = merge(&default, &load_document(&path).unwrap());

        let report = check_override(&path, &default_path, true, &settings());
        assert!(report.pruned, "{:?}", report.error);
        assert!(report.is_clean());

        let pruned = load_document(&path).unwrap();
        assert!(pruned.get("metadata").is_none());
        assert!(pruned.get("version").is_some());
        assert_eq!(merge(&default, &pruned), before);
    }

    #[test]
    fn test_missing_dir_is_unreadable() {
        let temp = TempDir::new().unwrap();
        let result = find_overrides(&temp.path().join("missing"));
        assert!(matches!(result, Err(SyncError::TargetUnreadable { .. })));
    }
}
