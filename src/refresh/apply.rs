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

//! Snapshot, write, validate, and restore on failure.

use chrono::Local;
use log::{debug, warn};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::document::{Node, load_document, to_yaml_string, write_atomic};
use crate::error::{Result, SyncError};
use crate::validation::DocumentValidator;

const BACKUP_SUFFIX: &str = "backup";

#[derive(Debug, Clone, Default)]
pub struct BackupSettings {
    /// Write a timestamped copy of the original before replacing it
    pub enabled: bool,
    /// Where backups go; beside the original when unset
    pub directory: Option<PathBuf>,
    /// Keep the backup after a validated write
    pub keep: bool,
}

/// Holds the original bytes of a file while it is being replaced. Unless
/// [`commit`](Self::commit) is called, dropping the guard puts the original
/// back (or removes the file if it did not exist before).
pub struct BackupGuard {
    target: PathBuf,
    original: Option<Vec<u8>>,
    backup_path: Option<PathBuf>,
    committed: bool,
}

impl BackupGuard {
    pub fn acquire(target: &Path, settings: &BackupSettings) -> Result<Self> {
        let original = match fs::read(target) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(SyncError::filesystem(target, e)),
        };

        let backup_path = match (&original, settings.enabled) {
            (Some(bytes), true) => {
                let path = backup_path_for(target, settings.directory.as_deref());
                write_atomic(&path, bytes)?;
                debug!("Backed up {} to {}", target.display(), path.display());
                Some(path)
            }
            _ => None,
        };

        Ok(Self {
            target: target.to_path_buf(),
            original,
            backup_path,
            committed: false,
        })
    }

    /// Accept the new contents. Returns the retained backup, if any.
    pub fn commit(mut self, keep_backup: bool) -> Option<PathBuf> {
        self.committed = true;
        let backup = self.backup_path.take()?;
        if keep_backup {
            return Some(backup);
        }
        if let Err(e) = fs::remove_file(&backup) {
            warn!("Failed to remove backup {}: {e}", backup.display());
            return Some(backup);
        }
        None
    }

    fn restore(&self) -> Result<()> {
        match &self.original {
            Some(bytes) => write_atomic(&self.target, bytes),
            None => match fs::remove_file(&self.target) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(SyncError::filesystem(&self.target, e)),
            },
        }
    }
}

impl Drop for BackupGuard {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match self.restore() {
            Ok(()) => {
                debug!("Restored {}", self.target.display());
                if let Some(backup) = self.backup_path.take()
                    && let Err(e) = fs::remove_file(&backup)
                {
                    warn!("Failed to remove backup {}: {e}", backup.display());
                }
            }
            Err(e) => {
                warn!(
                    "Failed to restore {}: {e}; original kept at {}",
                    self.target.display(),
                    self.backup_path
                        .as_deref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "(no backup)".to_string())
                );
            }
        }
    }
}

/// `{file}.{YYYYmmdd_HHMMSS}.backup` beside `target` or in `directory`.
/// A numeric suffix is appended if that name is taken.
pub fn backup_path_for(target: &Path, directory: Option<&Path>) -> PathBuf {
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let dir = directory
        .map(Path::to_path_buf)
        .or_else(|| target.parent().map(Path::to_path_buf))
        .unwrap_or_default();

    let mut candidate = dir.join(format!("{file_name}.{stamp}.{BACKUP_SUFFIX}"));
    let mut counter = 1;
    while candidate.exists() {
        candidate = dir.join(format!("{file_name}.{stamp}.{counter}.{BACKUP_SUFFIX}"));
        counter += 1;
    }
    candidate
}

/// Serialize `document` to `target`, re-read it and validate the result.
///
/// `effective` turns the re-read document into what the validator should
/// see, e.g. the merge with its default document. On any failure the
/// original file is restored before returning the error.
pub fn write_validated<F>(
    target: &Path,
    document: &Node,
    settings: &BackupSettings,
    validator: &dyn DocumentValidator,
    effective: F,
) -> Result<Option<PathBuf>>
where
    F: FnOnce(Node) -> Node,
{
    let contents = to_yaml_string(document)?;
    let guard = BackupGuard::acquire(target, settings)?;

    write_atomic(target, contents.as_bytes())?;
    let written = load_document(target)?;
    validator
        .validate(&effective(written))
        .into_result(target)?;

    Ok(guard.commit(settings.keep))
}
