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

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use super::context::OsContext;
use crate::repository::ConfigurationIssue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    VersionChanged,
    /// The repository identifier differs; the version may differ as well
    NameChanged,
    /// Close but not exact match; reported only
    Suggested,
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateKind::VersionChanged => write!(f, "version"),
            UpdateKind::NameChanged => write!(f, "name"),
            UpdateKind::Suggested => write!(f, "suggested"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageUpdate {
    pub provider: String,
    /// Logical name of the package entry
    pub package: String,
    pub old_name: String,
    pub new_name: String,
    pub old_version: Option<String>,
    pub new_version: String,
    pub source_repository: String,
    pub kind: UpdateKind,
    /// False in check-only mode, for suggestions, and when the write was
    /// rolled back or declined
    pub applied: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Updated,
    Created,
    Unchanged,
    /// Changes found but not written (check-only or declined)
    Pending,
    Failed,
    TimedOut,
}

impl FileStatus {
    pub fn is_error(&self) -> bool {
        matches!(self, FileStatus::Failed | FileStatus::TimedOut)
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FileStatus::Updated => "updated",
            FileStatus::Created => "created",
            FileStatus::Unchanged => "unchanged",
            FileStatus::Pending => "pending",
            FileStatus::Failed => "failed",
            FileStatus::TimedOut => "timed out",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshResult {
    pub path: PathBuf,
    pub context: OsContext,
    pub status: FileStatus,
    pub updates: Vec<PackageUpdate>,
    /// Packages found with nothing to change
    pub unchanged: usize,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub backup_path: Option<PathBuf>,
    pub elapsed_ms: u64,
}

impl RefreshResult {
    pub fn new(path: PathBuf, context: OsContext) -> Self {
        Self {
            path,
            context,
            status: FileStatus::Unchanged,
            updates: Vec::new(),
            unchanged: 0,
            warnings: Vec::new(),
            errors: Vec::new(),
            backup_path: None,
            elapsed_ms: 0,
        }
    }

    pub fn fail(&mut self, error: impl fmt::Display) {
        self.status = FileStatus::Failed;
        self.errors.push(error.to_string());
        for update in &mut self.updates {
            update.applied = false;
        }
    }

    pub fn timed_out(path: PathBuf, context: OsContext, message: impl Into<String>) -> Self {
        let mut result = Self::new(path, context);
        result.status = FileStatus::TimedOut;
        result.errors.push(message.into());
        result
    }

    pub fn applied_updates(&self) -> usize {
        self.updates.iter().filter(|u| u.applied).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    PartialSuccess,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub files: usize,
    pub files_written: usize,
    pub updates: usize,
    pub applied: usize,
    pub unchanged: usize,
    pub warnings: usize,
    pub errors: usize,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub summary: RunSummary,
    pub files: Vec<RefreshResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub configuration_issues: Vec<ConfigurationIssue>,
}

impl RunReport {
    /// Totals are summed in file order; `elapsed_ms` is the wall-clock time
    /// of the whole run.
    pub fn aggregate(
        files: Vec<RefreshResult>,
        configuration_issues: Vec<ConfigurationIssue>,
        elapsed_ms: u64,
    ) -> Self {
        let mut summary = RunSummary {
            files: files.len(),
            elapsed_ms,
            ..Default::default()
        };
        for file in &files {
            if matches!(file.status, FileStatus::Updated | FileStatus::Created) {
                summary.files_written += 1;
            }
            summary.updates += file.updates.len();
            summary.applied += file.applied_updates();
            summary.unchanged += file.unchanged;
            summary.warnings += file.warnings.len();
            summary.errors += file.errors.len();
        }

        let status = if summary.warnings == 0 && summary.errors == 0 {
            RunStatus::Success
        } else {
            RunStatus::PartialSuccess
        };

        Self {
            status,
            summary,
            files,
            configuration_issues,
        }
    }
}
