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

mod context;
mod exit_codes;
mod format;
#[cfg(test)]
mod tests;

pub use context::ErrorContext;
pub use exit_codes::{PARTIAL_SUCCESS_EXIT_CODE, get_exit_code};
pub use format::{error_subject, format_error_chain, format_error_with_color};

use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Repository configuration error in {origin}: {message}")]
    Configuration { origin: String, message: String },

    #[error("No repository found for {provider} on {os} {version}")]
    Resolution {
        provider: String,
        os: String,
        version: String,
    },

    #[error("Package '{package}' not found in any repository")]
    PackageNotFound {
        package: String,
        searched: Vec<String>,
    },

    #[error("Unknown repository: {0}")]
    UnknownRepository(String),

    #[error("Repository '{0}' is disabled")]
    RepositoryDisabled(String),

    #[error("Repository '{repository}' is unavailable: {message}")]
    RepositoryUnavailable { repository: String, message: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Failed to parse {format} data: {message}")]
    Parse { format: String, message: String },

    #[error("Validation failed for {path}: {}", .errors.join("; "))]
    Validation { path: String, errors: Vec<String> },

    #[error("Filesystem error on {path}: {message}")]
    Filesystem { path: String, message: String },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Cannot read target {path}: {message}")]
    TargetUnreadable { path: String, message: String },

    #[error("Invalid document {path}: {message}")]
    InvalidDocument { path: String, message: String },

    #[error("Configuration file error: {0}")]
    ConfigFile(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Timed out: {0}")]
    TimedOut(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] attohttpc::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    WalkDir(#[from] walkdir::Error),
}

impl SyncError {
    /// Wrap an I/O failure on a specific path, keeping permission problems distinct.
    pub fn filesystem(path: &Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::PermissionDenied {
            SyncError::PermissionDenied(path.display().to_string())
        } else {
            SyncError::Filesystem {
                path: path.display().to_string(),
                message: err.to_string(),
            }
        }
    }

    /// Soft failures are recorded as warnings in a refresh result instead of
    /// failing the file.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            SyncError::Resolution { .. }
                | SyncError::PackageNotFound { .. }
                | SyncError::RepositoryUnavailable { .. }
                | SyncError::NetworkError(_)
                | SyncError::Http(_)
                | SyncError::UnknownRepository(_)
                | SyncError::RepositoryDisabled(_)
                | SyncError::Parse { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
