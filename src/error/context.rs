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

use crate::error::SyncError;
use std::fmt;

pub struct ErrorContext<'a> {
    pub error: &'a SyncError,
    pub suggestion: Option<String>,
    pub details: Option<String>,
}

impl<'a> ErrorContext<'a> {
    pub fn new(error: &'a SyncError) -> Self {
        let (suggestion, details) = match error {
            SyncError::Configuration { origin, message } => {
                let suggestion = Some(
                    "Fix the repository definition and run 'versync repos list' to confirm it \
                     is enabled."
                        .to_string(),
                );
                let details = Some(format!("{origin}: {message}"));
                (suggestion, details)
            }
            SyncError::Resolution {
                provider,
                os,
                version,
            } => {
                let suggestion = Some(format!(
                    "Add a '{provider}' repository whose version_mapping contains \"{version}\" \
                     and whose distribution list includes '{os}'."
                ));
                (suggestion, None)
            }
            SyncError::PackageNotFound { package, searched } => {
                let suggestion = Some(format!(
                    "Check the package_name for '{package}' or run with --inexact to see close \
                     matches."
                ));
                let details = if searched.is_empty() {
                    None
                } else {
                    Some(format!(
                        "Searched repositories:\n{}",
                        searched
                            .iter()
                            .map(|r| format!("  - {r}"))
                            .collect::<Vec<_>>()
                            .join("\n")
                    ))
                };
                (suggestion, details)
            }
            SyncError::UnknownRepository(name) => {
                let suggestion = Some(
                    "Run 'versync repos list' to see the configured repositories.".to_string(),
                );
                let details = Some(format!("No repository definition named '{name}'"));
                (suggestion, details)
            }
            SyncError::RepositoryUnavailable { repository, .. } => {
                let suggestion = Some(
                    "Check your internet connection and try again. Cached results can be used \
                     with the cache enabled."
                        .to_string(),
                );
                let details = Some(format!("All retry attempts against '{repository}' failed"));
                (suggestion, details)
            }
            SyncError::NetworkError(msg) => {
                let suggestion = Some(
                    "Check your internet connection and proxy settings, then try again."
                        .to_string(),
                );
                let details = Some(format!("Network failure: {msg}"));
                (suggestion, details)
            }
            SyncError::Validation { errors, .. } => {
                let suggestion = Some(
                    "The original file was restored from its backup. Inspect the reported \
                     fields before retrying."
                        .to_string(),
                );
                let details = Some(
                    errors
                        .iter()
                        .map(|e| format!("  - {e}"))
                        .collect::<Vec<_>>()
                        .join("\n"),
                );
                (suggestion, details)
            }
            SyncError::PermissionDenied(path) => {
                let suggestion = if cfg!(windows) {
                    Some("Ensure the file is not read-only or locked by another program.".to_string())
                } else {
                    Some(format!(
                        "Check ownership and permissions of '{path}' (e.g., ls -l) and retry."
                    ))
                };
                (suggestion, None)
            }
            SyncError::TargetUnreadable { path, .. } => {
                let suggestion = Some(format!(
                    "Verify that '{path}' exists and is a metadata document or a directory of \
                     documents."
                ));
                (suggestion, None)
            }
            SyncError::InvalidConfig(msg) | SyncError::ConfigFile(msg) => {
                let suggestion = Some(
                    "Check ~/.versync/config.toml and VERSYNC_* environment variables."
                        .to_string(),
                );
                let details = Some(msg.clone());
                (suggestion, details)
            }
            SyncError::Cache(msg) => {
                let suggestion =
                    Some("Run 'versync cache clear' to discard the on-disk cache.".to_string());
                let details = Some(msg.clone());
                (suggestion, details)
            }
            _ => (None, None),
        };

        ErrorContext {
            error,
            suggestion,
            details,
        }
    }
}

impl<'a> fmt::Display for ErrorContext<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error: {}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\n\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}
