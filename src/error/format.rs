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

use std::error::Error;

use crate::error::{ErrorContext, SyncError};

/// The repository, document or index an error is about, if it names one.
pub fn error_subject(error: &SyncError) -> Option<String> {
    match error {
        SyncError::Configuration { origin, .. } => Some(format!("repository definitions {origin}")),
        SyncError::UnknownRepository(name)
        | SyncError::RepositoryDisabled(name)
        | SyncError::RepositoryUnavailable {
            repository: name, ..
        } => Some(format!("repository '{name}'")),
        SyncError::Validation { path, .. } | SyncError::InvalidDocument { path, .. } => {
            Some(format!("document {path}"))
        }
        SyncError::TargetUnreadable { path, .. } => Some(format!("target {path}")),
        SyncError::Filesystem { path, .. } | SyncError::PermissionDenied(path) => {
            Some(format!("path {path}"))
        }
        SyncError::Parse { format, .. } => Some(format!("{format} index")),
        _ => None,
    }
}

/// Lines placed under the headline: what the error is about, then each
/// underlying cause.
fn attribution(error: &SyncError) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(subject) = error_subject(error) {
        lines.push(format!("in {subject}"));
    }
    let mut source = error.source();
    while let Some(cause) = source {
        lines.push(format!("caused by: {cause}"));
        source = cause.source();
    }
    lines
}

pub fn format_error_chain(error: &SyncError) -> String {
    let context = ErrorContext::new(error);
    let mut output = format!("Error: {error}");

    for line in attribution(error) {
        output.push_str(&format!("\n  {line}"));
    }
    if let Some(details) = &context.details {
        output.push_str(&format!("\n\nDetails: {details}"));
    }
    if let Some(suggestion) = &context.suggestion {
        output.push_str(&format!("\n\nSuggestion: {suggestion}"));
    }

    output
}

/// Terminal rendering of [`format_error_chain`].
pub fn format_error_with_color(error: &SyncError, use_color: bool) -> String {
    let red = if use_color { "\x1b[31m" } else { "" };
    let yellow = if use_color { "\x1b[33m" } else { "" };
    let cyan = if use_color { "\x1b[36m" } else { "" };
    let dim = if use_color { "\x1b[2m" } else { "" };
    let reset = if use_color { "\x1b[0m" } else { "" };
    let bold = if use_color { "\x1b[1m" } else { "" };

    let context = ErrorContext::new(error);
    let mut output = format!("{red}{bold}Error:{reset} {error}\n");

    for line in attribution(error) {
        output.push_str(&format!("{dim}  {line}{reset}\n"));
    }

    if let Some(details) = &context.details {
        output.push_str(&format!("\n{details}\n"));
    }

    if let Some(suggestion) = &context.suggestion {
        output.push_str(&format!("\n{yellow}{bold}Suggestions:{reset}\n"));
        for line in suggestion.lines() {
            if !line.trim().is_empty() {
                output.push_str(&format!("{cyan}• {line}{reset}\n"));
            }
        }
    }

    if use_color {
        output.push_str(reset);
    }

    output
}
