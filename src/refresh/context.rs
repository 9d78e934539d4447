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
use std::path::{Path, PathBuf};

pub const DEFAULT_FILE_STEM: &str = "default";

/// Operating-system context implied by where a document is stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OsContext {
    pub os: Option<String>,
    pub version: Option<String>,
    pub is_default: bool,
}

impl OsContext {
    pub fn default_document() -> Self {
        Self {
            os: None,
            version: None,
            is_default: true,
        }
    }

    pub fn os_specific(os: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            os: Some(os.into()),
            version: Some(version.into()),
            is_default: false,
        }
    }

    pub fn is_os_specific(&self) -> bool {
        self.os.is_some() && self.version.is_some()
    }
}

impl fmt::Display for OsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.os, &self.version) {
            (Some(os), Some(version)) => write!(f, "{os} {version}"),
            _ if self.is_default => write!(f, "default"),
            _ => write!(f, "os-agnostic"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub context: OsContext,
    /// Directory holding `default.yaml` and the per-OS subdirectories
    pub software_dir: Option<PathBuf>,
    /// Set when the path matched no known layout
    pub warning: Option<String>,
}

pub fn is_document_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml")
    )
}

/// Derive the OS context from a document path.
///
/// `{software}/default.yaml` is the default document and
/// `{software}/{os}/{version}.yaml` an OS override. Any other shape is
/// treated as OS-agnostic and reported through `warning`.
pub fn extract(path: &Path) -> Extracted {
    let stem = path.file_stem().and_then(|s| s.to_str());
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());

    if is_document_file(path)
        && let Some(stem) = stem
    {
        if stem == DEFAULT_FILE_STEM {
            return Extracted {
                context: OsContext::default_document(),
                software_dir: parent.map(Path::to_path_buf),
                warning: None,
            };
        }

        let os = parent.and_then(|p| p.file_name()).and_then(|s| s.to_str());
        let software_dir = parent.and_then(Path::parent).filter(|p| !p.as_os_str().is_empty());
        if stem.starts_with(|c: char| c.is_ascii_digit())
            && let Some(os) = os
            && let Some(software_dir) = software_dir
        {
            return Extracted {
                context: OsContext::os_specific(os, stem),
                software_dir: Some(software_dir.to_path_buf()),
                warning: None,
            };
        }
    }

    let warning = format!(
        "Unrecognized document path {}; expected {{software}}/default.yaml or \
         {{software}}/{{os}}/{{version}}.yaml, using OS-agnostic resolution",
        path.display()
    );
    log::warn!("{warning}");
    Extracted {
        context: OsContext::default(),
        software_dir: None,
        warning: Some(warning),
    }
}

/// Path of the OS override for `os`/`version` under `software_dir`.
pub fn override_path(software_dir: &Path, os: &str, version: &str) -> PathBuf {
    software_dir.join(os).join(format!("{version}.yaml"))
}

pub fn default_path(software_dir: &Path) -> PathBuf {
    software_dir.join(format!("{DEFAULT_FILE_STEM}.yaml"))
}
