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

use log::{debug, info, warn};
use serde::Serialize;
use serde_yaml::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::config::{QueryType, RepositoryConfig};
use crate::error::{Result, SyncError};
use crate::parsers::{ParsingFormat, ParsingOptions};

/// A repository definition that could not be used as written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigurationIssue {
    /// File the definition came from
    pub origin: String,
    pub repository: Option<String>,
    pub message: String,
}

impl fmt::Display for ConfigurationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repository {
            Some(name) => write!(f, "{} ({name}): {}", self.origin, self.message),
            None => write!(f, "{}: {}", self.origin, self.message),
        }
    }
}

impl From<&ConfigurationIssue> for SyncError {
    fn from(issue: &ConfigurationIssue) -> Self {
        SyncError::Configuration {
            origin: issue.origin.clone(),
            message: match &issue.repository {
                Some(name) => format!("{name}: {}", issue.message),
                None => issue.message.clone(),
            },
        }
    }
}

/// Immutable set of repository definitions, ordered by priority (highest
/// first) and then by name.
#[derive(Debug, Clone, Default)]
pub struct RepositoryRegistry {
    repositories: Vec<RepositoryConfig>,
    by_name: HashMap<String, usize>,
    issues: Vec<ConfigurationIssue>,
}

impl RepositoryRegistry {
    /// Load every `*.yaml`/`*.yml` file below the given directories.
    ///
    /// A malformed entry is disabled and recorded as an issue; it never
    /// prevents other entries from loading. Entries without a readable name
    /// can only be reported.
    pub fn load(config_dirs: &[PathBuf]) -> Result<Self> {
        let mut builder = RegistryBuilder::default();

        for dir in config_dirs {
            if !dir.exists() {
                debug!("Repository config directory {} does not exist", dir.display());
                continue;
            }
            for entry in WalkDir::new(dir).sort_by_file_name() {
                let entry = entry?;
                let path = entry.path();
                if entry.file_type().is_file() && is_yaml(path) {
                    builder.load_file(path)?;
                }
            }
        }

        let registry = builder.finish();
        info!(
            "Loaded {} repositories ({} configuration issues)",
            registry.repositories.len(),
            registry.issues.len()
        );
        Ok(registry)
    }

    /// Parse one repository configuration document.
    pub fn from_yaml(text: &str, origin: &str) -> Self {
        let mut builder = RegistryBuilder::default();
        builder.load_text(text, origin);
        builder.finish()
    }

    pub fn get(&self, name: &str) -> Option<&RepositoryConfig> {
        self.by_name.get(name).map(|&i| &self.repositories[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// All definitions, enabled or not, in priority order.
    pub fn all(&self) -> &[RepositoryConfig] {
        &self.repositories
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    pub fn issues(&self) -> &[ConfigurationIssue] {
        &self.issues
    }

    /// Enabled repositories for `provider` that list `os` among their
    /// distributions (any OS when `os` is `None`), highest priority first
    /// with ties broken by name.
    pub fn find_candidates(&self, provider: &str, os: Option<&str>) -> Vec<&RepositoryConfig> {
        self.repositories
            .iter()
            .filter(|repo| repo.enabled && repo.serves(provider, os))
            .collect()
    }

    /// Every (os, version) pair some enabled repository of `provider` maps.
    pub fn os_versions(&self, provider: &str) -> BTreeSet<(String, String)> {
        self.repositories
            .iter()
            .filter(|repo| repo.enabled && repo.provider_type == provider)
            .flat_map(|repo| {
                repo.distributions.iter().flat_map(move |os| {
                    repo.version_mapping
                        .keys()
                        .map(move |version| (os.clone(), version.clone()))
                })
            })
            .collect()
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == "yaml" || ext == "yml")
}

#[derive(Default)]
struct RegistryBuilder {
    repositories: Vec<RepositoryConfig>,
    issues: Vec<ConfigurationIssue>,
}

impl RegistryBuilder {
    fn load_file(&mut self, path: &Path) -> Result<()> {
        let text = fs::read_to_string(path).map_err(|e| SyncError::filesystem(path, e))?;
        self.load_text(&text, &path.display().to_string());
        Ok(())
    }

    fn load_text(&mut self, text: &str, origin: &str) {
        let document: Value = match serde_yaml::from_str(text) {
            Ok(document) => document,
            Err(e) => {
                self.issue(origin, None, format!("invalid YAML: {e}"));
                return;
            }
        };

        let entries = match document {
            Value::Mapping(ref map) => match map.get("repositories") {
                Some(Value::Sequence(entries)) => entries.clone(),
                Some(Value::Null) | None => Vec::new(),
                Some(_) => {
                    self.issue(origin, None, "'repositories' must be a list".to_string());
                    return;
                }
            },
            Value::Sequence(entries) => entries,
            Value::Null => Vec::new(),
            _ => {
                self.issue(origin, None, "expected a 'repositories' list".to_string());
                return;
            }
        };

        for entry in entries {
            let name = entry
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string);
            match serde_yaml::from_value::<RepositoryConfig>(entry.clone()) {
                Ok(config) => self.add(config, origin),
                Err(e) => {
                    self.issue(origin, name.clone(), e.to_string());
                    if let Some(name) = name.filter(|n| !n.is_empty()) {
                        self.insert(disabled_placeholder(name, &entry), origin);
                    }
                }
            }
        }
    }

    fn add(&mut self, mut config: RepositoryConfig, origin: &str) {
        let errors = config.validate();
        if !errors.is_empty() {
            config.enabled = false;
            for error in errors {
                self.issue(origin, Some(config.name.clone()), error);
            }
        }
        self.insert(config, origin);
    }

    /// A name defined twice is ambiguous, so the definition kept under that
    /// name is disabled and the later one dropped.
    fn insert(&mut self, config: RepositoryConfig, origin: &str) {
        if let Some(i) = self.repositories.iter().position(|r| r.name == config.name) {
            self.repositories[i].enabled = false;
            self.issue(
                origin,
                Some(config.name),
                "duplicate repository name, definition disabled".to_string(),
            );
            return;
        }
        self.repositories.push(config);
    }

    fn issue(&mut self, origin: &str, repository: Option<String>, message: String) {
        let issue = ConfigurationIssue {
            origin: origin.to_string(),
            repository,
            message,
        };
        warn!("Repository configuration error in {issue}");
        self.issues.push(issue);
    }

    fn finish(mut self) -> RepositoryRegistry {
        self.repositories
            .sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));
        let by_name = self
            .repositories
            .iter()
            .enumerate()
            .map(|(i, repo)| (repo.name.clone(), i))
            .collect();

        RepositoryRegistry {
            repositories: self.repositories,
            by_name,
            issues: self.issues,
        }
    }
}

/// Stand-in for an entry that did not deserialize, so it is still listed
/// (as disabled) under its name. Whatever identifying fields can be read
/// are kept.
fn disabled_placeholder(name: String, entry: &Value) -> RepositoryConfig {
    let text = |key: &str| entry.get(key).and_then(Value::as_str).map(str::to_string);
    let list = |key: &str| -> Vec<String> {
        entry
            .get(key)
            .and_then(Value::as_sequence)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    };
    let query_type = entry
        .get("query_type")
        .and_then(|v| serde_yaml::from_value::<QueryType>(v.clone()).ok())
        .unwrap_or_default();
    let parsing = entry
        .get("parsing")
        .and_then(|v| serde_yaml::from_value::<ParsingOptions>(v.clone()).ok())
        .unwrap_or_else(|| {
            ParsingOptions::new(match query_type {
                QueryType::BulkDownload => ParsingFormat::DebianPackages,
                QueryType::Api => ParsingFormat::JsonApi,
            })
        });

    RepositoryConfig {
        name,
        provider_type: text("type").unwrap_or_default(),
        platform: text("platform"),
        distributions: list("distribution"),
        architectures: list("architecture"),
        version_mapping: Default::default(),
        eol: entry.get("eol").and_then(Value::as_bool).unwrap_or(false),
        query_type,
        endpoints: Default::default(),
        parsing,
        cache: Default::default(),
        limits: Default::default(),
        priority: entry
            .get("priority")
            .and_then(Value::as_i64)
            .and_then(|p| i32::try_from(p).ok())
            .unwrap_or(0),
        enabled: false,
    }
}
