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

use super::registry::RepositoryRegistry;

/// No repository maps the requested OS version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionWarning {
    pub provider: String,
    pub os: String,
    pub version: String,
}

impl fmt::Display for ResolutionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no {} repository maps {} {}, falling back to '{}'",
            self.provider, self.os, self.version, self.provider
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub repository: String,
    pub warning: Option<ResolutionWarning>,
}

/// Maps (provider, os, version) to a repository name. The result depends
/// only on the registry and the arguments.
#[derive(Debug, Clone, Copy)]
pub struct CodenameResolver<'a> {
    registry: &'a RepositoryRegistry,
}

impl<'a> CodenameResolver<'a> {
    pub fn new(registry: &'a RepositoryRegistry) -> Self {
        Self { registry }
    }

    pub fn resolve(&self, provider: &str, os: Option<&str>, version: Option<&str>) -> Resolution {
        let (Some(os), Some(version)) = (os, version) else {
            return Resolution {
                repository: provider.to_string(),
                warning: None,
            };
        };

        let matched = self
            .registry
            .find_candidates(provider, Some(os))
            .into_iter()
            .find(|repo| repo.codename_for(version).is_some());

        match matched {
            Some(repo) => {
                log::debug!("Resolved {provider} on {os} {version} to {}", repo.name);
                Resolution {
                    repository: repo.name.clone(),
                    warning: None,
                }
            }
            None => {
                let warning = ResolutionWarning {
                    provider: provider.to_string(),
                    os: os.to_string(),
                    version: version.to_string(),
                };
                log::warn!("{warning}");
                Resolution {
                    repository: provider.to_string(),
                    warning: Some(warning),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> RepositoryRegistry {
        RepositoryRegistry::from_yaml(
            r#"
repositories:
  - name: apt-ubuntu-jammy
    type: apt
    distribution: [ubuntu]
    version_mapping: {"22.04": jammy}
    endpoints: {packages: "https://example/{codename}"}
    parsing: {format: debian_packages}
    priority: 90
  - name: hashicorp-apt-ubuntu-jammy
    type: apt
    distribution: [ubuntu]
    version_mapping: {"22.04": jammy}
    endpoints: {packages: "https://vendor/{codename}"}
    parsing: {format: debian_packages}
    priority: 100
  - name: apt-ubuntu-noble
    type: apt
    distribution: [ubuntu]
    version_mapping: {"24.04": noble}
    endpoints: {packages: "https://example/{codename}"}
    parsing: {format: debian_packages}
    priority: 90
    enabled: false
"#,
            "apt.yaml",
        )
    }

    #[test]
    fn test_highest_priority_mapping_wins() {
        let registry = registry();
        let resolution =
            CodenameResolver::new(&registry).resolve("apt", Some("ubuntu"), Some("22.04"));

        assert_eq!(resolution.repository, "hashicorp-apt-ubuntu-jammy");
        assert!(resolution.warning.is_none());
    }

    #[test]
    fn test_missing_context_returns_provider() {
        let registry = registry();
        let resolver = CodenameResolver::new(&registry);

        assert_eq!(resolver.resolve("apt", None, None).repository, "apt");
        assert_eq!(resolver.resolve("apt", Some("ubuntu"), None).repository, "apt");
        assert!(resolver.resolve("apt", None, Some("22.04")).warning.is_none());
    }

    #[test]
    fn test_unmapped_version_falls_back_with_warning() {
        let registry = registry();
        let resolution =
            CodenameResolver::new(&registry).resolve("apt", Some("ubuntu"), Some("24.04"));

        assert_eq!(resolution.repository, "apt");
        assert_eq!(
            resolution.warning,
            Some(ResolutionWarning {
                provider: "apt".to_string(),
                os: "ubuntu".to_string(),
                version: "24.04".to_string(),
            })
        );
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let registry = registry();
        let resolver = CodenameResolver::new(&registry);

        let first = resolver.resolve("apt", Some("ubuntu"), Some("22.04"));
        let _ = resolver.resolve("apt", Some("ubuntu"), Some("24.04"));
        let second = resolver.resolve("apt", Some("ubuntu"), Some("22.04"));
        assert_eq!(first, second);
    }
}
