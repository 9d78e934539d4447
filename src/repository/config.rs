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

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use crate::error::{Result, SyncError};
use crate::parsers::ParsingOptions;

static VERSION_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9.]+$").expect("unable to compile version key regex"));
static CODENAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9-]+$").expect("unable to compile codename regex"));

const DEFAULT_TTL_HOURS: u64 = 24;
const DEFAULT_MAX_SIZE_MB: u64 = 100;
const DEFAULT_REQUESTS_PER_MINUTE: u32 = 60;
const DEFAULT_MAX_CONCURRENCY: usize = 5;
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

const VERSION_PLACEHOLDERS: &[&str] = &["{codename}", "{version}"];
const ENDPOINT_PLACEHOLDERS: &[&str] = &["{codename}", "{version}", "{os}", "{arch}", "{package}"];

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    #[default]
    BulkDownload,
    Api,
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryType::BulkDownload => write!(f, "bulk_download"),
            QueryType::Api => write!(f, "api"),
        }
    }
}

/// URL templates. Placeholders: `{codename}`, `{version}`, `{os}`, `{arch}`
/// and `{package}`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packages: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
}

impl Endpoints {
    /// Configured templates with their field names.
    pub fn templates(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("packages", &self.packages),
            ("search", &self.search),
            ("info", &self.info),
        ]
        .into_iter()
        .filter_map(|(field, template)| template.as_deref().map(|t| (field, t)))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u64,
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u64,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            ttl_hours: DEFAULT_TTL_HOURS,
            max_size_mb: DEFAULT_MAX_SIZE_MB,
        }
    }
}

impl CachePolicy {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_hours * 3600)
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb * 1024 * 1024
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RateLimits {
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

impl RateLimits {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn default_ttl_hours() -> u64 {
    DEFAULT_TTL_HOURS
}

fn default_max_size_mb() -> u64 {
    DEFAULT_MAX_SIZE_MB
}

fn default_requests_per_minute() -> u32 {
    DEFAULT_REQUESTS_PER_MINUTE
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_true() -> bool {
    true
}

/// One remote repository definition.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RepositoryConfig {
    pub name: String,

    /// Provider (package manager) this repository serves, e.g. `apt`
    #[serde(rename = "type")]
    pub provider_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    #[serde(default, rename = "distribution")]
    pub distributions: Vec<String>,

    #[serde(default, rename = "architecture")]
    pub architectures: Vec<String>,

    /// OS version to codename, e.g. `"22.04": jammy`
    #[serde(default, deserialize_with = "deserialize_version_mapping")]
    pub version_mapping: BTreeMap<String, String>,

    #[serde(default)]
    pub eol: bool,

    #[serde(default)]
    pub query_type: QueryType,

    #[serde(default)]
    pub endpoints: Endpoints,

    pub parsing: ParsingOptions,

    #[serde(default)]
    pub cache: CachePolicy,

    #[serde(default)]
    pub limits: RateLimits,

    #[serde(default)]
    pub priority: i32,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Values substituted into endpoint templates.
#[derive(Debug, Clone, Default)]
pub struct EndpointVars<'a> {
    pub version: Option<&'a str>,
    pub os: Option<&'a str>,
    pub package: Option<&'a str>,
}

impl RepositoryConfig {
    /// Structural problems that make this definition unusable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("name must not be empty".to_string());
        }
        if self.provider_type.trim().is_empty() {
            errors.push("type must not be empty".to_string());
        }
        for (version, codename) in &self.version_mapping {
            if !VERSION_KEY_RE.is_match(version) {
                errors.push(format!(
                    "version_mapping key '{version}' must match ^[0-9.]+$"
                ));
            }
            if !CODENAME_RE.is_match(codename) {
                errors.push(format!(
                    "version_mapping value '{codename}' must match ^[a-z0-9-]+$"
                ));
            }
        }
        match self.query_type {
            QueryType::BulkDownload if self.endpoints.packages.is_none() => {
                errors.push("bulk_download repositories need endpoints.packages".to_string());
            }
            QueryType::Api if self.endpoints.search.is_none() => {
                errors.push("api repositories need endpoints.search".to_string());
            }
            _ => {}
        }
        if self.version_mapping.len() != 1 {
            for (field, template) in self.endpoints.templates() {
                let placeholder = VERSION_PLACEHOLDERS.iter().find(|p| template.contains(**p));
                if let Some(placeholder) = placeholder {
                    errors.push(format!(
                        "endpoints.{field} uses {placeholder} but version_mapping has {} entries; \
                         templates with version placeholders need exactly one",
                        self.version_mapping.len()
                    ));
                }
            }
        }
        if self.limits.requests_per_minute == 0 {
            errors.push("limits.requests_per_minute must be at least 1".to_string());
        }
        if self.limits.max_concurrency == 0 {
            errors.push("limits.max_concurrency must be at least 1".to_string());
        }

        errors
    }

    pub fn codename_for(&self, version: &str) -> Option<&str> {
        self.version_mapping.get(version).map(String::as_str)
    }

    pub fn serves(&self, provider: &str, os: Option<&str>) -> bool {
        self.provider_type == provider
            && os.is_none_or(|os| self.distributions.iter().any(|d| d == os))
    }

    /// Endpoint used for the query path of this repository.
    pub fn query_endpoint(&self) -> Option<&str> {
        match self.query_type {
            QueryType::BulkDownload => self.endpoints.packages.as_deref(),
            QueryType::Api => self.endpoints.search.as_deref(),
        }
    }

    fn single_mapping(&self) -> Option<(&str, &str)> {
        if self.version_mapping.len() != 1 {
            return None;
        }
        self.version_mapping
            .iter()
            .next()
            .map(|(version, codename)| (version.as_str(), codename.as_str()))
    }

    /// Fill in a URL template. Without an explicit version the repository's
    /// only mapping is used. The package name is percent-encoded. A
    /// placeholder left without a value is a configuration error.
    pub fn render_endpoint(&self, template: &str, vars: &EndpointVars<'_>) -> Result<String> {
        let (version, codename) = match vars.version {
            Some(version) => (Some(version), self.codename_for(version)),
            None => match self.single_mapping() {
                Some((version, codename)) => (Some(version), Some(codename)),
                None => (None, None),
            },
        };
        let os = vars
            .os
            .or_else(|| self.distributions.first().map(String::as_str));
        let arch = self.architectures.first().map(String::as_str);

        let mut url = template.to_string();
        for (placeholder, value) in [
            ("{codename}", codename),
            ("{version}", version),
            ("{os}", os),
            ("{arch}", arch),
        ] {
            if let Some(value) = value {
                url = url.replace(placeholder, value);
            }
        }
        if let Some(package) = vars.package {
            url = url.replace("{package}", &urlencoding::encode(package));
        }

        if let Some(placeholder) = ENDPOINT_PLACEHOLDERS.iter().find(|p| url.contains(**p)) {
            return Err(SyncError::Configuration {
                origin: self.name.clone(),
                message: format!("no value for {placeholder} in endpoint {template}"),
            });
        }
        Ok(url)
    }
}

/// Accept integer keys (`12: bookworm`) as well as strings. Float keys are
/// rejected because `20.10` would silently become `20.1`.
fn deserialize_version_mapping<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let raw = serde_yaml::Mapping::deserialize(deserializer)?;
    let mut mapping = BTreeMap::new();
    for (key, value) in raw {
        let key = match key {
            serde_yaml::Value::String(s) => s,
            serde_yaml::Value::Number(n) if n.is_u64() => n.to_string(),
            other => {
                return Err(D::Error::custom(format!(
                    "version_mapping key {other:?} must be a quoted string"
                )));
            }
        };
        let value = match value {
            serde_yaml::Value::String(s) => s,
            other => {
                return Err(D::Error::custom(format!(
                    "version_mapping value for '{key}' must be a string, got {other:?}"
                )));
            }
        };
        mapping.insert(key, value);
    }
    Ok(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> RepositoryConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    const APT_JAMMY: &str = r#"
name: apt-ubuntu-jammy
type: apt
platform: linux
distribution: [ubuntu]
architecture: [amd64]
version_mapping: {"22.04": jammy}
query_type: bulk_download
endpoints:
  packages: "https://archive.ubuntu.com/ubuntu/dists/{codename}/main/binary-{arch}/Packages.gz"
parsing:
  format: debian_packages
priority: 90
"#;

    #[test]
    fn test_defaults_applied() {
        let config = parse(APT_JAMMY);

        assert!(config.enabled);
        assert!(!config.eol);
        assert_eq!(config.cache, CachePolicy::default());
        assert_eq!(config.limits.requests_per_minute, DEFAULT_REQUESTS_PER_MINUTE);
        assert_eq!(config.priority, 90);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_render_endpoint() {
        let config = parse(APT_JAMMY);
        let url = config.render_endpoint(
            config.query_endpoint().unwrap(),
            &EndpointVars {
                version: Some("22.04"),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(
            url,
            "https://archive.ubuntu.com/ubuntu/dists/jammy/main/binary-amd64/Packages.gz"
        );
    }

    #[test]
    fn test_render_endpoint_encodes_package() {
        let mut config = parse(APT_JAMMY);
        config.query_type = QueryType::Api;
        config.endpoints.search = Some("https://api.example/{os}/{package}".to_string());

        let url = config.render_endpoint(
            config.query_endpoint().unwrap(),
            &EndpointVars {
                package: Some("g++"),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(url, "https://api.example/ubuntu/g%2B%2B");
    }

    #[test]
    fn test_single_mapping_fills_codename_without_version() {
        let config = parse(APT_JAMMY);
        let url = config
            .render_endpoint(config.query_endpoint().unwrap(), &EndpointVars::default())
            .unwrap();
        assert!(url.contains("/dists/jammy/"));
    }

    #[test]
    fn test_codename_template_needs_single_mapping() {
        let mut config = parse(APT_JAMMY);
        config
            .version_mapping
            .insert("24.04".to_string(), "noble".to_string());

        let errors = config.validate();
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert!(errors[0].contains("endpoints.packages uses {codename}"));

        let rendered =
            config.render_endpoint(config.query_endpoint().unwrap(), &EndpointVars::default());
        match rendered {
            Err(SyncError::Configuration { origin, message }) => {
                assert_eq!(origin, "apt-ubuntu-jammy");
                assert!(message.contains("{codename}"));
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_validation_errors() {
        let mut config = parse(APT_JAMMY);
        config
            .version_mapping
            .insert("22.04-lts".to_string(), "Jammy".to_string());
        config.endpoints.packages = None;
        config.limits.requests_per_minute = 0;

        let errors = config.validate();
        assert_eq!(errors.len(), 4, "{errors:?}");
    }

    #[test]
    fn test_api_requires_search_endpoint() {
        let config = parse(
            r#"
name: brew
type: brew
query_type: api
endpoints:
  packages: "https://formulae.brew.sh/api/formula.json"
parsing:
  format: json_api
"#,
        );
        assert_eq!(config.validate(), vec!["api repositories need endpoints.search"]);
    }

    #[test]
    fn test_integer_mapping_key_accepted() {
        let config = parse(
            r#"
name: apt-debian-bookworm
type: apt
distribution: [debian]
version_mapping: {12: bookworm}
endpoints: {packages: "https://deb.debian.org/debian/dists/{codename}/main/binary-amd64/Packages.gz"}
parsing: {format: debian_packages}
"#,
        );
        assert_eq!(config.codename_for("12"), Some("bookworm"));
    }

    #[test]
    fn test_float_mapping_key_rejected() {
        let result: std::result::Result<RepositoryConfig, _> = serde_yaml::from_str(
            r#"
name: apt-ubuntu-groovy
type: apt
version_mapping: {20.10: groovy}
parsing: {format: debian_packages}
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_serves() {
        let config = parse(APT_JAMMY);
        assert!(config.serves("apt", Some("ubuntu")));
        assert!(config.serves("apt", None));
        assert!(!config.serves("apt", Some("debian")));
        assert!(!config.serves("dnf", Some("ubuntu")));
    }
}
