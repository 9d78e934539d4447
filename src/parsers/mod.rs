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

//! Decoders for repository package indexes and per-package API payloads.
//!
//! Every parser takes raw bytes as served by the repository (compressed or
//! not) and produces normalized [`PackageRecord`]s tagged with the repository
//! they came from.

mod alpine;
mod archive;
mod debian;
mod index;
mod json_api;
mod pacman;
mod rpm;
mod version;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, SyncError};
use crate::models::PackageRecord;

pub use archive::{decompress, is_gzip};
pub use index::PackageIndex;
pub use version::compare_versions;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ParsingFormat {
    DebianPackages,
    RpmPrimaryXml,
    AlpineApkindex,
    PacmanDesc,
    JsonApi,
}

impl ParsingFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParsingFormat::DebianPackages => "debian_packages",
            ParsingFormat::RpmPrimaryXml => "rpm_primary_xml",
            ParsingFormat::AlpineApkindex => "alpine_apkindex",
            ParsingFormat::PacmanDesc => "pacman_desc",
            ParsingFormat::JsonApi => "json_api",
        }
    }
}

impl fmt::Display for ParsingFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Dotted paths locating the name and version inside a JSON record.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldPaths {
    #[serde(default = "default_name_path")]
    pub name: String,
    #[serde(default = "default_version_path")]
    pub version: String,
}

fn default_name_path() -> String {
    "name".to_string()
}

fn default_version_path() -> String {
    "version".to_string()
}

impl Default for FieldPaths {
    fn default() -> Self {
        Self {
            name: default_name_path(),
            version: default_version_path(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ParsingOptions {
    pub format: ParsingFormat,
    #[serde(default)]
    pub fields: FieldPaths,
    /// Dotted path to the array of records in a JSON index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<String>,
    /// Append the release to RPM versions (`ver-rel`)
    #[serde(default)]
    pub include_release: bool,
}

impl ParsingOptions {
    pub fn new(format: ParsingFormat) -> Self {
        Self {
            format,
            fields: FieldPaths::default(),
            items: None,
            include_release: false,
        }
    }
}

/// Parse a complete package index.
pub fn parse_index(
    bytes: &[u8],
    options: &ParsingOptions,
    repository: &str,
) -> Result<Vec<PackageRecord>> {
    let data = decompress(bytes, options.format)?;

    let records = match options.format {
        ParsingFormat::DebianPackages => {
            debian::parse(&as_text(&data, options.format)?, repository)?
        }
        ParsingFormat::RpmPrimaryXml => rpm::parse(&data, options.include_release, repository)?,
        ParsingFormat::AlpineApkindex => alpine::parse(&as_text(&data, options.format)?, repository),
        ParsingFormat::PacmanDesc => pacman::parse(&as_text(&data, options.format)?, repository),
        ParsingFormat::JsonApi => json_api::parse(&data, options, repository)?,
    };

    log::debug!(
        "Parsed {} records from {} index of {repository}",
        records.len(),
        options.format
    );
    Ok(records)
}

/// Parse the payload returned by a per-package lookup.
///
/// Returns the record named `identifier` when present, or the only record if
/// the payload describes a single package under a different name.
pub fn parse_item(
    bytes: &[u8],
    options: &ParsingOptions,
    repository: &str,
    identifier: &str,
) -> Result<Option<PackageRecord>> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let mut records = parse_index(bytes, options, repository)?;
    if let Some(pos) = records.iter().position(|r| r.name == identifier) {
        return Ok(Some(records.swap_remove(pos)));
    }
    if records.len() == 1 {
        return Ok(records.pop());
    }
    Ok(None)
}

fn as_text(data: &[u8], format: ParsingFormat) -> Result<String> {
    String::from_utf8(data.to_vec()).map_err(|e| SyncError::Parse {
        format: format.to_string(),
        message: format!("invalid UTF-8: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_names_match_serde() {
        for format in [
            ParsingFormat::DebianPackages,
            ParsingFormat::RpmPrimaryXml,
            ParsingFormat::AlpineApkindex,
            ParsingFormat::PacmanDesc,
            ParsingFormat::JsonApi,
        ] {
            let yaml = serde_yaml::to_string(&format).unwrap();
            assert_eq!(yaml.trim(), format.as_str());
        }
    }

    #[test]
    fn test_unknown_format_rejected() {
        let result: std::result::Result<ParsingOptions, _> =
            serde_yaml::from_str("format: gentoo_ebuild\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_options_defaults() {
        let options: ParsingOptions = serde_yaml::from_str("format: json_api\n").unwrap();
        assert_eq!(options.fields, FieldPaths::default());
        assert!(options.items.is_none());
        assert!(!options.include_release);
    }

    #[test]
    fn test_signed_apkindex_index() {
        let bytes = archive::test_support::signed_apkindex("P:curl\nV:8.5.0-r0\n\nP:jq\nV:1.7.1-r0\n");
        let options = ParsingOptions::new(ParsingFormat::AlpineApkindex);

        let records = parse_index(&bytes, &options, "apk-alpine-3.19").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "curl");
        assert_eq!(records[0].version, "8.5.0-r0");
    }

    #[test]
    fn test_zstd_primary_xml() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata xmlns="http://linux.duke.edu/metadata/common" packages="1">
<package type="rpm"><name>curl</name><arch>x86_64</arch><version epoch="0" ver="8.2.1" rel="4.fc39"/></package>
</metadata>"#;
        let bytes = archive::test_support::zstd(xml.as_bytes());
        let options = ParsingOptions::new(ParsingFormat::RpmPrimaryXml);

        let records = parse_index(&bytes, &options, "dnf-fedora-39").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].version, "8.2.1");
    }

    #[test]
    fn test_parse_item_prefers_exact_name() {
        let options = ParsingOptions::new(ParsingFormat::JsonApi);
        let payload = br#"[{"name": "curl-dev", "version": "1"}, {"name": "curl", "version": "8.5.0"}]"#;

        let record = parse_item(payload, &options, "api-repo", "curl")
            .unwrap()
            .unwrap();
        assert_eq!(record.version, "8.5.0");
    }

    #[test]
    fn test_parse_item_single_record_under_other_name() {
        let options = ParsingOptions::new(ParsingFormat::JsonApi);
        let payload = br#"{"name": "python@3.12", "version": "3.12.4"}"#;

        let record = parse_item(payload, &options, "brew", "python")
            .unwrap()
            .unwrap();
        assert_eq!(record.name, "python@3.12");
    }

    #[test]
    fn test_parse_item_empty_payload_is_absent() {
        let options = ParsingOptions::new(ParsingFormat::JsonApi);
        assert!(parse_item(b"  \n", &options, "brew", "jq").unwrap().is_none());
        assert!(parse_item(b"[]", &options, "brew", "jq").unwrap().is_none());
    }

    #[test]
    fn test_parse_item_ambiguous_is_absent() {
        let options = ParsingOptions::new(ParsingFormat::JsonApi);
        let payload = br#"[{"name": "a", "version": "1"}, {"name": "b", "version": "2"}]"#;
        assert!(parse_item(payload, &options, "repo", "c").unwrap().is_none());
    }
}
