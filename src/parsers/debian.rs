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

use serde::Deserialize;

use crate::error::{Result, SyncError};
use crate::models::PackageRecord;

/// The subset of a `Packages` stanza that is kept. Other fields, including
/// folded multi-line ones like `Description`, are skipped by the decoder.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Stanza {
    package: Option<String>,
    version: Option<String>,
    architecture: Option<String>,
    source: Option<String>,
    section: Option<String>,
}

/// Parse a deb822 `Packages` file. Epochs and Debian revisions stay in the
/// version string as published.
pub fn parse(content: &str, repository: &str) -> Result<Vec<PackageRecord>> {
    let normalized;
    let content = if content.contains('\r') {
        normalized = content.replace("\r\n", "\n");
        normalized.as_str()
    } else {
        content
    };
    let content = content.trim_matches('\n');
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let stanzas: Vec<Stanza> = rfc822_like::from_str(content).map_err(|e| SyncError::Parse {
        format: "debian_packages".to_string(),
        message: e.to_string(),
    })?;

    Ok(stanzas
        .into_iter()
        .filter_map(|stanza| into_record(stanza, repository))
        .collect())
}

fn into_record(stanza: Stanza, repository: &str) -> Option<PackageRecord> {
    let name = stanza.package.filter(|n| !n.is_empty());
    let version = stanza.version.filter(|v| !v.is_empty());
    let (Some(name), Some(version)) = (name, version) else {
        log::trace!("Skipping Packages stanza without Package/Version");
        return None;
    };

    let mut record = PackageRecord::new(name, version, repository);
    for (key, value) in [
        ("Architecture", stanza.architecture),
        ("Source", stanza.source),
        ("Section", stanza.section),
    ] {
        if let Some(value) = value {
            record = record.with_field(key, value);
        }
    }
    Some(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PACKAGES: &str = "\
Package: nginx
Architecture: amd64
Version: 1.18.0-6ubuntu14.4
Section: httpd
Description: small, powerful, scalable web/proxy server
 Nginx (\"engine X\") is a high-performance web and reverse proxy server
 created by Igor Sysoev.

Package: terraform
Version: 1:1.6.5-1
Architecture: amd64

Package: broken-entry
Architecture: all
";

    #[test]
    fn test_parses_stanzas() {
        let records = parse(PACKAGES, "apt-ubuntu-jammy").unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "nginx");
        assert_eq!(records[0].version, "1.18.0-6ubuntu14.4");
        assert_eq!(records[0].source_repository, "apt-ubuntu-jammy");
        assert_eq!(records[0].fields.get("Section").map(String::as_str), Some("httpd"));
        assert!(!records[0].fields.contains_key("Description"));
    }

    #[test]
    fn test_epoch_kept_verbatim() {
        let records = parse(PACKAGES, "repo").unwrap();
        assert_eq!(records[1].version, "1:1.6.5-1");
    }

    #[test]
    fn test_crlf_and_trailing_whitespace() {
        let content = "Package: jq\r\nVersion: 1.6-2.1ubuntu3\r\n\r\nPackage: git\r\nVersion: 1:2.34.1\r\n";
        let records = parse(content, "repo").unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].version, "1.6-2.1ubuntu3");
        assert_eq!(records[1].name, "git");
    }

    #[test]
    fn test_empty_input() {
        assert!(parse("", "repo").unwrap().is_empty());
        assert!(parse("\n\n", "repo").unwrap().is_empty());
    }

    #[test]
    fn test_folded_field_with_colon_text() {
        let content = "\
Package: docker-ce
Version: 5:24.0.7-1~ubuntu.22.04~jammy
Description: Docker: the open-source application container engine
 Version: 99.0 appears here only as description text
 Package: not-a-package
Section: admin
";
        let records = parse(content, "docker-apt-ubuntu-jammy").unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "docker-ce");
        assert_eq!(records[0].version, "5:24.0.7-1~ubuntu.22.04~jammy");
        assert_eq!(records[0].fields.get("Section").map(String::as_str), Some("admin"));
    }
}
