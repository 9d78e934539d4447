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

//! Shared repository definitions and metadata documents.

#![allow(dead_code)]

use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;

pub const HASHICORP_PATH: &str = "/hashicorp/dists/jammy/main/binary-amd64/Packages";
pub const UBUNTU_PATH: &str = "/ubuntu/dists/jammy/main/binary-amd64/Packages.gz";
pub const SNAP_PATH_PREFIX: &str = "/snap/v2/find";

/// Settings that keep retries instant in tests.
pub const FAST_CONFIG: &str = r#"
[retry]
max_attempts = 2
base_delay_ms = 0
jitter = false

[http]
timeout_secs = 5
"#;

/// A vendor repository (priority 100), the distribution archive (priority
/// 90) and an API repository, all served from `base_url`.
pub fn repositories_yaml(base_url: &str) -> String {
    format!(
        r#"version: "1.0"
repositories:
  - name: hashicorp-apt-ubuntu-jammy
    type: apt
    platform: linux
    distribution: [ubuntu]
    architecture: [amd64]
    version_mapping: {{"22.04": jammy}}
    query_type: bulk_download
    endpoints:
      packages: "{base_url}/hashicorp/dists/{{codename}}/main/binary-amd64/Packages"
    parsing:
      format: debian_packages
    priority: 100
  - name: apt-ubuntu-jammy
    type: apt
    platform: linux
    distribution: [ubuntu]
    architecture: [amd64]
    version_mapping: {{"22.04": jammy}}
    query_type: bulk_download
    endpoints:
      packages: "{base_url}/ubuntu/dists/{{codename}}/main/binary-amd64/Packages.gz"
    parsing:
      format: debian_packages
    priority: 90
"#
    )
}

pub const BROKEN_REPOSITORIES: &str = r#"repositories:
  - name: ""
    type: apt
    endpoints: {packages: "https://example/Packages"}
    parsing: {format: debian_packages}
  - name: dnf-fedora-39
    type: dnf
    query_type: api
    parsing: {format: json_api}
  - name: apk-alpine-3.19
    type: apk
    distribution: [alpine]
    version_mapping: {3.19: v3.19}
    endpoints: {packages: "https://example/{codename}/main/x86_64/APKINDEX.tar.gz"}
    parsing: {format: alpine_apkindex}
"#;

/// deb822 stanzas for `(package, version)` pairs.
pub fn debian_packages(entries: &[(&str, &str)]) -> String {
    entries
        .iter()
        .map(|(name, version)| {
            format!("Package: {name}\nVersion: {version}\nArchitecture: amd64\n")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn gzip(text: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

pub const TERRAFORM_DEFAULT: &str = r#"version: "0.3"
metadata:
  name: terraform
  description: Infrastructure as code
packages:
  - name: terraform
    package_name: terraform
providers:
  apt:
    packages:
      - name: terraform
        package_name: terraform
"#;

pub const TERRAFORM_JAMMY: &str = r#"version: "0.3"
providers:
  apt:
    packages:
      - name: terraform
        package_name: terraform
        version: "1.3.0"
      - name: git
        package_name: git
        version: "1:2.34.1-1ubuntu1"
"#;
