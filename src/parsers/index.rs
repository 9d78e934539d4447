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

use std::borrow::Cow;
use std::collections::HashMap;

use super::version::compare_versions;
use crate::models::PackageRecord;

/// Name-indexed view of a parsed bulk index.
#[derive(Debug, Clone, Default)]
pub struct PackageIndex {
    by_name: HashMap<String, PackageRecord>,
}

impl PackageIndex {
    /// Build an index; when a name appears more than once the highest
    /// version wins.
    pub fn from_records(records: Vec<PackageRecord>) -> Self {
        let mut by_name: HashMap<String, PackageRecord> = HashMap::with_capacity(records.len());
        for record in records {
            let newer = by_name.get(&record.name).is_none_or(|existing| {
                compare_versions(&full_version(existing), &full_version(&record)).is_lt()
            });
            if newer {
                by_name.insert(record.name.clone(), record);
            }
        }
        Self { by_name }
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&PackageRecord> {
        self.by_name.get(name)
    }

    /// Exact lookup, optionally followed by a case-insensitive and then a
    /// prefix match. Records found the second way are flagged inexact.
    pub fn lookup(&self, name: &str, inexact_fallback: bool) -> Option<PackageRecord> {
        if let Some(record) = self.by_name.get(name) {
            return Some(record.clone());
        }
        if !inexact_fallback {
            return None;
        }

        let wanted = name.to_lowercase();
        let case_insensitive = self
            .by_name
            .keys()
            .filter(|candidate| candidate.to_lowercase() == wanted)
            .min();
        let prefix = || {
            self.by_name
                .keys()
                .filter(|candidate| candidate.to_lowercase().starts_with(&wanted))
                .min_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
        };

        case_insensitive
            .or_else(prefix)
            .and_then(|key| self.by_name.get(key))
            .map(|record| {
                log::debug!("Inexact match for '{name}': '{}'", record.name);
                record.clone().into_inexact()
            })
    }

    /// All records sorted by name.
    pub fn records(&self) -> Vec<&PackageRecord> {
        let mut records: Vec<&PackageRecord> = self.by_name.values().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }
}

/// Version used for ordering duplicates. RPM records keep the epoch and
/// release as separate fields, so they are folded back in here.
fn full_version(record: &PackageRecord) -> Cow<'_, str> {
    let epoch = record.fields.get("epoch");
    let release = record
        .fields
        .get("release")
        .filter(|rel| !record.version.ends_with(&format!("-{rel}")));
    if epoch.is_none() && release.is_none() {
        return Cow::Borrowed(&record.version);
    }

    let mut version = String::new();
    if let Some(epoch) = epoch {
        version.push_str(epoch);
        version.push(':');
    }
    version.push_str(&record.version);
    if let Some(release) = release {
        version.push('-');
        version.push_str(release);
    }
    Cow::Owned(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, version: &str) -> PackageRecord {
        PackageRecord::new(name, version, "repo")
    }

    #[test]
    fn test_duplicate_names_keep_highest_version() {
        let index = PackageIndex::from_records(vec![
            record("nginx", "1.18.0"),
            record("nginx", "1.24.0"),
            record("nginx", "1.20.1"),
        ]);

        assert_eq!(index.len(), 1);
        assert_eq!(index.get("nginx").unwrap().version, "1.24.0");
    }

    #[test]
    fn test_release_outranks_prerelease_and_epoch_outranks_both() {
        let index = PackageIndex::from_records(vec![
            record("pkg", "1.0"),
            record("pkg", "1.0~rc1"),
            record("git", "1:2.34.1-1ubuntu1"),
            record("git", "2.43.0-1"),
        ]);

        assert_eq!(index.get("pkg").unwrap().version, "1.0");
        assert_eq!(index.get("git").unwrap().version, "1:2.34.1-1ubuntu1");
    }

    #[test]
    fn test_rpm_epoch_and_release_fields_order_duplicates() {
        let index = PackageIndex::from_records(vec![
            record("curl", "8.2.1").with_field("epoch", "1").with_field("release", "1.fc39"),
            record("curl", "8.5.0").with_field("release", "1.fc39"),
            record("jq", "1.7.1").with_field("release", "1.fc39"),
            record("jq", "1.7.1").with_field("release", "3.fc39"),
        ]);

        assert_eq!(index.get("curl").unwrap().version, "8.2.1");
        assert_eq!(index.get("jq").unwrap().fields["release"], "3.fc39");
    }

    #[test]
    fn test_exact_lookup_without_fallback() {
        let index = PackageIndex::from_records(vec![record("Terraform", "1.6.5")]);

        assert!(index.lookup("terraform", false).is_none());
        let exact = index.lookup("Terraform", false).unwrap();
        assert!(!exact.inexact_match);
    }

    #[test]
    fn test_inexact_lookup_is_flagged() {
        let index = PackageIndex::from_records(vec![
            record("Terraform", "1.6.5"),
            record("python3.11", "3.11.4"),
            record("python3", "3.11.2"),
        ]);

        let by_case = index.lookup("terraform", true).unwrap();
        assert_eq!(by_case.name, "Terraform");
        assert!(by_case.inexact_match);

        let by_prefix = index.lookup("python", true).unwrap();
        assert_eq!(by_prefix.name, "python3");
        assert!(by_prefix.inexact_match);

        assert!(index.lookup("ruby", true).is_none());
    }

    #[test]
    fn test_records_sorted() {
        let index = PackageIndex::from_records(vec![record("zsh", "5"), record("bash", "5")]);
        let names: Vec<_> = index.records().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["bash", "zsh"]);
    }
}
