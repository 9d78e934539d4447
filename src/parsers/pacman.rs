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

use crate::models::PackageRecord;

#[derive(Default)]
struct Desc {
    name: Option<String>,
    version: Option<String>,
    arch: Option<String>,
    base: Option<String>,
}

impl Desc {
    fn into_record(self, repository: &str) -> Option<PackageRecord> {
        let mut record = PackageRecord::new(self.name?, self.version?, repository);
        if let Some(arch) = self.arch {
            record = record.with_field("arch", arch);
        }
        if let Some(base) = self.base {
            record = record.with_field("base", base);
        }
        Some(record)
    }
}

/// Parse concatenated pacman `desc` entries (`%NAME%`, `%VERSION%`, ...).
/// A new `%FILENAME%` or a second `%NAME%` starts the next package.
pub fn parse(content: &str, repository: &str) -> Vec<PackageRecord> {
    let mut records = Vec::new();
    let mut current = Desc::default();
    let mut section: Option<&str> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            section = None;
            continue;
        }

        if line.len() > 2 && line.starts_with('%') && line.ends_with('%') {
            let header = &line[1..line.len() - 1];
            let starts_package = header == "FILENAME" || (header == "NAME" && current.name.is_some());
            if starts_package && (current.name.is_some() || current.version.is_some()) {
                records.extend(std::mem::take(&mut current).into_record(repository));
            }
            section = Some(header);
            continue;
        }

        // Multi-valued sections keep only their first line
        match section.take() {
            Some("NAME") => current.name = Some(line.to_string()),
            Some("VERSION") => current.version = Some(line.to_string()),
            Some("ARCH") => current.arch = Some(line.to_string()),
            Some("BASE") => current.base = Some(line.to_string()),
            _ => {}
        }
    }
    records.extend(current.into_record(repository));

    records
}
