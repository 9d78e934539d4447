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

/// Parse an APKINDEX. Each block is a run of `X:value` lines; `P` is the
/// package name, `V` the version, `A` the architecture and `o` the origin.
pub fn parse(content: &str, repository: &str) -> Vec<PackageRecord> {
    let mut records = Vec::new();
    let mut block = Block::default();

    for line in content.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            block.flush(repository, &mut records);
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key {
            "P" => block.name = Some(value),
            "V" => block.version = Some(value),
            "A" => block.fields.push(("arch", value)),
            "o" => block.fields.push(("origin", value)),
            _ => {}
        }
    }
    block.flush(repository, &mut records);

    records
}

#[derive(Default)]
struct Block<'a> {
    name: Option<&'a str>,
    version: Option<&'a str>,
    fields: Vec<(&'static str, &'a str)>,
}

impl Block<'_> {
    fn flush(&mut self, repository: &str, records: &mut Vec<PackageRecord>) {
        if let (Some(name), Some(version)) = (self.name.take(), self.version.take()) {
            let mut record = PackageRecord::new(name, version, repository);
            for (key, value) in &self.fields {
                record = record.with_field(*key, *value);
            }
            records.push(record);
        }
        self.fields.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_blocks() {
        let index = "\
C:Q1abc=
P:curl
V:8.5.0-r0
A:x86_64
S:123
o:curl

C:Q1def=
P:libcurl
V:8.5.0-r0
A:x86_64
o:curl
";
        let records = parse(index, "apk-alpine-3.19");

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "curl");
        assert_eq!(records[0].version, "8.5.0-r0");
        assert_eq!(records[1].name, "libcurl");
        assert_eq!(records[1].fields.get("origin").map(String::as_str), Some("curl"));
    }

    #[test]
    fn test_block_without_version_skipped() {
        let records = parse("P:orphan\n\nP:ok\nV:1.0-r1\n", "repo");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "ok");
    }
}
