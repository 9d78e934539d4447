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

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A package as published by one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    /// Identifier the repository actually uses for the package
    pub name: String,
    pub version: String,
    /// Name of the repository definition that produced this record
    pub source_repository: String,
    /// Raw fields retained from the index entry or API payload
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
    /// Set when the record was found by a case-insensitive or prefix
    /// lookup instead of an exact name match
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub inexact_match: bool,
}

impl PackageRecord {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        source_repository: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            source_repository: source_repository.into(),
            fields: BTreeMap::new(),
            inexact_match: false,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub(crate) fn into_inexact(mut self) -> Self {
        self.inexact_match = true;
        self
    }
}
