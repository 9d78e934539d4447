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

//! Gate for every document write. The refresh flow only depends on the
//! [`DocumentValidator`] trait; [`StructuralValidator`] is the built-in
//! implementation checking the shape the refresh code relies on.

use serde::Serialize;
use std::path::Path;

use crate::document::{DocPath, Node};
use crate::error::{Result, SyncError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    pub fn into_result(self, path: &Path) -> Result<()> {
        if self.valid {
            Ok(())
        } else {
            Err(SyncError::Validation {
                path: path.display().to_string(),
                errors: self.errors,
            })
        }
    }
}

pub trait DocumentValidator: Send + Sync {
    fn validate(&self, document: &Node) -> ValidationReport;
}

/// Checks the top-level layout of a metadata document without knowing
/// anything about provider-specific fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralValidator;

impl DocumentValidator for StructuralValidator {
    fn validate(&self, document: &Node) -> ValidationReport {
        let mut errors = Vec::new();
        let root = DocPath::root();

        let Some(map) = document.as_map() else {
            return ValidationReport::from_errors(vec![
                "document root must be a mapping".to_string(),
            ]);
        };

        match map.get("version") {
            None => errors.push("missing required key 'version'".to_string()),
            Some(node) if node.scalar_text().is_none() => {
                errors.push("'version' must be a scalar".to_string())
            }
            Some(_) => {}
        }

        if let Some(metadata) = map.get("metadata") {
            match metadata.as_map() {
                Some(fields) => {
                    if let Some(name) = fields.get("name")
                        && name.as_str().is_none()
                    {
                        errors.push("'metadata.name' must be a string".to_string());
                    }
                }
                None => errors.push("'metadata' must be a mapping".to_string()),
            }
        }

        if let Some(packages) = map.get("packages") {
            check_package_list(&root.key("packages"), packages, &mut errors);
        }

        if let Some(providers) = map.get("providers") {
            match providers.as_map() {
                Some(providers_map) => {
                    for (provider, section) in providers_map {
                        let path = root.key("providers").key(provider);
                        check_provider(&path, section, &mut errors);
                    }
                }
                None => errors.push("'providers' must be a mapping".to_string()),
            }
        }

        ValidationReport::from_errors(errors)
    }
}

fn check_provider(path: &DocPath, section: &Node, errors: &mut Vec<String>) {
    if section.is_null() {
        return;
    }
    let Some(fields) = section.as_map() else {
        errors.push(format!("'{path}' must be a mapping"));
        return;
    };
    if let Some(packages) = fields.get("packages") {
        check_package_list(&path.key("packages"), packages, errors);
    }
}

fn check_package_list(path: &DocPath, packages: &Node, errors: &mut Vec<String>) {
    let Some(items) = packages.as_list() else {
        errors.push(format!("'{path}' must be a list"));
        return;
    };

    for (index, item) in items.iter().enumerate() {
        let item_path = path.index(index);
        let Some(fields) = item.as_map() else {
            errors.push(format!("'{item_path}' must be a mapping"));
            continue;
        };
        match fields.get("name") {
            Some(name) if name.as_str().is_some_and(|n| !n.is_empty()) => {}
            Some(_) => errors.push(format!("'{item_path}.name' must be a non-empty string")),
            None => errors.push(format!("'{item_path}' is missing 'name'")),
        }
        if let Some(package_name) = fields.get("package_name")
            && package_name.as_str().is_none()
        {
            errors.push(format!("'{item_path}.package_name' must be a string"));
        }
        if let Some(version) = fields.get("version")
            && !version.is_null()
            && version.scalar_text().is_none()
        {
            errors.push(format!("'{item_path}.version' must be a scalar"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse_document;

    fn validate(text: &str) -> ValidationReport {
        StructuralValidator.validate(&parse_document(text, "test.yaml").unwrap())
    }

    #[test]
    fn test_valid_document() {
        let report = validate(
            r#"
version: "0.3"
metadata:
  name: terraform
packages:
  - name: terraform
providers:
  apt:
    packages:
      - name: terraform
        package_name: terraform
        version: "1.3.0"
  brew:
"#,
        );
        assert!(report.valid, "{:?}", report.errors);
    }

    #[test]
    fn test_missing_version() {
        let report = validate("metadata:\n  name: nginx\n");
        assert!(!report.valid);
        assert_eq!(report.errors, vec!["missing required key 'version'"]);
    }

    #[test]
    fn test_non_mapping_root() {
        let report = validate("- a\n- b\n");
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn test_package_errors_are_located() {
        let report = validate(
            r#"
version: "0.3"
providers:
  apt:
    packages:
      - package_name: nginx
      - name: nginx
        version: [1, 2]
"#,
        );
        assert!(!report.valid);
        assert!(
            report
                .errors
                .contains(&"'providers.apt.packages[0]' is missing 'name'".to_string())
        );
        assert!(
            report
                .errors
                .contains(&"'providers.apt.packages[1].version' must be a scalar".to_string())
        );
    }

    #[test]
    fn test_into_result() {
        let report = ValidationReport::from_errors(vec!["bad".to_string()]);
        let err = report.into_result(Path::new("x.yaml")).unwrap_err();
        assert!(matches!(err, SyncError::Validation { .. }));

        assert!(!ValidationReport::default().valid);
        assert!(ValidationReport::from_errors(vec![]).into_result(Path::new("x")).is_ok());
    }
}
