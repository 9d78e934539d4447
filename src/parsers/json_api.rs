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

use serde_json::Value;

use super::ParsingOptions;
use crate::error::{Result, SyncError};
use crate::models::PackageRecord;

pub fn parse(data: &[u8], options: &ParsingOptions, repository: &str) -> Result<Vec<PackageRecord>> {
    let root: Value = serde_json::from_slice(data).map_err(|e| SyncError::Parse {
        format: "json_api".to_string(),
        message: e.to_string(),
    })?;

    let items = match &options.items {
        Some(path) => lookup(&root, path).ok_or_else(|| SyncError::Parse {
            format: "json_api".to_string(),
            message: format!("items path '{path}' not found"),
        })?,
        None => &root,
    };

    let candidates: Vec<&Value> = match items {
        Value::Array(values) => values.iter().collect(),
        Value::Object(_) => vec![items],
        Value::Null => Vec::new(),
        other => {
            return Err(SyncError::Parse {
                format: "json_api".to_string(),
                message: format!("expected an object or array of records, found {other}"),
            });
        }
    };

    Ok(candidates
        .into_iter()
        .filter_map(|item| {
            let name = lookup(item, &options.fields.name).and_then(render_scalar)?;
            let version = lookup(item, &options.fields.version).and_then(render_scalar)?;
            Some(PackageRecord::new(name, version, repository))
        })
        .collect())
}

/// Follow a dotted path; numeric segments index into arrays.
fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

fn render_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
