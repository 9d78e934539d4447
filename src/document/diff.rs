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

use super::{DocPath, Node, NodeVisitor, Visit, walk};
use serde::Serialize;

/// Structural comparison of two documents, keyed by rendered path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentDiff {
    /// Leaves (or empty containers) with equal values in both documents
    pub identical_paths: Vec<String>,
    /// Leaves whose values or node kinds differ
    pub differing_paths: Vec<String>,
    /// Topmost paths present only in the second document
    pub b_only_paths: Vec<String>,
}

impl DocumentDiff {
    pub fn has_duplication(&self) -> bool {
        !self.identical_paths.is_empty()
    }
}

/// Compare `b` against `a`, walking `b` and looking up the counterpart of
/// each node at the same path in `a`. Paths only present in `a` are not
/// reported.
pub fn diff(a: &Node, b: &Node) -> DocumentDiff {
    let mut collector = DiffCollector {
        a,
        result: DocumentDiff::default(),
    };
    walk(b, &mut collector);
    collector.result
}

struct DiffCollector<'a> {
    a: &'a Node,
    result: DocumentDiff,
}

impl NodeVisitor for DiffCollector<'_> {
    fn visit(&mut self, path: &DocPath, node: &Node) -> Visit {
        let Some(counterpart) = self.a.get_path(path) else {
            self.result.b_only_paths.push(path.to_string());
            return Visit::Skip;
        };

        match (counterpart, node) {
            (Node::Map(a_map), Node::Map(b_map)) => {
                if b_map.is_empty() {
                    if a_map.is_empty() {
                        self.result.identical_paths.push(path.to_string());
                    } else {
                        self.result.differing_paths.push(path.to_string());
                    }
                    return Visit::Skip;
                }
                Visit::Descend
            }
            (Node::List(a_items), Node::List(b_items)) if a_items.len() == b_items.len() => {
                if b_items.is_empty() {
                    self.result.identical_paths.push(path.to_string());
                    return Visit::Skip;
                }
                Visit::Descend
            }
            (left, right) => {
                if left == right {
                    self.result.identical_paths.push(path.to_string());
                } else {
                    self.result.differing_paths.push(path.to_string());
                }
                Visit::Skip
            }
        }
    }
}
