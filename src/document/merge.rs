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

use super::{Node, NodeMap};

/// Overlay `override_doc` on `base`.
///
/// Maps merge key by key, lists and scalars from the override replace the
/// base value wholesale, and an explicit `null` in the override deletes the
/// key. Applying the same override twice yields the same document.
pub fn merge(base: &Node, override_doc: &Node) -> Node {
    match (base, override_doc) {
        (Node::Map(base_map), Node::Map(override_map)) => {
            let mut merged = base_map.clone();
            for (key, value) in override_map {
                if value.is_null() {
                    merged.shift_remove(key);
                    continue;
                }
                let next = match merged.get(key) {
                    Some(existing) => merge(existing, value),
                    None => prune_nulls(value),
                };
                merged.insert(key.clone(), next);
            }
            Node::Map(merged)
        }
        (_, other) => prune_nulls(other),
    }
}

/// Remove null-valued keys from nested maps. List contents are data and
/// are left untouched.
pub fn prune_nulls(node: &Node) -> Node {
    match node {
        Node::Map(map) => Node::Map(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), prune_nulls(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Drop map keys from `override_doc` whose whole subtree already equals the
/// value inherited from `base`, so that `merge(base, result)` is unchanged.
///
/// Lists are never pruned element by element since an override list
/// replaces the base list as a unit. Top-level keys named in
/// `preserve_root_keys` are always kept.
pub fn prune_identical(base: &Node, override_doc: &Node, preserve_root_keys: &[&str]) -> Node {
    match (base, override_doc) {
        (Node::Map(base_map), Node::Map(override_map)) => {
            Node::Map(prune_map(base_map, override_map, preserve_root_keys))
        }
        (_, other) => other.clone(),
    }
}

fn prune_map(base: &NodeMap, overlay: &NodeMap, preserve: &[&str]) -> NodeMap {
    let mut kept = NodeMap::new();
    for (key, value) in overlay {
        if preserve.contains(&key.as_str()) {
            kept.insert(key.clone(), value.clone());
            continue;
        }
        let existing = base.get(key);
        if value.is_null() {
            // Deleting a key the base never had is a no-op.
            if existing.is_some() {
                kept.insert(key.clone(), value.clone());
            }
            continue;
        }
        match existing {
            Some(existing) if merge(existing, value) == *existing => {}
            Some(Node::Map(base_child)) => match value {
                Node::Map(override_child) => {
                    let pruned = prune_map(base_child, override_child, &[]);
                    if !pruned.is_empty() {
                        kept.insert(key.clone(), Node::Map(pruned));
                    }
                }
                other => {
                    kept.insert(key.clone(), other.clone());
                }
            },
            _ => {
                kept.insert(key.clone(), value.clone());
            }
        }
    }
    kept
}
