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

//! Schema-agnostic document tree shared by the merge, diff and refresh code.
//!
//! Documents are held as a small tagged tree of scalars, lists and
//! insertion-ordered maps. Nothing here knows what a metadata document is
//! supposed to contain; that is left to the validator.

mod diff;
mod io;
mod merge;

pub use diff::{DocumentDiff, diff};
pub use io::{load_document, parse_document, to_yaml_string, write_atomic};
pub use merge::{merge, prune_identical, prune_nulls};

use indexmap::IndexMap;
use serde_yaml::Value;
use std::fmt;

pub type NodeMap = IndexMap<String, Node>;

#[derive(Debug, Clone)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    /// Integers above `i64::MAX`
    Uint(u64),
    Float(f64),
    String(String),
}

/// Floats compare by bit pattern so that `.nan` equals itself and every
/// document equals its own copy.
impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Scalar::Null, Scalar::Null) => true,
            (Scalar::Bool(a), Scalar::Bool(b)) => a == b,
            (Scalar::Int(a), Scalar::Int(b)) => a == b,
            (Scalar::Uint(a), Scalar::Uint(b)) => a == b,
            (Scalar::Float(a), Scalar::Float(b)) => a.to_bits() == b.to_bits(),
            (Scalar::String(a), Scalar::String(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Scalar {}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Uint(u) => write!(f, "{u}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::String(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Scalar(Scalar),
    List(Vec<Node>),
    Map(NodeMap),
}

impl Node {
    pub fn null() -> Self {
        Node::Scalar(Scalar::Null)
    }

    pub fn string(value: impl Into<String>) -> Self {
        Node::Scalar(Scalar::String(value.into()))
    }

    pub fn empty_map() -> Self {
        Node::Map(NodeMap::new())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Scalar(Scalar::Null))
    }

    pub fn as_map(&self) -> Option<&NodeMap> {
        match self {
            Node::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut NodeMap> {
        match self {
            Node::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Node]> {
        match self {
            Node::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Render a non-null scalar as text. Unquoted YAML versions such as
    /// `1.20` arrive as numbers and still need to compare as strings.
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            Node::Scalar(Scalar::Null) => None,
            Node::Scalar(scalar) => Some(scalar.to_string()),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_map().and_then(|map| map.get(key))
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.as_map_mut().and_then(|map| map.get_mut(key))
    }

    pub fn get_path(&self, path: &DocPath) -> Option<&Node> {
        let mut current = self;
        for segment in path.segments() {
            current = match (segment, current) {
                (PathSegment::Key(key), Node::Map(map)) => map.get(key)?,
                (PathSegment::Index(index), Node::List(items)) => items.get(*index)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Node::null(),
            Value::Bool(b) => Node::Scalar(Scalar::Bool(b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Node::Scalar(Scalar::Int(i))
                } else if let Some(u) = n.as_u64() {
                    Node::Scalar(Scalar::Uint(u))
                } else {
                    Node::Scalar(Scalar::Float(n.as_f64().unwrap_or(f64::NAN)))
                }
            }
            Value::String(s) => Node::string(s),
            Value::Sequence(items) => Node::List(items.into_iter().map(Node::from).collect()),
            Value::Mapping(mapping) => Node::Map(
                mapping
                    .into_iter()
                    .map(|(k, v)| (key_to_string(k), Node::from(v)))
                    .collect(),
            ),
            Value::Tagged(tagged) => Node::from(tagged.value),
        }
    }
}

fn key_to_string(key: Value) -> String {
    match key {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

impl From<&Node> for Value {
    fn from(node: &Node) -> Self {
        match node {
            Node::Scalar(Scalar::Null) => Value::Null,
            Node::Scalar(Scalar::Bool(b)) => Value::Bool(*b),
            Node::Scalar(Scalar::Int(i)) => Value::Number((*i).into()),
            Node::Scalar(Scalar::Uint(u)) => Value::Number((*u).into()),
            Node::Scalar(Scalar::Float(f)) => Value::Number((*f).into()),
            Node::Scalar(Scalar::String(s)) => Value::String(s.clone()),
            Node::List(items) => Value::Sequence(items.iter().map(Value::from).collect()),
            Node::Map(map) => Value::Mapping(
                map.iter()
                    .map(|(k, v)| (Value::String(k.clone()), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Location of a node, rendered as `providers.apt.packages[0].version`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocPath(Vec<PathSegment>);

impl DocPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn key(&self, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Key(key.to_string()));
        Self(segments)
    }

    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(index));
        Self(segments)
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "(root)");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if i == 0 => write!(f, "{key}")?,
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// Whether a walk should continue into the children of the visited node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Descend,
    Skip,
}

pub trait NodeVisitor {
    fn visit(&mut self, path: &DocPath, node: &Node) -> Visit;
}

impl<F> NodeVisitor for F
where
    F: FnMut(&DocPath, &Node) -> Visit,
{
    fn visit(&mut self, path: &DocPath, node: &Node) -> Visit {
        self(path, node)
    }
}

/// Depth-first, document-order walk over every node of `node`.
pub fn walk(node: &Node, visitor: &mut dyn NodeVisitor) {
    walk_at(&DocPath::root(), node, visitor);
}

fn walk_at(path: &DocPath, node: &Node, visitor: &mut dyn NodeVisitor) {
    if visitor.visit(path, node) == Visit::Skip {
        return;
    }
    match node {
        Node::Map(map) => {
            for (key, child) in map {
                walk_at(&path.key(key), child, visitor);
            }
        }
        Node::List(items) => {
            for (index, child) in items.iter().enumerate() {
                walk_at(&path.index(index), child, visitor);
            }
        }
        Node::Scalar(_) => {}
    }
}
