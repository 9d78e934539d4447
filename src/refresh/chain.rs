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

use serde::Serialize;

use super::context::OsContext;
use crate::repository::{CodenameResolver, RepositoryRegistry};

/// Ordered list of repositories to try for one provider of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepositoryChain {
    pub repositories: Vec<String>,
    pub warnings: Vec<String>,
}

impl RepositoryChain {
    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    fn push(&mut self, name: &str) {
        if !self.repositories.iter().any(|existing| existing == name) {
            self.repositories.push(name.to_string());
        }
    }
}

/// Every enabled repository mapping the context's OS version, highest
/// priority first, then the resolver's answer, then a repository named
/// after the bare provider if one is registered.
pub fn build_chain(
    registry: &RepositoryRegistry,
    provider: &str,
    context: &OsContext,
) -> RepositoryChain {
    let mut chain = RepositoryChain::default();
    let os = context.os.as_deref();
    let version = context.version.as_deref();

    if let (Some(os), Some(version)) = (os, version) {
        for repo in registry.find_candidates(provider, Some(os)) {
            if repo.codename_for(version).is_some() {
                chain.push(&repo.name);
            }
        }
    }

    let resolution = CodenameResolver::new(registry).resolve(provider, os, version);
    if let Some(warning) = resolution.warning {
        chain.warnings.push(warning.to_string());
    }

    if registry.get(&resolution.repository).is_some_and(|repo| repo.enabled) {
        chain.push(&resolution.repository);
    }
    if registry.get(provider).is_some_and(|repo| repo.enabled) {
        chain.push(provider);
    }

    if chain.is_empty() {
        chain.warnings.push(format!(
            "no enabled repository for provider '{provider}' ({context})"
        ));
    }
    chain
}
