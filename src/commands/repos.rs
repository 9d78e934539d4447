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


use clap::Subcommand;
use colored::*;
use comfy_table::{Cell, CellAlignment, Color, Table};

use super::support::load_registry;
use crate::config::SyncConfig;
use crate::error::Result;
use crate::refresh::{OsContext, build_chain};
use crate::repository::{CodenameResolver, RepositoryConfig, RepositoryRegistry};

#[derive(Subcommand, Debug)]
pub enum ReposCommand {
    /// List repository definitions in priority order
    List {
        /// Only show repositories of this provider
        #[arg(long)]
        provider: Option<String>,
        /// Only show repositories serving this distribution
        #[arg(long)]
        os: Option<String>,
    },
    /// Show which repositories would be searched for an OS version
    Resolve {
        /// Provider, e.g. apt
        provider: String,
        /// Distribution, e.g. ubuntu
        os: String,
        /// Distribution version, e.g. 22.04
        version: String,
    },
}

impl ReposCommand {
    pub fn execute(self, config: &SyncConfig) -> Result<()> {
        let registry = load_registry(config)?;
        match self {
            ReposCommand::List { provider, os } => {
                list_repositories(&registry, provider.as_deref(), os.as_deref());
            }
            ReposCommand::Resolve {
                provider,
                os,
                version,
            } => resolve(&registry, &provider, &os, &version),
        }
        Ok(())
    }
}

fn matches_filter(repo: &RepositoryConfig, provider: Option<&str>, os: Option<&str>) -> bool {
    provider.is_none_or(|p| repo.provider_type == p)
        && os.is_none_or(|os| repo.distributions.iter().any(|d| d == os))
}

fn status_cell(repo: &RepositoryConfig) -> Cell {
    if !repo.enabled {
        Cell::new("disabled").fg(Color::Red)
    } else if repo.eol {
        Cell::new("eol").fg(Color::Yellow)
    } else {
        Cell::new("enabled").fg(Color::Green)
    }
}

fn list_repositories(registry: &RepositoryRegistry, provider: Option<&str>, os: Option<&str>) {
    let repositories: Vec<&RepositoryConfig> = registry
        .all()
        .iter()
        .filter(|repo| matches_filter(repo, provider, os))
        .collect();

    if repositories.is_empty() {
        println!("No repositories configured");
    } else {
        let mut table = Table::new();
        table.load_preset(comfy_table::presets::UTF8_BORDERS_ONLY);
        table.set_header(vec![
            Cell::new("Name"),
            Cell::new("Provider"),
            Cell::new("Distributions"),
            Cell::new("Versions"),
            Cell::new("Query"),
            Cell::new("Format"),
            Cell::new("Priority"),
            Cell::new("Status"),
        ]);

        for repo in &repositories {
            let versions = repo
                .version_mapping
                .iter()
                .map(|(version, codename)| format!("{version} ({codename})"))
                .collect::<Vec<_>>()
                .join(", ");
            table.add_row(vec![
                Cell::new(&repo.name),
                Cell::new(&repo.provider_type),
                Cell::new(repo.distributions.join(", ")),
                Cell::new(versions),
                Cell::new(repo.query_type),
                Cell::new(repo.parsing.format),
                Cell::new(repo.priority).set_alignment(CellAlignment::Right),
                status_cell(repo),
            ]);
        }
        println!("{table}");
        println!("\nTotal: {} repositories", repositories.len());
    }

    if !registry.issues().is_empty() {
        println!("\n{}", "Configuration issues:".yellow().bold());
        for issue in registry.issues() {
            println!("  {} {issue}", "✗".red());
        }
    }
}

fn resolve(registry: &RepositoryRegistry, provider: &str, os: &str, version: &str) {
    let resolution = CodenameResolver::new(registry).resolve(provider, Some(os), Some(version));
    println!("{}: {}", "Repository".bold(), resolution.repository.cyan());
    if let Some(warning) = &resolution.warning {
        println!("{} {warning}", "Warning:".yellow());
    }

    let chain = build_chain(registry, provider, &OsContext::os_specific(os, version));
    println!("\n{}", "Search order:".bold());
    if chain.is_empty() {
        println!("  (none)");
    }
    for (position, name) in chain.repositories.iter().enumerate() {
        let detail = registry
            .get(name)
            .map(|repo| {
                let eol = if repo.eol { ", eol" } else { "" };
                format!("priority {}{eol}", repo.priority)
            })
            .unwrap_or_default();
        println!("  {}. {name} {}", position + 1, detail.as_str().dimmed());
    }
    for warning in &chain.warnings {
        if resolution.warning.as_ref().is_none_or(|w| w.to_string() != *warning) {
            println!("{} {warning}", "Warning:".yellow());
        }
    }
}
