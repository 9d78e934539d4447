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

use super::support::format_size;
use crate::cache::CacheStore;
use crate::config::SyncConfig;
use crate::error::Result;

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Show cache location, entry counts and size
    Info {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove cached indexes and API answers
    Clear {
        /// Only clear entries belonging to this repository
        #[arg(long, value_name = "NAME")]
        repository: Option<String>,
    },
}

impl CacheCommand {
    pub fn execute(self, config: &SyncConfig) -> Result<()> {
        let store = CacheStore::new(config.cache_dir());
        match self {
            CacheCommand::Info { json } => show_cache_info(config, &store, json),
            CacheCommand::Clear { repository } => clear_cache(&store, repository.as_deref()),
        }
    }
}

fn show_cache_info(config: &SyncConfig, store: &CacheStore, json: bool) -> Result<()> {
    let stats = store.stats()?;

    if json {
        let output = serde_json::json!({
            "location": store.root(),
            "enabled": config.cache.enabled,
            "index_entries": stats.index_entries,
            "api_entries": stats.api_entries,
            "stale_entries": stats.stale_entries,
            "total_bytes": stats.total_bytes,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if stats.index_entries + stats.api_entries == 0 {
        println!("{} No cache found at {}", "✗".red(), store.root().display());
        return Ok(());
    }

    println!("Cache Information:");
    println!("  Location: {}", store.root().display());
    if !config.cache.enabled {
        println!("  Status: {}", "disabled".yellow());
    }
    println!("  Size: {}", format_size(stats.total_bytes));
    println!("  Index entries: {}", stats.index_entries);
    println!("  API entries: {}", stats.api_entries);
    println!("  Stale entries: {}", stats.stale_entries);
    Ok(())
}

fn clear_cache(store: &CacheStore, repository: Option<&str>) -> Result<()> {
    let removed = match repository {
        Some(name) => store.clear_repository(name)?,
        None => store.clear(None)?,
    };

    if removed == 0 {
        println!("No cache to clear");
    } else {
        println!(
            "{} Removed {removed} cache entries",
            "✓".green().bold()
        );
    }
    Ok(())
}
