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

//! Wiring shared by the subcommands.

use colored::*;
use log::warn;
use std::sync::Arc;

use crate::cache::CacheStore;
use crate::config::SyncConfig;
use crate::error::Result;
use crate::repository::{AttoHttpClient, HttpClient, RepositoryRegistry};
use crate::user_agent;

pub(crate) fn load_registry(config: &SyncConfig) -> Result<RepositoryRegistry> {
    let dirs = config.repository_dirs();
    if !dirs.iter().any(|dir| dir.exists()) {
        let listed: Vec<String> = dirs.iter().map(|d| d.display().to_string()).collect();
        warn!("No repository definition directory exists ({})", listed.join(", "));
    }
    RepositoryRegistry::load(&dirs)
}

pub(crate) fn open_cache(config: &SyncConfig) -> Option<Arc<CacheStore>> {
    config
        .cache
        .enabled
        .then(|| Arc::new(CacheStore::new(config.cache_dir())))
}

pub(crate) fn http_client(config: &SyncConfig) -> Arc<dyn HttpClient> {
    let user_agent = config
        .http
        .user_agent
        .clone()
        .unwrap_or_else(user_agent::refresh_client);
    Arc::new(AttoHttpClient::new(&user_agent))
}

/// Ask on stdin; anything but `y`/`Y` is a no.
pub(crate) fn prompt_yes_no(question: &str) -> Result<bool> {
    use std::io::{self, Write};

    print!("{question} [y/N] ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

pub(crate) fn status_mark(ok: bool) -> ColoredString {
    if ok { "✓".green() } else { "✗".red() }
}

pub(crate) fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
    }

    #[test]
    fn test_open_cache_respects_enabled() {
        let temp = TempDir::new().unwrap();
        let mut config = SyncConfig::new(temp.path().to_path_buf()).unwrap();
        assert!(open_cache(&config).is_some());
        config.cache.enabled = false;
        assert!(open_cache(&config).is_none());
    }

    #[test]
    fn test_load_registry_reads_home_repositories() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("repositories");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("brew.yaml"),
            "repositories:\n  - name: brew\n    type: brew\n    query_type: api\n    endpoints: {search: \"https://formulae/{package}.json\"}\n    parsing: {format: json_api}\n",
        )
        .unwrap();

        let config = SyncConfig::new(temp.path().to_path_buf()).unwrap();
        let registry = load_registry(&config).unwrap();
        assert!(registry.contains("brew"));
    }
}
