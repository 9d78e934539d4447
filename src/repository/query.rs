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

use log::{debug, info, warn};
use retry::OperationResult;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use super::config::{EndpointVars, QueryType, RepositoryConfig};
use super::http::HttpClient;
use super::rate_limit::RequestThrottle;
use super::registry::RepositoryRegistry;
use super::retry::RetryPolicy;
use crate::cache::{CacheKind, CacheStore};
use crate::error::{Result, SyncError};
use crate::models::PackageRecord;
use crate::parsers::{PackageIndex, parse_index, parse_item};

const DEFAULT_NEGATIVE_TTL: Duration = Duration::from_secs(60 * 60);
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Try case-insensitive and prefix matches when a bulk index has no
    /// exact entry. Such records are flagged `inexact_match`.
    pub inexact_fallback: bool,
    /// TTL for cached "not found" API answers
    pub negative_ttl: Duration,
    /// Upper bound on any single request; repositories may set a lower one
    pub http_timeout: Duration,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            inexact_fallback: false,
            negative_ttl: DEFAULT_NEGATIVE_TTL,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

enum Fetched {
    Body(Vec<u8>),
    NotFound,
}

type IndexSlot = Arc<Mutex<Option<Arc<PackageIndex>>>>;

/// Looks packages up in one named repository at a time.
///
/// Bulk repositories are served from their full index (memoized for the
/// life of the service and cached on disk); API repositories are queried
/// per package through a per-repository throttle.
pub struct QueryService {
    registry: Arc<RepositoryRegistry>,
    client: Arc<dyn HttpClient>,
    cache: Option<Arc<CacheStore>>,
    retry: RetryPolicy,
    options: QueryOptions,
    indexes: Mutex<HashMap<String, IndexSlot>>,
    throttles: Mutex<HashMap<String, Arc<RequestThrottle>>>,
    eol_noted: Mutex<HashSet<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl QueryService {
    pub fn new(
        registry: Arc<RepositoryRegistry>,
        client: Arc<dyn HttpClient>,
        cache: Option<Arc<CacheStore>>,
        retry: RetryPolicy,
        options: QueryOptions,
    ) -> Self {
        Self {
            registry,
            client,
            cache,
            retry,
            options,
            indexes: Mutex::new(HashMap::new()),
            throttles: Mutex::new(HashMap::new()),
            eol_noted: Mutex::new(HashSet::new()),
        }
    }

    pub fn registry(&self) -> &RepositoryRegistry {
        &self.registry
    }

    /// Look `identifier` up in `repository`.
    ///
    /// `Ok(None)` means the repository answered and does not carry the
    /// package. Unreachable repositories yield `RepositoryUnavailable`.
    pub fn query(
        &self,
        repository: &str,
        identifier: &str,
        use_cache: bool,
    ) -> Result<Option<PackageRecord>> {
        let repo = self
            .registry
            .get(repository)
            .ok_or_else(|| SyncError::UnknownRepository(repository.to_string()))?;
        if !repo.enabled {
            return Err(SyncError::RepositoryDisabled(repository.to_string()));
        }
        self.note_eol(repo);

        match repo.query_type {
            QueryType::BulkDownload => {
                let index = self.load_index(repo, use_cache)?;
                Ok(index.lookup(identifier, self.options.inexact_fallback))
            }
            QueryType::Api => self.query_api(repo, identifier, use_cache),
        }
    }

    fn note_eol(&self, repo: &RepositoryConfig) {
        if repo.eol && lock(&self.eol_noted).insert(repo.name.clone()) {
            info!(
                "Repository {} is end-of-life; results may no longer receive updates",
                repo.name
            );
        }
    }

    fn index_slot(&self, name: &str) -> IndexSlot {
        lock(&self.indexes)
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    fn load_index(&self, repo: &RepositoryConfig, use_cache: bool) -> Result<Arc<PackageIndex>> {
        let slot = self.index_slot(&repo.name);
        // Holding the slot keeps concurrent lookups from downloading the
        // same index twice
        let mut memo = lock(&slot);
        if let Some(index) = memo.as_ref() {
            return Ok(Arc::clone(index));
        }

        if use_cache && let Some(records) = self.cached_index(repo)? {
            let index = Arc::new(PackageIndex::from_records(records));
            *memo = Some(Arc::clone(&index));
            return Ok(index);
        }

        let template = repo.endpoints.packages.as_deref().ok_or_else(|| {
            SyncError::Configuration {
                origin: repo.name.clone(),
                message: "missing endpoints.packages".to_string(),
            }
        })?;
        let url = repo.render_endpoint(template, &EndpointVars::default())?;
        info!("Downloading package index for {} from {url}", repo.name);

        let bytes = match self.fetch(repo, &url, None)? {
            Fetched::Body(bytes) => bytes,
            Fetched::NotFound => {
                return Err(SyncError::RepositoryUnavailable {
                    repository: repo.name.clone(),
                    message: format!("package index not found at {url}"),
                });
            }
        };
        let records = parse_index(&bytes, &repo.parsing, &repo.name)?;
        self.store_index(repo, &records);

        let index = Arc::new(PackageIndex::from_records(records));
        *memo = Some(Arc::clone(&index));
        Ok(index)
    }

    fn cached_index(&self, repo: &RepositoryConfig) -> Result<Option<Vec<PackageRecord>>> {
        let Some(cache) = &self.cache else {
            return Ok(None);
        };
        let Some(entry) = cache.get_fresh(CacheKind::BulkIndex, &repo.name)? else {
            return Ok(None);
        };
        match serde_json::from_value(entry.payload) {
            Ok(records) => Ok(Some(records)),
            Err(e) => {
                warn!("Discarding cached index for {}: {e}", repo.name);
                Ok(None)
            }
        }
    }

    fn store_index(&self, repo: &RepositoryConfig, records: &[PackageRecord]) {
        let Some(cache) = &self.cache else {
            return;
        };
        let payload = match serde_json::to_value(records) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Cannot cache index for {}: {e}", repo.name);
                return;
            }
        };
        let size = payload.to_string().len() as u64;
        if size > repo.cache.max_size_bytes() {
            warn!(
                "Index for {} is {size} bytes, above its {} MB cache limit; not caching",
                repo.name, repo.cache.max_size_mb
            );
            return;
        }
        if let Err(e) = cache.put(CacheKind::BulkIndex, &repo.name, payload, repo.cache.ttl()) {
            warn!("Failed to cache index for {}: {e}", repo.name);
        }
    }

    fn query_api(
        &self,
        repo: &RepositoryConfig,
        identifier: &str,
        use_cache: bool,
    ) -> Result<Option<PackageRecord>> {
        let key = format!("{}:{identifier}", repo.name);

        if use_cache
            && let Some(cache) = &self.cache
            && let Some(entry) = cache.get_fresh(CacheKind::ApiItem, &key)?
        {
            if entry.payload.is_null() {
                debug!("Cached negative result for {key}");
                return Ok(None);
            }
            match serde_json::from_value::<PackageRecord>(entry.payload) {
                Ok(record) => return Ok(Some(record)),
                Err(e) => warn!("Discarding cached item {key}: {e}"),
            }
        }

        let throttle = self.throttle(repo);
        let vars = EndpointVars {
            package: Some(identifier),
            ..Default::default()
        };

        let mut templates = Vec::new();
        templates.extend(repo.endpoints.search.as_deref());
        templates.extend(repo.endpoints.info.as_deref());

        let mut found = None;
        for template in templates {
            let url = repo.render_endpoint(template, &vars)?;
            if let Fetched::Body(bytes) = self.fetch(repo, &url, Some(&throttle))? {
                found = parse_item(&bytes, &repo.parsing, &repo.name, identifier)?;
            }
            if found.is_some() {
                break;
            }
        }

        if let Some(cache) = &self.cache {
            let (payload, ttl) = match &found {
                Some(record) => (serde_json::to_value(record)?, repo.cache.ttl()),
                None => (serde_json::Value::Null, self.options.negative_ttl),
            };
            if let Err(e) = cache.put(CacheKind::ApiItem, &key, payload, ttl) {
                warn!("Failed to cache {key}: {e}");
            }
        }

        Ok(found)
    }

    fn throttle(&self, repo: &RepositoryConfig) -> Arc<RequestThrottle> {
        lock(&self.throttles)
            .entry(repo.name.clone())
            .or_insert_with(|| Arc::new(RequestThrottle::new(&repo.limits)))
            .clone()
    }

    /// GET with retries. 429, 5xx and transport failures are retried;
    /// exhausting the attempts makes the repository unavailable.
    fn fetch(
        &self,
        repo: &RepositoryConfig,
        url: &str,
        throttle: Option<&RequestThrottle>,
    ) -> Result<Fetched> {
        let timeout = repo.limits.timeout().min(self.options.http_timeout);

        let result = self.retry.run(|attempt| {
            if attempt > 0 {
                debug!("Retrying {url} (attempt {})", attempt + 1);
            }
            let _permit = throttle.map(RequestThrottle::acquire);

            let response = match self.client.get(url, timeout) {
                Ok(response) => response,
                Err(e) => return OperationResult::Retry(e),
            };

            match response.status {
                200..=299 if response.body.is_empty() => OperationResult::Ok(Fetched::NotFound),
                200..=299 => OperationResult::Ok(Fetched::Body(response.body)),
                404 | 410 => OperationResult::Ok(Fetched::NotFound),
                429 => {
                    if let Some(wait) = response.retry_after
                        && !self.retry.is_last_attempt(attempt)
                    {
                        debug!("Rate limited by {}, waiting {wait:?}", repo.name);
                        thread::sleep(wait);
                    }
                    OperationResult::Retry(SyncError::NetworkError(format!(
                        "{url}: too many requests"
                    )))
                }
                status @ 500..=599 => OperationResult::Retry(SyncError::NetworkError(format!(
                    "{url}: server error {status}"
                ))),
                status => OperationResult::Err(SyncError::NetworkError(format!(
                    "{url}: unexpected status {status}"
                ))),
            }
        });

        result.map_err(|e| match e {
            SyncError::NetworkError(message) => SyncError::RepositoryUnavailable {
                repository: repo.name.clone(),
                message,
            },
            other => other,
        })
    }
}
