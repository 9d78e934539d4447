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

//! Batch refresh of package versions in metadata documents.
//!
//! For every discovered file the orchestrator extracts the OS context,
//! builds a repository chain per provider, looks every package up
//! (concurrently, bounded), diffs the answers against the document and,
//! unless running check-only, writes the result through a validated,
//! rollback-protected write. Per-file failures are recorded in the
//! report; only an unreadable target aborts the run.

mod apply;
mod chain;
mod context;
mod discover;
mod result;

pub use apply::{BackupGuard, BackupSettings, backup_path_for, write_validated};
pub use chain::{RepositoryChain, build_chain};
pub use context::{Extracted, OsContext, default_path, extract, is_document_file, override_path};
pub use discover::{DiscoveredFile, DiscoveryPolicy, discover, skeleton_from_default};
pub use result::{
    FileStatus, PackageUpdate, RefreshResult, RunReport, RunStatus, RunSummary, UpdateKind,
};

use log::{debug, info, warn};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::document::{Node, NodeMap, load_document, merge};
use crate::error::{Result, SyncError};
use crate::models::PackageRecord;
use crate::repository::QueryService;
use crate::validation::DocumentValidator;

const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone)]
pub struct RefreshOptions {
    /// Report changes without writing
    pub check_only: bool,
    pub use_cache: bool,
    /// Only refresh these providers; empty means all
    pub providers: Vec<String>,
    pub skip_default: bool,
    pub all_variants: bool,
    pub create_missing: bool,
    pub backup: BackupSettings,
    /// Write the result here instead of in place (single file targets)
    pub output: Option<PathBuf>,
    /// Upper bound on concurrent package lookups within one file
    pub concurrency: usize,
    pub file_timeout: Option<Duration>,
    pub run_timeout: Option<Duration>,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            check_only: false,
            use_cache: true,
            providers: Vec::new(),
            skip_default: false,
            all_variants: false,
            create_missing: false,
            backup: BackupSettings {
                enabled: true,
                directory: None,
                keep: false,
            },
            output: None,
            concurrency: DEFAULT_CONCURRENCY,
            file_timeout: None,
            run_timeout: None,
        }
    }
}

/// Asked before each write when running interactively.
pub trait ConfirmWrite: Send + Sync {
    fn confirm(&self, path: &Path, updates: &[PackageUpdate]) -> bool;
}

#[derive(Debug, Clone, Copy)]
struct Deadline(Option<Instant>);

impl Deadline {
    fn after(budget: Option<Duration>) -> Self {
        Self(budget.map(|budget| Instant::now() + budget))
    }

    fn earliest(self, other: Self) -> Self {
        match (self.0, other.0) {
            (Some(a), Some(b)) => Self(Some(a.min(b))),
            (a, b) => Self(a.or(b)),
        }
    }

    fn expired(&self) -> bool {
        self.0.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// One package entry of one provider section.
#[derive(Debug, Clone)]
struct PackageTask {
    provider: String,
    /// Position in `providers.<provider>.packages`
    index: usize,
    logical_name: String,
    identifier: String,
    current_version: Option<String>,
}

#[derive(Debug, Default)]
struct LookupOutcome {
    record: Option<PackageRecord>,
    /// Repositories that answered without the package
    searched: Vec<String>,
    /// Repositories that could not answer
    failures: Vec<String>,
    timed_out: bool,
}

impl LookupOutcome {
    fn timed_out() -> Self {
        Self {
            timed_out: true,
            ..Default::default()
        }
    }
}

pub struct RefreshOrchestrator {
    query: Arc<QueryService>,
    validator: Arc<dyn DocumentValidator>,
    confirm: Option<Arc<dyn ConfirmWrite>>,
    options: RefreshOptions,
}

impl RefreshOrchestrator {
    pub fn new(
        query: Arc<QueryService>,
        validator: Arc<dyn DocumentValidator>,
        options: RefreshOptions,
    ) -> Self {
        Self {
            query,
            validator,
            confirm: None,
            options,
        }
    }

    pub fn with_confirmation(mut self, confirm: Arc<dyn ConfirmWrite>) -> Self {
        self.confirm = Some(confirm);
        self
    }

    pub fn options(&self) -> &RefreshOptions {
        &self.options
    }

    /// Refresh every document under `target`.
    pub fn run(&self, target: &Path) -> Result<RunReport> {
        let started = Instant::now();
        let run_deadline = Deadline::after(self.options.run_timeout);
        let registry = self.query.registry();

        let policy = DiscoveryPolicy {
            skip_default: self.options.skip_default,
            all_variants: self.options.all_variants,
            create_missing: self.options.create_missing,
        };
        let files = discover(target, &policy, &self.options.providers, registry)?;
        if self.options.output.is_some() && files.len() > 1 {
            return Err(SyncError::InvalidConfig(format!(
                "an output path needs a single document, but {} matched {}",
                target.display(),
                files.len()
            )));
        }

        let mut results = Vec::with_capacity(files.len());
        for file in &files {
            if run_deadline.expired() {
                results.push(RefreshResult::timed_out(
                    file.path.clone(),
                    file.context.clone(),
                    "run time budget exhausted before this file was processed",
                ));
                continue;
            }

            let deadline = run_deadline.earliest(Deadline::after(self.options.file_timeout));
            let file_started = Instant::now();
            let mut result = self.process_file(file, &deadline);
            result.elapsed_ms = elapsed_ms(file_started);

            info!(
                "{}: {} ({} update(s), {} warning(s), {} error(s))",
                file.path.display(),
                result.status,
                result.updates.len(),
                result.warnings.len(),
                result.errors.len()
            );
            results.push(result);
        }

        Ok(RunReport::aggregate(
            results,
            registry.issues().to_vec(),
            elapsed_ms(started),
        ))
    }

    fn process_file(&self, file: &DiscoveredFile, deadline: &Deadline) -> RefreshResult {
        let mut result = RefreshResult::new(file.path.clone(), file.context.clone());
        result.warnings.extend(file.warning.clone());

        let document = match load_source(file) {
            Ok(document) => document,
            Err(e) => {
                result.fail(e);
                return result;
            }
        };

        let tasks = collect_tasks(&document, &self.options.providers, &mut result.warnings);
        if tasks.is_empty() {
            debug!("{}: no packages to refresh", file.path.display());
            return result;
        }

        let registry = self.query.registry();
        let mut chains = BTreeMap::new();
        for task in &tasks {
            if !chains.contains_key(&task.provider) {
                let chain = build_chain(registry, &task.provider, &file.context);
                result.warnings.extend(chain.warnings.iter().cloned());
                chains.insert(task.provider.clone(), chain);
            }
        }

        let outcomes = self.lookup_all(&tasks, &chains, deadline);
        if deadline.expired() || outcomes.iter().any(|o| o.timed_out) {
            result.status = FileStatus::TimedOut;
            result
                .errors
                .push("time budget exceeded during lookups; nothing written".to_string());
            return result;
        }

        let mut updated = document.clone();
        let mut resolved = HashSet::new();
        let mut changed = false;
        for (task, outcome) in tasks.iter().zip(outcomes) {
            result.warnings.extend(outcome.failures.iter().cloned());
            let Some(record) = outcome.record else {
                if !outcome.searched.is_empty() {
                    result.warnings.push(format!(
                        "{}/{}: '{}' not found in {}",
                        task.provider,
                        task.logical_name,
                        task.identifier,
                        outcome.searched.join(", ")
                    ));
                }
                continue;
            };
            if let Some(update) = classify(task, record, &file.context, &mut result) {
                if update.kind != UpdateKind::Suggested {
                    apply_update(&mut updated, task, &update);
                    resolved.insert((task.provider.clone(), task.index));
                    changed = true;
                }
                result.updates.push(update);
            }
        }

        if !changed {
            return result;
        }
        if !file.exists {
            retain_resolved(&mut updated, &resolved);
        }
        if self.options.check_only {
            result.status = FileStatus::Pending;
            return result;
        }
        if let Some(confirm) = &self.confirm
            && !confirm.confirm(&file.path, &result.updates)
        {
            result.status = FileStatus::Pending;
            result.warnings.push("write declined".to_string());
            return result;
        }

        let write_path = self.options.output.as_deref().unwrap_or(&file.path);
        match write_validated(
            write_path,
            &updated,
            &self.options.backup,
            self.validator.as_ref(),
            |written| effective_document(file, written),
        ) {
            Ok(backup_path) => {
                result.status = if file.exists {
                    FileStatus::Updated
                } else {
                    FileStatus::Created
                };
                result.backup_path = backup_path;
                for update in &mut result.updates {
                    update.applied = update.kind != UpdateKind::Suggested;
                }
            }
            Err(e) => {
                warn!("{}: {e}", write_path.display());
                result.fail(e);
            }
        }
        result
    }

    /// Run every lookup on a bounded set of scoped workers. Outcomes come
    /// back in task order regardless of completion order.
    fn lookup_all(
        &self,
        tasks: &[PackageTask],
        chains: &BTreeMap<String, RepositoryChain>,
        deadline: &Deadline,
    ) -> Vec<LookupOutcome> {
        let slots: Mutex<Vec<Option<LookupOutcome>>> =
            Mutex::new((0..tasks.len()).map(|_| None).collect());
        let next = AtomicUsize::new(0);
        let workers = self.options.concurrency.clamp(1, tasks.len().max(1));
        let empty = RepositoryChain::default();

        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| {
                    loop {
                        let i = next.fetch_add(1, Ordering::SeqCst);
                        let Some(task) = tasks.get(i) else {
                            break;
                        };
                        let chain = chains.get(&task.provider).unwrap_or(&empty);
                        let outcome = self.lookup(task, chain, deadline);
                        slots.lock().unwrap_or_else(|p| p.into_inner())[i] = Some(outcome);
                    }
                });
            }
        });

        slots
            .into_inner()
            .unwrap_or_else(|p| p.into_inner())
            .into_iter()
            .map(|slot| slot.unwrap_or_else(LookupOutcome::timed_out))
            .collect()
    }

    /// Try the chain in order. An exact match stops the search; a close
    /// match is kept only if no later repository has an exact one.
    fn lookup(
        &self,
        task: &PackageTask,
        chain: &RepositoryChain,
        deadline: &Deadline,
    ) -> LookupOutcome {
        let mut outcome = LookupOutcome::default();
        let mut suggestion = None;

        for repository in &chain.repositories {
            if deadline.expired() {
                outcome.timed_out = true;
                return outcome;
            }
            match self
                .query
                .query(repository, &task.identifier, self.options.use_cache)
            {
                Ok(Some(record)) if record.inexact_match => {
                    outcome.searched.push(repository.clone());
                    suggestion.get_or_insert(record);
                }
                Ok(Some(record)) => {
                    debug!(
                        "{}/{}: {} {} from {repository}",
                        task.provider, task.logical_name, record.name, record.version
                    );
                    outcome.record = Some(record);
                    return outcome;
                }
                Ok(None) => outcome.searched.push(repository.clone()),
                Err(e) => {
                    warn!("{}/{}: {e}", task.provider, task.logical_name);
                    outcome.failures.push(format!(
                        "{}/{}: {e}",
                        task.provider, task.logical_name
                    ));
                }
            }
        }

        outcome.record = suggestion;
        outcome
    }
}

/// Compare a found record with the document entry. `None` means the
/// entry is already current.
fn classify(
    task: &PackageTask,
    record: PackageRecord,
    context: &OsContext,
    result: &mut RefreshResult,
) -> Option<PackageUpdate> {
    let version_differs = task.current_version.as_deref() != Some(record.version.as_str());
    let name_differs = record.name != task.identifier;

    let mut update = PackageUpdate {
        provider: task.provider.clone(),
        package: task.logical_name.clone(),
        old_name: task.identifier.clone(),
        new_name: task.identifier.clone(),
        old_version: task.current_version.clone(),
        new_version: record.version.clone(),
        source_repository: record.source_repository.clone(),
        kind: UpdateKind::VersionChanged,
        applied: false,
    };

    if record.inexact_match {
        update.new_name = record.name;
        update.kind = UpdateKind::Suggested;
        result.warnings.push(format!(
            "{}/{}: no exact match for '{}', closest is '{}' {} in {}",
            update.provider,
            update.package,
            update.old_name,
            update.new_name,
            update.new_version,
            update.source_repository
        ));
        return Some(update);
    }

    let rename = name_differs && context.is_os_specific();
    if name_differs && !rename {
        result.warnings.push(format!(
            "{}/{}: {} names it '{}'; package_name is only rewritten in OS-specific files",
            update.provider, update.package, update.source_repository, record.name
        ));
    }
    if !version_differs && !rename {
        result.unchanged += 1;
        return None;
    }
    if rename {
        update.new_name = record.name;
        update.kind = UpdateKind::NameChanged;
    }
    Some(update)
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn load_source(file: &DiscoveredFile) -> Result<Node> {
    if file.exists {
        return load_document(&file.path);
    }
    let software_dir = file
        .software_dir
        .as_deref()
        .ok_or_else(|| SyncError::InvalidDocument {
            path: file.path.display().to_string(),
            message: "no software directory to create the document in".to_string(),
        })?;
    let default_doc = load_document(&default_path(software_dir))?;
    Ok(skeleton_from_default(&default_doc))
}

/// Package entries under `providers.*.packages`, in document order.
fn collect_tasks(
    document: &Node,
    provider_filter: &[String],
    warnings: &mut Vec<String>,
) -> Vec<PackageTask> {
    let Some(providers) = document.get("providers").and_then(Node::as_map) else {
        return Vec::new();
    };

    let mut tasks = Vec::new();
    for (provider, section) in providers {
        if !provider_filter.is_empty() && !provider_filter.iter().any(|p| p == provider) {
            continue;
        }
        let Some(packages) = section.get("packages").and_then(Node::as_list) else {
            continue;
        };
        for (index, item) in packages.iter().enumerate() {
            let Some(logical_name) = item.get("name").and_then(Node::as_str) else {
                warnings.push(format!(
                    "providers.{provider}.packages[{index}] has no name; skipped"
                ));
                continue;
            };
            let identifier = item
                .get("package_name")
                .and_then(Node::as_str)
                .unwrap_or(logical_name);
            tasks.push(PackageTask {
                provider: provider.clone(),
                index,
                logical_name: logical_name.to_string(),
                identifier: identifier.to_string(),
                current_version: item.get("version").and_then(Node::scalar_text),
            });
        }
    }
    tasks
}

fn package_entry_mut<'a>(
    document: &'a mut Node,
    provider: &str,
    index: usize,
) -> Option<&'a mut NodeMap> {
    document
        .get_mut("providers")?
        .get_mut(provider)?
        .get_mut("packages")?
        .as_list_mut()?
        .get_mut(index)?
        .as_map_mut()
}

/// Only `version` and, for renames, `package_name` are touched. The
/// logical `name` is never rewritten.
fn apply_update(document: &mut Node, task: &PackageTask, update: &PackageUpdate) {
    let Some(entry) = package_entry_mut(document, &task.provider, task.index) else {
        return;
    };
    entry.insert("version".to_string(), Node::string(update.new_version.clone()));
    if update.kind == UpdateKind::NameChanged {
        entry.insert("package_name".to_string(), Node::string(update.new_name.clone()));
    }
}

/// Drop unresolved entries (and emptied providers) from a new document.
fn retain_resolved(document: &mut Node, resolved: &HashSet<(String, usize)>) {
    let Some(providers) = document.get_mut("providers").and_then(Node::as_map_mut) else {
        return;
    };
    for (provider, section) in providers.iter_mut() {
        if let Some(packages) = section.get_mut("packages").and_then(Node::as_list_mut) {
            let mut index = 0;
            packages.retain(|_| {
                let keep = resolved.contains(&(provider.clone(), index));
                index += 1;
                keep
            });
        }
    }
    providers.retain(|_, section| {
        section
            .get("packages")
            .and_then(Node::as_list)
            .is_some_and(|packages| !packages.is_empty())
    });
}

/// OS overrides are validated merged over their default document.
fn effective_document(file: &DiscoveredFile, written: Node) -> Node {
    let Some(software_dir) = file
        .software_dir
        .as_deref()
        .filter(|_| file.context.is_os_specific())
    else {
        return written;
    };
    match load_document(&default_path(software_dir)) {
        Ok(default_doc) => merge(&default_doc, &written),
        Err(e) => {
            debug!("Validating {} without its default: {e}", file.path.display());
            written
        }
    }
}
