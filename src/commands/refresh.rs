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


use clap::Args;
use colored::*;
use comfy_table::{Cell, CellAlignment, Color, Table};
use log::warn;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::support::{http_client, load_registry, open_cache, prompt_yes_no, status_mark};
use crate::config::SyncConfig;
use crate::error::Result;
use crate::refresh::{
    BackupSettings, ConfirmWrite, FileStatus, PackageUpdate, RefreshOptions, RefreshOrchestrator,
    RefreshResult, RunReport, RunStatus, UpdateKind,
};
use crate::repository::{QueryOptions, QueryService};
use crate::validation::StructuralValidator;

#[derive(Args, Debug, Clone, Default)]
pub struct RefreshArgs {
    /// Metadata document or directory of documents
    pub target: PathBuf,

    /// Only refresh these providers (comma separated or repeated)
    #[arg(short, long = "provider", value_delimiter = ',')]
    pub providers: Vec<String>,

    /// Ignore cached indexes and API answers for this run
    #[arg(long)]
    pub no_cache: bool,

    /// Write the result to this path instead of in place (single file only)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Do not write a backup before replacing a document
    #[arg(long)]
    pub no_backup: bool,

    /// Directory for backup files (defaults to beside each document)
    #[arg(long, value_name = "DIR")]
    pub backup_dir: Option<PathBuf>,

    /// Keep backups after a successful write
    #[arg(long)]
    pub keep_backups: bool,

    /// Report what would change without writing anything
    #[arg(long)]
    pub check_only: bool,

    /// When given a single file, also refresh its siblings
    #[arg(long)]
    pub all_variants: bool,

    /// Leave default.yaml documents untouched
    #[arg(long)]
    pub skip_default: bool,

    /// Create OS override files for mapped versions that have none
    #[arg(long)]
    pub create_missing: bool,

    /// Confirm each write
    #[arg(short, long, conflicts_with = "json")]
    pub interactive: bool,

    /// Report close name matches as suggestions
    #[arg(long)]
    pub inexact: bool,

    /// Concurrent package lookups per file
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Time budget per file in seconds
    #[arg(long, value_name = "SECS")]
    pub file_timeout: Option<u64>,

    /// Time budget for the whole run in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

pub struct RefreshCommand<'a> {
    config: &'a SyncConfig,
}

impl<'a> RefreshCommand<'a> {
    pub fn new(config: &'a SyncConfig) -> Result<Self> {
        Ok(Self { config })
    }

    pub fn execute(&self, args: &RefreshArgs) -> Result<RunStatus> {
        let registry = Arc::new(load_registry(self.config)?);
        let query = Arc::new(QueryService::new(
            registry,
            http_client(self.config),
            open_cache(self.config),
            self.config.retry.policy(),
            self.query_options(args),
        ));

        let mut orchestrator = RefreshOrchestrator::new(
            query,
            Arc::new(StructuralValidator),
            self.refresh_options(args),
        );
        if args.interactive {
            orchestrator = orchestrator.with_confirmation(Arc::new(StdinConfirm));
        }

        let report = orchestrator.run(&args.target)?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report, args.check_only);
        }
        Ok(report.status)
    }

    fn query_options(&self, args: &RefreshArgs) -> QueryOptions {
        QueryOptions {
            inexact_fallback: args.inexact || self.config.refresh.inexact_fallback,
            negative_ttl: Duration::from_secs(self.config.cache.negative_ttl_minutes * 60),
            http_timeout: self.config.http_timeout(),
        }
    }

    /// Command-line flags win over the configuration file.
    fn refresh_options(&self, args: &RefreshArgs) -> RefreshOptions {
        let settings = &self.config.refresh;
        RefreshOptions {
            check_only: args.check_only,
            use_cache: !args.no_cache,
            providers: args.providers.clone(),
            skip_default: args.skip_default,
            all_variants: args.all_variants,
            create_missing: args.create_missing,
            backup: BackupSettings {
                enabled: settings.backup && !args.no_backup,
                directory: args.backup_dir.clone().or_else(|| settings.backup_dir.clone()),
                keep: args.keep_backups || settings.keep_backups,
            },
            output: args.output.clone(),
            concurrency: args.concurrency.unwrap_or(settings.concurrency).max(1),
            file_timeout: args
                .file_timeout
                .or(settings.file_timeout_secs)
                .map(Duration::from_secs),
            run_timeout: args
                .timeout
                .or(settings.run_timeout_secs)
                .map(Duration::from_secs),
        }
    }
}

struct StdinConfirm;

impl ConfirmWrite for StdinConfirm {
    fn confirm(&self, path: &Path, updates: &[PackageUpdate]) -> bool {
        println!("\n{} {}", "Pending changes for".bold(), path.display());
        for update in updates.iter().filter(|u| u.kind != UpdateKind::Suggested) {
            println!("  {}", describe_update(update));
        }
        match prompt_yes_no("Do you want to continue?") {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Could not read confirmation: {e}");
                false
            }
        }
    }
}

fn describe_update(update: &PackageUpdate) -> String {
    let old_version = update.old_version.as_deref().unwrap_or("-");
    let name = if update.old_name == update.new_name {
        update.new_name.clone()
    } else {
        format!("{} -> {}", update.old_name, update.new_name)
    };
    format!(
        "{}/{}: {name} {old_version} -> {} ({})",
        update.provider, update.package, update.new_version, update.source_repository
    )
}

fn status_cell(status: FileStatus) -> Cell {
    let cell = Cell::new(status.to_string());
    match status {
        FileStatus::Updated | FileStatus::Created => cell.fg(Color::Green),
        FileStatus::Pending => cell.fg(Color::Yellow),
        FileStatus::Failed | FileStatus::TimedOut => cell.fg(Color::Red),
        FileStatus::Unchanged => cell,
    }
}

fn count_cell(count: usize) -> Cell {
    Cell::new(count).set_alignment(CellAlignment::Right)
}

fn print_report(report: &RunReport, check_only: bool) {
    if report.files.is_empty() {
        println!("No metadata documents found");
        return;
    }

    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_BORDERS_ONLY);
    table.set_header(vec![
        Cell::new("File"),
        Cell::new("Context"),
        Cell::new("Status"),
        Cell::new("Updates"),
        Cell::new("Unchanged"),
        Cell::new("Warnings"),
        Cell::new("Errors"),
    ]);
    for file in &report.files {
        table.add_row(vec![
            Cell::new(file.path.display()),
            Cell::new(&file.context),
            status_cell(file.status),
            count_cell(file.updates.len()),
            count_cell(file.unchanged),
            count_cell(file.warnings.len()),
            count_cell(file.errors.len()),
        ]);
    }
    println!("{table}");

    for file in &report.files {
        print_file_details(file);
    }

    let summary = &report.summary;
    println!(
        "\n{}: {} files, {} written, {} updates ({} applied), {} unchanged, {} warnings, {} errors in {:.1}s",
        "Summary".bold(),
        summary.files,
        summary.files_written,
        summary.updates,
        summary.applied,
        summary.unchanged,
        summary.warnings,
        summary.errors,
        summary.elapsed_ms as f64 / 1000.0
    );
    if check_only && summary.updates > 0 {
        println!("Check-only mode: no files were modified");
    }
    if !report.configuration_issues.is_empty() {
        println!(
            "{} {} repository definitions were disabled (see 'versync repos list')",
            "Note:".yellow().bold(),
            report.configuration_issues.len()
        );
    }
    match report.status {
        RunStatus::Success => println!("{} Refresh completed", status_mark(true)),
        RunStatus::PartialSuccess => {
            println!("{} Refresh completed with warnings or errors", "!".yellow())
        }
    }
}

fn print_file_details(file: &RefreshResult) {
    if file.updates.is_empty() && file.warnings.is_empty() && file.errors.is_empty() {
        return;
    }

    println!("\n{}", file.path.display().to_string().bold());
    for update in &file.updates {
        let line = describe_update(update);
        if update.kind == UpdateKind::Suggested {
            println!("  {} suggested: {line}", "?".yellow());
        } else {
            let ok = update.applied || file.status == FileStatus::Pending;
            println!("  {} {line}", status_mark(ok));
        }
    }
    for warning in &file.warnings {
        println!("  {} {warning}", "warning:".yellow());
    }
    for error in &file.errors {
        println!("  {} {error}", "error:".red());
    }
    if let Some(backup) = &file.backup_path {
        println!("  backup: {}", backup.display());
    }
}
