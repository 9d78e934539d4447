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


use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;
use versync::commands::cache::CacheCommand;
use versync::commands::merge;
use versync::commands::overrides::ValidateOverridesCommand;
use versync::commands::refresh::{RefreshArgs, RefreshCommand};
use versync::commands::repos::ReposCommand;
use versync::config::new_sync_config;
use versync::error::{
    PARTIAL_SUCCESS_EXIT_CODE, Result, SyncError, format_error_chain, format_error_with_color,
    get_exit_code,
};
use versync::logging;
use versync::refresh::RunStatus;

#[derive(Parser)]
#[command(name = "versync")]
#[command(author, version, about = "Keep package versions in software metadata in sync with upstream repositories", long_about = None)]
struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh package versions in metadata documents
    #[command(visible_alias = "r")]
    Refresh(RefreshArgs),

    /// Inspect repository definitions
    Repos {
        #[command(subcommand)]
        command: ReposCommand,
    },

    /// Manage the repository cache
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },

    /// Compare OS override documents against their default document
    ValidateOverrides {
        /// Directory to scan
        dir: PathBuf,

        /// Drop keys that repeat the default, keeping the merged result
        #[arg(long)]
        remove_duplicates: bool,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective document of an OS override
    Merge {
        /// OS override document
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    logging::setup_logger(cli.verbose);

    // Load configuration once at startup
    let config = match new_sync_config() {
        Ok(config) => config,
        Err(e) => {
            report_error(&e);
            std::process::exit(get_exit_code(&e));
        }
    };

    let result: Result<RunStatus> = (|| match cli.command {
        Commands::Refresh(args) => {
            let command = RefreshCommand::new(&config)?;
            command.execute(&args)
        }
        Commands::Repos { command } => command.execute(&config).map(|()| RunStatus::Success),
        Commands::Cache { command } => command.execute(&config).map(|()| RunStatus::Success),
        Commands::ValidateOverrides {
            dir,
            remove_duplicates,
            json,
        } => {
            let command = ValidateOverridesCommand::new(&config)?;
            command.execute(&dir, remove_duplicates, json)
        }
        Commands::Merge { file } => merge::execute(&file).map(|()| RunStatus::Success),
    })();

    match result {
        Ok(RunStatus::Success) => {}
        Ok(RunStatus::PartialSuccess) => std::process::exit(PARTIAL_SUCCESS_EXIT_CODE),
        Err(e) => {
            report_error(&e);
            std::process::exit(get_exit_code(&e));
        }
    }
}

fn report_error(error: &SyncError) {
    if std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none() {
        eprint!("{}", format_error_with_color(error, true));
    } else {
        eprintln!("{}", format_error_chain(error));
    }
}
