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

use assert_cmd::Command;
use mockito::{Mock, Server, ServerGuard};
use predicates::prelude::*;
use std::fs;

mod common;
use common::TestHome;
use common::fixtures::*;

fn versync(home: &TestHome) -> Command {
    let mut cmd = Command::cargo_bin("versync").unwrap();
    cmd.env("VERSYNC_HOME", home.versync_home())
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    cmd
}

/// A home with the standard repositories pointing at a mock server.
fn configured_home() -> (TestHome, ServerGuard) {
    let server = Server::new();
    let home = TestHome::new();
    home.write_config(FAST_CONFIG)
        .write_repositories("apt.yaml", &repositories_yaml(&server.url()));
    (home, server)
}

fn mock_hashicorp(server: &mut ServerGuard) -> Mock {
    server
        .mock("GET", HASHICORP_PATH)
        .with_status(200)
        .with_body(debian_packages(&[("terraform", "1.6.5")]))
        .create()
}

fn mock_ubuntu(server: &mut ServerGuard) -> Mock {
    server
        .mock("GET", UBUNTU_PATH)
        .with_status(200)
        .with_body(gzip(&debian_packages(&[("git", "1:2.34.1-1ubuntu1.11")])))
        .create()
}

#[test]
fn test_help_lists_commands() {
    let mut cmd = Command::cargo_bin("versync").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("refresh"))
        .stdout(predicate::str::contains("repos"))
        .stdout(predicate::str::contains("validate-overrides"))
        .stdout(predicate::str::contains("merge"));
}

#[test]
fn test_interactive_conflicts_with_json() {
    let home = TestHome::new();
    versync(&home)
        .args(["refresh", "--interactive", "--json"])
        .arg(home.metadata_dir())
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_missing_target_is_fatal() {
    let home = TestHome::new();
    versync(&home)
        .arg("refresh")
        .arg(home.path().join("does-not-exist"))
        .assert()
        .code(66)
        .stderr(predicate::str::contains("Cannot read target"));
}

#[test]
fn test_invalid_config_exits_with_config_code() {
    let home = TestHome::new();
    home.write_config("[refresh]\nconcurrency = 0\n");
    versync(&home)
        .args(["repos", "list"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("concurrency"));
}

#[test]
fn test_refresh_single_file_succeeds() {
    let (home, mut server) = configured_home();
    let hashicorp = mock_hashicorp(&mut server);
    let ubuntu = mock_ubuntu(&mut server);
    home.write_document("terraform/default.yaml", TERRAFORM_DEFAULT);
    let file = home.write_document("terraform/ubuntu/22.04.yaml", TERRAFORM_JAMMY);

    versync(&home)
        .arg("refresh")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("1.3.0 -> 1.6.5"))
        .stdout(predicate::str::contains("Refresh completed"));

    hashicorp.assert();
    ubuntu.assert();
    let written = fs::read_to_string(&file).unwrap();
    assert!(written.contains("1.6.5"));
    assert!(written.contains("1:2.34.1-1ubuntu1.11"));
}

#[test]
fn test_refresh_json_report() {
    let (home, mut server) = configured_home();
    let _hashicorp = mock_hashicorp(&mut server);
    let _ubuntu = mock_ubuntu(&mut server);
    home.write_document("terraform/default.yaml", TERRAFORM_DEFAULT);
    let file = home.write_document("terraform/ubuntu/22.04.yaml", TERRAFORM_JAMMY);
    let before = fs::read(&file).unwrap();

    let output = versync(&home)
        .args(["refresh", "--check-only", "--json"])
        .arg(&file)
        .output()
        .unwrap();

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["status"], "success");
    assert_eq!(report["summary"]["updates"], 2);
    assert_eq!(report["summary"]["applied"], 0);
    assert_eq!(report["files"][0]["status"], "pending");
    assert_eq!(report["files"][0]["context"]["os"], "ubuntu");
    assert_eq!(fs::read(&file).unwrap(), before);
}

#[test]
fn test_partial_success_exit_code() {
    let (home, mut server) = configured_home();
    let _hashicorp = mock_hashicorp(&mut server);
    let _ubuntu = mock_ubuntu(&mut server);
    home.write_document("terraform/default.yaml", TERRAFORM_DEFAULT);
    home.write_document("terraform/ubuntu/22.04.yaml", TERRAFORM_JAMMY);

    // default.yaml has no repository for a bare apt provider
    versync(&home)
        .arg("refresh")
        .arg(home.metadata_dir())
        .assert()
        .code(4)
        .stdout(predicate::str::contains("no enabled repository"));
}

#[test]
fn test_repos_list_shows_priority_order_and_issues() {
    let (home, _server) = configured_home();
    home.write_repositories("broken.yaml", BROKEN_REPOSITORIES);

    let output = versync(&home).args(["repos", "list"]).output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    let rows: Vec<&str> = stdout.lines().collect();
    let vendor = rows
        .iter()
        .position(|row| row.contains("hashicorp-apt-ubuntu-jammy"))
        .unwrap();
    let archive = rows
        .iter()
        .position(|row| row.contains("apt-ubuntu-jammy") && !row.contains("hashicorp"))
        .unwrap();
    assert!(vendor < archive);
    assert!(stdout.contains("Configuration issues"));
    assert!(stdout.contains("dnf-fedora-39"));

    // Unreadable definitions stay listed, disabled, under their name
    let alpine = rows
        .iter()
        .find(|row| row.contains("apk-alpine-3.19"))
        .unwrap();
    assert!(alpine.contains("disabled"));
}

#[test]
fn test_repos_resolve_prints_chain() {
    let (home, _server) = configured_home();
    versync(&home)
        .args(["repos", "resolve", "apt", "ubuntu", "22.04"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Repository: hashicorp-apt-ubuntu-jammy"))
        .stdout(predicate::str::contains("2. apt-ubuntu-jammy"));

    versync(&home)
        .args(["repos", "resolve", "apt", "ubuntu", "18.04"])
        .assert()
        .success()
        .stdout(predicate::str::contains("falling back"));
}

#[test]
fn test_cache_info_and_clear() {
    let (home, mut server) = configured_home();
    let _hashicorp = mock_hashicorp(&mut server);
    home.write_document("terraform/default.yaml", TERRAFORM_DEFAULT);
    let file = home.write_document(
        "terraform/ubuntu/22.04.yaml",
        "version: \"0.3\"\nproviders:\n  apt:\n    packages:\n      - {name: terraform, version: \"1.3.0\"}\n",
    );
    versync(&home)
        .args(["refresh", "--check-only"])
        .arg(&file)
        .assert()
        .success();

    let output = versync(&home).args(["cache", "info", "--json"]).output().unwrap();
    let info: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(info["index_entries"], 1);

    versync(&home)
        .args(["cache", "clear", "--repository", "hashicorp-apt-ubuntu-jammy"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 1 cache entries"));

    versync(&home)
        .args(["cache", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No cache to clear"));
}

const DUPLICATING_OVERRIDE: &str = r#"version: "0.3"
metadata:
  description: Infrastructure as code
providers:
  apt:
    packages:
      - name: terraform
        package_name: terraform
        version: "1.3.0"
"#;

#[test]
fn test_validate_overrides_reports_then_prunes() {
    let home = TestHome::new();
    home.write_document("terraform/default.yaml", TERRAFORM_DEFAULT);
    let file = home.write_document("terraform/ubuntu/22.04.yaml", DUPLICATING_OVERRIDE);

    versync(&home)
        .arg("validate-overrides")
        .arg(home.metadata_dir())
        .assert()
        .code(4)
        .stdout(predicate::str::contains("metadata.description"))
        .stdout(predicate::str::contains("--remove-duplicates"));

    versync(&home)
        .args(["validate-overrides", "--remove-duplicates"])
        .arg(home.metadata_dir())
        .assert()
        .success();

    let pruned = fs::read_to_string(&file).unwrap();
    assert!(!pruned.contains("description"));
    assert!(pruned.contains("1.3.0"));
}

#[test]
fn test_merge_prints_effective_document() {
    let home = TestHome::new();
    home.write_document("terraform/default.yaml", TERRAFORM_DEFAULT);
    let file = home.write_document("terraform/ubuntu/22.04.yaml", TERRAFORM_JAMMY);

    versync(&home)
        .arg("merge")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("description: Infrastructure as code"))
        .stdout(predicate::str::contains("1:2.34.1-1ubuntu1"));
}
