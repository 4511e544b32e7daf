//! Integration tests for the bidforge CLI
//!
//! These tests drive the binary end to end in a temporary project. Runs use
//! `--offline`, so every phase takes its fallback path and no model is needed.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to create a bidforge Command
fn bidforge() -> Command {
    let mut cmd = cargo_bin_cmd!("bidforge");
    cmd.env_remove("BIDFORGE_EXPRESS")
        .env_remove("BIDFORGE_AGENT_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

/// Helper to create a temporary project directory
fn create_temp_project() -> TempDir {
    TempDir::new().unwrap()
}

/// Helper to initialize a bidforge project in a temp directory
fn init_bidforge_project(dir: &TempDir) {
    bidforge()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();
}

/// Start an offline run and return the workflow id printed in the resume hint.
fn start_offline_run(dir: &TempDir) -> String {
    fs::write(dir.path().join("rfp.txt"), "Request for proposal: data platform").unwrap();
    let output = bidforge()
        .current_dir(dir.path())
        .args(["run", "--rfp", "rfp.txt", "--offline"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    stdout
        .lines()
        .find_map(|line| line.trim().strip_prefix("bidforge resume "))
        .and_then(|rest| rest.split_whitespace().next())
        .map(str::to_string)
        .expect("run output should include a resume command")
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_bidforge_help() {
        bidforge().arg("--help").assert().success();
    }

    #[test]
    fn test_bidforge_version() {
        bidforge().arg("--version").assert().success();
    }

    #[test]
    fn test_bidforge_init_creates_structure() {
        let dir = create_temp_project();

        bidforge()
            .current_dir(dir.path())
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("Initialized bidforge project"));

        assert!(dir.path().join(".bidforge/checkpoints").is_dir());
        assert!(dir.path().join(".bidforge/logs").is_dir());
        assert!(dir.path().join(".bidforge/bidforge.toml").is_file());
        assert!(dir.path().join(".bidforge/catalog.json").is_file());
    }

    #[test]
    fn test_bidforge_init_idempotent() {
        let dir = create_temp_project();
        init_bidforge_project(&dir);

        bidforge()
            .current_dir(dir.path())
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("already initialized"));
    }

    #[test]
    fn test_status_uninitialized() {
        let dir = create_temp_project();

        bidforge()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("Not initialized"));
    }

    #[test]
    fn test_status_without_workflows() {
        let dir = create_temp_project();
        init_bidforge_project(&dir);

        bidforge()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("No workflows found"));
    }

    #[test]
    fn test_list_empty() {
        let dir = create_temp_project();
        init_bidforge_project(&dir);

        bidforge()
            .current_dir(dir.path())
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::contains("No workflows found"));
    }
}

// =============================================================================
// Configuration Tests
// =============================================================================

mod configuration {
    use super::*;

    #[test]
    fn test_config_show_reads_file() {
        let dir = create_temp_project();
        init_bidforge_project(&dir);

        bidforge()
            .current_dir(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Config file:"))
            .stdout(predicate::str::contains("pass_threshold = 0.75"));
    }

    #[test]
    fn test_config_show_defaults_without_file() {
        let dir = create_temp_project();

        bidforge()
            .current_dir(dir.path())
            .arg("config")
            .assert()
            .success()
            .stdout(predicate::str::contains("Using default configuration"));
    }

    #[test]
    fn test_config_init_refuses_to_overwrite() {
        let dir = create_temp_project();
        init_bidforge_project(&dir);

        bidforge()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));
    }

    #[test]
    fn test_config_init_creates_toml() {
        let dir = create_temp_project();

        bidforge()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created bidforge.toml"));

        assert!(dir.path().join(".bidforge/bidforge.toml").exists());
    }

    #[test]
    fn test_config_validate_default_file() {
        let dir = create_temp_project();
        init_bidforge_project(&dir);

        bidforge()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration is valid"));
    }

    #[test]
    fn test_config_validate_reports_warnings() {
        let dir = create_temp_project();
        init_bidforge_project(&dir);

        let config_content = r#"
[defaults]
agent_timeout_secs = 0

[quality]
pass_threshold = 1.5
"#;
        fs::write(dir.path().join(".bidforge/bidforge.toml"), config_content).unwrap();

        bidforge()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration warnings"))
            .stdout(predicate::str::contains("pass_threshold"));
    }

    #[test]
    fn test_config_parse_error_fails() {
        let dir = create_temp_project();
        init_bidforge_project(&dir);
        fs::write(dir.path().join(".bidforge/bidforge.toml"), "[quality\n").unwrap();

        bidforge()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to parse bidforge.toml"));
    }
}

// =============================================================================
// Workflow Tests
// =============================================================================

mod workflow {
    use super::*;

    #[test]
    fn test_run_requires_init() {
        let dir = create_temp_project();
        fs::write(dir.path().join("rfp.txt"), "RFP").unwrap();

        bidforge()
            .current_dir(dir.path())
            .args(["run", "--rfp", "rfp.txt", "--offline"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Project not initialized"));
    }

    #[test]
    fn test_run_missing_rfp_file_fails() {
        let dir = create_temp_project();
        init_bidforge_project(&dir);

        bidforge()
            .current_dir(dir.path())
            .args(["run", "--rfp", "missing.txt", "--offline"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to read RFP"));
    }

    #[test]
    fn test_offline_run_parks_at_first_gate() {
        let dir = create_temp_project();
        init_bidforge_project(&dir);
        fs::write(dir.path().join("rfp.txt"), "RFP body").unwrap();

        bidforge()
            .current_dir(dir.path())
            .args(["run", "--rfp", "rfp.txt", "--offline"])
            .assert()
            .success()
            .stdout(predicate::str::contains("is waiting at gate #1"))
            .stdout(predicate::str::contains("--gate 1"));

        let checkpoints: Vec<_> = fs::read_dir(dir.path().join(".bidforge/checkpoints"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
            .collect();
        assert_eq!(checkpoints.len(), 1);
    }

    #[test]
    fn test_list_and_status_show_suspended_run() {
        let dir = create_temp_project();
        init_bidforge_project(&dir);
        let id = start_offline_run(&dir);

        bidforge()
            .current_dir(dir.path())
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::contains(id.as_str()))
            .stdout(predicate::str::contains("suspended"));

        bidforge()
            .current_dir(dir.path())
            .args(["status", id.as_str()])
            .assert()
            .success()
            .stdout(predicate::str::contains("Waiting at: gate #1"))
            .stdout(predicate::str::contains("upstream_failure"));
    }

    #[test]
    fn test_resume_wrong_gate_is_rejected() {
        let dir = create_temp_project();
        init_bidforge_project(&dir);
        let id = start_offline_run(&dir);

        bidforge()
            .current_dir(dir.path())
            .args(["resume", id.as_str(), "--gate", "3", "--approve", "--offline"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("suspended at gate 1, not gate 3"));
    }

    #[test]
    fn test_resume_approve_moves_to_strategy_gate() {
        let dir = create_temp_project();
        init_bidforge_project(&dir);
        let id = start_offline_run(&dir);

        bidforge()
            .current_dir(dir.path())
            .args(["resume", id.as_str(), "--gate", "1", "--approve", "--offline"])
            .assert()
            .success()
            .stdout(predicate::str::contains("is waiting at gate #3"));
    }

    #[test]
    fn test_resume_unknown_workflow_fails() {
        let dir = create_temp_project();
        init_bidforge_project(&dir);

        bidforge()
            .current_dir(dir.path())
            .args([
                "resume",
                "00000000-0000-4000-8000-000000000000",
                "--gate",
                "1",
                "--approve",
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("no checkpoint found"));
    }

    #[test]
    fn test_resume_needs_a_decision() {
        let dir = create_temp_project();
        init_bidforge_project(&dir);

        bidforge()
            .current_dir(dir.path())
            .args(["resume", "00000000-0000-4000-8000-000000000000", "--gate", "1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--approve, --reject or --interactive"));
    }
}
