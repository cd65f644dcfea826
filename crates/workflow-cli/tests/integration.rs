#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

const JOB_WORKFLOW: &str = r#"{
    "version": "1.0",
    "name": "Job Workflow",
    "initialState": "none",
    "active": true,
    "states": {
        "scheduled": {
            "transitions": [{
                "name": "validate_and_start_ingesting",
                "next": "ingesting",
                "processors": [{"name": "JobValidationProcessor", "executionMode": "SYNC"}]
            }]
        },
        "ingesting": {
            "transitions": [
                {
                    "name": "ingest_data_and_save_laureates",
                    "next": "succeeded",
                    "criterion": {"type": "function", "function": {"name": "IngestionSuccessCriterion"}},
                    "processors": [{"name": "DataIngestionProcessor"}]
                },
                {
                    "name": "ingest_data_failure",
                    "next": "failed",
                    "criterion": {"type": "function", "function": {"name": "IngestionFailureCriterion"}}
                }
            ]
        },
        "succeeded": {
            "transitions": [{
                "name": "notify_subscribers",
                "next": "notified_subscribers",
                "processors": [{"name": "SubscribersNotifierProcessor"}]
            }]
        },
        "failed": {"transitions": []},
        "notified_subscribers": {"transitions": []}
    }
}"#;

fn workflow(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("workflow").unwrap();
    cmd.current_dir(dir.path()).env_remove("WORKFLOW_CONFIG");
    cmd
}

fn write_job(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("Job.json");
    std::fs::write(&path, JOB_WORKFLOW).unwrap();
    path
}

// ---------------------------------------------------------------------------
// workflow simulate
// ---------------------------------------------------------------------------

#[test]
fn simulate_validation_reaches_ingesting() {
    let dir = TempDir::new().unwrap();
    let job = write_job(&dir);
    workflow(&dir)
        .arg("simulate")
        .arg(&job)
        .args(["--transition", "validate_and_start_ingesting"])
        .assert()
        .success()
        .stdout("ingesting\n");
}

#[test]
fn simulate_ingestion_follows_criterion() {
    let dir = TempDir::new().unwrap();
    let job = write_job(&dir);

    workflow(&dir)
        .arg("simulate")
        .arg(&job)
        .args(["-t", "ingest_data_and_save_laureates"])
        .assert()
        .success()
        .stdout("succeeded\n");

    workflow(&dir)
        .arg("simulate")
        .arg(&job)
        .args(["-t", "ingest_data_and_save_laureates"])
        .args(["--criterion", "IngestionSuccessCriterion=false"])
        .assert()
        .success()
        .stdout("failed\n");
}

#[test]
fn simulate_failing_notifier_gives_error_state() {
    let dir = TempDir::new().unwrap();
    let job = write_job(&dir);
    workflow(&dir)
        .arg("simulate")
        .arg(&job)
        .args(["-t", "notify_subscribers", "--fail", "SubscribersNotifierProcessor"])
        .assert()
        .success()
        .stdout("error_state\n")
        .stderr(predicate::str::contains("forced to fail"));
}

#[test]
fn simulate_criterion_only_transition() {
    let dir = TempDir::new().unwrap();
    let job = write_job(&dir);
    workflow(&dir)
        .arg("simulate")
        .arg(&job)
        .args(["-t", "ingest_data_failure"])
        .assert()
        .success()
        .stdout("failed\n");
}

#[test]
fn simulate_unknown_transition_passes_through() {
    let dir = TempDir::new().unwrap();
    let job = write_job(&dir);
    workflow(&dir)
        .arg("simulate")
        .arg(&job)
        .args(["-t", "archive_job"])
        .assert()
        .success()
        .stdout("archive_job\n");
}

#[test]
fn simulate_unknown_transition_with_error_policy() {
    let dir = TempDir::new().unwrap();
    let job = write_job(&dir);
    let config = dir.path().join("workflow.yaml");
    std::fs::write(&config, "unknown_transition: error_state\n").unwrap();

    workflow(&dir)
        .env("WORKFLOW_CONFIG", &config)
        .arg("simulate")
        .arg(&job)
        .args(["-t", "archive_job"])
        .assert()
        .success()
        .stdout("error_state\n");
}

#[test]
fn simulate_json_report() {
    let dir = TempDir::new().unwrap();
    let job = write_job(&dir);
    let entity = dir.path().join("entity.json");
    std::fs::write(&entity, r#"{"source": "nobel"}"#).unwrap();

    let output = workflow(&dir)
        .arg("--json")
        .arg("simulate")
        .arg(&job)
        .args(["-t", "ingest_data_and_save_laureates", "--entity-id", "job-7"])
        .arg("--entity")
        .arg(&entity)
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["workflow"], "Job");
    assert_eq!(report["entity_id"], "job-7");
    assert_eq!(report["next_state"], "succeeded");
    assert_eq!(report["matched"], true);
    assert_eq!(report["steps"][0]["processor"], "DataIngestionProcessor");
    assert_eq!(report["steps"][0]["criterion_result"], true);
}

#[test]
fn simulate_rejects_malformed_criterion_flag() {
    let dir = TempDir::new().unwrap();
    let job = write_job(&dir);
    workflow(&dir)
        .arg("simulate")
        .arg(&job)
        .args(["-t", "notify_subscribers", "--criterion", "oops"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected NAME=BOOL"));
}

#[test]
fn simulate_with_yaml_table() {
    let dir = TempDir::new().unwrap();
    let table = dir.path().join("orders.yaml");
    std::fs::write(
        &table,
        "transitions:\n  pay:\n    - processor: ChargeCard\n      criterion: PaymentCleared\n      on_true: paid\n      on_false: payment_failed\n",
    )
    .unwrap();

    workflow(&dir)
        .arg("simulate")
        .arg(&table)
        .args(["-t", "pay", "--criterion", "PaymentCleared=false"])
        .assert()
        .success()
        .stdout("payment_failed\n");
}

// ---------------------------------------------------------------------------
// workflow table
// ---------------------------------------------------------------------------

#[test]
fn table_lists_transitions() {
    let dir = TempDir::new().unwrap();
    let job = write_job(&dir);
    workflow(&dir)
        .arg("table")
        .arg(&job)
        .assert()
        .success()
        .stdout(predicate::str::contains("validate_and_start_ingesting"))
        .stdout(predicate::str::contains("succeeded / failed"))
        .stdout(predicate::str::contains("IngestionFailureCriterion"))
        .stdout(predicate::str::contains("failed / failed"));
}

#[test]
fn table_reports_definition_warnings() {
    let dir = TempDir::new().unwrap();
    let doc = dir.path().join("Audit.json");
    std::fs::write(
        &doc,
        r#"{"states": {"open": {"transitions": [
            {"name": "audit", "processors": [{"name": "AuditProcessor"}]}
        ]}}}"#,
    )
    .unwrap();

    workflow(&dir)
        .arg("table")
        .arg(&doc)
        .assert()
        .success()
        .stdout(predicate::str::contains("(unchanged)"))
        .stderr(predicate::str::contains(
            "warning: state 'open', transition 'audit': no next state; state unchanged",
        ));
}

#[test]
fn table_json_output() {
    let dir = TempDir::new().unwrap();
    let job = write_job(&dir);
    let output = workflow(&dir)
        .args(["table", "--json"])
        .arg(&job)
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let transitions = value["transitions"].as_object().unwrap();
    assert_eq!(transitions.len(), 4);
    assert!(transitions["ingest_data_failure"][0].get("processor").is_none());
    assert!(value["warnings"].as_array().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// workflow check
// ---------------------------------------------------------------------------

#[test]
fn check_directory_reports_each_entity() {
    let dir = TempDir::new().unwrap();
    write_job(&dir);
    std::fs::write(
        dir.path().join("Subscriber.json"),
        r#"{"states": {"new": {"transitions": [
            {"name": "activate", "next": "active", "processors": [{"name": "Activator"}]}
        ]}}}"#,
    )
    .unwrap();

    workflow(&dir)
        .arg("check")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Job: 4 transition(s), 0 warning(s)"))
        .stdout(predicate::str::contains("Subscriber: 1 transition(s), 0 warning(s)"));
}

#[test]
fn check_fails_when_a_workflow_has_nothing_to_run() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("Empty.json"),
        r#"{"states": {"only": {"transitions": []}}}"#,
    )
    .unwrap();

    workflow(&dir)
        .arg("check")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("no runnable transitions in: Empty"));
}

#[test]
fn check_uses_configured_workflows_dir() {
    let dir = TempDir::new().unwrap();
    let workflows = dir.path().join("workflows");
    std::fs::create_dir_all(&workflows).unwrap();
    std::fs::write(workflows.join("Job.json"), JOB_WORKFLOW).unwrap();
    let config = dir.path().join("workflow.yaml");
    std::fs::write(
        &config,
        format!("workflows_dir: {}\n", workflows.display()),
    )
    .unwrap();

    workflow(&dir)
        .arg("--config")
        .arg(&config)
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("Job: 4 transition(s)"));
}

#[test]
fn check_without_path_or_config_fails() {
    let dir = TempDir::new().unwrap();
    workflow(&dir)
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no workflows_dir configured"));
}

#[test]
fn invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let job = write_job(&dir);
    let config = dir.path().join("workflow.yaml");
    std::fs::write(&config, "false_branch_state: \"not valid\"\n").unwrap();

    workflow(&dir)
        .arg("--config")
        .arg(&config)
        .arg("table")
        .arg(&job)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid config"));
}
