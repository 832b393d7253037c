//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary against a throwaway data directory and
//! verify outputs.

use std::path::Path;
use std::process::Command;

/// Run a CLI command and return (exit code, stdout, stderr).
fn run_cli(home: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_dosewatch"))
        .args(args)
        .env("DOSEWATCH_HOME", home)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

fn run_json(home: &Path, args: &[&str]) -> serde_json::Value {
    let (code, stdout, stderr) = run_cli(home, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).expect("Failed to parse JSON output")
}

fn add_medicine(home: &Path, args: &[&str]) -> String {
    let mut full = vec!["medicine", "add"];
    full.extend_from_slice(args);
    let created = run_json(home, &full);
    created["id"].as_str().unwrap().to_string()
}

#[test]
fn test_medicine_add_and_list() {
    let home = tempfile::tempdir().unwrap();
    let id = add_medicine(home.path(), &["Aspirin", "100mg", "--frequency", "twice-daily"]);

    let list = run_json(home.path(), &["medicine", "list"]);
    let medicines = list.as_array().unwrap();
    assert_eq!(medicines.len(), 1);
    assert_eq!(medicines[0]["id"], id.as_str());
    assert_eq!(medicines[0]["times"], serde_json::json!(["09:00", "21:00"]));
    assert_eq!(medicines[0]["reminder_enabled"], true);
}

#[test]
fn test_medicine_add_rejects_bad_time() {
    let home = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_cli(home.path(), &["medicine", "add", "A", "1mg", "--time", "25:00"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("25:00"), "stderr: {stderr}");
}

#[test]
fn test_medicine_update_and_remove() {
    let home = tempfile::tempdir().unwrap();
    let id = add_medicine(home.path(), &["Vitamin D", "1000IU"]);

    let updated = run_json(
        home.path(),
        &["medicine", "update", &id, "--time", "07:15", "--reminders", "false"],
    );
    assert_eq!(updated["times"], serde_json::json!(["07:15"]));
    assert_eq!(updated["reminder_enabled"], false);

    let (code, _, _) = run_cli(home.path(), &["medicine", "remove", &id]);
    assert_eq!(code, 0);
    let (code, _, stderr) = run_cli(home.path(), &["medicine", "show", &id]);
    assert_ne!(code, 0);
    assert!(stderr.contains("not found"), "stderr: {stderr}");
}

#[test]
fn test_reminders_upcoming_at_fixed_time() {
    let home = tempfile::tempdir().unwrap();
    add_medicine(home.path(), &["Aspirin", "100mg", "--time", "09:00", "--time", "21:00"]);
    add_medicine(home.path(), &["Quiet", "5mg", "--time", "09:30", "--no-reminder"]);

    let upcoming = run_json(home.path(), &["reminders", "upcoming", "--at", "2024-06-15T08:00"]);
    let doses = upcoming.as_array().unwrap();
    assert_eq!(doses.len(), 1);
    assert_eq!(doses[0]["medicine_name"], "Aspirin");
    assert_eq!(doses[0]["time"], "09:00");
    assert_eq!(doses[0]["time_remaining"], "in 1h 0m");

    let late = run_json(home.path(), &["reminders", "upcoming", "--at", "2024-06-15T21:30"]);
    assert!(late.as_array().unwrap().is_empty());
}

#[test]
fn test_dose_log_feeds_adherence() {
    let home = tempfile::tempdir().unwrap();
    let id = add_medicine(home.path(), &["Aspirin", "100mg"]);
    for status in ["taken", "taken", "taken", "missed"] {
        let entry = run_json(
            home.path(),
            &["dose", "log", &id, status, "--scheduled", "2024-06-15T09:00"],
        );
        assert_eq!(entry["status"], status);
    }

    let report = run_json(home.path(), &["stats", "adherence"]);
    assert_eq!(report["total_medicines"], 1);
    assert_eq!(report["average_adherence"], 75);
    assert_eq!(report["medicines"][0]["band"], "warning");

    let single = run_json(home.path(), &["stats", "adherence", "--id", &id]);
    assert_eq!(single["missed_doses"], 1);
}

#[test]
fn test_stats_adherence_empty() {
    let home = tempfile::tempdir().unwrap();
    let report = run_json(home.path(), &["stats", "adherence"]);
    assert_eq!(report["total_medicines"], 0);
    assert!(report["average_adherence"].is_null());
}

#[test]
fn test_config_get_set() {
    let home = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(home.path(), &["config", "get", "reminders.alert_lead_min"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "5");

    let (code, _, _) = run_cli(home.path(), &["config", "set", "reminders.alert_lead_min", "10"]);
    assert_eq!(code, 0);
    let (_, stdout, _) = run_cli(home.path(), &["config", "get", "reminders.alert_lead_min"]);
    assert_eq!(stdout.trim(), "10");
}

#[test]
fn test_config_set_rejects_invalid() {
    let home = tempfile::tempdir().unwrap();
    let (code, _, _) = run_cli(home.path(), &["config", "set", "reminders.tick_interval_secs", "0"]);
    assert_ne!(code, 0);
    let (code, _, _) = run_cli(home.path(), &["config", "get", "reminders.nope"]);
    assert_ne!(code, 0);
}

#[test]
fn test_config_list_and_path() {
    let home = tempfile::tempdir().unwrap();
    let list = run_json(home.path(), &["config", "list"]);
    assert_eq!(list["adherence"]["good_threshold"], 80);

    let (code, stdout, _) = run_cli(home.path(), &["config", "path"]);
    assert_eq!(code, 0);
    assert!(stdout.trim().ends_with("config.toml"));
}
