//! CLI integration tests for the vplan binary.
//!
//! Each test uses an isolated temp directory for config and database, and its
//! own provider stand-in, so tests can run in parallel safely.

#![allow(deprecated)] // Command::cargo_bin deprecation only affects custom build dirs

mod common;

use std::path::Path;

use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use common::{PASSWORD, PLAN_FILE, Provider, SCHOOL_ID, USERNAME, plan_xml};
use predicates::prelude::*;
use serde_json::Value;
use vplan::store::{SqliteStore, Store};

struct TestContext {
    temp_dir: TempDir,
    provider: Provider,
}

impl TestContext {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("failed to create temp dir"),
            provider: Provider::start(),
        }
    }

    fn data_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    fn data_dir_str(&self) -> String {
        self.data_dir().to_string_lossy().to_string()
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("vplan").expect("failed to find binary");
        cmd.env("NO_COLOR", "1");
        cmd.args(["--data-dir", &self.data_dir_str()]);
        cmd
    }

    fn init(&self) -> assert_cmd::assert::Assert {
        self.cmd()
            .args(["init", "--base-url", &self.provider.base_url])
            .assert()
    }

    fn add_school(&self, password: &str) -> assert_cmd::assert::Assert {
        self.cmd()
            .args([
                "school",
                "add",
                "--id",
                &SCHOOL_ID.to_string(),
                "--username",
                USERNAME,
                "--password",
                password,
                "--non-interactive",
            ])
            .assert()
    }

    fn onboard(&self) {
        self.init().success();
        self.add_school(PASSWORD).success();
        self.cmd()
            .args([
                "profile",
                "add",
                "--kind",
                "student",
                "--name",
                "5a",
                "--non-interactive",
            ])
            .assert()
            .success();
    }

    fn json(&self, args: &[&str]) -> Value {
        let output = self.cmd().args(args).output().expect("failed to run command");
        assert!(
            output.status.success(),
            "command failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).expect("invalid JSON output")
    }

    fn store(&self) -> SqliteStore {
        SqliteStore::new(self.data_dir().join("vplan.db")).expect("failed to open store")
    }
}

#[test]
fn test_init_writes_config_and_database() {
    let ctx = TestContext::new();
    ctx.init()
        .success()
        .stdout(predicate::str::contains("Initialized"));

    ctx.temp_dir
        .child("config.toml")
        .assert(predicate::str::contains(ctx.provider.base_url.as_str()));
    ctx.temp_dir.child("vplan.db").assert(predicate::path::exists());

    let status = ctx.json(&["status", "--json"]);
    assert_eq!(status["schools"], 0);
    assert_eq!(status["schema_version"], status["latest_schema_version"]);
}

#[test]
fn test_commands_require_init() {
    let ctx = TestContext::new();
    ctx.cmd()
        .args(["school", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Run 'vplan init' first"));
}

#[test]
fn test_school_add_with_wrong_password() {
    let ctx = TestContext::new();
    ctx.init().success();
    ctx.add_school("wrong")
        .failure()
        .stderr(predicate::str::contains("Wrong username or password"));

    assert!(ctx.store().list_schools().unwrap().is_empty());
}

#[test]
fn test_school_add_rejects_malformed_id() {
    let ctx = TestContext::new();
    ctx.init().success();
    ctx.cmd()
        .args([
            "school",
            "add",
            "--id",
            "1234",
            "--username",
            USERNAME,
            "--password",
            PASSWORD,
            "--non-interactive",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected 8 digits"));
}

#[test]
fn test_school_add_and_list() {
    let ctx = TestContext::new();
    ctx.init().success();
    ctx.add_school(PASSWORD)
        .success()
        .stdout(predicate::str::contains("Added school 'Testschule am See'"));

    let schools = ctx.json(&["school", "list", "--json"]);
    let schools = schools.as_array().unwrap();
    assert_eq!(schools.len(), 1);
    assert_eq!(schools[0]["id"], SCHOOL_ID);
    assert!(schools[0].get("password").is_none());
}

#[test]
fn test_sync_and_show() {
    let ctx = TestContext::new();
    ctx.onboard();
    ctx.provider.put(PLAN_FILE, &plan_xml("04.03.2024, 07:12", "101"));

    let reports = ctx.json(&["sync", "--date", "2024-03-04", "--json"]);
    assert_eq!(reports[0]["response"], "SUCCESS");
    assert_eq!(reports[0]["classes_updated"], 2);

    let shown = ctx.json(&["show", "--date", "2024-03-04", "--json"]);
    assert_eq!(shown["profile"]["name"], "5a");
    assert_eq!(shown["info"][0], "Elternabend 18 Uhr");
    assert_eq!(shown["day_type"], "NORMAL");
    let lessons = shown["lessons"].as_array().unwrap();
    assert_eq!(lessons.len(), 2);
    assert_eq!(lessons[0]["rooms"][0]["name"], "101");

    ctx.cmd()
        .args(["show", "--date", "2024-03-04"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[cancelled]"))
        .stdout(predicate::str::contains("Ausfall"));
}

#[test]
fn test_show_holiday_and_weekend() {
    let ctx = TestContext::new();
    ctx.onboard();
    ctx.provider.put(PLAN_FILE, &plan_xml("04.03.2024, 07:12", "101"));
    ctx.json(&["sync", "--date", "2024-03-04", "--json"]);

    let shown = ctx.json(&["show", "--date", "2024-03-25", "--json"]);
    assert_eq!(shown["day_type"], "HOLIDAY");
    assert!(shown["lessons"].as_array().unwrap().is_empty());

    ctx.cmd()
        .args(["show", "--date", "2024-03-09"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Weekend, no school."));
}

#[test]
fn test_sync_without_plan_reports_no_data() {
    let ctx = TestContext::new();
    ctx.onboard();

    ctx.cmd()
        .args(["sync", "--date", "2024-03-05"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no plan published"));
}

#[test]
fn test_profile_add_unknown_name() {
    let ctx = TestContext::new();
    ctx.init().success();
    ctx.add_school(PASSWORD).success();

    ctx.cmd()
        .args([
            "profile",
            "add",
            "--kind",
            "teacher",
            "--name",
            "XYZ",
            "--non-interactive",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No teacher named 'XYZ'"));
}

#[test]
fn test_profile_switch_and_remove() {
    let ctx = TestContext::new();
    ctx.onboard();
    ctx.cmd()
        .args(["profile", "add", "--kind", "room", "--name", "101", "--non-interactive"])
        .assert()
        .success();

    let profiles = ctx.json(&["profile", "list", "--json"]);
    let profiles = profiles.as_array().unwrap();
    assert_eq!(profiles.len(), 2);
    assert_eq!(profiles[1]["active"], true);
    let first = profiles[0]["id"].as_i64().unwrap().to_string();

    ctx.cmd().args(["profile", "use", &first]).assert().success();
    let profiles = ctx.json(&["profile", "list", "--json"]);
    assert_eq!(profiles[0]["active"], true);

    ctx.cmd()
        .args(["profile", "remove", &first, "--non-interactive"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--yes is required"));
    ctx.cmd()
        .args(["profile", "remove", &first, "--yes"])
        .assert()
        .success();

    ctx.cmd()
        .args(["show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No active profile"));
}

#[test]
fn test_reset_clears_lessons() {
    let ctx = TestContext::new();
    ctx.onboard();
    ctx.provider.put(PLAN_FILE, &plan_xml("04.03.2024, 07:12", "101"));
    ctx.cmd().args(["sync", "--date", "2024-03-04"]).assert().success();

    ctx.cmd()
        .args(["reset", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted 3 lessons"));

    let shown = ctx.json(&["show", "--date", "2024-03-04", "--json"]);
    assert!(shown["lessons"].as_array().unwrap().is_empty());
    assert_eq!(ctx.store().list_schools().unwrap().len(), 1);
}

#[test]
fn test_logs_record_sync() {
    let ctx = TestContext::new();
    ctx.onboard();
    ctx.provider.put(PLAN_FILE, &plan_xml("04.03.2024, 07:12", "101"));
    ctx.cmd().args(["sync", "--date", "2024-03-04"]).assert().success();

    ctx.cmd()
        .args(["logs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Sync"))
        .stdout(predicate::str::contains("version 202403040712"));
}

#[test]
fn test_db_rebuild_requires_yes() {
    let ctx = TestContext::new();
    ctx.init().success();
    ctx.add_school(PASSWORD).success();

    ctx.cmd()
        .args(["db", "rebuild"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--yes"));
    assert_eq!(ctx.store().list_schools().unwrap().len(), 1);

    ctx.cmd().args(["db", "rebuild", "--yes"]).assert().success();
    assert!(ctx.store().list_schools().unwrap().is_empty());
}

#[test]
fn test_school_remove_drops_profiles() {
    let ctx = TestContext::new();
    ctx.onboard();

    ctx.cmd()
        .args(["school", "remove", "--id", &SCHOOL_ID.to_string(), "--yes"])
        .assert()
        .success();

    let profiles = ctx.json(&["profile", "list", "--json"]);
    assert!(profiles.as_array().unwrap().is_empty());
}
