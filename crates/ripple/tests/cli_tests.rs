//! Integration tests for the ripple CLI.
//!
//! These tests run the compiled binary against a temporary workspace and
//! check exit status, stdout and the persisted graph.

use rstest::{fixture, rstest};
use serde_json::Value;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

mod common;
use common::run_ripple_in_dir;

// ============================================================================
// Test Fixtures
// ============================================================================

/// Provides a fresh temporary directory for each test
#[fixture]
fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

/// Provides a temporary directory with an initialized ripple workspace
#[fixture]
fn initialized_dir() -> TempDir {
    let temp = TempDir::new().expect("Failed to create temp directory");
    let output = run_ripple_in_dir(temp.path(), &["init", "--quiet"]);
    assert!(
        output.status.success(),
        "Failed to initialize ripple: {:?}",
        String::from_utf8_lossy(&output.stderr)
    );
    temp
}

/// Provides a workspace holding `web -> api -> db` in project `shop`
#[fixture]
fn chain_dir(initialized_dir: TempDir) -> TempDir {
    let dir = initialized_dir.path();
    ok(dir, &["add", "web", "-p", "shop", "-t", "frontend"]);
    ok(dir, &["add", "api", "-p", "shop", "-t", "backend"]);
    ok(dir, &["add", "db", "-p", "shop", "-t", "database"]);
    ok(dir, &["dep", "add", "web", "api", "-t", "api-call"]);
    ok(dir, &["dep", "add", "api", "db", "-t", "database"]);
    initialized_dir
}

fn ok(dir: &Path, args: &[&str]) -> Output {
    let output = run_ripple_in_dir(dir, args);
    assert!(
        output.status.success(),
        "ripple {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

fn fails(dir: &Path, args: &[&str]) -> String {
    let output = run_ripple_in_dir(dir, args);
    assert!(!output.status.success(), "ripple {args:?} unexpectedly succeeded");
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

fn ripple() -> Command {
    Command::new(env!("CARGO_BIN_EXE_ripple"))
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_cli_help_shows_all_commands() {
    let output = ripple().arg("--help").output().expect("Failed to run ripple");

    assert!(output.status.success());
    let stdout = stdout(&output);
    assert!(stdout.contains("Usage:"));
    for command in [
        "init", "info", "add", "update", "delete", "show", "list", "dep", "impact", "propagate",
        "replay",
    ] {
        assert!(stdout.contains(command), "help is missing '{command}'");
    }
}

#[test]
fn test_cli_version() {
    let output = ripple().arg("--version").output().expect("Failed to run ripple");

    assert!(output.status.success());
    assert!(stdout(&output).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_no_args() {
    let output = ripple().output().expect("Failed to run ripple");

    assert!(output.status.success());
    assert!(stdout(&output).contains("ripple --help"));
}

// ============================================================================
// Init Tests
// ============================================================================

#[rstest]
fn test_cli_init_creates_workspace(temp_dir: TempDir) {
    let output = ok(temp_dir.path(), &["init"]);

    assert!(stdout(&output).contains("Initialized ripple"));
    assert!(temp_dir.path().join(".ripple/config.yaml").is_file());
    assert!(temp_dir.path().join(".ripple/graph.jsonl").is_file());
}

#[rstest]
fn test_cli_init_twice_fails(initialized_dir: TempDir) {
    let stderr = fails(initialized_dir.path(), &["init"]);
    assert!(stderr.contains("already initialized"));
}

#[rstest]
fn test_cli_requires_initialized_workspace(temp_dir: TempDir) {
    let stderr = fails(temp_dir.path(), &["list"]);
    assert!(stderr.contains("ripple init"));
}

#[rstest]
fn test_cli_finds_workspace_from_subdirectory(chain_dir: TempDir) {
    let nested = chain_dir.path().join("src/app");
    std::fs::create_dir_all(&nested).unwrap();

    let output = ok(&nested, &["show", "api"]);
    assert!(stdout(&output).contains("api"));
}

// ============================================================================
// Component Tests
// ============================================================================

#[rstest]
fn test_cli_add_and_show(initialized_dir: TempDir) {
    let dir = initialized_dir.path();
    let output = ok(
        dir,
        &[
            "add", "api", "-p", "shop", "-t", "backend", "-n", "Orders API", "-v", "2.1.0", "-m",
            "replicas=3",
        ],
    );
    assert_eq!(
        stdout(&output),
        "api Orders API [BACKEND] v2.1.0 ACTIVE (shop)\n"
    );

    let shown = json(&ok(dir, &["show", "api", "--json"]));
    assert_eq!(shown["id"], "api");
    assert_eq!(shown["type"], "BACKEND");
    assert_eq!(shown["version"], "2.1.0");
    assert_eq!(shown["metadata"]["replicas"], 3);
    assert_eq!(shown["dependencies"], Value::Array(vec![]));
}

#[rstest]
fn test_cli_add_duplicate_fails(initialized_dir: TempDir) {
    let dir = initialized_dir.path();
    ok(dir, &["add", "api", "-p", "shop", "-t", "backend"]);

    let stderr = fails(dir, &["add", "api", "-p", "shop", "-t", "service", "-v", "9.0.0"]);
    assert!(stderr.contains("already exists"));

    let shown = json(&ok(dir, &["show", "api", "--json"]));
    assert_eq!(shown["version"], "1.0.0");
}

#[rstest]
#[case("latest")]
#[case("1.2.3.4")]
#[case("")]
fn test_cli_add_rejects_bad_version(initialized_dir: TempDir, #[case] version: &str) {
    fails(
        initialized_dir.path(),
        &["add", "api", "-p", "shop", "-t", "backend", "-v", version],
    );
}

#[rstest]
fn test_cli_list_filters(chain_dir: TempDir) {
    let dir = chain_dir.path();
    ok(dir, &["add", "ledger", "-p", "finance", "-t", "service"]);

    let all = json(&ok(dir, &["list", "--json"]));
    assert_eq!(all.as_array().unwrap().len(), 4);

    let shop = json(&ok(dir, &["list", "-p", "shop", "--json"]));
    assert_eq!(shop.as_array().unwrap().len(), 3);

    let databases = json(&ok(dir, &["list", "-t", "database", "--json"]));
    assert_eq!(databases[0]["id"], "db");
}

#[rstest]
fn test_cli_list_empty(initialized_dir: TempDir) {
    let output = ok(initialized_dir.path(), &["list"]);
    assert!(stdout(&output).contains("No components found"));
}

#[rstest]
fn test_cli_info_counts(chain_dir: TempDir) {
    let info = json(&ok(chain_dir.path(), &["info", "--json"]));
    assert_eq!(info["components"], 3);
    assert_eq!(info["dependencies"], 2);
}

// ============================================================================
// Dependency Tests
// ============================================================================

#[rstest]
fn test_cli_dep_list_directions(chain_dir: TempDir) {
    let dir = chain_dir.path();

    let direct = json(&ok(dir, &["dep", "list", "api", "--json"]));
    assert_eq!(direct[0]["target"], "db");
    assert_eq!(direct[0]["type"], "DATABASE");

    let dependents = json(&ok(dir, &["dep", "list", "api", "--dependents", "--json"]));
    assert_eq!(dependents[0]["source"], "web");

    let transitive = json(&ok(dir, &["dep", "list", "web", "--transitive", "--json"]));
    assert_eq!(transitive.as_array().unwrap().len(), 2);
}

#[rstest]
fn test_cli_dep_path(chain_dir: TempDir) {
    let output = ok(chain_dir.path(), &["dep", "path", "web", "db"]);
    assert_eq!(stdout(&output), "web -> api -> db (2 hops)\n");

    let none = ok(chain_dir.path(), &["dep", "path", "db", "web"]);
    assert!(stdout(&none).contains("No dependency path found"));
}

#[rstest]
fn test_cli_dep_cycle_rejected(chain_dir: TempDir) {
    let dir = chain_dir.path();

    let stderr = fails(dir, &["dep", "add", "db", "web"]);
    assert!(stderr.contains("Circular dependency"));

    let info = json(&ok(dir, &["info", "--json"]));
    assert_eq!(info["dependencies"], 2);
}

#[rstest]
fn test_cli_dep_self_rejected(chain_dir: TempDir) {
    let stderr = fails(chain_dir.path(), &["dep", "add", "api", "api"]);
    assert!(stderr.contains("cannot depend on itself"));
}

#[rstest]
fn test_cli_delete_blocked_until_edge_removed(chain_dir: TempDir) {
    let dir = chain_dir.path();

    let stderr = fails(dir, &["delete", "api"]);
    assert!(stderr.contains("depend on it"));

    ok(dir, &["dep", "remove", "web", "api", "-t", "api-call"]);
    let output = ok(dir, &["delete", "api"]);
    assert!(stdout(&output).contains("Deleted api"));

    let direct = json(&ok(dir, &["dep", "list", "web", "--json"]));
    assert_eq!(direct, Value::Array(vec![]));
    fails(dir, &["show", "api"]);
}

// ============================================================================
// Update, Propagation and Impact Tests
// ============================================================================

#[rstest]
fn test_cli_update_version_propagates(chain_dir: TempDir) {
    let output = ok(chain_dir.path(), &["update", "db", "-v", "2.0.0", "--by", "alice"]);

    let stdout = stdout(&output);
    assert!(stdout.contains("Updated db 1.0.0 -> 2.0.0"));
    assert!(stdout.contains("CASCADE propagation reached 2 component(s), depth 2: api, web"));
}

#[rstest]
fn test_cli_update_is_persisted(chain_dir: TempDir) {
    let dir = chain_dir.path();
    ok(dir, &["update", "api", "-s", "deprecated", "-m", "owner=core"]);

    let shown = json(&ok(dir, &["show", "api", "--json"]));
    assert_eq!(shown["status"], "DEPRECATED");
    assert_eq!(shown["metadata"]["owner"], "core");
}

#[rstest]
fn test_cli_propagate_rollback(chain_dir: TempDir) {
    let result = json(&ok(chain_dir.path(), &["propagate", "db", "--rollback", "--json"]));

    assert_eq!(result["propagation_type"], "ROLLBACK");
    assert_eq!(result["affected"], serde_json::json!(["api", "web"]));
    assert_eq!(result["truncated"], false);
}

#[rstest]
fn test_cli_impact_grades_components(chain_dir: TempDir) {
    let analysis = json(&ok(
        chain_dir.path(),
        &["impact", "web", "-p", "shop", "-D", "Replace checkout flow", "--json"],
    ));

    let affected = analysis["affected_components"].as_array().unwrap();
    assert_eq!(affected.len(), 3);
    assert_eq!(affected[0]["component_id"], "web");
    assert_eq!(affected[0]["impact_level"], "CRITICAL");
    assert_eq!(affected[1]["impact_level"], "HIGH");
    assert_eq!(affected[2]["impact_level"], "MEDIUM");
    assert_eq!(analysis["risk_assessment"]["overall_risk"], "HIGH");
}

#[rstest]
fn test_cli_impact_shallow_text(chain_dir: TempDir) {
    let output = ok(
        chain_dir.path(),
        &["impact", "web", "-p", "shop", "-D", "Tweak", "-d", "shallow"],
    );

    let stdout = stdout(&output);
    assert!(stdout.contains("Affected: 2 (1 direct, 1 indirect)"));
    assert!(stdout.contains("Recommendations"));
}

// ============================================================================
// Replay Tests
// ============================================================================

#[rstest]
fn test_cli_replay_applies_events(initialized_dir: TempDir) {
    let dir = initialized_dir.path();
    let events = [
        r#"{"stream":"generation_request","request_id":"gen-1","project_id":"shop","components":[{"id":"web","name":"Web","type":"FRONTEND","dependencies":["api"]},{"id":"api","name":"API","type":"BACKEND"}]}"#,
        "",
        r#"{"stream":"component_update","event_id":"evt-1","component_id":"api","project_id":"shop","update_type":"VERSION_CHANGE","new_version":"1.1.0"}"#,
        r#"{"stream":"component_update","event_id":"evt-1","component_id":"api","project_id":"shop","update_type":"VERSION_CHANGE","new_version":"1.1.0"}"#,
    ];
    std::fs::write(dir.join("events.jsonl"), events.join("\n")).unwrap();

    let output = ok(dir, &["replay", "events.jsonl"]);

    let stdout = stdout(&output);
    assert!(stdout.contains("line 1: registered 2 component(s)"));
    assert!(stdout.contains("line 3: Updated api 1.0.0 -> 1.1.0"));
    assert!(stdout.contains("update-propagation"));
    assert!(stdout.contains("line 4: duplicate event evt-1 skipped"));

    let shown = json(&ok(dir, &["show", "api", "--json"]));
    assert_eq!(shown["version"], "1.1.0");
}

#[rstest]
fn test_cli_replay_stops_at_first_failure(initialized_dir: TempDir) {
    let dir = initialized_dir.path();
    let events = [
        r#"{"stream":"component_update","event_id":"e1","component_id":"api","project_id":"shop","update_type":"CREATE","new_version":"1.0.0","changes":{"type":"BACKEND"}}"#,
        "not json",
        r#"{"stream":"component_update","event_id":"e2","component_id":"db","project_id":"shop","update_type":"CREATE","new_version":"1.0.0","changes":{"type":"DATABASE"}}"#,
    ];
    std::fs::write(dir.join("events.jsonl"), events.join("\n")).unwrap();

    let stderr = fails(dir, &["replay", "events.jsonl"]);
    assert!(stderr.contains("line 2"));

    // Work before the failure is kept.
    let listed = json(&ok(dir, &["list", "--json"]));
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let stderr = fails(dir, &["replay", "events.jsonl", "--keep-going"]);
    assert!(stderr.contains("event(s) failed"));
    let listed = json(&ok(dir, &["list", "--json"]));
    assert_eq!(listed.as_array().unwrap().len(), 2);
}
