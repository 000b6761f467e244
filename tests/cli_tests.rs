use std::{fs, path::Path};

use assert_cmd::Command;
use predicates::str::contains;
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};

fn revrec(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("revrec_cli").unwrap();
    cmd.arg("--home").arg(home).arg("--quiet").env("NO_COLOR", "1");
    cmd
}

fn stdout_json(cmd: &mut Command) -> Value {
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).expect("stdout is JSON")
}

fn home_with_bundle() -> (TempDir, std::path::PathBuf) {
    let home = tempdir().unwrap();
    let bundle = home.path().join("bundle.json");
    let contents = json!({
        "contract": {
            "id": "c1",
            "customerId": "cust-1",
            "totalValue": "1200",
            "startDate": "2025-01-01",
            "endDate": "2025-12-31",
            "paymentTerms": "quarterly net 15",
            "status": "active",
            "currentVersionId": "c1-v1"
        },
        "versions": [
            {"id": "c1-v1", "contractId": "c1", "versionNumber": 1, "totalValue": "1200"}
        ],
        "lineItems": [
            {"id": "li-1", "contractId": "c1", "versionId": "c1-v1", "totalPrice": "1200",
             "recognitionMethod": "over_time"}
        ]
    });
    fs::write(&bundle, contents.to_string()).unwrap();
    (home, bundle)
}

#[test]
fn import_generates_billing_and_defers_initial_entry() {
    let (home, bundle) = home_with_bundle();

    let out = stdout_json(
        revrec(home.path())
            .args(["--tenant", "acme", "import"])
            .arg(&bundle)
            .args(["--as-of", "2025-01-01"]),
    );
    assert_eq!(out["imported"]["contractId"], "c1");
    assert_eq!(out["onCreate"]["billing"]["created"].as_array().unwrap().len(), 4);
    assert_eq!(out["onCreate"]["initialEntry"]["decision"], "deferred");
    assert!(home
        .path()
        .join("data/tenants/acme/contracts/c1.json")
        .exists());

    revrec(home.path())
        .args(["--tenant", "acme", "import"])
        .arg(&bundle)
        .assert()
        .failure()
        .stderr(contains("already-exists"));
}

#[test]
fn recompute_then_replay_is_idempotent() {
    let (home, bundle) = home_with_bundle();
    revrec(home.path())
        .arg("import")
        .arg(&bundle)
        .args(["--as-of", "2025-01-01"])
        .assert()
        .success();

    let recognition = stdout_json(revrec(home.path()).args(["recompute", "c1", "--as-of", "2025-03-31"]));
    assert_eq!(recognition["versionNumber"], 1);
    assert_eq!(recognition["schedule"].as_array().unwrap().len(), 12);

    let first = stdout_json(revrec(home.path()).args(["replay", "c1", "--up-to", "2025-03-31"]));
    assert_eq!(first, json!({"created": 3, "skipped": 0}));
    let second = stdout_json(revrec(home.path()).args(["replay", "c1", "--up-to", "2025-03-31"]));
    assert_eq!(second, json!({"created": 0, "skipped": 3}));

    let trial = stdout_json(revrec(home.path()).args(["trial-balance", "c1"]));
    assert_eq!(trial["entries"], 3);
    assert_eq!(trial["totals"]["debits"], trial["totals"]["credits"]);
}

#[test]
fn billing_status_change_fires_the_ledger_trigger() {
    let (home, bundle) = home_with_bundle();
    revrec(home.path())
        .arg("import")
        .arg(&bundle)
        .args(["--as-of", "2025-01-01"])
        .assert()
        .success();

    let out = stdout_json(revrec(home.path()).args([
        "billing",
        "status",
        "c1-bill-001",
        "invoiced",
        "--at",
        "2025-01-01",
    ]));
    assert_eq!(out["billing"]["status"], "invoiced");
    assert_eq!(out["trigger"]["contractId"], "c1");

    revrec(home.path())
        .args(["billing", "status", "c1-bill-001", "cancelled"])
        .assert()
        .failure()
        .stderr(contains("failed-precondition"));
}

#[test]
fn missing_contracts_report_not_found() {
    let home = tempdir().unwrap();
    revrec(home.path())
        .args(["replay", "ghost"])
        .assert()
        .failure()
        .stderr(contains("not-found"));
    revrec(home.path())
        .args(["reconcile", "ghost", "--opening", "cash=10"])
        .assert()
        .failure()
        .stderr(contains("not-found"));
}

#[test]
fn sweep_defaults_to_the_selected_tenant() {
    let (home, bundle) = home_with_bundle();
    revrec(home.path())
        .arg("import")
        .arg(&bundle)
        .args(["--as-of", "2025-01-01"])
        .assert()
        .success();

    let report = stdout_json(revrec(home.path()).args(["sweep", "--as-of", "2025-02-28"]));
    assert_eq!(report["tenants"], 1);
    assert_eq!(report["contracts"], 1);
    assert_eq!(report["succeeded"], 1);
    assert_eq!(report["failures"], json!([]));
}

#[test]
fn config_command_shows_defaults() {
    let home = tempdir().unwrap();
    revrec(home.path())
        .arg("config")
        .assert()
        .success()
        .stdout(contains("\"default_currency\": \"USD\""))
        .stdout(contains("\"log_filter\": \"revrec=info\""));
}
