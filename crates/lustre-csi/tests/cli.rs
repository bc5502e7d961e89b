//! End-to-end tests of the `lustre-csi-node` binary in mock mount mode.

use assert_cmd::Command;
use predicates::prelude::*;

fn node() -> Command {
    let mut cmd = Command::cargo_bin("lustre-csi-node").unwrap();
    cmd.env_remove("KUBE_NODE_NAME")
        .env_remove("LUSTRE_CSI_WORKING_MOUNT_DIR")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn version_prints_yaml() {
    node()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("Driver Name: lustre-csi.hpe.com"))
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn info_reports_node_and_capabilities() {
    node()
        .args(["--node-id", "node-7", "--enable-mock-mount", "info"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"node_id\": \"node-7\""))
        .stdout(predicate::str::contains("GET_VOLUME_STATS"))
        .stdout(predicate::str::contains("SINGLE_NODE_MULTI_WRITER"));
}

#[test]
fn mock_publish_and_unpublish() {
    let temp = tempfile::tempdir().unwrap();
    let target = temp.path().join("pods/p1/mount");
    let work = temp.path().join("work");

    node()
        .arg("--enable-mock-mount")
        .arg("--working-mount-dir")
        .arg(&work)
        .arg("publish")
        .arg("lustrefs")
        .arg(&target)
        .args(["--context", "mgs-ip-address=10.0.0.1@tcp"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"published\": true"));
    assert!(target.is_dir());

    node()
        .arg("--enable-mock-mount")
        .arg("unpublish")
        .arg("lustrefs")
        .arg(&target)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"published\": false"));
    assert!(!target.exists());
}

#[test]
fn publish_without_server_address_fails() {
    let temp = tempfile::tempdir().unwrap();

    node()
        .arg("--enable-mock-mount")
        .arg("publish")
        .arg("lustrefs")
        .arg(temp.path().join("target"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("mgs-ip-address must be provided"));
}

#[test]
fn stats_of_missing_path_fails() {
    let temp = tempfile::tempdir().unwrap();

    node()
        .arg("--enable-mock-mount")
        .arg("stats")
        .arg("lustrefs")
        .arg(temp.path().join("missing"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}
