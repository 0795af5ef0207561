use assert_cmd::Command;
use predicates::prelude::*;

fn sso_cli() -> Command {
    let mut cmd = Command::cargo_bin("sso-cli").unwrap();
    cmd.env_remove("JWT_SECRET");
    cmd
}

#[test]
fn version_prints_package_version() {
    sso_cli()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn gen_secret_prints_64_alphanumerics() {
    let output = sso_cli().arg("gen-secret").output().unwrap();
    assert!(output.status.success());
    let secret = String::from_utf8(output.stdout).unwrap();
    let secret = secret.trim();
    assert_eq!(secret.len(), 64);
    assert!(secret.chars().all(|c| c.is_ascii_alphanumeric()));
}

#[test]
fn gen_secret_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jwt-secret");

    sso_cli()
        .args(["gen-secret", "--output"])
        .arg(&path)
        .assert()
        .success();
    let first = std::fs::read_to_string(&path).unwrap();
    assert_eq!(first.len(), 64);

    sso_cli()
        .args(["gen-secret", "--output"])
        .arg(&path)
        .assert()
        .failure();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), first);
}

#[test]
fn hash_password_reads_stdin() {
    sso_cli()
        .args(["hash-password", "--cost", "4"])
        .write_stdin("correct horse\n")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("$2"));
}

#[test]
fn issued_token_verifies_with_same_secret_only() {
    let output = sso_cli()
        .args(["issue-token", "--subject", "42", "--secret", "cli-secret"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let pair: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let access = pair["access_token"].as_str().unwrap();

    sso_cli()
        .args(["verify-token", access, "--secret", "cli-secret"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"user_id\": 42"));

    sso_cli()
        .args(["verify-token", access, "--secret", "other-secret"])
        .assert()
        .failure();
}

#[test]
fn secret_can_come_from_environment() {
    sso_cli()
        .env("JWT_SECRET", "env-secret")
        .args(["issue-token", "--subject", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("refresh_token"));
}
