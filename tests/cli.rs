use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn invalid_reference_exits_with_code_one() {
    Command::cargo_bin("ytscribe")
        .unwrap()
        .args(["fetch", "not a video"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("could not extract a video id"));
}

#[test]
fn languages_rejects_invalid_reference() {
    Command::cargo_bin("ytscribe")
        .unwrap()
        .args(["languages", "%%%"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("could not extract a video id"));
}

#[test]
fn help_lists_subcommands() {
    Command::cargo_bin("ytscribe")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("fetch"))
        .stdout(predicate::str::contains("languages"))
        .stdout(predicate::str::contains("strategies"));
}

#[test]
fn fetch_help_documents_the_fallback_controls() {
    Command::cargo_bin("ytscribe")
        .unwrap()
        .args(["fetch", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--granularity"))
        .stdout(predicate::str::contains("--force"))
        .stdout(predicate::str::contains("--no-escalation"))
        .stdout(predicate::str::contains("--max-retries"));
}

#[test]
fn unknown_granularity_is_a_usage_error() {
    Command::cargo_bin("ytscribe")
        .unwrap()
        .args(["fetch", "dQw4w9WgXcQ", "--granularity", "haiku"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("granularity"));
}
