//! Integration tests for argument handling that never touch the network.

use assert_cmd::Command;
use predicates::prelude::*;

fn offprint() -> Command {
  Command::cargo_bin("offprint").unwrap()
}

#[test]
fn list_screens_shows_preset_table() {
  offprint()
    .arg("--list-screens")
    .assert()
    .success()
    .stdout(predicate::str::contains("kindle-paperwhite"))
    .stdout(predicate::str::contains("kindle-scribe"))
    .stdout(predicate::str::contains("a5"));
}

#[test]
fn no_papers_is_a_usage_error() {
  offprint().assert().failure().stderr(predicate::str::contains("Usage"));
}

#[test]
fn width_requires_height() {
  offprint()
    .args(["--width", "100", "2402.08954"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("--height"));
}

#[test]
fn height_requires_width() {
  offprint()
    .args(["--height", "200", "2402.08954"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("--width"));
}

#[test]
fn unknown_preset_is_rejected_before_any_network() {
  offprint()
    .args(["--screen", "kindle-oasis", "2402.08954"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("unknown screen preset"));
}

#[test]
fn no_math_images_flag_is_accepted() {
  offprint().args(["--no-math-images", "--list-screens"]).assert().success();
}

#[test]
fn nonpositive_dimensions_are_rejected() {
  offprint()
    .args(["--width", "0", "--height", "200", "2402.08954"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("positive"));
}
