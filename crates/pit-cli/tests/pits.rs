use std::fs;
use std::path::PathBuf;
use std::process::Command;

use tempfile::TempDir;

fn bin(pit_home: &PathBuf) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_pit"));
    command.env("PIT_HOME", pit_home);
    command
}

fn project_fixture() -> (TempDir, PathBuf, PathBuf) {
    let temp = TempDir::new().expect("tempdir");
    let root = temp.path().canonicalize().expect("canonical root");
    let pit_home = root.join("pithome");
    let project_dir = root.join("proj");
    fs::create_dir_all(&project_dir).expect("project dir");

    let output = bin(&pit_home)
        .arg("init")
        .arg(&project_dir)
        .output()
        .expect("run init");
    assert!(output.status.success(), "{:?}", output);
    (temp, pit_home, project_dir)
}

#[test]
fn add_list_delete_worked_example() {
    let (_temp, pit_home, project_dir) = project_fixture();

    let output = bin(&pit_home)
        .current_dir(&project_dir)
        .args(["add", "--group", "url", "--name", "docs", "--location", "http://x"])
        .output()
        .expect("run add");
    assert!(output.status.success(), "{:?}", output);
    assert!(String::from_utf8_lossy(&output.stdout).contains("Added pit 1"));

    let output = bin(&pit_home)
        .current_dir(&project_dir)
        .arg("list")
        .output()
        .expect("run list");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("1 | url | docs | http://x"), "{stdout}");

    let output = bin(&pit_home)
        .current_dir(&project_dir)
        .args(["delete", "1"])
        .output()
        .expect("run delete");
    assert!(output.status.success());

    let output = bin(&pit_home)
        .current_dir(&project_dir)
        .arg("list")
        .output()
        .expect("run list");
    assert!(output.status.success());
    assert!(!String::from_utf8_lossy(&output.stdout).contains("docs"));
}

#[test]
fn add_requires_at_least_one_field() {
    let (_temp, pit_home, project_dir) = project_fixture();

    let output = bin(&pit_home)
        .current_dir(&project_dir)
        .arg("add")
        .output()
        .expect("run add");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("EmptyPitError"), "{stderr}");
}

#[test]
fn add_rejects_an_unknown_group() {
    let (_temp, pit_home, project_dir) = project_fixture();

    let output = bin(&pit_home)
        .current_dir(&project_dir)
        .args(["add", "--group", "bogus"])
        .output()
        .expect("run add");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("InvalidTokenError"), "{stderr}");
}

#[test]
fn pit_names_stay_unique_within_the_project() {
    let (_temp, pit_home, project_dir) = project_fixture();

    let output = bin(&pit_home)
        .current_dir(&project_dir)
        .args(["add", "--name", "docs"])
        .output()
        .expect("run add");
    assert!(output.status.success());

    let output = bin(&pit_home)
        .current_dir(&project_dir)
        .args(["add", "--name", "docs"])
        .output()
        .expect("run add");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("NameTakenError"), "{stderr}");
}

#[test]
fn edit_applies_only_the_provided_fields() {
    let (_temp, pit_home, project_dir) = project_fixture();

    let output = bin(&pit_home)
        .current_dir(&project_dir)
        .args(["add", "--group", "url", "--name", "docs", "--location", "http://old"])
        .output()
        .expect("run add");
    assert!(output.status.success());

    let output = bin(&pit_home)
        .current_dir(&project_dir)
        .args(["edit", "docs", "--location", "http://new"])
        .output()
        .expect("run edit");
    assert!(output.status.success(), "{:?}", output);

    let output = bin(&pit_home)
        .current_dir(&project_dir)
        .arg("list")
        .output()
        .expect("run list");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("1 | url | docs | http://new"), "{stdout}");
}

#[test]
fn pit_commands_fail_outside_any_project() {
    let (_temp, pit_home, project_dir) = project_fixture();
    let elsewhere = project_dir.parent().expect("parent").join("elsewhere");
    fs::create_dir_all(&elsewhere).expect("dir");

    let output = bin(&pit_home)
        .current_dir(&elsewhere)
        .args(["add", "--name", "docs"])
        .output()
        .expect("run add");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("NotFoundError"), "{stderr}");
}
