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
fn goto_relays_a_cd_command() {
    let (_temp, pit_home, project_dir) = project_fixture();

    let output = bin(&pit_home).args(["goto", "1"]).output().expect("run");
    assert!(output.status.success(), "{:?}", output);

    let relayed = fs::read_to_string(pit_home.join("pit.tmp")).expect("relay file");
    assert_eq!(relayed, format!("cd {}\n", project_dir.display()));
}

#[test]
fn goto_by_name_resolves_the_project() {
    let (_temp, pit_home, project_dir) = project_fixture();
    let output = bin(&pit_home)
        .args(["update", "1", "--name", "alpha"])
        .output()
        .expect("run update");
    assert!(output.status.success());

    let output = bin(&pit_home).args(["goto", "alpha"]).output().expect("run");
    assert!(output.status.success());
    let relayed = fs::read_to_string(pit_home.join("pit.tmp")).expect("relay file");
    assert!(relayed.contains(project_dir.to_string_lossy().as_ref()));
}

#[test]
fn start_is_a_no_op_without_a_script() {
    let (_temp, pit_home, project_dir) = project_fixture();

    let output = bin(&pit_home)
        .current_dir(&project_dir)
        .arg("start")
        .output()
        .expect("run start");
    assert!(output.status.success(), "{:?}", output);
    assert!(!pit_home.join("pit.tmp").exists());
}

#[test]
fn start_sources_the_project_script_when_present() {
    let (_temp, pit_home, project_dir) = project_fixture();
    let script = project_dir.join(".pit").join("start.sh");
    fs::write(&script, "echo started\n").expect("script");

    let output = bin(&pit_home)
        .current_dir(&project_dir)
        .arg("start")
        .output()
        .expect("run start");
    assert!(output.status.success(), "{:?}", output);

    let relayed = fs::read_to_string(pit_home.join("pit.tmp")).expect("relay file");
    assert_eq!(relayed, format!(". {}\n", script.display()));
}

#[test]
fn stop_sources_the_stop_script() {
    let (_temp, pit_home, project_dir) = project_fixture();
    let script = project_dir.join(".pit").join("stop.sh");
    fs::write(&script, "echo stopped\n").expect("script");

    let output = bin(&pit_home)
        .current_dir(&project_dir)
        .arg("stop")
        .output()
        .expect("run stop");
    assert!(output.status.success(), "{:?}", output);

    let relayed = fs::read_to_string(pit_home.join("pit.tmp")).expect("relay file");
    assert_eq!(relayed, format!(". {}\n", script.display()));
}

#[test]
fn open_relays_a_group_appropriate_action() {
    let (_temp, pit_home, project_dir) = project_fixture();
    let output = bin(&pit_home)
        .current_dir(&project_dir)
        .args(["add", "--group", "url", "--name", "docs", "--location", "http://x"])
        .output()
        .expect("run add");
    assert!(output.status.success());

    let output = bin(&pit_home)
        .current_dir(&project_dir)
        .args(["open", "docs"])
        .output()
        .expect("run open");
    assert!(output.status.success(), "{:?}", output);

    let relayed = fs::read_to_string(pit_home.join("pit.tmp")).expect("relay file");
    assert!(relayed.ends_with(" http://x\n"), "{relayed}");
}

#[test]
fn open_fails_when_the_pit_has_no_location() {
    let (_temp, pit_home, project_dir) = project_fixture();
    let output = bin(&pit_home)
        .current_dir(&project_dir)
        .args(["add", "--name", "docs"])
        .output()
        .expect("run add");
    assert!(output.status.success());

    let output = bin(&pit_home)
        .current_dir(&project_dir)
        .args(["open", "docs"])
        .output()
        .expect("run open");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no location"), "{stderr}");
}
