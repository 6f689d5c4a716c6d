use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const VALID: &str = r#"
timezone_offset_minutes: 180
admin_chat_id: -100500
telegram:
  token: "123:abc"
statistics:
  receivers: [1]
menu:
  categories: [Soups]
  dishes:
    - name: Borscht
      price: 150
      category: Soups
"#;

fn lunchbot() -> Command {
    let mut cmd = Command::cargo_bin("lunchbot").unwrap();
    cmd.env_remove("LUNCHBOT_TOKEN");
    cmd
}

fn write_config(dir: &TempDir, yaml: &str) -> std::path::PathBuf {
    let path = dir.path().join("lunchbot.yaml");
    std::fs::write(&path, yaml).unwrap();
    path
}

#[test]
fn check_config_accepts_valid_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, VALID);
    lunchbot()
        .args(["check-config", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Config is valid. No warnings."));
}

#[test]
fn check_config_reports_errors_and_fails() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "timezone_offset_minutes: 60\n");
    lunchbot()
        .args(["check-config", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error] admin_chat_id is not set"))
        .stdout(predicate::str::contains("[error] telegram.token is not set"))
        .stderr(predicate::str::contains("configuration error(s)"));
}

#[test]
fn check_config_json_lists_warnings() {
    let dir = TempDir::new().unwrap();
    let yaml = VALID.replace("  receivers: [1]\n", "");
    let path = write_config(&dir, &yaml);
    let output = lunchbot()
        .args(["check-config", "--json", "--config"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let warnings = value["warnings"].as_array().unwrap();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0]["level"], "warning");
    assert!(warnings[0]["message"]
        .as_str()
        .unwrap()
        .contains("statistics.receivers"));
}

#[test]
fn missing_config_file_fails_with_path() {
    let dir = TempDir::new().unwrap();
    lunchbot()
        .args(["check-config", "--config"])
        .arg(dir.path().join("nope.yaml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load config"))
        .stderr(predicate::str::contains("nope.yaml"));
}

#[test]
fn run_refuses_to_start_without_token() {
    let dir = TempDir::new().unwrap();
    let yaml = VALID.replace("123:abc", "");
    let path = write_config(&dir, &yaml);
    lunchbot()
        .args(["run", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration has 1 error(s)"));
}
