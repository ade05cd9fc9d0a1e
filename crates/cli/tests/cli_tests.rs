//! CLI integration tests

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

fn coffeebot() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_coffeebot"));
    command
        .env_remove("GEMINI_API_KEY")
        .env_remove("DATA_CLEAN")
        .env_remove("ART_PRICE")
        .env_remove("ART_CONSUMPTION")
        .env_remove("ART_PROFIT")
        .env("RUST_LOG", "off");
    command
}

fn run(args: &[&str]) -> Output {
    coffeebot().args(args).output().expect("Failed to execute command")
}

/// Historical data and a price artifact predicting `2 * year - 4000`
fn fixture() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("coffee.csv"),
        "Country,Coffee type,year,price\nColombia,Arabica,2019,100\nColombia,Arabica,2020,110\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("price_model.json"),
        r#"{"model": {"kind": "linear", "feature_names": ["year"], "coefficients": [2.0], "intercept": -4000.0},
            "feat_cols": ["year"], "PI80_abs": 1.5}"#,
    )
    .unwrap();
    dir
}

fn path_arg(dir: &Path, name: &str) -> String {
    dir.join(name).to_string_lossy().into_owned()
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = run(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Coffee market"), "Should show app description");
    assert!(stdout.contains("chat"), "Should show chat command");
    assert!(stdout.contains("predict"), "Should show predict command");
    assert!(stdout.contains("evaluate"), "Should show evaluate command");
    assert!(stdout.contains("reshape"), "Should show reshape command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = run(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("coffeebot"), "Should show binary name");
}

/// Test predict subcommand help
#[test]
fn test_predict_help() {
    let output = run(&["predict", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Predict help should succeed");
    assert!(stdout.contains("--country"), "Should show country option");
    assert!(stdout.contains("--type"), "Should show type option");
    assert!(stdout.contains("--year"), "Should show year option");
}

/// Test format option
#[test]
fn test_format_option() {
    let output = run(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("--format"), "Should show format option");
    assert!(stdout.contains("table"), "Should show table format");
    assert!(stdout.contains("json"), "Should show json format");
    assert!(stdout.contains("--log-json"), "Should show log-json option");
}

/// Test unknown target error handling
#[test]
fn test_invalid_target() {
    let output = run(&["predict", "precios", "--country", "Colombia", "--type", "Arabica", "--year", "2021"]);
    assert!(!output.status.success(), "Unknown target should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("precios"), "Should name the bad target");
}

/// Test missing required argument error handling
#[test]
fn test_missing_argument() {
    let output = run(&["predict", "precio", "--country", "Colombia"]);
    assert!(!output.status.success(), "Missing argument should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("required") || stderr.contains("error"),
        "Should show error about missing argument"
    );
}

/// Test a one-shot prediction with JSON output
#[test]
fn test_predict_json() {
    let dir = fixture();
    let output = run(&[
        "--data",
        &path_arg(dir.path(), "coffee.csv"),
        "--art-price",
        &path_arg(dir.path(), "price_model.json"),
        "--format",
        "json",
        "predict",
        "precio",
        "--country",
        "colombia",
        "--type",
        "arabica",
        "--year",
        "2021",
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["pred"], 42.0);
    assert_eq!(result["key"]["country"], "Colombia");
    assert_eq!(result["pi80"]["lo"], 40.5);
    assert!(result.get("pi95").is_none());
}

/// Test a prediction against a missing artifact
#[test]
fn test_predict_missing_artifact() {
    let dir = fixture();
    let output = run(&[
        "--data",
        &path_arg(dir.path(), "coffee.csv"),
        "--art-profit",
        &path_arg(dir.path(), "profit_model.json"),
        "predict",
        "utilidad",
        "--country",
        "Colombia",
        "--type",
        "Arabica",
        "--year",
        "2021",
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not found"), "{}", stderr);
}

/// Test the chat loop answers commands without a chat model key
#[test]
fn test_chat_prediction_turn() {
    let dir = fixture();
    let mut child = coffeebot()
        .args([
            "--data",
            &path_arg(dir.path(), "coffee.csv"),
            "--art-price",
            &path_arg(dir.path(), "price_model.json"),
            "chat",
        ])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn chat");

    child
        .stdin
        .take()
        .unwrap()
        .write_all("/pred precio pais=Colombia tipo=Arabica año=2021\nsalir\n".as_bytes())
        .unwrap();
    let output = child.wait_with_output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("✅ Precio for Colombia / Arabica / 2021"), "{}", stdout);
    assert!(stdout.contains("- pred: 42.000 (PI80: 40.500–43.500)"), "{}", stdout);
}

/// Test the evaluate command on a small CSV
#[test]
fn test_evaluate_json() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("scores.csv");
    std::fs::write(&file, "actual,predicted\n10,12\n20,18\n").unwrap();

    let output = run(&["--format", "json", "evaluate", &file.to_string_lossy()]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["mae"], 2.0);
    assert_eq!(report["rmse"], 2.0);
}
