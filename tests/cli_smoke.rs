use std::{
    path::Path,
    process::{Command, Output},
};

use serde_json::Value;

fn docask(config_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_docask"))
        .args(args)
        .env("DOCASK_CONFIG", config_dir.join("config.toml"))
        .env_remove("DOCASK_API_KEY")
        .env_remove("GEMINI_API_KEY")
        .env_remove("DOCASK_MODEL")
        .env_remove("DOCASK_ENDPOINT")
        .env_remove("DOCASK_LOG")
        .output()
        .expect("failed to run docask")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn vocab_json_lists_every_value() {
    let tmp = tempfile::tempdir().unwrap();
    let output = docask(tmp.path(), &["vocab", "--json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let value: Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(value["responseSignals"].as_array().unwrap().len(), 9);
    assert_eq!(value["vectorDbBackends"][0], "QDRANT");
    assert_eq!(value["distanceMethods"][1], "dot");
}

#[test]
fn extract_prints_provenance_blocks_in_order() {
    let tmp = tempfile::tempdir().unwrap();
    let docs = tmp.path().join("docs");
    std::fs::create_dir_all(docs.join("sub")).unwrap();
    std::fs::write(docs.join("a.txt"), "alpha").unwrap();
    std::fs::write(docs.join("sub").join("b.txt"), "beta").unwrap();
    std::fs::write(docs.join("ignored.md"), "not loaded").unwrap();

    let output = docask(tmp.path(), &["extract", docs.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let text = stdout(&output);
    let a = text.find("--- START OF FILE: a.txt ---\nalpha\n").unwrap();
    let b = text.find("beta\n--- END OF FILE: ").unwrap();
    assert!(a < b);
    assert!(!text.contains("not loaded"));
}

#[test]
fn extract_json_reports_unsupported_files() {
    let tmp = tempfile::tempdir().unwrap();
    let note = tmp.path().join("note.txt");
    let sheet = tmp.path().join("sheet.csv");
    std::fs::write(&note, "hello").unwrap();
    std::fs::write(&sheet, "a,b").unwrap();

    let output = docask(
        tmp.path(),
        &[
            "extract",
            "--json",
            note.to_str().unwrap(),
            sheet.to_str().unwrap(),
        ],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let value: Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(value["files"].as_array().unwrap().len(), 1);
    assert_eq!(value["files"][0]["name"], "note.txt");
    assert_eq!(value["diagnostics"].as_array().unwrap().len(), 1);
    assert_eq!(value["diagnostics"][0]["name"], "sheet.csv");
}

#[test]
fn extract_missing_path_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let missing = tmp.path().join("nope");
    let output = docask(tmp.path(), &["extract", missing.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("path not found"));
}

#[test]
fn ask_without_api_key_fails_before_sending() {
    let tmp = tempfile::tempdir().unwrap();
    let note = tmp.path().join("note.txt");
    std::fs::write(&note, "hello").unwrap();

    let output = docask(
        tmp.path(),
        &["ask", note.to_str().unwrap(), "-q", "what?"],
    );
    assert!(!output.status.success());
    assert!(stderr(&output).contains("no API key configured"));
}

#[test]
fn config_reads_file_and_redacts_key() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(
        tmp.path().join("config.toml"),
        "api_key = \"abcdefgh12345678\"\nmodel = \"gemini-file\"\nmax_attempts = 3\n",
    )
    .unwrap();

    let output = docask(tmp.path(), &["config", "--json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let value: Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(value["model"], "gemini-file");
    assert_eq!(value["maxAttempts"], 3);
    assert_eq!(value["apiKey"], "********5678");
    assert_eq!(value["maxContentChars"], 150_000);
}

#[test]
fn model_flag_overrides_config_file() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("config.toml"), "model = \"gemini-file\"\n")
        .unwrap();

    let output = docask(
        tmp.path(),
        &["config", "--json", "--model", "gemini-flag"],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let value: Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(value["model"], "gemini-flag");
    assert_eq!(value["apiKey"], "(not set)");
}
