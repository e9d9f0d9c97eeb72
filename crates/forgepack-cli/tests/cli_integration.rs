//! CLI subprocess integration tests.
//!
//! These tests invoke the `forgepack` binary as a subprocess and verify
//! exit codes, stdout content, and JSON output shape.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn forgepack_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_forgepack"));
    cmd.env_remove("FORGEPACK_LOG");
    cmd
}

fn write_config(dir: &Path, file: &str, content: &str) -> PathBuf {
    let path = dir.join(file);
    std::fs::write(&path, content).unwrap();
    path
}

fn run(args: &[&str]) -> Output {
    forgepack_bin().args(args).output().unwrap()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout must be JSON ({e}): {}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

#[test]
fn cli_version_exits_zero() {
    let output = run(&["--version"]);
    assert!(output.status.success(), "forgepack --version must exit 0");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("forgepack"), "version output: {stdout}");
}

#[test]
fn cli_help_lists_commands() {
    let output = run(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["build", "watch", "inspect", "validate", "completions"] {
        assert!(stdout.contains(command), "help must list '{command}': {stdout}");
    }
}

#[test]
fn cli_build_with_mock_reports_stats() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "forgepack.toml", "name = \"app\"\nentry = \"./src/index.js\"\n");
    let output = run(&["--driver", "mock", "--json", "-c", &config.to_string_lossy(), "build"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let stats = stdout_json(&output);
    assert_eq!(stats["name"], "app");
    assert_eq!(stats["mode"], "production");
    assert_eq!(stats["assets"][0], "mock:./src/index.js");
}

#[test]
fn cli_build_with_inspect_plans_assets() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        "forgepack.json",
        r#"{ "name": "web", "devtool": "source-map", "output": { "path": "out" } }"#,
    );
    let output = run(&["--json", "-c", &config.to_string_lossy(), "build"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let stats = stdout_json(&output);
    let assets: Vec<String> = stats["assets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a.as_str().unwrap().to_owned())
        .collect();
    assert_eq!(assets.len(), 2);
    assert!(assets[0].ends_with("main.js"), "{assets:?}");
    assert!(assets[1].ends_with("main.js.map"), "{assets:?}");
    assert!(assets[0].contains("out"), "{assets:?}");
}

#[test]
fn cli_build_multi_reports_every_child() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        "forgepack.toml",
        r#"
[[configurations]]
name = "server"
dependencies = ["client"]

[[configurations]]
name = "client"
"#,
    );
    let output = run(&["--driver", "mock", "--json", "-c", &config.to_string_lossy(), "build"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let stats = stdout_json(&output);
    assert_eq!(stats["children"][0]["name"], "server");
    assert_eq!(stats["children"][1]["name"], "client");
}

#[test]
fn cli_invalid_config_exits_with_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "forgepack.toml", "mode = \"fast\"\nwatch = 3\n");
    let output = run(&["-c", &config.to_string_lossy(), "build"]);
    assert_eq!(output.status.code(), Some(2));
    let err = stderr(&output);
    assert!(err.contains("configuration.mode"), "{err}");
    assert!(err.contains("configuration.watch"), "{err}");
}

#[test]
fn cli_unknown_dependency_exits_with_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        "forgepack.json",
        r#"[{ "name": "a", "dependencies": ["ghost"] }]"#,
    );
    let output = run(&["--driver", "mock", "-c", &config.to_string_lossy(), "build"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("ghost"));
}

#[test]
fn cli_missing_config_exits_with_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    let output = run(&["-c", &missing.to_string_lossy(), "validate"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("failed to read configuration"));
}

#[test]
fn cli_unknown_driver_exits_with_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "forgepack.toml", "name = \"app\"\n");
    let output = run(&["--driver", "webpack", "-c", &config.to_string_lossy(), "build"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("unknown build driver"));
}

#[test]
fn cli_validate_reports_fingerprints() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "forgepack.toml", "name = \"app\"\n");
    let output = run(&["--json", "-c", &config.to_string_lossy(), "validate"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let report = stdout_json(&output);
    assert_eq!(report["valid"], true);
    assert_eq!(report["configurations"][0]["name"], "app");
    assert_eq!(report["configurations"][0]["hash"].as_str().unwrap().len(), 64);
}

#[test]
fn cli_inspect_shows_order_and_deprecation() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        "forgepack.json",
        r#"[
            { "name": "server", "dependencies": ["client"], "watch": true },
            { "name": "client", "plugins": ["mode-preset"] }
        ]"#,
    );
    let output = run(&["--json", "-c", &config.to_string_lossy(), "inspect"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let report = stdout_json(&output);
    assert_eq!(report["multi"], true);
    assert_eq!(report["watch"], true);
    assert_eq!(report["buildOrder"], serde_json::json!(["client", "server"]));
    assert_eq!(report["deprecations"][0]["code"], "FORGEPACK_WATCH_WITHOUT_CALLBACK");
    assert_eq!(report["engines"][1]["options"]["mode"], "development");
    assert_eq!(
        report["engines"][0]["phases"],
        serde_json::json!(["environment", "afterEnvironment", "processOptions", "initialize"])
    );
}

#[test]
fn cli_watch_with_mock_stops_after_scripted_cycles() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "forgepack.toml", "name = \"app\"\n");
    let output = run(&["--driver", "mock", "--json", "-c", &config.to_string_lossy(), "watch"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout_json(&output)["name"], "app");
}

#[test]
fn cli_several_configs_build_together() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_config(dir.path(), "a.toml", "name = \"a\"\n");
    let b = write_config(dir.path(), "b.toml", "name = \"b\"\ndependencies = [\"a\"]\n");
    let output = run(&[
        "--driver",
        "mock",
        "--json",
        "-c",
        &a.to_string_lossy(),
        "-c",
        &b.to_string_lossy(),
        "build",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout_json(&output)["children"].as_array().unwrap().len(), 2);
}

#[test]
fn cli_completions_bash() {
    let output = run(&["completions", "bash"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("forgepack"));
}

#[test]
fn cli_man_pages_written() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("man");
    let output = run(&["man-pages", &out.to_string_lossy()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(out.join("forgepack.1").exists());
    assert!(out.join("forgepack-build.1").exists());
}
