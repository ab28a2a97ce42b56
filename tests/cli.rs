#![cfg(feature = "server")]

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn generates_svg_from_workflow_file() -> Result<(), Box<dyn std::error::Error>> {
    let fixture =
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/input/etl_workflow.json");
    assert!(fixture.exists(), "fixture workflow should exist");

    let tmp = tempdir()?;
    let output_path = tmp.path().join("workflow.svg");

    let mut cmd = Command::cargo_bin("flowcanvas")?;
    cmd.arg("--input")
        .arg(&fixture)
        .arg("--output")
        .arg(&output_path)
        .arg("--output-format")
        .arg("svg");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Rendered workflow"));

    let svg_contents = fs::read_to_string(&output_path)?;
    assert!(
        svg_contents.contains("<svg"),
        "output should contain an <svg> element"
    );
    assert!(
        svg_contents.contains("Energy Meter"),
        "node labels should appear in the rendered output"
    );

    Ok(())
}

#[test]
fn renders_stdin_to_stdout() -> Result<(), Box<dyn std::error::Error>> {
    let definition = r#"{
        "id": "wf-stdin",
        "name": "Stdin Workflow",
        "nodes": [
            { "id": "node-1", "kind": "scheduler", "position": { "x": 80.0, "y": 80.0 } }
        ]
    }"#;

    let mut cmd = Command::cargo_bin("flowcanvas")?;
    cmd.arg("--input").arg("-").arg("--output").arg("-");
    cmd.write_stdin(definition);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("<svg"));

    Ok(())
}

#[test]
fn rejects_a_missing_input_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("flowcanvas")?;
    cmd.arg("--input").arg("does-not-exist.json");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));

    Ok(())
}
