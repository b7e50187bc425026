mod common;

use common::*;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

struct TestContext {
    dir: TempDir,
    institution: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let institution = dir.path().join("institution.json");
        let json = InstitutionBuilder::new()
            .level("6e", &[("Math", 3.0), ("Art", 1.5)])
            .subject("Math", single("Curie"))
            .subject("Art", single("Monet"))
            .class("6A", "6e", 24)
            .teacher("Curie")
            .teacher("Monet")
            .room("R1", 30)
            .to_json();
        fs::write(&institution, json).unwrap();
        Self { dir, institution }
    }

    fn out_dir(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_timeforge"))
            .arg("--institution")
            .arg(&self.institution)
            .args(args)
            .output()
            .expect("Failed to run timeforge")
    }

    fn solve(&self) -> Output {
        let out = self.out_dir();
        self.run(&[
            "solve",
            "--attempts",
            "2",
            "--threads",
            "1",
            "--seed",
            "5",
            "--search-steps",
            "20000",
            "--out",
            out.to_str().unwrap(),
        ])
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_solve_writes_outputs() {
    let ctx = TestContext::new();
    let output = ctx.solve();
    assert!(output.status.success(), "solve failed: {}", stdout(&output));

    let out = ctx.out_dir();
    for file in ["schedule.json", "report.json", "timetable.json"] {
        assert!(out.join(file).exists(), "{} missing", file);
    }
    assert!(!out.join("runs.json").exists());

    let timetable = read_json(&out.join("timetable.json"));
    // 3 Math and 2 Art sessions over the cycle.
    assert_eq!(timetable["assignments"].as_array().unwrap().len(), 5);

    let report = read_json(&out.join("report.json"));
    assert!(report["global_score"].as_f64().unwrap() > 0.0);

    let text = stdout(&output);
    let global = Regex::new(r"Global\s*\|\s*\d+\.\d{2}%").unwrap();
    assert!(global.is_match(&text), "missing summary table:\n{}", text);
    assert!(text.contains("Schedule: 6A"));
}

#[test]
fn test_keep_all_runs_writes_every_run() {
    let ctx = TestContext::new();
    let out = ctx.out_dir();
    let output = ctx.run(&[
        "solve",
        "--attempts",
        "2",
        "--threads",
        "1",
        "--seed",
        "5",
        "--search-steps",
        "20000",
        "--keep-all-runs",
        "--out",
        out.to_str().unwrap(),
    ]);
    assert!(output.status.success());

    let runs = read_json(&out.join("runs.json"));
    assert_eq!(runs.as_array().unwrap().len(), 2);
}

#[test]
fn test_verify_accepts_solved_timetable() {
    let ctx = TestContext::new();
    assert!(ctx.solve().status.success());

    let timetable = ctx.out_dir().join("timetable.json");
    let output = ctx.run(&["verify", "--timetable", timetable.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(0), "{}", stdout(&output));
    assert!(stdout(&output).contains("volume"));
}

#[test]
fn test_verify_flags_session_at_lunch() {
    let ctx = TestContext::new();
    assert!(ctx.solve().status.success());

    let path = ctx.out_dir().join("timetable.json");
    let mut doc = read_json(&path);
    doc["assignments"][0]["period"] = serde_json::Value::String("12:00".to_string());
    fs::write(&path, serde_json::to_string(&doc).unwrap()).unwrap();

    let report_dir = ctx.dir.path().join("audit");
    let output = ctx.run(&[
        "verify",
        "--timetable",
        path.to_str().unwrap(),
        "--out",
        report_dir.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stdout(&output).contains("[calendar-blocking]"));

    let report = read_json(&report_dir.join("report.json"));
    assert!(report["mandatory_score"].as_f64().unwrap() < 100.0);
}

#[test]
fn test_unknown_reference_fails_cleanly() {
    let ctx = TestContext::new();
    let broken = ctx.dir.path().join("broken.json");
    let json = InstitutionBuilder::new()
        .level("6e", &[("Math", 3.0)])
        .subject("Math", single("Mozart"))
        .class("6A", "6e", 24)
        .to_json();
    fs::write(&broken, json).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_timeforge"))
        .arg("--institution")
        .arg(&broken)
        .arg("solve")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("Mozart"));
}
