//! End-to-end runs of the `sniff` binary

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Child, Command, Output, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

use crate::common::{self, FOO_ANALYZER, FakeAnalyzer, LINE_COUNTING_ANALYZER};

/// `sniff` with `HOME` pointed at `home`, so logs stay out of the real one.
fn sniff_command(cwd: &Path, home: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_sniff"));
    cmd.args(args)
        .current_dir(cwd)
        .env("HOME", home)
        .env("RUST_LOG", "off");
    cmd
}

fn sniff(cwd: &Path, args: &[&str]) -> Output {
    let home = tempfile::tempdir().unwrap();
    sniff_command(cwd, home.path(), args).output().unwrap()
}

struct Running(Child);

impl Drop for Running {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn stdout_lines(child: &mut Child) -> Receiver<String> {
    let stdout = child.stdout.take().unwrap();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in BufReader::new(stdout).lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn wait_for_line(lines: &Receiver<String>, needle: &str) {
    loop {
        let line = lines
            .recv_timeout(Duration::from_secs(10))
            .unwrap_or_else(|_| panic!("no output containing {needle:?}"));
        if line.contains(needle) {
            return;
        }
    }
}

#[test]
fn check_prints_diagnostics() {
    let analyzer = FakeAnalyzer::new(FOO_ANALYZER);
    let config = analyzer.write_config();
    let (docs, _foo) = common::document("foo.py", "x = 42\n");

    let out = sniff(
        docs.path(),
        &["--config", config.to_str().unwrap(), "check", "foo.py"],
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8(out.stdout).unwrap();
    assert!(stdout.contains("foo.py:5:1: warning: [Smelly Python] magic number used"));
}

#[test]
fn check_fails_when_analyzer_crashes() {
    let analyzer = FakeAnalyzer::new("cat > /dev/null; echo boom >&2; exit 2");
    let config = analyzer.write_config();
    let (docs, _foo) = common::document("foo.py", "x = 1\n");

    let out = sniff(
        docs.path(),
        &["--config", config.to_str().unwrap(), "check", "foo.py"],
    );
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("boom"));
}

#[test]
fn check_rejects_unsupported_file() {
    let analyzer = FakeAnalyzer::new(FOO_ANALYZER);
    let config = analyzer.write_config();
    let (docs, _notes) = common::document("notes.txt", "hi");

    let out = sniff(
        docs.path(),
        &["--config", config.to_str().unwrap(), "check", "notes.txt"],
    );
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("not a supported document"));
}

#[test]
fn report_writes_html_file() {
    let analyzer = FakeAnalyzer::new(FOO_ANALYZER);
    let config = analyzer.write_config();
    let (docs, _foo) = common::document("foo.py", "x = 42\n");
    let html = docs.path().join("report.html");

    let out = sniff(
        docs.path(),
        &[
            "--config",
            config.to_str().unwrap(),
            "report",
            "foo.py",
            "--output",
            html.to_str().unwrap(),
        ],
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(fs::read_to_string(&html).unwrap().contains("report for"));
}

#[test]
fn report_failure_exits_non_zero_with_error_page() {
    let analyzer = FakeAnalyzer::new("echo 'SyntaxError: bad' >&2; exit 1");
    let config = analyzer.write_config();
    let (docs, _foo) = common::document("foo.py", "x = \n");

    let out = sniff(
        docs.path(),
        &["--config", config.to_str().unwrap(), "report", "foo.py"],
    );
    assert_eq!(out.status.code(), Some(1));
    let page = String::from_utf8(out.stdout).unwrap();
    assert!(page.contains("<title>Smell Report: foo.py</title>"));
    assert!(page.contains("SyntaxError: bad"));
}

#[test]
fn logs_go_under_home() {
    let analyzer = FakeAnalyzer::new(FOO_ANALYZER);
    let config = analyzer.write_config();
    let (docs, _foo) = common::document("foo.py", "x = 42\n");
    let home = tempfile::tempdir().unwrap();

    let out = sniff_command(
        docs.path(),
        home.path(),
        &["--config", config.to_str().unwrap(), "check", "foo.py"],
    )
    .output()
    .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(home.path().join(".sniff/logs/sniff.log").is_file());
    assert!(!docs.path().join(".sniff").exists());
}

#[test]
fn watch_reanalyzes_changed_file() {
    let analyzer = FakeAnalyzer::new(LINE_COUNTING_ANALYZER);
    let config = analyzer.write_config();
    let (docs, foo) = common::document("foo.py", "a\nb\n");
    let home = tempfile::tempdir().unwrap();

    let mut child = sniff_command(
        docs.path(),
        home.path(),
        &["--config", config.to_str().unwrap(), "watch", "foo.py"],
    )
    .stdout(Stdio::piped())
    .stderr(Stdio::null())
    .spawn()
    .unwrap();
    let lines = stdout_lines(&mut child);
    let _running = Running(child);

    wait_for_line(&lines, "2 lines");
    fs::write(&foo, "a\nb\nc\nd\n").unwrap();
    wait_for_line(&lines, "4 lines");
    assert!(analyzer.calls() >= 2);
}
