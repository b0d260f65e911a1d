//! Shared test utilities and fixtures
//!
//! Scratch analyzers are shell scripts named `main.py` that speak the
//! analyzer's command-line protocol.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sniff_analyzer::{AnalysisManager, AnalysisNotice, AnalyzerConfig, Locator};
use tempfile::TempDir;

/// Prints one finding for line 5 in live mode and a tiny page in report mode.
pub const FOO_ANALYZER: &str = r#"
case "$1" in
  --json)
    cat > /dev/null
    echo '[{"line":5,"message":"magic number used","severity":"Warning"}]'
    ;;
  --html)
    echo "<html><body>report for $2</body></html>"
    ;;
esac
"#;

/// Reports one Information finding on the last line of the text it receives,
/// and logs each invocation to `calls.log` next to the script.
pub const LINE_COUNTING_ANALYZER: &str = r#"
echo run >> calls.log
n=$(wc -l | tr -d ' ')
echo "[{\"line\":$n,\"message\":\"$n lines\",\"severity\":\"Information\"}]"
"#;

/// A scratch directory holding an executable `main.py`.
pub struct FakeAnalyzer {
    pub dir: TempDir,
    pub script: PathBuf,
}

impl FakeAnalyzer {
    pub fn new(body: &str) -> Self {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("main.py");
        fs::write(&script, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        Self { dir, script }
    }

    pub fn config(&self, debounce_ms: u64) -> AnalyzerConfig {
        serde_json::from_value(serde_json::json!({
            "search": [{ "path": self.script }],
            "debounce_ms": debounce_ms,
            "timeout_secs": 10
        }))
        .unwrap()
    }

    pub fn manager(&self, debounce_ms: u64) -> AnalysisManager {
        let config = self.config(debounce_ms);
        AnalysisManager::new(config, self.dir.path())
    }

    pub fn locator(&self, config: &AnalyzerConfig) -> Locator {
        Locator::new(config, self.dir.path())
    }

    /// Number of runs recorded by [`LINE_COUNTING_ANALYZER`].
    pub fn calls(&self) -> usize {
        fs::read_to_string(self.dir.path().join("calls.log"))
            .map(|log| log.lines().count())
            .unwrap_or(0)
    }

    /// Write a sniff config file pointing at this analyzer.
    pub fn write_config(&self) -> PathBuf {
        let path = self.dir.path().join("config.toml");
        fs::write(
            &path,
            format!(
                "[analyzer]\nsearch = [{{ path = \"{}\" }}]\ntimeout_secs = 10\n",
                self.script.display()
            ),
        )
        .unwrap();
        path
    }
}

/// A document file with the given contents in a fresh directory.
pub fn document(name: &str, text: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    fs::write(&path, text).unwrap();
    (dir, path)
}

/// Drive the manager until it queues a notice.
pub async fn next_notice(manager: &mut AnalysisManager) -> AnalysisNotice {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if let Some(notice) = manager.take_notices().into_iter().next() {
                return notice;
            }
            manager.next_event().await;
        }
    })
    .await
    .expect("analysis did not finish in time")
}

pub fn paths_equal(a: &Path, b: &Path) -> bool {
    fs::canonicalize(a).unwrap() == fs::canonicalize(b).unwrap()
}
