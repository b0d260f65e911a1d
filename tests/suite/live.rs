//! Live analysis against real analyzer processes

use std::time::Duration;

use sniff_analyzer::{AnalysisNotice, ProtocolError, Severity};

use crate::common::{self, FOO_ANALYZER, FakeAnalyzer, LINE_COUNTING_ANALYZER};

#[tokio::test]
async fn foo_py_warning_lands_on_line_index_four() {
    let analyzer = FakeAnalyzer::new(FOO_ANALYZER);
    let (_docs, foo) = common::document("foo.py", "x = 42\n");
    let mut manager = analyzer.manager(500);

    manager.on_document_opened(&foo, "x = 42\n");
    let notice = common::next_notice(&mut manager).await;
    assert!(matches!(
        notice,
        AnalysisNotice::DiagnosticsChanged { count: 1, .. }
    ));

    let diags = manager.diagnostics_for(&foo);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].line(), 4);
    assert_eq!(diags[0].col(), 0);
    assert_eq!(diags[0].severity(), Severity::Warning);
    assert_eq!(diags[0].message(), "magic number used");
    assert_eq!(diags[0].source(), "Smelly Python");
    assert_eq!(manager.snapshot().status_string(), "E:0 W:1 I:0");
}

#[tokio::test]
async fn unsaved_text_is_analyzed_not_the_file() {
    let analyzer = FakeAnalyzer::new(LINE_COUNTING_ANALYZER);
    let (_docs, foo) = common::document("foo.py", "on disk\n");
    let mut manager = analyzer.manager(500);

    manager.on_document_opened(&foo, "a\nb\nc\n");
    common::next_notice(&mut manager).await;
    assert_eq!(manager.diagnostics_for(&foo)[0].message(), "3 lines");
}

#[tokio::test]
async fn edit_burst_is_analyzed_once_with_final_text() {
    let analyzer = FakeAnalyzer::new(LINE_COUNTING_ANALYZER);
    let (_docs, foo) = common::document("foo.py", "");
    let mut manager = analyzer.manager(200);

    for text in ["a\n", "a\nb\n", "a\nb\nc\n", "a\nb\nc\nd\n"] {
        manager.on_document_changed(&foo, text);
    }
    common::next_notice(&mut manager).await;
    assert_eq!(manager.diagnostics_for(&foo)[0].message(), "4 lines");
    assert_eq!(manager.diagnostics_for(&foo)[0].line(), 3);

    tokio::time::sleep(Duration::from_millis(400)).await;
    manager.poll_events(16);
    assert_eq!(analyzer.calls(), 1);
}

#[tokio::test]
async fn malformed_output_keeps_previous_diagnostics() {
    let analyzer = FakeAnalyzer::new(
        r#"
text=$(cat)
if [ "$text" = "broken" ]; then
  echo 'Traceback (most recent call last):'
else
  echo '[{"line":1,"message":"kept","severity":"Error"}]'
fi
"#,
    );
    let (_docs, foo) = common::document("foo.py", "");
    let mut manager = analyzer.manager(500);

    manager.on_document_opened(&foo, "fine");
    common::next_notice(&mut manager).await;
    let applied = manager.last_applied_sequence(&foo);

    manager.on_document_saved(&foo, "broken");
    let notice = common::next_notice(&mut manager).await;
    match notice {
        AnalysisNotice::Failed { error, .. } => match error {
            ProtocolError::Malformed { raw, .. } => {
                assert!(raw.starts_with("Traceback"));
            }
            other => panic!("expected malformed output, got {other:?}"),
        },
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(manager.diagnostics_for(&foo)[0].message(), "kept");
    assert_eq!(manager.last_applied_sequence(&foo), applied);
}

#[tokio::test]
async fn crashing_analyzer_reports_stderr() {
    let analyzer = FakeAnalyzer::new("cat > /dev/null; echo 'ImportError: ast' >&2; exit 1");
    let (_docs, foo) = common::document("foo.py", "");
    let mut manager = analyzer.manager(500);

    manager.on_document_opened(&foo, "x = 1\n");
    match common::next_notice(&mut manager).await {
        AnalysisNotice::Failed {
            error: ProtocolError::NonZeroExit { code, stderr },
            ..
        } => {
            assert_eq!(code, Some(1));
            assert_eq!(stderr.trim(), "ImportError: ast");
        }
        other => panic!("expected non-zero exit, got {other:?}"),
    }
    assert!(manager.snapshot().is_empty());
}

#[tokio::test]
async fn empty_array_clears_diagnostics() {
    let analyzer = FakeAnalyzer::new(
        r#"
text=$(cat)
if [ "$text" = "clean" ]; then
  echo '[]'
else
  echo '[{"line":2,"message":"smell","severity":"Error"}]'
fi
"#,
    );
    let (_docs, foo) = common::document("foo.py", "");
    let mut manager = analyzer.manager(500);

    manager.on_document_opened(&foo, "smelly");
    common::next_notice(&mut manager).await;
    assert_eq!(manager.snapshot().error_count(), 1);

    manager.on_document_saved(&foo, "clean");
    let notice = common::next_notice(&mut manager).await;
    assert!(matches!(
        notice,
        AnalysisNotice::DiagnosticsChanged { count: 0, .. }
    ));
    assert!(manager.snapshot().is_empty());
}
