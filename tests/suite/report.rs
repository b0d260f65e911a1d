//! Full report sessions and analyzer location

use std::fs;

use sniff_analyzer::{
    AnalyzerConfig, Locator, ReportError, ReportSession, ReportSurface, ReportView,
};

use crate::common::{self, FOO_ANALYZER, FakeAnalyzer};

#[derive(Default)]
struct Surface {
    views: Vec<ReportView>,
    titles: Vec<String>,
}

impl ReportSurface for Surface {
    fn show(&mut self, title: &str, view: &ReportView) {
        self.titles.push(title.to_string());
        self.views.push(view.clone());
    }
}

#[tokio::test]
async fn report_renders_analyzer_html() {
    let analyzer = FakeAnalyzer::new(FOO_ANALYZER);
    let (_docs, foo) = common::document("foo.py", "x = 42\n");
    let session = ReportSession::new(analyzer.config(500), analyzer.dir.path());
    let mut surface = Surface::default();

    let view = session.start(&foo, &mut surface).await.unwrap();
    let ReportView::Rendered(html) = &view else {
        panic!("expected a rendered report, got {view:?}");
    };
    assert!(html.contains(&format!("report for {}", foo.display())));
    assert_eq!(surface.views[0], ReportView::Loading);
    assert_eq!(surface.titles, vec!["Smell Report: foo.py"; 2]);
}

#[tokio::test]
async fn report_with_no_output_is_an_error() {
    let analyzer = FakeAnalyzer::new("exit 0");
    let (_docs, foo) = common::document("foo.py", "");
    let session = ReportSession::new(analyzer.config(500), analyzer.dir.path());

    let view = session.start(&foo, &mut Surface::default()).await.unwrap();
    let ReportView::Failed(text) = &view else {
        panic!("expected failure, got {view:?}");
    };
    assert!(text.starts_with("Analyzer finished but returned no output."));
    assert!(view.to_html("Smell Report: foo.py").contains("Analysis failed"));
}

#[tokio::test]
async fn report_rejects_unsupported_documents() {
    let analyzer = FakeAnalyzer::new(FOO_ANALYZER);
    let (_docs, notes) = common::document("notes.txt", "hello");
    let session = ReportSession::new(analyzer.config(500), analyzer.dir.path());
    let mut surface = Surface::default();

    let err = session.start(&notes, &mut surface).await.unwrap_err();
    assert!(matches!(err, ReportError::UnsupportedDocument(_)));
    assert!(surface.views.is_empty());
}

#[test]
fn locator_falls_back_to_configured_path() {
    let analyzer = FakeAnalyzer::new(FOO_ANALYZER);
    let install = tempfile::tempdir().unwrap();
    let config: AnalyzerConfig = serde_json::from_value(serde_json::json!({
        "search": [
            { "relative_to_install": "../smelly_python/main.py" },
            { "path": analyzer.script }
        ]
    }))
    .unwrap();

    let locator = Locator::new(&config, install.path().join("bin"));
    let target = locator.resolve().unwrap();
    assert_eq!(target.program(), analyzer.script.as_path());
    assert!(common::paths_equal(target.cwd(), analyzer.dir.path()));
}

#[test]
fn locator_prefers_install_relative_script() {
    let install = tempfile::tempdir().unwrap();
    let tool = install.path().join("smelly_python");
    fs::create_dir_all(&tool).unwrap();
    fs::write(tool.join("main.py"), "").unwrap();
    let bin = install.path().join("bin");
    fs::create_dir_all(&bin).unwrap();

    let target = Locator::new(&AnalyzerConfig::default(), &bin)
        .resolve()
        .unwrap();
    assert!(common::paths_equal(target.program(), &tool.join("main.py")));
}
