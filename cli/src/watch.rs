//! `sniff watch` - keep documents open and follow their changes on disk.
//!
//! `notify` delivers events on its own thread; they are forwarded into a tokio
//! channel and fed through the manager's debounced change path.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use sniff_analyzer::{AnalysisManager, AnalysisNotice, AnalyzerConfig};

use crate::{document_path, print_diagnostics};

enum Step {
    Quit,
    FileTouched(PathBuf),
    Handled,
}

pub async fn run(config: AnalyzerConfig, root: PathBuf, files: &[PathBuf]) -> Result<ExitCode> {
    let mut texts: HashMap<PathBuf, String> = HashMap::new();
    for file in files {
        let path = document_path(&config, file)?;
        let path = fs::canonicalize(&path)
            .with_context(|| format!("failed to resolve {}", path.display()))?;
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        texts.insert(path, text);
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) => {
            for path in event.paths {
                let _ = tx.send(path);
            }
        }
        Ok(_) => {}
        Err(e) => tracing::warn!("File watch error: {e}"),
    })
    .context("failed to start file watcher")?;

    // Watch parent directories so editors that save by rename are still seen.
    let dirs: BTreeSet<&Path> = texts.keys().filter_map(|p| p.parent()).collect();
    for dir in dirs {
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("failed to watch {}", dir.display()))?;
    }

    let mut manager = AnalysisManager::new(config, root);
    for (path, text) in &texts {
        manager.on_document_opened(path, text);
    }
    eprintln!("Watching {} file(s); Ctrl-C to stop", texts.len());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let step = tokio::select! {
            _ = &mut ctrl_c => Step::Quit,
            Some(path) = rx.recv() => Step::FileTouched(path),
            _ = manager.next_event() => Step::Handled,
        };

        match step {
            Step::Quit => break,
            Step::FileTouched(path) => on_file_touched(&mut manager, &mut texts, path),
            Step::Handled => report_notices(&mut manager),
        }
    }

    manager.shutdown();
    Ok(ExitCode::SUCCESS)
}

fn on_file_touched(
    manager: &mut AnalysisManager,
    texts: &mut HashMap<PathBuf, String>,
    path: PathBuf,
) {
    let Some(previous) = texts.get_mut(&path) else {
        return;
    };
    match fs::read_to_string(&path) {
        Ok(text) if text == *previous => {}
        Ok(text) => {
            manager.on_document_changed(&path, &text);
            *previous = text;
        }
        Err(e) => tracing::warn!(path = %path.display(), "Failed to re-read watched file: {e}"),
    }
}

fn report_notices(manager: &mut AnalysisManager) {
    for notice in manager.take_notices() {
        // Live failures stay in the log.
        if let AnalysisNotice::DiagnosticsChanged { document, count } = notice {
            println!("── {} ({count} issue(s))", document.path().display());
            print_diagnostics(document.path(), manager.diagnostics_for(document.path()));
        }
    }
}
