//! Analyzer location - turns configured search strategies into a runnable target.
//!
//! Resolution is a pure function over configuration plus filesystem existence
//! checks. Nothing is spawned here, and no machine-specific path is ever used
//! unless it was configured explicitly.

use std::path::{Path, PathBuf};

use crate::types::{AnalyzerConfig, Launcher, SearchStrategy};

#[derive(Debug, thiserror::Error)]
pub enum LocatorError {
    #[error("analyzer script not found; searched: {}", display_paths(.searched))]
    NotFound { searched: Vec<PathBuf> },
    #[error("launcher `{command}` not found in PATH: {source}")]
    Launcher {
        command: String,
        #[source]
        source: which::Error,
    },
}

impl LocatorError {
    /// Candidate paths that were tried, in order (empty for launcher failures).
    #[must_use]
    pub fn searched(&self) -> &[PathBuf] {
        match self {
            Self::NotFound { searched } => searched,
            Self::Launcher { .. } => &[],
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A fully resolved way to run the analyzer.
///
/// The command line is `program leading_args... <request args>`, run from `cwd`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerTarget {
    program: PathBuf,
    leading_args: Vec<String>,
    cwd: PathBuf,
}

impl AnalyzerTarget {
    #[must_use]
    pub fn new(program: PathBuf, leading_args: Vec<String>, cwd: PathBuf) -> Self {
        Self {
            program,
            leading_args,
            cwd,
        }
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    #[must_use]
    pub fn leading_args(&self) -> &[String] {
        &self.leading_args
    }

    #[must_use]
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }
}

#[derive(Debug, Clone)]
pub struct Locator {
    install_root: PathBuf,
    search: Vec<SearchStrategy>,
    launcher: Option<Launcher>,
}

impl Locator {
    #[must_use]
    pub fn new(config: &AnalyzerConfig, install_root: impl Into<PathBuf>) -> Self {
        Self {
            install_root: install_root.into(),
            search: config.search().to_vec(),
            launcher: config.launcher().cloned(),
        }
    }

    /// Candidate script paths, in strategy order.
    #[must_use]
    pub fn candidates(&self) -> Vec<PathBuf> {
        self.search
            .iter()
            .map(|strategy| match strategy {
                SearchStrategy::RelativeToInstall(rel) => self.install_root.join(rel),
                SearchStrategy::Path(path) => path.clone(),
            })
            .collect()
    }

    /// Pick the first existing candidate and attach the launcher, if any.
    pub fn resolve(&self) -> Result<AnalyzerTarget, LocatorError> {
        let candidates = self.candidates();
        let Some(script) = candidates.iter().find(|p| p.is_file()).cloned() else {
            return Err(LocatorError::NotFound {
                searched: candidates,
            });
        };
        tracing::debug!(script = %script.display(), "Resolved analyzer script");

        let cwd = script
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.install_root.clone());

        match &self.launcher {
            Some(launcher) => {
                let program = which::which(launcher.command()).map_err(|source| {
                    LocatorError::Launcher {
                        command: launcher.command().to_string(),
                        source,
                    }
                })?;
                let mut leading_args = launcher.args().to_vec();
                leading_args.push(script.to_string_lossy().into_owned());
                Ok(AnalyzerTarget::new(program, leading_args, cwd))
            }
            None => Ok(AnalyzerTarget::new(script, Vec::new(), cwd)),
        }
    }
}
