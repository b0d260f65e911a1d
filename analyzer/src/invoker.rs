//! Process invoker - runs one analyzer process per request.
//!
//! Every invocation resolves to exactly one [`AnalyzerOutcome`]. Spawn
//! failures, stdin write failures and timeouts become
//! [`AnalyzerOutcome::ProcessError`]; they never escape as panics or `Err`s.
//! Dropping the returned future kills the child (`kill_on_drop`), which is how
//! superseded live analyses are terminated.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, Command};

use crate::codec::EncodedRequest;
use crate::locator::AnalyzerTarget;
use crate::types::AnalyzerOutcome;

/// Invocation future type alias.
pub type InvokeFut = Pin<Box<dyn Future<Output = AnalyzerOutcome> + Send + 'static>>;

/// Seam between scheduling and process management.
pub trait Invoke: Send + Sync + 'static {
    fn invoke(&self, target: &AnalyzerTarget, request: EncodedRequest) -> InvokeFut;
}

/// Spawns the analyzer with `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct ProcessInvoker {
    timeout: Option<Duration>,
}

impl ProcessInvoker {
    #[must_use]
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl Invoke for ProcessInvoker {
    fn invoke(&self, target: &AnalyzerTarget, request: EncodedRequest) -> InvokeFut {
        let target = target.clone();
        let timeout = self.timeout;
        Box::pin(async move { run_process(&target, request, timeout).await })
    }
}

async fn read_all<R: AsyncRead + Unpin>(stream: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        stream.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

async fn write_stdin(stdin: Option<ChildStdin>, text: Option<String>) -> io::Result<()> {
    let (Some(mut stdin), Some(text)) = (stdin, text) else {
        return Ok(());
    };
    stdin.write_all(text.as_bytes()).await?;
    // Dropping after shutdown closes the pipe so the analyzer sees EOF.
    stdin.shutdown().await
}

async fn run_process(
    target: &AnalyzerTarget,
    request: EncodedRequest,
    timeout: Option<Duration>,
) -> AnalyzerOutcome {
    let EncodedRequest { args, stdin } = request;
    let program = target.program().display().to_string();

    let mut cmd = Command::new(target.program());
    cmd.args(target.leading_args())
        .args(&args)
        .current_dir(target.cwd())
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            tracing::warn!(program = %program, "Failed to start analyzer: {e}");
            return AnalyzerOutcome::ProcessError(format!("failed to start {program}: {e}"));
        }
    };
    tracing::debug!(program = %program, pid = ?child.id(), "Analyzer started");

    let child_stdin = child.stdin.take();
    let child_stdout = child.stdout.take();
    let child_stderr = child.stderr.take();

    let run = async {
        let (written, stdout, stderr) = tokio::join!(
            write_stdin(child_stdin, stdin),
            read_all(child_stdout),
            read_all(child_stderr),
        );
        let status = child.wait().await;
        (written, stdout, stderr, status)
    };

    let finished = match timeout {
        Some(limit) => tokio::time::timeout(limit, run).await.ok(),
        None => Some(run.await),
    };

    let Some((written, stdout, stderr, status)) = finished else {
        let _ = child.kill().await;
        let limit = timeout.unwrap_or_default();
        tracing::warn!(program = %program, "Analyzer timed out after {limit:?}");
        return AnalyzerOutcome::ProcessError(format!(
            "analyzer timed out after {}s",
            limit.as_secs_f64()
        ));
    };
    if let Err(e) = written {
        return AnalyzerOutcome::ProcessError(format!("writing analyzer stdin: {e}"));
    }
    let stdout = match stdout {
        Ok(bytes) => bytes,
        Err(e) => return AnalyzerOutcome::ProcessError(format!("reading analyzer stdout: {e}")),
    };
    let stderr = String::from_utf8_lossy(&stderr.unwrap_or_default()).into_owned();
    let status = match status {
        Ok(status) => status,
        Err(e) => return AnalyzerOutcome::ProcessError(format!("waiting for analyzer: {e}")),
    };

    tracing::debug!(program = %program, status = %status, "Analyzer exited");
    if status.success() {
        AnalyzerOutcome::Success(stdout)
    } else {
        AnalyzerOutcome::NonZeroExit {
            code: status.code(),
            stderr,
        }
    }
}
