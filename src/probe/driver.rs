use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::domain::ProbeData;
use crate::error::AppError;

use super::args::build_probe_args;
use super::options::ProbeOptions;
use super::process_ext::{run_with_timeout, ActiveProcessRegistry};

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_CAPTURE_LIMIT: usize = 100 * 1024 * 1024;
const STDERR_TAIL_LINES: usize = 12;

/// Typed wrapper around the external probe and renderer binaries. Besides
/// configuration, it holds the registry of currently-running child
/// processes so a shutdown can force-kill stragglers past the grace period.
#[derive(Clone)]
pub struct ProbeDriver {
    probe_path: PathBuf,
    renderer_path: PathBuf,
    capture_limit: usize,
    processes: Arc<ActiveProcessRegistry>,
}

/// Output of a renderer invocation, captured line by line for the caller to
/// scrape metric values out of via a documented textual contract.
pub struct RendererOutput {
    pub stdout_lines: Vec<String>,
    pub stderr_lines: Vec<String>,
}

impl ProbeDriver {
    pub fn new(probe_path: PathBuf, renderer_path: PathBuf) -> Self {
        Self {
            probe_path,
            renderer_path,
            capture_limit: DEFAULT_CAPTURE_LIMIT,
            processes: Arc::new(ActiveProcessRegistry::new()),
        }
    }

    pub fn with_capture_limit(mut self, limit: usize) -> Self {
        self.capture_limit = limit;
        self
    }

    pub fn probe_path(&self) -> &Path {
        &self.probe_path
    }

    pub fn renderer_path(&self) -> &Path {
        &self.renderer_path
    }

    /// The registry of subprocesses this driver currently has in flight.
    /// Shutdown paths call [`ActiveProcessRegistry::kill_all`] on it once
    /// the grace period elapses.
    pub fn active_processes(&self) -> &Arc<ActiveProcessRegistry> {
        &self.processes
    }

    /// Runs the probe against `source_ref` under `options`, parsing stdout
    /// as JSON on success. `timeout` defaults to five minutes when absent.
    /// `cancel` is checked throughout the subprocess wait; a cancellation
    /// kills the child and returns [`AppError::Cancelled`].
    pub fn probe(
        &self,
        source_ref: &str,
        options: &ProbeOptions,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<ProbeData, AppError> {
        options
            .validate()
            .map_err(AppError::Validation)?;

        let args = build_probe_args(source_ref, options);
        let mut cmd = Command::new(&self.probe_path);
        cmd.args(&args);

        let outcome = run_with_timeout(
            cmd,
            timeout.unwrap_or(DEFAULT_PROBE_TIMEOUT),
            self.capture_limit,
            cancel,
            &self.processes,
        )
        .map_err(|e| AppError::ProbeFailed(format!("failed to spawn probe: {e}")))?;

        if outcome.cancelled {
            return Err(AppError::Cancelled);
        }

        if outcome.timed_out {
            return Err(AppError::Timeout("probe invocation exceeded its deadline".to_string()));
        }

        if !outcome.status.success() {
            return Err(AppError::ProbeFailed(stderr_tail(&outcome.stderr)));
        }

        super::parse::parse_probe_output(&outcome.stdout)
    }

    /// Runs the renderer with `filter_graph` over `inputs`, discarding muxed
    /// output (`-f null -`), and returns captured stdout/stderr split into
    /// lines for textual metric extraction. `cancel` is checked throughout
    /// the subprocess wait the same way as [`ProbeDriver::probe`].
    pub fn run_renderer(
        &self,
        inputs: &[&Path],
        filter_graph: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<RendererOutput, AppError> {
        let mut cmd = Command::new(&self.renderer_path);
        cmd.arg("-hide_banner").arg("-nostdin");
        for input in inputs {
            cmd.arg("-i").arg(input);
        }
        cmd.arg("-an")
            .arg("-sn")
            .arg("-lavfi")
            .arg(filter_graph)
            .arg("-f")
            .arg("null")
            .arg("-");

        let outcome = run_with_timeout(cmd, timeout, self.capture_limit, cancel, &self.processes)
            .map_err(|e| AppError::ProbeFailed(format!("failed to spawn renderer: {e}")))?;

        if outcome.cancelled {
            return Err(AppError::Cancelled);
        }

        if outcome.timed_out {
            return Err(AppError::Timeout("renderer invocation exceeded its deadline".to_string()));
        }

        if !outcome.status.success() {
            return Err(AppError::ProbeFailed(stderr_tail(&outcome.stderr)));
        }

        Ok(RendererOutput {
            stdout_lines: String::from_utf8_lossy(&outcome.stdout)
                .lines()
                .map(str::to_string)
                .collect(),
            stderr_lines: String::from_utf8_lossy(&outcome.stderr)
                .lines()
                .map(str::to_string)
                .collect(),
        })
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    text.lines()
        .rev()
        .take(STDERR_TAIL_LINES)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_rejects_unsafe_extra_args_before_spawning() {
        let driver = ProbeDriver::new(PathBuf::from("/bin/true"), PathBuf::from("/bin/true"));
        let opts = ProbeOptions {
            extra_args: vec!["; evil".to_string()],
            ..Default::default()
        };
        let err = driver
            .probe("input.mp4", &opts, None, &CancellationToken::new())
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn probe_missing_binary_is_probe_failed() {
        let driver = ProbeDriver::new(PathBuf::from("/no/such/probe-binary"), PathBuf::from("/no/such/renderer"));
        let err = driver
            .probe(
                "input.mp4",
                &ProbeOptions::default_survey(),
                Some(Duration::from_secs(5)),
                &CancellationToken::new(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), "probe_failed");
    }

    #[test]
    fn probe_cancelled_before_spawn_returns_cancelled_error() {
        let driver = ProbeDriver::new(PathBuf::from("/bin/sleep"), PathBuf::from("/bin/true"));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = driver
            .probe(
                "input.mp4",
                &ProbeOptions::default_survey(),
                Some(Duration::from_secs(5)),
                &cancel,
            )
            .unwrap_err();
        assert_eq!(err.kind(), "cancelled");
    }
}
