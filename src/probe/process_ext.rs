//! Subprocess execution with a hard wall-clock timeout, cooperative
//! cancellation, and bounded output capture, shared by the probe and
//! renderer invocations.

use std::collections::HashMap;
use std::io::Read;
use std::process::{Child, ChildStderr, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct CapturedOutput {
    pub status: ExitStatus,
    pub timed_out: bool,
    pub cancelled: bool,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Tracks every child process currently spawned by [`run_with_timeout`] so
/// [`kill_all`](ActiveProcessRegistry::kill_all) can force-terminate them
/// past the shutdown grace period, instead of leaving `run_with_timeout`'s
/// poll loop to notice cancellation on its own schedule.
#[derive(Default)]
pub struct ActiveProcessRegistry {
    children: Mutex<HashMap<u64, Arc<Mutex<Child>>>>,
    next_id: AtomicU64,
}

impl ActiveProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, child: Arc<Mutex<Child>>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.children.lock().unwrap_or_else(|e| e.into_inner()).insert(id, child);
        id
    }

    fn unregister(&self, id: u64) {
        self.children.lock().unwrap_or_else(|e| e.into_inner()).remove(&id);
    }

    /// Sends a kill signal to every process still tracked. Used once the
    /// shutdown grace period elapses and worker threads still haven't
    /// returned from their subprocess wait.
    pub fn kill_all(&self) {
        let children = self.children.lock().unwrap_or_else(|e| e.into_inner());
        for child in children.values() {
            let mut guard = child.lock().unwrap_or_else(|e| e.into_inner());
            let _ = guard.kill();
        }
    }
}

fn drain_capped(mut reader: impl Read + Send + 'static, cap: usize) -> std::thread::JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut captured = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(_) => break,
            };
            if captured.len() < cap {
                let remaining = cap - captured.len();
                let to_copy = remaining.min(n);
                captured.extend_from_slice(&buf[..to_copy]);
            }
        }
        captured
    })
}

/// Runs `cmd` to completion, capturing stdout/stderr up to `capture_limit`
/// bytes each. The child is killed, and the outcome marked accordingly, the
/// moment it outlives `timeout` or `cancel` is cancelled — whichever comes
/// first. The process is also registered with `registry` for the duration
/// of the call so a hung shutdown can force-kill it from outside this loop.
pub fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    capture_limit: usize,
    cancel: &CancellationToken,
    registry: &ActiveProcessRegistry,
) -> std::io::Result<CapturedOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child: Child = cmd.spawn()?;

    let stdout: Option<ChildStdout> = child.stdout.take();
    let stderr: Option<ChildStderr> = child.stderr.take();
    let stdout_handle = stdout.map(|r| drain_capped(r, capture_limit));
    let stderr_handle = stderr.map(|r| drain_capped(r, capture_limit));

    let child = Arc::new(Mutex::new(child));
    let registry_id = registry.register(child.clone());

    let start = Instant::now();
    let mut timed_out = false;
    let mut cancelled = false;
    let status = loop {
        {
            let mut guard = child.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(status) = guard.try_wait()? {
                break status;
            }
            if cancel.is_cancelled() {
                cancelled = true;
                drop(guard.kill());
                break guard.wait()?;
            }
            if start.elapsed() >= timeout {
                timed_out = true;
                drop(guard.kill());
                break guard.wait()?;
            }
        }
        std::thread::sleep(POLL_INTERVAL);
    };
    registry.unregister(registry_id);

    let stdout_bytes = stdout_handle.map(|h| h.join().unwrap_or_default()).unwrap_or_default();
    let stderr_bytes = stderr_handle.map(|h| h.join().unwrap_or_default()).unwrap_or_default();

    Ok(CapturedOutput {
        status,
        timed_out,
        cancelled,
        stdout: stdout_bytes,
        stderr: stderr_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_and_exit_status() {
        let mut cmd = Command::new("printf");
        cmd.arg("hello");
        let out = run_with_timeout(cmd, Duration::from_secs(5), 1024, &CancellationToken::new(), &ActiveProcessRegistry::new()).unwrap();
        assert!(out.status.success());
        assert_eq!(String::from_utf8_lossy(&out.stdout), "hello");
        assert!(!out.timed_out);
        assert!(!out.cancelled);
    }

    #[test]
    fn kills_process_that_exceeds_timeout() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let out = run_with_timeout(cmd, Duration::from_millis(50), 1024, &CancellationToken::new(), &ActiveProcessRegistry::new()).unwrap();
        assert!(out.timed_out);
        assert!(!out.cancelled);
    }

    #[test]
    fn caps_captured_output_at_limit() {
        let mut cmd = Command::new("yes");
        let out = run_with_timeout(cmd.arg("x"), Duration::from_millis(100), 16, &CancellationToken::new(), &ActiveProcessRegistry::new()).unwrap();
        assert!(out.stdout.len() <= 16);
    }

    #[test]
    fn cancelling_the_token_kills_the_child_before_the_timeout() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let start = Instant::now();
        let out = run_with_timeout(cmd, Duration::from_secs(5), 1024, &cancel, &ActiveProcessRegistry::new()).unwrap();
        assert!(out.cancelled);
        assert!(!out.timed_out);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn kill_all_terminates_a_tracked_process() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let registry = Arc::new(ActiveProcessRegistry::new());
        let cancel = CancellationToken::new();

        let registry_clone = registry.clone();
        let handle = std::thread::spawn(move || run_with_timeout(cmd, Duration::from_secs(30), 1024, &cancel, &registry_clone));

        std::thread::sleep(Duration::from_millis(100));
        registry.kill_all();
        let out = handle.join().unwrap().unwrap();
        assert!(!out.status.success());
    }
}
